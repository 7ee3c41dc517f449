//! One Euro filter: adaptive low-pass for jittery pointer signals.
//!
//! Smooth at rest, responsive during saccades. The cutoff frequency rises
//! with the filtered speed estimate.

use std::f64::consts::PI;

/// Tuning for one filter channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneEuroParams {
    /// Nominal sample rate (Hz), replaced by the measured rate once two
    /// timestamps have been seen.
    pub freq: f64,
    /// Minimum cutoff frequency (Hz). Lower = smoother at rest.
    pub min_cutoff: f64,
    /// Speed coefficient. Higher = less lag during fast motion.
    pub beta: f64,
    /// Derivative cutoff frequency (Hz).
    pub d_cutoff: f64,
}

impl OneEuroParams {
    /// Same rates, with cutoff and speed coefficient scaled.
    pub fn scaled(&self, cutoff_scale: f64, beta_scale: f64) -> Self {
        Self {
            freq: self.freq,
            min_cutoff: self.min_cutoff * cutoff_scale,
            beta: self.beta * beta_scale,
            d_cutoff: self.d_cutoff,
        }
    }
}

/// Scalar One Euro filter.
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    params: OneEuroParams,
    x_prev: f64,
    dx_prev: f64,
    t_prev: f64,
    initialized: bool,
}

impl OneEuroFilter {
    pub fn new(params: OneEuroParams) -> Self {
        Self {
            params,
            x_prev: 0.0,
            dx_prev: 0.0,
            t_prev: 0.0,
            initialized: false,
        }
    }

    pub fn params(&self) -> OneEuroParams {
        self.params
    }

    /// Swap tuning without dropping smoothing memory.
    pub fn set_params(&mut self, params: OneEuroParams) {
        self.params = params;
    }

    fn smoothing_factor(t_e: f64, cutoff: f64) -> f64 {
        let r = 2.0 * PI * cutoff * t_e;
        r / (r + 1.0)
    }

    /// Filter one value. `t` is in seconds. The first call returns `x`.
    pub fn filter(&mut self, t: f64, x: f64) -> f64 {
        if !self.initialized {
            self.x_prev = x;
            self.dx_prev = 0.0;
            self.t_prev = t;
            self.initialized = true;
            return x;
        }

        let t_e = t - self.t_prev;
        if t_e <= 0.0 {
            return self.x_prev;
        }
        self.params.freq = 1.0 / t_e;

        let a_d = Self::smoothing_factor(t_e, self.params.d_cutoff);
        let dx = (x - self.x_prev) / t_e;
        let dx_hat = a_d * dx + (1.0 - a_d) * self.dx_prev;

        let cutoff = self.params.min_cutoff + self.params.beta * dx_hat.abs();
        let a = Self::smoothing_factor(t_e, cutoff);
        let x_hat = a * x + (1.0 - a) * self.x_prev;

        self.x_prev = x_hat;
        self.dx_prev = dx_hat;
        self.t_prev = t;
        x_hat
    }

    pub fn value(&self) -> Option<f64> {
        self.initialized.then_some(self.x_prev)
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.x_prev = 0.0;
        self.dx_prev = 0.0;
        self.t_prev = 0.0;
    }
}

/// Pair of filters for a 2D point.
#[derive(Debug, Clone)]
pub struct OneEuroFilter2D {
    pub x: OneEuroFilter,
    pub y: OneEuroFilter,
}

impl OneEuroFilter2D {
    pub fn new(params: OneEuroParams) -> Self {
        Self {
            x: OneEuroFilter::new(params),
            y: OneEuroFilter::new(params),
        }
    }

    pub fn set_params(&mut self, params: OneEuroParams) {
        self.x.set_params(params);
        self.y.set_params(params);
    }

    pub fn filter(&mut self, t: f64, pos: (f64, f64)) -> (f64, f64) {
        (self.x.filter(t, pos.0), self.y.filter(t, pos.1))
    }

    pub fn value(&self) -> Option<(f64, f64)> {
        Some((self.x.value()?, self.y.value()?))
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
