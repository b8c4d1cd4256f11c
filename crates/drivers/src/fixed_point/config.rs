use thiserror::Error;

/// Configuration for the fixed-point driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    tolerance: f64,
}

/// Errors that can occur when validating a fixed-point driver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_iters must be at least 1")]
    MaxIters,

    #[error("tolerance must be finite and non-negative")]
    Tolerance,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(100, 1e-10).unwrap()
    }
}

impl Config {
    /// Creates a new config with a validated iteration limit and tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iters` is zero or the tolerance is negative
    /// or non-finite.
    pub fn new(max_iters: usize, tolerance: f64) -> Result<Self, ConfigError> {
        if max_iters == 0 {
            return Err(ConfigError::MaxIters);
        }
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::Tolerance);
        }
        Ok(Self {
            max_iters,
            tolerance,
        })
    }

    /// Returns the maximum number of iterations per run.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the absolute tolerance on `|x_out - x_in|`.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}
