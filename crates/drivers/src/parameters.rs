use thiserror::Error;
use weave_core::{DriverContext, Error, Kind, References};

/// Errors from declaring or applying parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("'{path}' is already a parameter")]
    Duplicate { path: String },

    #[error("'{path}' has low bound {low} above high bound {high}")]
    EmptyRange { path: String, low: f64, high: f64 },

    #[error("'{path}' is not a float variable")]
    NotFloat { path: String },

    #[error("expected {expected} parameter values, got {found}")]
    Count { expected: usize, found: usize },
}

/// A design variable with its bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub path: String,
    pub low: f64,
    pub high: f64,
}

impl Parameter {
    /// Maps a value in `[0, 1]` onto the parameter's range.
    #[must_use]
    pub fn scale(&self, unit: f64) -> f64 {
        self.low + (self.high - self.low) * unit
    }
}

/// The design variables a driver writes, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    params: Vec<Parameter>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is already a parameter or `low > high`.
    pub fn add(&mut self, path: impl Into<String>, low: f64, high: f64) -> Result<(), ParameterError> {
        let path = path.into();
        if self.params.iter().any(|p| p.path == path) {
            return Err(ParameterError::Duplicate { path });
        }
        if low.partial_cmp(&high).is_none_or(std::cmp::Ordering::is_gt) {
            return Err(ParameterError::EmptyRange { path, low, high });
        }
        self.params.push(Parameter { path, low, high });
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Adds every parameter to a driver's written references.
    #[must_use]
    pub fn references(&self, refs: References) -> References {
        self.params.iter().fold(refs, |refs, p| refs.write(&p.path))
    }

    /// Maps a point in the unit cube onto the parameter ranges.
    #[must_use]
    pub fn scale(&self, unit: &[f64]) -> Vec<f64> {
        self.params.iter().zip(unit).map(|(p, &u)| p.scale(u)).collect()
    }

    /// Confirms every parameter names a float variable.
    ///
    /// # Errors
    ///
    /// Returns a driver failure if a target is missing or not a float.
    pub fn check(&self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        for p in &self.params {
            if ctx.get(&p.path)?.kind() != Kind::Float {
                return Err(ctx.fail(ParameterError::NotFloat {
                    path: p.path.clone(),
                }));
            }
        }
        Ok(())
    }

    /// Writes one value per parameter.
    ///
    /// # Errors
    ///
    /// Returns a driver failure if the number of values does not match, or
    /// the error raised by the write.
    pub fn set_values(&self, ctx: &mut DriverContext<'_>, values: &[f64]) -> Result<(), Error> {
        if values.len() != self.params.len() {
            return Err(ctx.fail(ParameterError::Count {
                expected: self.params.len(),
                found: values.len(),
            }));
        }
        for (p, &value) in self.params.iter().zip(values) {
            ctx.set(&p.path, value)?;
        }
        Ok(())
    }

    /// Reads the current value of every parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if a target cannot be read.
    pub fn values(&self, ctx: &mut DriverContext<'_>) -> Result<Vec<f64>, Error> {
        self.params.iter().map(|p| ctx.get_f64(&p.path)).collect()
    }
}
