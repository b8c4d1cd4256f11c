use thiserror::Error;

/// Produces design points in the unit cube.
pub trait DoeGenerator {
    /// Returns the design points for `dims` parameters, each coordinate in `[0, 1]`.
    fn points(&self, dims: usize) -> Vec<Vec<f64>>;
}

/// Errors that can occur when configuring a full factorial design.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a full factorial design needs at least 2 levels, got {0}")]
    Levels(usize),
}

/// Every combination of evenly spaced levels per parameter.
///
/// Points are ordered with the first parameter varying slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullFactorial {
    levels: usize,
}

impl FullFactorial {
    /// Creates a design with `levels` values per parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if `levels` is less than 2.
    pub fn new(levels: usize) -> Result<Self, ConfigError> {
        if levels < 2 {
            return Err(ConfigError::Levels(levels));
        }
        Ok(Self { levels })
    }

    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }

    fn linspace(&self) -> Vec<f64> {
        let last = (self.levels - 1) as f64;
        (0..self.levels).map(|i| i as f64 / last).collect()
    }
}

impl DoeGenerator for FullFactorial {
    fn points(&self, dims: usize) -> Vec<Vec<f64>> {
        let values = self.linspace();
        (0..dims).fold(vec![Vec::new()], |points, _| {
            points
                .iter()
                .flat_map(|prefix| {
                    values.iter().map(move |&v| {
                        let mut point = prefix.clone();
                        point.push(v);
                        point
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_two_levels() {
        assert_eq!(FullFactorial::new(1), Err(ConfigError::Levels(1)));
        assert!(FullFactorial::new(2).is_ok());
    }

    #[test]
    fn enumerates_every_combination() {
        let points = FullFactorial::new(3).unwrap().points(2);
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], [0.0, 0.0]);
        assert_eq!(points[1], [0.0, 0.5]);
        assert_eq!(points[3], [0.5, 0.0]);
        assert_eq!(points[8], [1.0, 1.0]);
    }

    #[test]
    fn single_parameter_is_a_linspace() {
        let points = FullFactorial::new(5).unwrap().points(1);
        let flat: Vec<f64> = points.into_iter().flatten().collect();
        assert_eq!(flat, [0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
