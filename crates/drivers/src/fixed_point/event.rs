/// Emitted after each fixed-point iteration that did not converge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// One-based iteration number.
    pub iter: usize,
    /// The input the workflow ran with.
    pub x: f64,
    /// The output the workflow produced.
    pub fx: f64,
    pub residual: f64,
}

/// Actions an observer can take during fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop iterating and leave the last input in place.
    StopEarly,
}

/// Indicates why the driver stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `|x_out - x_in|` fell within the tolerance.
    Converged,
    /// Reached the iteration limit without converging.
    MaxIters,
    /// Stopped early due to an observer decision.
    StoppedByObserver,
}
