//! Iteration drivers for Weave assemblies.
//!
//! - [`RunOnce`] runs its workflow a single time
//! - [`fixed_point::FixedPoint`] iterates a coupling variable to convergence
//! - [`doe::Doe`] evaluates every point of a generated design
//! - [`CaseIterator`] evaluates a list of predefined cases
//!
//! Design-point drivers write [`Parameters`], check [`Constraints`], and hand
//! each evaluated [`Case`] to a [`Recorder`].

mod case;
mod case_iterator;
mod constraints;
mod parameters;
mod recorder;
mod run_once;

pub mod doe;
pub mod fixed_point;

pub use case::Case;
pub use case_iterator::CaseIterator;
pub use constraints::{
    Comparator, Constraint, ConstraintError, Constraints, Evaluation, Side,
};
pub use parameters::{Parameter, ParameterError, Parameters};
pub use recorder::{ListRecorder, LogRecorder, Recorder};
pub use run_once::RunOnce;

/// Converts a count for storage in an integer variable.
pub(crate) fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
