//! Reusable components for Weave assemblies.

mod linear;
mod paraboloid;
mod scalar;

pub use linear::Linear;
pub use paraboloid::Paraboloid;
pub use scalar::{Adder, Multiplier};
