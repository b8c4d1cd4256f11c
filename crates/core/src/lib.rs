//! Dependency and validity graph engine for composing numerical components.
//!
//! A model is a tree of [`Assembly`] values. Each assembly owns:
//!
//! - components, the units of computation, implementing [`Component`]
//! - drivers, the iteration controllers, implementing [`Driver`]
//! - nested assemblies, exposing child variables through boundary passthroughs
//!
//! Connections between variables form a dependency graph. Every variable
//! carries a validity flag: setting an input invalidates everything
//! downstream, and running an assembly executes only the children whose
//! inputs changed. Reading an output through [`Assembly::evaluate`] runs
//! just enough of the model to bring that output up to date.
//!
//! Drivers iterate over the components they reference. When one driver's
//! iteration set lies inside another's, it becomes a single step of the
//! enclosing driver; peer drivers run in data-flow order.

mod assembly;
mod component;
mod driver;
mod error;
mod graph;
mod io;
mod observer;
mod value;
mod workflow;

pub use assembly::{
    Assembly, ChildKind, ChildSnapshot, Passthrough, Snapshot, VariableSnapshot,
};
pub use component::{Component, Exec, FnComponent};
pub use driver::{Driver, DriverContext, References};
pub use error::{BoxError, ConfigError, Error, Interrupted, Overlap};
pub use graph::DependencyGraph;
pub use io::{Direction, Io, VarDecl, Variable};
pub use observer::Observer;
pub use value::{Kind, Value};
pub use workflow::{Flow, RunState, StopHandle, Workflow};
