//! Iteration controllers.
//!
//! A [`Driver`] repeatedly executes its workflow until a stopping condition
//! holds. The default [`Driver::run`] implements the iteration state machine:
//!
//! ```text
//! start_iteration
//! while continue_iteration {
//!     pre_iteration
//!     run_iteration
//!     post_iteration
//! }
//! ```
//!
//! Drivers reach the rest of the assembly only through their
//! [`DriverContext`], by path. The paths a driver reads and writes are
//! declared up front through [`Driver::references`] so the assembly can work
//! out which components each driver iterates over and in what order sibling
//! drivers must run.

mod context;
mod schedule;

use std::any::Any;
use std::collections::BTreeSet;

pub use context::DriverContext;
pub(crate) use schedule::{DriverPlan, Schedule};

use crate::error::Error;
use crate::io::{Io, VarDecl};
use crate::workflow::Workflow;

/// An iteration controller.
pub trait Driver: Any {
    /// Returns the driver's own variables, such as iteration limits or results.
    fn variables(&self) -> Vec<VarDecl> {
        Vec::new()
    }

    /// Returns the external variables this driver reads and writes.
    fn references(&self) -> References {
        References::default()
    }

    /// Runs the driver to completion.
    ///
    /// Override this only when the iteration state machine does not fit.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an iteration step or by a component
    /// in the workflow.
    fn run(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.start_iteration(ctx)?;
        while self.continue_iteration(ctx)? {
            self.pre_iteration(ctx)?;
            self.run_iteration(ctx)?;
            self.post_iteration(ctx)?;
        }
        Ok(())
    }

    /// Resets counters and accumulators before the first iteration.
    ///
    /// # Errors
    ///
    /// Implementations may fail, for example on an invalid setting.
    fn start_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// Returns `true` while another iteration should run.
    ///
    /// # Errors
    ///
    /// Implementations may fail while reading their state.
    fn continue_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<bool, Error>;

    /// Prepares an iteration, typically by pushing a design point.
    ///
    /// # Errors
    ///
    /// Implementations may fail, for example when a write is rejected.
    fn pre_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// Executes the workflow once.
    ///
    /// # Errors
    ///
    /// Propagates workflow errors, including stop requests.
    fn run_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        ctx.run_workflow()
    }

    /// Processes the results of an iteration.
    ///
    /// # Errors
    ///
    /// Implementations may fail while reading results.
    fn post_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        Ok(())
    }
}

/// The external variables a driver reads and writes, as assembly paths.
///
/// A driver writes design variables (inputs of components it iterates over)
/// and reads results (outputs it evaluates). Both kinds pull the owning
/// component into the driver's iteration set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    reads: Vec<String>,
    writes: Vec<String>,
}

impl References {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path the driver reads.
    #[must_use]
    pub fn read(mut self, path: impl Into<String>) -> Self {
        self.reads.push(path.into());
        self
    }

    /// Adds a path the driver writes.
    #[must_use]
    pub fn write(mut self, path: impl Into<String>) -> Self {
        self.writes.push(path.into());
        self
    }

    #[must_use]
    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    #[must_use]
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    /// Returns every referenced path.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().chain(&self.reads).map(String::as_str)
    }

    /// Returns the names of the children owning the referenced paths.
    ///
    /// References to boundary variables name no child and are skipped.
    #[must_use]
    pub fn components(&self) -> BTreeSet<String> {
        self.paths()
            .filter_map(crate::graph::owner)
            .map(str::to_owned)
            .collect()
    }
}

/// A driver owned by an assembly.
pub(crate) struct DriverNode {
    pub(crate) io: Io,
    /// Taken out while the driver runs.
    pub(crate) inner: Option<Box<dyn Driver>>,
    pub(crate) workflow: Workflow,
    pub(crate) runs: usize,
}

impl DriverNode {
    pub(crate) fn new(path: &str, inner: Box<dyn Driver>) -> Result<Self, Error> {
        let mut io = Io::component(inner.variables())?;
        io.set_owner(path);
        Ok(Self {
            io,
            inner: Some(inner),
            workflow: Workflow::default(),
            runs: 0,
        })
    }

    pub(crate) fn references(&self) -> References {
        self.inner
            .as_ref()
            .map(|driver| driver.references())
            .unwrap_or_default()
    }
}
