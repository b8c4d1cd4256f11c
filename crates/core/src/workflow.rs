//! Workflows, run states, and cooperative stopping.
//!
//! A [`Workflow`] names the sibling components a driver iterates over. The
//! owning [`Assembly`](crate::Assembly) turns that membership into an
//! execution order and runs it, pulling stale inputs before each member and
//! skipping members that are already up to date.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;

/// How a workflow orders its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Members run in dependency order derived from the connection graph.
    #[default]
    Dataflow,
    /// Members run in the order they were added, followed by any other
    /// components in the iteration set in dependency order.
    Sequential,
}

/// The state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Ready,
    Running,
    /// Ended by a cooperative stop request.
    Stopped,
    /// Ended by a component reporting an external interruption.
    Interrupted,
    /// Ended by a failing component or driver.
    Error,
    /// Ran every member.
    Completed,
}

/// The ordered membership of a driver's iteration.
///
/// Entries are component names only; the components themselves belong to the
/// assembly. An empty workflow leaves membership to the driver's variable
/// references, or to the whole assembly when there are none.
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    flow: Flow,
    members: Vec<String>,
    cursor: Option<usize>,
    state: RunState,
}

impl Workflow {
    #[must_use]
    pub fn new(flow: Flow) -> Self {
        Self {
            flow,
            ..Self::default()
        }
    }

    /// Adds a member if it is not already present.
    pub fn add(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.members.contains(&name) {
            self.members.push(name);
        }
    }

    /// Removes a member, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != name);
        self.members.len() != before
    }

    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    #[must_use]
    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn set_flow(&mut self, flow: Flow) {
        self.flow = flow;
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the position the next step resumes from, if a run or a
    /// sequence of steps is in progress.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub(crate) fn begin(&mut self) {
        self.state = RunState::Running;
        self.cursor = Some(0);
    }

    pub(crate) fn advance(&mut self, position: usize) {
        self.cursor = Some(position);
    }

    pub(crate) fn finish(&mut self) {
        self.state = RunState::Completed;
        self.cursor = None;
    }

    /// Records how a run ended early. The cursor is kept so stepping resumes.
    pub(crate) fn fail(&mut self, error: &Error) {
        self.state = match error {
            Error::Stopped { .. } => RunState::Stopped,
            Error::Interrupted { .. } => RunState::Interrupted,
            _ => RunState::Error,
        };
    }

    pub(crate) fn set_running(&mut self) {
        self.state = RunState::Running;
    }
}

/// A cloneable handle for requesting a cooperative stop.
///
/// The request is honored after the currently executing unit of work
/// finishes, and unwinds to the caller of `run()` as [`Error::Stopped`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests a stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consumes a pending request.
    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
