use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use crate::Case;

/// Receives every case a driver evaluates.
pub trait Recorder {
    fn record(&mut self, case: &Case);
}

impl<F> Recorder for F
where
    F: FnMut(&Case),
{
    fn record(&mut self, case: &Case) {
        self(case);
    }
}

/// Discards every case.
impl Recorder for () {
    fn record(&mut self, _case: &Case) {}
}

/// Collects cases in memory.
///
/// Clones share the same list, so keep a clone to read the cases after the
/// driver that owns the recorder has run.
#[derive(Debug, Clone, Default)]
pub struct ListRecorder {
    cases: Rc<RefCell<Vec<Case>>>,
}

impl ListRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded cases.
    #[must_use]
    pub fn cases(&self) -> Vec<Case> {
        self.cases.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.cases.borrow_mut().clear();
    }
}

impl Recorder for ListRecorder {
    fn record(&mut self, case: &Case) {
        self.cases.borrow_mut().push(case.clone());
    }
}

/// Emits each case as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecorder;

impl Recorder for LogRecorder {
    fn record(&mut self, case: &Case) {
        let inputs = render(&case.inputs);
        let outputs = render(&case.outputs);
        match &case.msg {
            None => info!(%inputs, %outputs, "case"),
            Some(msg) => info!(%inputs, error = %msg, "case failed"),
        }
    }
}

fn render(pairs: &[(String, weave_core::Value)]) -> String {
    pairs
        .iter()
        .map(|(path, value)| format!("{path}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}
