use tracing::debug;
use weave_core::{Driver, DriverContext, Error, References, VarDecl};

use crate::case::describe;
use crate::{Case, Recorder, count};

/// Runs the workflow once per predefined case.
///
/// Each case's inputs are written before the run and the responses are read
/// back into a copy of the case, which goes to the recorder. A case whose
/// evaluation fails is recorded with the error message.
pub struct CaseIterator<R = ()> {
    cases: Vec<Case>,
    responses: Vec<String>,
    recorder: R,
    next: usize,
}

impl CaseIterator {
    #[must_use]
    pub fn new(cases: impl IntoIterator<Item = Case>) -> Self {
        Self {
            cases: cases.into_iter().collect(),
            responses: Vec::new(),
            recorder: (),
            next: 0,
        }
    }
}

impl<R> CaseIterator<R> {
    /// Adds a variable to read back after each case.
    #[must_use]
    pub fn with_response(mut self, path: impl Into<String>) -> Self {
        self.responses.push(path.into());
        self
    }

    /// Replaces the recorder.
    #[must_use]
    pub fn with_recorder<S: Recorder>(self, recorder: S) -> CaseIterator<S> {
        CaseIterator {
            cases: self.cases,
            responses: self.responses,
            recorder,
            next: self.next,
        }
    }
}

impl<R: Recorder + 'static> Driver for CaseIterator<R> {
    fn variables(&self) -> Vec<VarDecl> {
        vec![VarDecl::output("cases", 0)]
    }

    fn references(&self) -> References {
        let written = self.cases.iter().flat_map(|c| c.inputs.iter().map(|(p, _)| p));
        let mut refs = References::new();
        for path in written {
            if !refs.writes().contains(path) {
                refs = refs.write(path);
            }
        }
        self.responses.iter().fold(refs, |refs, path| refs.read(path))
    }

    fn start_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.next = 0;
        Ok(())
    }

    fn continue_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<bool, Error> {
        Ok(self.next < self.cases.len())
    }

    fn pre_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        for (path, value) in &self.cases[self.next].inputs {
            ctx.set(path, value.clone())?;
        }
        Ok(())
    }

    fn run_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        let mut case = Case::new(self.cases[self.next].inputs.clone());

        match ctx.run_workflow() {
            Ok(()) => {
                for path in &self.responses {
                    case.outputs.push((path.clone(), ctx.get(path)?));
                }
            }
            Err(err @ (Error::Execution { .. } | Error::NotReady { .. })) => {
                debug!(path = %ctx.path(), case = self.next, error = %err, "case failed");
                case.msg = Some(describe(&err));
            }
            Err(err) => return Err(err),
        }

        self.recorder.record(&case);
        Ok(())
    }

    fn post_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.next += 1;
        ctx.set_own("cases", count(self.next))
    }
}
