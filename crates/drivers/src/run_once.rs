use weave_core::{Driver, DriverContext, Error, References};

/// Executes its workflow exactly once per run.
#[derive(Debug, Clone, Default)]
pub struct RunOnce {
    refs: References,
    done: bool,
}

impl RunOnce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the workflow to the components these references touch.
    #[must_use]
    pub fn with_references(refs: References) -> Self {
        Self { refs, done: false }
    }
}

impl Driver for RunOnce {
    fn references(&self) -> References {
        self.refs.clone()
    }

    fn start_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.done = false;
        Ok(())
    }

    fn continue_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<bool, Error> {
        Ok(!self.done)
    }

    fn post_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.done = true;
        Ok(())
    }
}
