//! Design of experiments.
//!
//! A [`Doe`] driver asks its [`DoeGenerator`] for points in the unit cube,
//! maps each onto the parameter ranges, runs the workflow once per point,
//! and records a [`Case`] holding the parameter values, the responses, and
//! any violated [`Constraints`].
//!
//! A point whose evaluation fails is recorded with the error message and the
//! run moves on to the next point. Stop requests still end the run.

mod generator;


pub use generator::{ConfigError, DoeGenerator, FullFactorial};

use tracing::{debug, info};
use weave_core::{Driver, DriverContext, Error, References, VarDecl};

use crate::case::describe;
use crate::{Case, Constraints, Parameters, Recorder, count};

/// Evaluates the workflow at every point of a generated design.
pub struct Doe<G, R = ()> {
    parameters: Parameters,
    responses: Vec<String>,
    constraints: Constraints,
    generator: G,
    recorder: R,
    points: Vec<Vec<f64>>,
    next: usize,
    failures: usize,
}

impl<G: DoeGenerator> Doe<G> {
    #[must_use]
    pub fn new(parameters: Parameters, generator: G) -> Self {
        Self {
            parameters,
            responses: Vec::new(),
            constraints: Constraints::new(),
            generator,
            recorder: (),
            points: Vec::new(),
            next: 0,
            failures: 0,
        }
    }
}

impl<G, R> Doe<G, R> {
    /// Adds a variable to read back after each point.
    #[must_use]
    pub fn with_response(mut self, path: impl Into<String>) -> Self {
        self.responses.push(path.into());
        self
    }

    /// Checks these constraints after each successful point.
    ///
    /// Violated constraints are listed in the recorded case.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Replaces the recorder.
    #[must_use]
    pub fn with_recorder<S: Recorder>(self, recorder: S) -> Doe<G, S> {
        Doe {
            parameters: self.parameters,
            responses: self.responses,
            constraints: self.constraints,
            generator: self.generator,
            recorder,
            points: self.points,
            next: self.next,
            failures: self.failures,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    pub fn recorder(&self) -> &R {
        &self.recorder
    }
}

impl<G, R> Driver for Doe<G, R>
where
    G: DoeGenerator + 'static,
    R: Recorder + 'static,
{
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::output("cases", 0),
            VarDecl::output("failures", 0),
        ]
    }

    fn references(&self) -> References {
        let refs = self.parameters.references(References::new());
        let refs = self.constraints.references(refs);
        self.responses.iter().fold(refs, |refs, path| refs.read(path))
    }

    fn start_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.parameters.check(ctx)?;
        self.points = self
            .generator
            .points(self.parameters.len())
            .iter()
            .map(|unit| self.parameters.scale(unit))
            .collect();
        self.next = 0;
        self.failures = 0;
        info!(path = %ctx.path(), cases = self.points.len(), "design generated");
        Ok(())
    }

    fn continue_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<bool, Error> {
        Ok(self.next < self.points.len())
    }

    fn pre_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.parameters.set_values(ctx, &self.points[self.next])
    }

    fn run_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        let inputs = self
            .parameters
            .iter()
            .zip(&self.points[self.next])
            .map(|(p, &v)| (p.path.clone(), v.into()));
        let mut case = Case::new(inputs);

        match ctx.run_workflow() {
            Ok(()) => {
                for path in &self.responses {
                    case.outputs.push((path.clone(), ctx.get(path)?));
                }
                case.violated = self.constraints.violated(ctx)?;
            }
            Err(err @ (Error::Execution { .. } | Error::NotReady { .. })) => {
                debug!(path = %ctx.path(), case = self.next, error = %err, "case failed");
                case.msg = Some(describe(&err));
                self.failures += 1;
            }
            Err(err) => return Err(err),
        }

        self.recorder.record(&case);
        Ok(())
    }

    fn post_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.next += 1;
        ctx.set_own("cases", count(self.next))?;
        ctx.set_own("failures", count(self.failures))
    }
}
