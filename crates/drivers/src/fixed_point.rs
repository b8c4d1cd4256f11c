//! Fixed-point iteration over a single coupling variable.
//!
//! # Algorithm
//!
//! Each iteration runs the workflow, reads `x_out`, and compares it with the
//! `x_in` the workflow ran with. If `|x_out - x_in|` is within the tolerance
//! the driver has converged; otherwise `x_out` is written back to `x_in` and
//! the workflow runs again.
//!
//! # Driver Variables
//!
//! | name             | direction | meaning                                   |
//! |------------------|-----------|-------------------------------------------|
//! | `max_iterations` | input     | iteration limit per run                   |
//! | `tolerance`      | input     | absolute tolerance on the residual        |
//! | `iterations`     | output    | iterations taken by the last run          |
//! | `residual`       | output    | last `|x_out - x_in|`                     |
//! | `converged`      | output    | whether the last run converged            |
//!
//! Setting an input variable through the assembly makes the driver run again.
//!
//! # Observer Events
//!
//! Every iteration that does not converge emits an [`Event`]. Observers can
//! return [`Action::StopEarly`] to end the run without converging.

mod config;
mod event;

#[cfg(test)]
mod tests;

pub use config::{Config, ConfigError};
pub use event::{Action, Event, Status};

use tracing::{debug, warn};
use weave_core::{Driver, DriverContext, Error, Observer, References, VarDecl};

use crate::count;

/// Drives `x_in` toward a fixed point of the workflow.
pub struct FixedPoint<Obs = ()> {
    x_in: String,
    x_out: String,
    config: Config,
    observer: Obs,
    status: Option<Status>,
    iters: usize,
    residual: f64,
}

impl FixedPoint {
    /// Creates a driver that feeds `x_out` back into `x_in`.
    #[must_use]
    pub fn new(x_in: impl Into<String>, x_out: impl Into<String>, config: Config) -> Self {
        Self {
            x_in: x_in.into(),
            x_out: x_out.into(),
            config,
            observer: (),
            status: None,
            iters: 0,
            residual: f64::INFINITY,
        }
    }
}

impl<Obs> FixedPoint<Obs> {
    /// Replaces the observer.
    #[must_use]
    pub fn with_observer<O>(self, observer: O) -> FixedPoint<O>
    where
        O: Observer<Event, Action>,
    {
        FixedPoint {
            x_in: self.x_in,
            x_out: self.x_out,
            config: self.config,
            observer,
            status: self.status,
            iters: self.iters,
            residual: self.residual,
        }
    }

    /// Returns why the last run stopped, or `None` before the first run.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    #[must_use]
    pub fn iters(&self) -> usize {
        self.iters
    }

    #[must_use]
    pub fn residual(&self) -> f64 {
        self.residual
    }

    fn read_config(ctx: &DriverContext<'_>) -> Result<Config, Error> {
        let max_iters = ctx
            .own("max_iterations")?
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ctx.fail(ConfigError::MaxIters))?;
        let tolerance = ctx.own_f64("tolerance")?;
        Config::new(max_iters, tolerance).map_err(|err| ctx.fail(err))
    }
}

impl<Obs> Driver for FixedPoint<Obs>
where
    Obs: Observer<Event, Action> + 'static,
{
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("max_iterations", count(self.config.max_iters())),
            VarDecl::input("tolerance", self.config.tolerance()),
            VarDecl::output("iterations", 0),
            VarDecl::output("residual", f64::INFINITY),
            VarDecl::output("converged", false),
        ]
    }

    fn references(&self) -> References {
        References::new().write(&self.x_in).read(&self.x_out)
    }

    fn start_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.config = Self::read_config(ctx)?;
        self.status = None;
        self.iters = 0;
        self.residual = f64::INFINITY;
        ctx.set_own("converged", false)
    }

    fn continue_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<bool, Error> {
        if self.status.is_some() {
            return Ok(false);
        }
        if self.iters >= self.config.max_iters() {
            warn!(
                path = %ctx.path(),
                iters = self.iters,
                residual = self.residual,
                "fixed-point iteration did not converge"
            );
            self.status = Some(Status::MaxIters);
            return Ok(false);
        }
        Ok(true)
    }

    fn post_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        let x = ctx.get_f64(&self.x_in)?;
        let fx = ctx.get_f64(&self.x_out)?;
        self.iters += 1;
        self.residual = (fx - x).abs();
        debug!(path = %ctx.path(), iter = self.iters, x, fx, residual = self.residual, "iteration");

        ctx.set_own("iterations", count(self.iters))?;
        ctx.set_own("residual", self.residual)?;

        if self.residual <= self.config.tolerance() {
            self.status = Some(Status::Converged);
            return ctx.set_own("converged", true);
        }

        let event = Event {
            iter: self.iters,
            x,
            fx,
            residual: self.residual,
        };
        if let Some(Action::StopEarly) = self.observer.observe(&event) {
            self.status = Some(Status::StoppedByObserver);
            return Ok(());
        }
        ctx.set(&self.x_in, fx)
    }
}
