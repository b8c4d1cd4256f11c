//! Shared fixtures for the integration tests.
//!
//! Every fixture appends its label to an [`ExecLog`] when it executes, so a
//! test can assert the exact order in which a model ran.

use std::cell::RefCell;
use std::rc::Rc;

use weave_core::{
    BoxError, Component, Driver, DriverContext, Error, Exec, References, VarDecl,
};

/// A shared, ordered record of executions.
#[derive(Debug, Clone, Default)]
pub struct ExecLog(Rc<RefCell<Vec<String>>>);

impl ExecLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str) {
        self.0.borrow_mut().push(label.to_owned());
    }

    /// Returns the recorded labels and clears the log.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        self.0.borrow_mut().drain(..).collect()
    }
}

/// `f_x = f(x)`.
pub struct Unary {
    label: String,
    log: ExecLog,
    f: fn(f64) -> f64,
}

impl Unary {
    #[must_use]
    pub fn new(label: &str, log: &ExecLog, f: fn(f64) -> f64) -> Self {
        Self {
            label: label.to_owned(),
            log: log.clone(),
            f,
        }
    }
}

impl Component for Unary {
    fn variables(&self) -> Vec<VarDecl> {
        vec![VarDecl::input("x", 0.0), VarDecl::output("f_x", 0.0)]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        self.log.record(&self.label);
        let x = exec.get_f64("x")?;
        exec.set("f_x", (self.f)(x))?;
        Ok(())
    }
}

/// `f_xy = f(x, y)`.
pub struct Binary {
    label: String,
    log: ExecLog,
    f: fn(f64, f64) -> f64,
}

impl Binary {
    #[must_use]
    pub fn new(label: &str, log: &ExecLog, f: fn(f64, f64) -> f64) -> Self {
        Self {
            label: label.to_owned(),
            log: log.clone(),
            f,
        }
    }
}

impl Component for Binary {
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("x", 0.0),
            VarDecl::input("y", 0.0),
            VarDecl::output("f_xy", 0.0),
        ]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        self.log.record(&self.label);
        let (x, y) = (exec.get_f64("x")?, exec.get_f64("y")?);
        exec.set("f_xy", (self.f)(x, y))?;
        Ok(())
    }
}

/// Sums an objective over `max_iterations` iterations.
///
/// Before every iteration the design variable is set to 1, so each pass
/// reruns whatever depends on it.
pub struct Summer {
    label: String,
    log: ExecLog,
    objective: String,
    design: String,
    iters: i64,
    sum: f64,
}

impl Summer {
    #[must_use]
    pub fn new(label: &str, log: &ExecLog, design: &str, objective: &str) -> Self {
        Self {
            label: label.to_owned(),
            log: log.clone(),
            objective: objective.to_owned(),
            design: design.to_owned(),
            iters: 0,
            sum: 0.0,
        }
    }
}

impl Driver for Summer {
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("max_iterations", 1),
            VarDecl::output("sum", 0.0),
        ]
    }

    fn references(&self) -> References {
        References::new().write(&self.design).read(&self.objective)
    }

    fn start_iteration(&mut self, _ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.log.record(&self.label);
        self.iters = 0;
        self.sum = 0.0;
        Ok(())
    }

    fn continue_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<bool, Error> {
        let max = ctx.own("max_iterations")?.as_i64().unwrap_or(0);
        Ok(self.iters < max)
    }

    fn pre_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        ctx.set(&self.design, 1.0)
    }

    fn post_iteration(&mut self, ctx: &mut DriverContext<'_>) -> Result<(), Error> {
        self.sum += ctx.get_f64(&self.objective)?;
        self.iters += 1;
        ctx.set_own("sum", self.sum)
    }
}
