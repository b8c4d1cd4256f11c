mod closure;

use std::any::Any;

pub use closure::FnComponent;

use crate::error::{BoxError, Error};
use crate::io::{Direction, Io, VarDecl};
use crate::value::Value;
use crate::workflow::StopHandle;

/// A unit of work with named inputs and outputs.
///
/// A `Component` declares its variables once, when it is added to an
/// [`Assembly`](crate::Assembly), and computes its outputs in [`execute()`].
/// The assembly owns the variable values and validity flags; the component
/// only sees them through an [`Exec`] view while it runs.
///
/// ## Execution guarantees
///
/// `execute()` is invoked only when every input is valid and enabled and the
/// component needs to run. After it returns `Ok`, all outputs are marked
/// valid. Inputs cannot be written through [`Exec`].
///
/// [`execute()`]: Component::execute
pub trait Component: Any {
    /// Returns the declared inputs and outputs with their default values.
    fn variables(&self) -> Vec<VarDecl>;

    /// Computes the outputs from the current inputs.
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller as an execution failure of this
    /// component. Return [`Interrupted`](crate::Interrupted) to end the run
    /// in the interrupted state.
    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError>;
}

/// The view a component gets of its own variables while executing.
pub struct Exec<'a> {
    io: &'a mut Io,
    stop: &'a StopHandle,
}

impl<'a> Exec<'a> {
    pub(crate) fn new(io: &'a mut Io, stop: &'a StopHandle) -> Self {
        Self { io, stop }
    }

    /// Returns the current value of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn get(&self, name: &str) -> Result<&Value, Error> {
        self.io.value(name)
    }

    /// Returns the value of a numeric variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable does not exist or is not numeric.
    pub fn get_f64(&self, name: &str) -> Result<f64, Error> {
        self.get(name)?.as_f64().ok_or_else(|| Error::WrongKind {
            path: self.io.qualify(name),
            expected: "numeric",
        })
    }

    /// Writes an output value.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not an output of this component.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.io.write_output(name, value.into())
    }

    /// Returns the names of the declared inputs.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.io.inputs().map(|v| v.name())
    }

    /// Returns the names of the declared outputs.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.io.outputs().map(|v| v.name())
    }

    /// Requests a cooperative stop.
    ///
    /// The current execution finishes normally; the enclosing workflow stops
    /// before the next component.
    pub fn request_stop(&self) {
        self.stop.stop();
    }
}

/// A component owned by an assembly, with its variables and run count.
pub(crate) struct ComponentNode {
    pub(crate) io: Io,
    pub(crate) inner: Box<dyn Component>,
    pub(crate) runs: usize,
}

impl ComponentNode {
    pub(crate) fn new(path: &str, inner: Box<dyn Component>) -> Result<Self, Error> {
        let mut io = Io::component(inner.variables())?;
        io.set_owner(path);
        Ok(Self { io, inner, runs: 0 })
    }

    /// Executes the wrapped component and marks its outputs valid.
    pub(crate) fn execute(&mut self, path: &str, stop: &StopHandle) -> Result<(), Error> {
        if let Some(input) = self.io.blocked_input() {
            return Err(Error::NotReady {
                path: path.to_owned(),
                input: input.to_owned(),
            });
        }

        tracing::debug!(path, "executing component");
        let mut exec = Exec::new(&mut self.io, stop);
        self.inner
            .execute(&mut exec)
            .map_err(|cause| crate::error::execution(path, cause))?;

        self.io.mark_executed();
        self.runs += 1;
        Ok(())
    }
}

/// Returns the names of the declared variables with the given direction.
pub(crate) fn names(io: &Io, direction: Direction) -> Vec<String> {
    io.variables()
        .filter(|v| v.direction() == direction)
        .map(|v| v.name().to_owned())
        .collect()
}
