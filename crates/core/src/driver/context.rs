use crate::assembly::Assembly;
use crate::error::{BoxError, Error};
use crate::value::Value;

/// A running driver's handle on its assembly.
///
/// Paths are resolved relative to the assembly that owns the driver. Reads
/// through [`get`](Self::get) are lazy: a stale output is brought up to date
/// before its value is returned.
pub struct DriverContext<'a> {
    assembly: &'a mut Assembly,
    name: &'a str,
}

impl<'a> DriverContext<'a> {
    pub(crate) fn new(assembly: &'a mut Assembly, name: &'a str) -> Self {
        Self { assembly, name }
    }

    /// Returns the driver's name within its assembly.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the driver's fully qualified path.
    #[must_use]
    pub fn path(&self) -> String {
        self.assembly.qualify(self.name)
    }

    /// Returns the up-to-date value of a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve or if bringing the
    /// variable up to date fails.
    pub fn get(&mut self, path: &str) -> Result<Value, Error> {
        self.assembly.evaluate(path)
    }

    /// Returns the up-to-date value of a numeric variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable cannot be evaluated or is not numeric.
    pub fn get_f64(&mut self, path: &str) -> Result<f64, Error> {
        self.get(path)?.as_f64().ok_or_else(|| Error::WrongKind {
            path: self.assembly.qualify(path),
            expected: "numeric",
        })
    }

    /// Sets a variable in the assembly, invalidating everything downstream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectedInput`] if the target is fed by a connection.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.assembly.set(path, value)
    }

    /// Returns the value of one of the driver's own variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if the driver declares no such variable.
    pub fn own(&self, name: &str) -> Result<&Value, Error> {
        self.assembly.get(&format!("{}.{name}", self.name))
    }

    /// Returns one of the driver's own numeric variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable does not exist or is not numeric.
    pub fn own_f64(&self, name: &str) -> Result<f64, Error> {
        self.own(name)?.as_f64().ok_or_else(|| Error::WrongKind {
            path: format!("{}.{name}", self.path()),
            expected: "numeric",
        })
    }

    /// Writes one of the driver's own outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not an output of the driver.
    pub fn set_own(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.assembly.write_driver_output(self.name, name, value.into())
    }

    /// Executes the driver's workflow once.
    ///
    /// # Errors
    ///
    /// Propagates component failures and stop requests.
    pub fn run_workflow(&mut self) -> Result<(), Error> {
        self.assembly.run_flow(Some(self.name))
    }

    /// Requests a cooperative stop of the whole run.
    pub fn request_stop(&self) {
        self.assembly.stop_handle().stop();
    }

    /// Wraps a driver-specific failure as an execution error of this driver.
    #[must_use]
    pub fn fail(&self, cause: impl Into<BoxError>) -> Error {
        Error::Execution {
            path: self.path(),
            cause: cause.into(),
        }
    }
}
