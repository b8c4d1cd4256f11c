//! Named variables with per-variable validity and enabled flags.
//!
//! An [`Io`] is the validity store of a single component, driver, or assembly
//! boundary. Inputs start valid and outputs start invalid. When an output
//! turns invalid, its name is queued in an outbox that the owning assembly
//! drains to propagate the change downstream.

use std::collections::HashMap;
use std::mem;

use crate::error::Error;
use crate::value::Value;

/// The direction of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    In,
    Out,
}

/// A variable declaration with its default value.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub direction: Direction,
    pub default: Value,
}

impl VarDecl {
    /// Declares an input variable.
    #[must_use]
    pub fn input(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::In,
            default: default.into(),
        }
    }

    /// Declares an output variable.
    #[must_use]
    pub fn output(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Out,
            default: default.into(),
        }
    }
}

/// A single named variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    direction: Direction,
    value: Value,
    valid: bool,
    enabled: bool,
    source: Option<String>,
    links: usize,
}

impl Variable {
    fn new(decl: VarDecl) -> Self {
        Self {
            valid: decl.direction == Direction::In,
            name: decl.name,
            direction: decl.direction,
            value: decl.default,
            enabled: true,
            source: None,
            links: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the connected source relative to the owning assembly, if any.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns how many external destinations this output feeds.
    #[must_use]
    pub fn links(&self) -> usize {
        self.links
    }
}

/// The validity store for one component, driver, or assembly boundary.
#[derive(Debug, Clone, Default)]
pub struct Io {
    owner: String,
    vars: Vec<Variable>,
    index: HashMap<String, usize>,
    cascade: bool,
    stale: bool,
    invalidated: Vec<String>,
}

impl Io {
    /// Creates the store of a component whose outputs depend on all of its inputs.
    pub(crate) fn component(decls: impl IntoIterator<Item = VarDecl>) -> Result<Self, Error> {
        Self::build(decls, true)
    }

    /// Creates an assembly boundary store.
    ///
    /// Boundary inputs do not cascade to boundary outputs; the assembly's
    /// dependency graph decides which outputs a changed input reaches.
    pub(crate) fn boundary() -> Self {
        Self {
            stale: true,
            ..Self::default()
        }
    }

    fn build(decls: impl IntoIterator<Item = VarDecl>, cascade: bool) -> Result<Self, Error> {
        let mut io = Self {
            cascade,
            stale: true,
            ..Self::default()
        };
        for decl in decls {
            io.declare(decl)?;
        }
        Ok(io)
    }

    /// Adds a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable with the same name already exists.
    pub(crate) fn declare(&mut self, decl: VarDecl) -> Result<(), Error> {
        if self.index.contains_key(&decl.name) {
            return Err(crate::ConfigError::DuplicateName {
                path: self.qualify(&decl.name),
            }
            .into());
        }
        self.index.insert(decl.name.clone(), self.vars.len());
        self.vars.push(Variable::new(decl));
        Ok(())
    }

    pub(crate) fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    /// Returns the fully qualified path of a variable in this store.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        if self.owner.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.owner)
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the variable with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn variable(&self, name: &str) -> Result<&Variable, Error> {
        self.index
            .get(name)
            .map(|&i| &self.vars[i])
            .ok_or_else(|| Error::UnknownVariable {
                path: self.qualify(name),
            })
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Variable, Error> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.vars[i]),
            None => Err(Error::UnknownVariable {
                path: self.qualify(name),
            }),
        }
    }

    /// Returns all variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter().filter(|v| v.direction == Direction::In)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter().filter(|v| v.direction == Direction::Out)
    }

    /// Returns the direction of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn direction(&self, name: &str) -> Result<Direction, Error> {
        self.variable(name).map(Variable::direction)
    }

    /// Returns the current value of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn value(&self, name: &str) -> Result<&Value, Error> {
        self.variable(name).map(Variable::value)
    }

    /// Returns the validity flag of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn get_valid(&self, name: &str) -> Result<bool, Error> {
        self.variable(name).map(Variable::is_valid)
    }

    /// Sets the validity flag of a variable and reports whether it changed.
    ///
    /// Invalidating an input of a component also invalidates every valid
    /// output. Outputs that turn invalid are queued for the owner to drain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn set_valid(&mut self, name: &str, valid: bool) -> Result<bool, Error> {
        let var = self.variable_mut(name)?;
        if var.valid == valid {
            return Ok(false);
        }
        var.valid = valid;
        let direction = var.direction;

        if !valid {
            match direction {
                Direction::In => {
                    self.stale = true;
                    if self.cascade {
                        self.invalidate_outputs();
                    }
                }
                Direction::Out => self.invalidated.push(name.to_owned()),
            }
        }
        Ok(true)
    }

    /// Returns the enabled flag of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn get_enabled(&self, name: &str) -> Result<bool, Error> {
        self.variable(name).map(Variable::is_enabled)
    }

    /// Sets the enabled flag of a variable and reports whether it changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if no such variable exists.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<bool, Error> {
        let var = self.variable_mut(name)?;
        let changed = var.enabled != enabled;
        var.enabled = enabled;
        Ok(changed)
    }

    /// Marks every valid output invalid and returns how many changed.
    pub fn invalidate_outputs(&mut self) -> usize {
        let mut count = 0;
        for var in &mut self.vars {
            if var.direction == Direction::Out && var.valid {
                var.valid = false;
                self.invalidated.push(var.name.clone());
                count += 1;
            }
        }
        count
    }

    /// Drains the names of outputs that turned invalid since the last call.
    pub fn take_invalidated(&mut self) -> Vec<String> {
        mem::take(&mut self.invalidated)
    }

    /// Sets a variable from outside the owner.
    ///
    /// Setting an input marks it valid and invalidates the owner. Setting an
    /// output only replaces its value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectedInput`] if the input is fed by a connection,
    /// [`Error::WrongKind`] if the value cannot take the variable's kind, or
    /// [`Error::UnknownVariable`] if no such variable exists.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let var = self.variable(name)?;
        if let Some(from) = var.source() {
            return Err(Error::ConnectedInput {
                path: self.qualify(name),
                from: from.to_owned(),
            });
        }
        self.assign(name, value.into())
    }

    /// Sets an input from its connected source, bypassing the connection check.
    pub(crate) fn set_from_source(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        self.assign(name, value.clone())
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let cascade = self.cascade;
        let path = self.qualify(name);
        let var = self.variable_mut(name)?;
        var.value = var.value.coerce_from(&value).ok_or(Error::WrongKind {
            path,
            expected: var.value.kind().describe(),
        })?;

        if var.direction == Direction::In {
            var.valid = true;
            self.stale = true;
            if cascade {
                self.invalidate_outputs();
            }
        }
        Ok(())
    }

    /// Writes an output value during execution without touching validity.
    pub(crate) fn write_output(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let path = self.qualify(name);
        let var = self.variable_mut(name)?;
        if var.direction != Direction::Out {
            return Err(Error::WrongKind {
                path,
                expected: "an output",
            });
        }
        var.value = var.value.coerce_from(&value).ok_or(Error::WrongKind {
            path,
            expected: var.value.kind().describe(),
        })?;
        Ok(())
    }

    pub(crate) fn set_source(&mut self, name: &str, from: &str) -> Result<(), Error> {
        self.variable_mut(name)?.source = Some(from.to_owned());
        Ok(())
    }

    /// Unregisters the source of an input; a disconnected input is valid.
    pub(crate) fn remove_source(&mut self, name: &str) -> Result<(), Error> {
        let var = self.variable_mut(name)?;
        var.source = None;
        if var.direction == Direction::In {
            var.valid = true;
        }
        Ok(())
    }

    pub(crate) fn link_output(&mut self, name: &str) -> Result<(), Error> {
        self.variable_mut(name)?.links += 1;
        Ok(())
    }

    pub(crate) fn unlink_output(&mut self, name: &str) -> Result<(), Error> {
        let var = self.variable_mut(name)?;
        var.links = var.links.saturating_sub(1);
        Ok(())
    }

    /// Returns `true` if every output is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outputs().all(Variable::is_valid)
    }

    /// Returns `true` if the owner has not run since its inputs last changed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Returns the first input that is invalid or disabled, if any.
    #[must_use]
    pub fn blocked_input(&self) -> Option<&str> {
        self.inputs()
            .find(|v| !v.valid || !v.enabled)
            .map(Variable::name)
    }

    /// Returns `true` if all inputs are valid and enabled and the owner needs to run.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.blocked_input().is_none() && (self.stale || !self.is_valid())
    }

    /// Returns `true` if the owner would run once its inputs are pulled.
    ///
    /// Unlike [`is_ready`](Self::is_ready), invalid inputs count as work
    /// rather than blocking it. Disabled inputs still block.
    #[must_use]
    pub fn has_work(&self) -> bool {
        self.inputs().all(|v| v.enabled)
            && (self.stale || !self.is_valid() || self.inputs().any(|v| !v.valid))
    }

    /// Returns the names of invalid inputs.
    #[must_use]
    pub fn invalid_inputs(&self) -> Vec<String> {
        self.inputs()
            .filter(|v| !v.valid)
            .map(|v| v.name.clone())
            .collect()
    }

    /// Marks every output valid after a successful execution.
    pub(crate) fn mark_executed(&mut self) {
        for var in &mut self.vars {
            if var.direction == Direction::Out {
                var.valid = true;
            }
        }
        self.stale = false;
    }

    /// Marks the owner up to date without touching outputs.
    pub(crate) fn mark_fresh(&mut self) {
        self.stale = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple() -> Io {
        let mut io = Io::component([
            VarDecl::input("a", 1.0),
            VarDecl::input("b", 2.0),
            VarDecl::output("c", 3.0),
            VarDecl::output("d", -1.0),
        ])
        .unwrap();
        io.set_owner("comp");
        io
    }

    #[test]
    fn inputs_start_valid_and_outputs_start_invalid() {
        let io = simple();
        let valid: Vec<_> = io.variables().map(Variable::is_valid).collect();
        assert_eq!(valid, [true, true, false, false]);
        assert!(io.is_ready());
    }

    #[test]
    fn invalid_input_cascades_to_outputs() {
        let mut io = simple();
        io.mark_executed();
        assert!(io.is_valid());

        assert!(io.set_valid("a", false).unwrap());
        assert!(!io.set_valid("a", false).unwrap());
        assert!(!io.is_valid());
        assert_eq!(io.take_invalidated(), ["c", "d"]);
        assert!(io.take_invalidated().is_empty());
    }

    #[test]
    fn connected_input_rejects_direct_set() {
        let mut io = simple();
        io.set_source("a", "other.x").unwrap();

        let err = io.set("a", 5.0).unwrap_err();
        assert!(matches!(err, Error::ConnectedInput { ref path, ref from }
            if path == "comp.a" && from == "other.x"));
        assert_eq!(
            err.to_string(),
            "'comp.a' is already connected to source 'other.x' and cannot be directly set"
        );

        io.set_from_source("a", &Value::Float(5.0)).unwrap();
        assert_eq!(io.value("a").unwrap(), &Value::Float(5.0));
    }

    #[test]
    fn set_input_invalidates_owner() {
        let mut io = simple();
        io.mark_executed();
        io.set("b", 4).unwrap();

        assert_eq!(io.value("b").unwrap(), &Value::Float(4.0));
        assert!(io.is_stale());
        assert!(io.is_ready());
        assert_eq!(io.take_invalidated(), ["c", "d"]);
    }

    #[test]
    fn values_keep_their_declared_kind() {
        let mut io = simple();
        io.mark_executed();

        let err = io.set("a", "abc").unwrap_err();
        assert!(matches!(err, Error::WrongKind { ref path, .. } if path == "comp.a"));
        assert_eq!(err.to_string(), "comp.a: not a float");
        assert_eq!(io.value("a").unwrap(), &Value::Float(1.0));
        assert!(io.is_valid());
        assert!(io.take_invalidated().is_empty());

        let err = io.write_output("c", Value::from("oops")).unwrap_err();
        assert_eq!(err.to_string(), "comp.c: not a float");
        assert_eq!(io.value("c").unwrap(), &Value::Float(3.0));

        let err = io.set_from_source("b", &Value::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::WrongKind { ref path, .. } if path == "comp.b"));

        io.write_output("d", Value::Int(7)).unwrap();
        assert_eq!(io.value("d").unwrap(), &Value::Float(7.0));
    }

    #[test]
    fn disabled_input_blocks_readiness() {
        let mut io = simple();
        assert!(io.set_enabled("b", false).unwrap());
        assert_eq!(io.blocked_input(), Some("b"));
        assert!(!io.is_ready());
    }

    #[test]
    fn unknown_variable_names_full_path() {
        let io = simple();
        let err = io.get_valid("nope").unwrap_err();
        assert_eq!(err.to_string(), "comp.nope: no such variable");
    }

    #[test]
    fn boundary_inputs_do_not_cascade() {
        let mut io = Io::boundary();
        io.declare(VarDecl::input("x", 0.0)).unwrap();
        io.declare(VarDecl::output("y", 0.0)).unwrap();
        io.mark_executed();

        io.set_valid("x", false).unwrap();
        assert!(io.get_valid("y").unwrap());
        assert!(io.take_invalidated().is_empty());
    }

    #[test]
    fn removing_a_source_revalidates_the_input() {
        let mut io = simple();
        io.set_source("a", "up.c").unwrap();
        io.set_valid("a", false).unwrap();
        io.remove_source("a").unwrap();
        assert!(io.get_valid("a").unwrap());
        assert_eq!(io.variable("a").unwrap().source(), None);
    }
}
