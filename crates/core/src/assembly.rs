//! Assemblies: containers of components, drivers, and nested assemblies.
//!
//! An [`Assembly`] owns its children, the dependency graph between their
//! variables, and its own boundary variables. It is the only place the graph
//! is mutated: children never reach back into their parent. Instead, every
//! store queues the outputs that turn invalid, and the assembly drains that
//! queue after each operation on a child and propagates the change
//! downstream. A nested assembly's boundary outputs travel up the same way.

mod connect;
mod execute;
mod invalidate;
mod snapshot;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

pub use connect::Passthrough;
pub use snapshot::{ChildKind, ChildSnapshot, Snapshot, VariableSnapshot};

use crate::component::{self, Component, ComponentNode};
use crate::driver::{Driver, DriverNode, DriverPlan, Schedule};
use crate::error::{ConfigError, Error};
use crate::graph::DependencyGraph;
use crate::io::{Direction, Io, Variable};
use crate::value::Value;
use crate::workflow::{Flow, RunState, StopHandle, Workflow};

/// A child owned by an assembly.
pub(crate) enum Node {
    Component(ComponentNode),
    Assembly(Box<Assembly>),
    Driver(DriverNode),
}

impl Node {
    pub(crate) fn io(&self) -> &Io {
        match self {
            Node::Component(c) => &c.io,
            Node::Assembly(a) => &a.io,
            Node::Driver(d) => &d.io,
        }
    }

    pub(crate) fn io_mut(&mut self) -> &mut Io {
        match self {
            Node::Component(c) => &mut c.io,
            Node::Assembly(a) => &mut a.io,
            Node::Driver(d) => &mut d.io,
        }
    }

    fn kind(&self) -> ChildKind {
        match self {
            Node::Component(_) => ChildKind::Component,
            Node::Assembly(_) => ChildKind::Assembly,
            Node::Driver(_) => ChildKind::Driver,
        }
    }

    fn runs(&self) -> usize {
        match self {
            Node::Component(c) => c.runs,
            Node::Assembly(a) => a.runs,
            Node::Driver(d) => d.runs,
        }
    }

    fn adopt(&mut self, path: &str, stop: &StopHandle) {
        match self {
            Node::Assembly(a) => a.adopt(path, stop),
            other => other.io_mut().set_owner(path),
        }
    }

    /// Marks a variable invalid and returns the outputs that turned invalid.
    fn invalidate_var(&mut self, var: &str) -> Result<Vec<String>, Error> {
        match &mut *self {
            Node::Assembly(sub) => {
                if sub.io.set_valid(var, false)? && sub.io.direction(var)? == Direction::In {
                    sub.invalidate_deps(&[var], true)?;
                }
            }
            other => {
                other.io_mut().set_valid(var, false)?;
            }
        }
        Ok(self.io_mut().take_invalidated())
    }

    /// Writes a value pulled from the connected source.
    fn set_from_source(&mut self, var: &str, value: &Value) -> Result<(), Error> {
        match self {
            Node::Assembly(sub) => {
                sub.io.set_from_source(var, value)?;
                if sub.io.direction(var)? == Direction::In {
                    sub.invalidate_deps(&[var], true)?;
                }
                Ok(())
            }
            other => other.io_mut().set_from_source(var, value),
        }
    }

    /// Toggles the enabled flag and returns the variables whose flag changed downstream.
    fn set_enabled_var(&mut self, var: &str, enabled: bool) -> Result<Vec<String>, Error> {
        if let Node::Assembly(sub) = self {
            if !sub.io.set_enabled(var, enabled)? {
                return Ok(Vec::new());
            }
            return match sub.io.direction(var)? {
                Direction::In => sub.propagate_enabled(&[var], enabled),
                Direction::Out => Ok(vec![var.to_owned()]),
            };
        }

        let io = self.io_mut();
        if !io.set_enabled(var, enabled)? {
            return Ok(Vec::new());
        }
        if io.direction(var)? == Direction::Out {
            return Ok(vec![var.to_owned()]);
        }
        if enabled && io.inputs().any(|v| !v.is_enabled()) {
            return Ok(Vec::new());
        }

        let mut changed = Vec::new();
        for output in component::names(io, Direction::Out) {
            if io.set_enabled(&output, enabled)? {
                changed.push(output);
            }
        }
        Ok(changed)
    }
}

/// A container of components, drivers, and nested assemblies.
///
/// # Example
///
/// ```
/// use weave_core::{Assembly, FnComponent, VarDecl};
///
/// let add_one = || {
///     FnComponent::new(
///         [VarDecl::input("x", 0.0), VarDecl::output("y", 0.0)],
///         |exec| {
///             let x = exec.get_f64("x")?;
///             exec.set("y", x + 1.0)?;
///             Ok(())
///         },
///     )
/// };
///
/// let mut top = Assembly::new();
/// top.add("a", add_one()).unwrap();
/// top.add("b", add_one()).unwrap();
/// top.connect("a.y", "b.x").unwrap();
///
/// top.set("a.x", 1.0).unwrap();
/// top.run().unwrap();
/// assert_eq!(top.get("b.y").unwrap().as_f64(), Some(3.0));
///
/// // Nothing changed, so nothing runs again.
/// top.run().unwrap();
/// assert_eq!(top.run_count("b").unwrap(), 1);
/// ```
pub struct Assembly {
    path: String,
    io: Io,
    children: Vec<(String, Node)>,
    graph: DependencyGraph,
    passthroughs: BTreeMap<String, Passthrough>,
    driver: Option<String>,
    workflow: Workflow,
    schedule: Option<Schedule>,
    stop: StopHandle,
    runs: usize,
}

impl Default for Assembly {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembly {
    /// Creates an empty assembly.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: String::new(),
            io: Io::boundary(),
            children: Vec::new(),
            graph: DependencyGraph::new(),
            passthroughs: BTreeMap::new(),
            driver: None,
            workflow: Workflow::default(),
            schedule: None,
            stop: StopHandle::default(),
            runs: 0,
        }
    }

    /// Returns the fully qualified path of this assembly (empty at the root).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Qualifies a path relative to this assembly.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.path)
        }
    }

    fn adopt(&mut self, path: &str, stop: &StopHandle) {
        path.clone_into(&mut self.path);
        self.io.set_owner(path);
        self.stop = stop.clone();
        for (name, node) in &mut self.children {
            node.adopt(&format!("{path}.{name}"), stop);
        }
    }

    /// Adds a component.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the component declares a
    /// variable twice.
    pub fn add(&mut self, name: &str, component: impl Component) -> Result<(), Error> {
        self.check_name(name)?;
        let node = ComponentNode::new(&self.qualify(name), Box::new(component))?;
        self.insert(name, Node::Component(node));
        Ok(())
    }

    /// Adds a nested assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken.
    pub fn add_assembly(&mut self, name: &str, assembly: Assembly) -> Result<(), Error> {
        self.check_name(name)?;
        self.insert(name, Node::Assembly(Box::new(assembly)));
        Ok(())
    }

    /// Adds a driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the driver declares a
    /// variable twice.
    pub fn add_driver(&mut self, name: &str, driver: impl Driver) -> Result<(), Error> {
        self.check_name(name)?;
        let node = DriverNode::new(&self.qualify(name), Box::new(driver))?;
        self.insert(name, Node::Driver(node));
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), Error> {
        if name.is_empty() || name.contains('.') {
            return Err(ConfigError::Unresolvable {
                path: self.qualify(name),
            }
            .into());
        }
        if self.has_child(name) || self.io.contains(name) {
            return Err(ConfigError::DuplicateName {
                path: self.qualify(name),
            }
            .into());
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, mut node: Node) {
        node.adopt(&self.qualify(name), &self.stop);
        let io = node.io();
        self.graph.add_component(
            name,
            &component::names(io, Direction::In),
            &component::names(io, Direction::Out),
        );
        self.children.push((name.to_owned(), node));
        self.schedule = None;
        tracing::debug!(path = %self.qualify(name), "added child");
    }

    /// Removes a child after disconnecting all of its variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] if there is no such child.
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        self.node(name)?;
        self.disconnect(name, None)?;
        for (_, node) in &mut self.children {
            if let Node::Driver(d) = node {
                d.workflow.remove(name);
            }
        }
        if self.driver.as_deref() == Some(name) {
            self.driver = None;
        }
        self.graph.remove_component(name);
        self.children.retain(|(n, _)| n != name);
        self.schedule = None;
        Ok(())
    }

    #[must_use]
    pub fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|(n, _)| n == name)
    }

    /// Returns the children and their kinds in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, ChildKind)> {
        self.children.iter().map(|(n, node)| (n.as_str(), node.kind()))
    }

    pub(crate) fn node(&self, name: &str) -> Result<&Node, Error> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
            .ok_or_else(|| Error::UnknownComponent {
                path: self.qualify(name),
            })
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Result<&mut Node, Error> {
        let path = self.qualify(name);
        self.children
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
            .ok_or(Error::UnknownComponent { path })
    }

    /// Resolves a dotted path to a child at any depth.
    fn descendant(&self, path: &str) -> Result<&Node, Error> {
        match path.split_once('.') {
            None => self.node(path),
            Some((name, rest)) => match self.node(name)? {
                Node::Assembly(sub) => sub.descendant(rest),
                _ => Err(Error::UnknownComponent {
                    path: self.qualify(path),
                }),
            },
        }
    }

    fn descendant_mut(&mut self, path: &str) -> Result<&mut Node, Error> {
        match path.split_once('.') {
            None => self.node_mut(path),
            Some((name, rest)) => {
                let full = self.qualify(path);
                match self.node_mut(name)? {
                    Node::Assembly(sub) => sub.descendant_mut(rest),
                    _ => Err(Error::UnknownComponent { path: full }),
                }
            }
        }
    }

    /// Resolves a variable path to its store and local name.
    fn locate<'p>(&self, path: &'p str) -> Result<(&Io, &'p str), Error> {
        match path.split_once('.') {
            None => Ok((&self.io, path)),
            Some((name, rest)) => match self.node(name)? {
                Node::Assembly(sub) => sub.locate(rest),
                node => Ok((node.io(), rest)),
            },
        }
    }

    /// Returns the current value of a variable without bringing it up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve.
    pub fn get(&self, path: &str) -> Result<&Value, Error> {
        let (io, name) = self.locate(path)?;
        io.value(name)
    }

    /// Returns a variable with its flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve.
    pub fn variable(&self, path: &str) -> Result<&Variable, Error> {
        let (io, name) = self.locate(path)?;
        io.variable(name)
    }

    /// Returns the validity flag of a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve.
    pub fn get_valid(&self, path: &str) -> Result<bool, Error> {
        self.variable(path).map(Variable::is_valid)
    }

    /// Returns the enabled flag of a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve.
    pub fn get_enabled(&self, path: &str) -> Result<bool, Error> {
        self.variable(path).map(Variable::is_enabled)
    }

    /// Returns the boundary variables of this assembly.
    #[must_use]
    pub fn io(&self) -> &Io {
        &self.io
    }

    /// Returns `true` if every boundary output is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.io.is_valid()
    }

    /// Returns the variables of a child at any depth.
    ///
    /// # Errors
    ///
    /// Returns an error if no child exists at `path`.
    pub fn child_io(&self, path: &str) -> Result<&Io, Error> {
        self.descendant(path).map(Node::io)
    }

    /// Returns `true` if every output of the child at `path` is valid.
    ///
    /// # Errors
    ///
    /// Returns an error if no child exists at `path`.
    pub fn is_child_valid(&self, path: &str) -> Result<bool, Error> {
        self.child_io(path).map(Io::is_valid)
    }

    /// Returns `true` if the child at `path` could execute right now.
    ///
    /// A component or driver is ready when every input is valid and enabled
    /// and it has something to recompute. A nested assembly is ready under
    /// [`Assembly::is_ready`].
    ///
    /// # Errors
    ///
    /// Returns an error if no child exists at `path`, or if a nested
    /// assembly's execution order cannot be determined.
    pub fn is_child_ready(&mut self, path: &str) -> Result<bool, Error> {
        match self.descendant_mut(path)? {
            Node::Assembly(sub) => sub.is_ready(),
            node => Ok(node.io().is_ready()),
        }
    }

    /// Sets a variable anywhere below this assembly.
    ///
    /// Setting an input marks it valid and invalidates everything that
    /// depends on it, up through enclosing boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectedInput`] if the input is fed by a connection,
    /// or an error if the path does not resolve.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        match path.split_once('.') {
            None => {
                self.io
                    .set(path, value)
                    .map_err(|err| self.qualify_source(err))?;
                if self.io.direction(path)? == Direction::In {
                    self.invalidate_deps(&[path], true)?;
                }
                Ok(())
            }
            Some((name, rest)) => {
                match self.node_mut(name)? {
                    Node::Assembly(sub) => sub.set(rest, value)?,
                    node => {
                        let result = node.io_mut().set(rest, value);
                        result.map_err(|err| self.qualify_source(err))?;
                    }
                }
                self.propagate_from(name)
            }
        }
    }

    /// Sources are stored relative to this assembly; errors report them in full.
    fn qualify_source(&self, err: Error) -> Error {
        match err {
            Error::ConnectedInput { path, from } => Error::ConnectedInput {
                path,
                from: self.qualify(&from),
            },
            other => other,
        }
    }

    /// Drains a child's invalidated outputs and propagates them downstream.
    pub(crate) fn propagate_from(&mut self, name: &str) -> Result<(), Error> {
        let outputs = self.node_mut(name)?.io_mut().take_invalidated();
        self.propagate(name, &outputs)
    }

    fn propagate(&mut self, name: &str, outputs: &[String]) -> Result<(), Error> {
        if outputs.is_empty() {
            return Ok(());
        }
        let paths: Vec<String> = outputs.iter().map(|o| format!("{name}.{o}")).collect();
        self.invalidate_deps(&paths, true)?;
        Ok(())
    }

    /// Designates the driver that runs this assembly.
    ///
    /// The designated driver iterates over every component unless its
    /// workflow or references say otherwise, and other drivers nest inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a driver of this assembly.
    pub fn set_driver(&mut self, name: &str) -> Result<(), Error> {
        if !matches!(self.node(name)?, Node::Driver(_)) {
            return Err(Error::WrongKind {
                path: self.qualify(name),
                expected: "a driver",
            });
        }
        self.driver = Some(name.to_owned());
        self.schedule = None;
        Ok(())
    }

    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Returns a driver's workflow for editing.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a driver of this assembly.
    pub fn workflow_mut(&mut self, name: &str) -> Result<&mut Workflow, Error> {
        self.schedule = None;
        self.driver_flow_mut(name)
    }

    /// Returns the workflow of a driver, or the top-level workflow for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner` is not a driver of this assembly.
    pub fn workflow(&self, owner: Option<&str>) -> Result<&Workflow, Error> {
        let Some(name) = owner else {
            return Ok(&self.workflow);
        };
        match self.node(name)? {
            Node::Driver(d) => Ok(&d.workflow),
            _ => Err(Error::WrongKind {
                path: self.qualify(name),
                expected: "a driver",
            }),
        }
    }

    fn flow_mut(&mut self, owner: Option<&str>) -> Result<&mut Workflow, Error> {
        match owner {
            None => Ok(&mut self.workflow),
            Some(name) => self.driver_flow_mut(name),
        }
    }

    fn driver_flow_mut(&mut self, name: &str) -> Result<&mut Workflow, Error> {
        let path = self.qualify(name);
        match self.node_mut(name)? {
            Node::Driver(d) => Ok(&mut d.workflow),
            _ => Err(Error::WrongKind {
                path,
                expected: "a driver",
            }),
        }
    }

    /// Returns the state of the most recent top-level run.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.workflow.state()
    }

    /// Requests a cooperative stop of the current run.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Returns a handle that can request a stop from elsewhere.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns how many times this assembly has run.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Returns how many times a child at any depth has executed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not name a child.
    pub fn run_count(&self, path: &str) -> Result<usize, Error> {
        self.descendant(path).map(Node::runs)
    }

    /// Returns a component by its concrete type.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not name a component of type `T`.
    pub fn component<T: Component>(&self, path: &str) -> Result<&T, Error> {
        let wrong = || Error::WrongKind {
            path: self.qualify(path),
            expected: std::any::type_name::<T>(),
        };
        match self.descendant(path)? {
            Node::Component(c) => {
                let any: &dyn Any = c.inner.as_ref();
                any.downcast_ref().ok_or_else(wrong)
            }
            _ => Err(wrong()),
        }
    }

    /// Returns a component by its concrete type for editing.
    ///
    /// Edits bypass validity tracking; change inputs through [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not name a component of type `T`.
    pub fn component_mut<T: Component>(&mut self, path: &str) -> Result<&mut T, Error> {
        let wrong = Error::WrongKind {
            path: self.qualify(path),
            expected: std::any::type_name::<T>(),
        };
        match self.descendant_mut(path)? {
            Node::Component(c) => {
                let any: &mut dyn Any = c.inner.as_mut();
                any.downcast_mut().ok_or(wrong)
            }
            _ => Err(wrong),
        }
    }

    /// Returns a driver by its concrete type.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not name a driver of type `T`.
    pub fn driver_ref<T: Driver>(&self, path: &str) -> Result<&T, Error> {
        let wrong = || Error::WrongKind {
            path: self.qualify(path),
            expected: std::any::type_name::<T>(),
        };
        match self.descendant(path)? {
            Node::Driver(DriverNode {
                inner: Some(driver),
                ..
            }) => {
                let any: &dyn Any = driver.as_ref();
                any.downcast_ref().ok_or_else(wrong)
            }
            _ => Err(wrong()),
        }
    }

    /// Returns a driver by its concrete type for editing.
    ///
    /// The cached schedule is dropped, since the driver's references may change.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not name a driver of type `T`.
    pub fn driver_mut<T: Driver>(&mut self, path: &str) -> Result<&mut T, Error> {
        self.schedule = None;
        let wrong = Error::WrongKind {
            path: self.qualify(path),
            expected: std::any::type_name::<T>(),
        };
        match self.descendant_mut(path)? {
            Node::Driver(DriverNode {
                inner: Some(driver),
                ..
            }) => {
                let any: &mut dyn Any = driver.as_mut();
                any.downcast_mut().ok_or(wrong)
            }
            _ => Err(wrong),
        }
    }

    /// Edits a nested assembly and propagates whatever the edit invalidated.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a nested assembly, or the error
    /// returned by `edit`.
    pub fn configure<T>(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut Assembly) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let path = self.qualify(name);
        let Node::Assembly(sub) = self.node_mut(name)? else {
            return Err(Error::WrongKind {
                path,
                expected: "an assembly",
            });
        };
        let result = edit(&mut **sub);
        let inputs = component::names(&sub.io, Direction::In);
        let outputs = component::names(&sub.io, Direction::Out);

        self.graph.add_component(name, &inputs, &outputs);
        self.schedule = None;
        self.propagate_from(name)?;
        result
    }

    /// Writes a driver's own output.
    pub(crate) fn write_driver_output(
        &mut self,
        driver: &str,
        name: &str,
        value: Value,
    ) -> Result<(), Error> {
        self.node_mut(driver)?.io_mut().write_output(name, value)
    }

    /// Returns the components a driver iterates over in name order,
    /// counting those of its nested drivers.
    ///
    /// # Errors
    ///
    /// Returns an error if `driver` is not a driver in this assembly, or if
    /// the execution order cannot be determined.
    pub fn iteration_set(&mut self, driver: &str) -> Result<Vec<String>, Error> {
        let path = self.qualify(driver);
        let set = self
            .schedule()?
            .iteration_set(driver)
            .ok_or(Error::WrongKind {
                path,
                expected: "a driver",
            })?;
        Ok(set.iter().cloned().collect())
    }

    /// Returns the schedule, computing it if the structure changed.
    pub(crate) fn schedule(&mut self) -> Result<&Schedule, Error> {
        if self.schedule.is_none() {
            let children: Vec<String> = self.children.iter().map(|(n, _)| n.clone()).collect();
            let plans = self.plans();
            let schedule = Schedule::compute(&self.path, &children, &plans, &self.graph)?;
            self.schedule = Some(schedule);
        }
        Ok(self.schedule.get_or_insert_default())
    }

    fn plans(&self) -> Vec<DriverPlan> {
        self.children
            .iter()
            .filter_map(|(name, node)| match node {
                Node::Driver(d) => Some((name, d)),
                _ => None,
            })
            .map(|(name, d)| {
                let mut members: BTreeSet<String> = d
                    .workflow
                    .members()
                    .iter()
                    .filter(|m| self.has_child(m))
                    .cloned()
                    .collect();
                members.extend(
                    d.references()
                        .components()
                        .into_iter()
                        .filter(|c| self.has_child(c) && c != name),
                );
                DriverPlan {
                    name: name.clone(),
                    members,
                    sequence: (d.workflow.flow() == Flow::Sequential)
                        .then(|| d.workflow.members().to_vec()),
                    root: self.driver.as_deref() == Some(name.as_str()),
                }
            })
            .collect()
    }
}
