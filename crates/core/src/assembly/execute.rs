use tracing::{debug, info, trace, warn};

use super::{Assembly, Node};
use crate::driver::DriverContext;
use crate::error::Error;
use crate::io::Direction;
use crate::value::Value;

impl Assembly {
    /// Runs the assembly as the root of a model.
    ///
    /// Boundary inputs count as up to date, since nothing outside can feed
    /// them. Only children whose inputs changed since their last run execute.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while executing, including
    /// [`Error::Stopped`] when a stop was requested.
    pub fn run(&mut self) -> Result<(), Error> {
        self.stop.clear();
        // Nothing above the root drains its queue.
        self.io.take_invalidated();
        self.accept_inputs()?;
        self.run_nested()
    }

    fn accept_inputs(&mut self) -> Result<(), Error> {
        for name in self.io.invalid_inputs() {
            self.io.set_valid(&name, true)?;
        }
        Ok(())
    }

    fn run_nested(&mut self) -> Result<(), Error> {
        info!(path = %self.path, "running assembly");
        self.execute()?;
        self.io.mark_fresh();
        self.runs += 1;
        Ok(())
    }

    /// Executes the top-level workflow and brings boundary outputs up to date.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a child.
    pub fn execute(&mut self) -> Result<(), Error> {
        self.run_flow(None)?;
        self.update_boundary_outputs()
    }

    fn update_boundary_outputs(&mut self) -> Result<(), Error> {
        let stale: Vec<String> = self
            .io
            .outputs()
            .filter(|v| !v.is_valid())
            .map(|v| v.name().to_owned())
            .collect();

        for name in stale {
            if self.graph.is_destination(&name) {
                self.update_inputs(&[&name])?;
            } else {
                self.io.set_valid(&name, true)?;
            }
        }
        Ok(())
    }

    /// Executes one item of the top-level workflow.
    ///
    /// Returns the name of the item, or `None` once the workflow is
    /// exhausted, in which case the next call starts over.
    ///
    /// # Errors
    ///
    /// Returns the error raised by the item.
    pub fn step(&mut self) -> Result<Option<String>, Error> {
        self.accept_inputs()?;
        let order = self.schedule()?.order(None).to_vec();
        let position = self.workflow.cursor().unwrap_or(0);

        let Some(name) = order.get(position).cloned() else {
            self.workflow.finish();
            return Ok(None);
        };

        self.workflow.set_running();
        if let Err(err) = self.visit(&name) {
            self.workflow.fail(&err);
            return Err(err);
        }
        self.workflow.advance(position + 1);
        Ok(Some(name))
    }

    /// Executes a workflow: the top level for `None`, or a driver's.
    pub(crate) fn run_flow(&mut self, owner: Option<&str>) -> Result<(), Error> {
        let order = self.schedule()?.order(owner).to_vec();
        self.flow_mut(owner)?.begin();

        for (position, name) in order.iter().enumerate() {
            if let Err(err) = self.visit(name) {
                self.flow_mut(owner)?.fail(&err);
                return Err(err);
            }
            self.flow_mut(owner)?.advance(position + 1);

            if self.stop.take() {
                let err = Error::Stopped {
                    path: self.qualify(name),
                };
                warn!(%err, "workflow stopped");
                self.flow_mut(owner)?.fail(&err);
                return Err(err);
            }
        }

        self.flow_mut(owner)?.finish();
        Ok(())
    }

    fn visit(&mut self, name: &str) -> Result<(), Error> {
        self.pull_inputs(name)?;
        if self.needs_run(name)? {
            self.execute_child(name)
        } else {
            trace!(path = %self.qualify(name), "up to date");
            Ok(())
        }
    }

    /// Pulls fresh values into a child's invalid inputs and executes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if an input is still invalid or disabled,
    /// or the error raised by the child.
    pub fn run_child(&mut self, name: &str) -> Result<(), Error> {
        self.pull_inputs(name)?;
        self.execute_child(name)
    }

    fn execute_child(&mut self, name: &str) -> Result<(), Error> {
        let path = self.qualify(name);
        let stop = self.stop.clone();

        match self.node_mut(name)? {
            Node::Component(c) => c.execute(&path, &stop)?,
            Node::Assembly(sub) => {
                if let Some(input) = sub.io.blocked_input() {
                    return Err(Error::NotReady {
                        path,
                        input: input.to_owned(),
                    });
                }
                sub.run_nested()?;
            }
            Node::Driver(_) => self.run_driver(name)?,
        }
        self.propagate_from(name)
    }

    fn run_driver(&mut self, name: &str) -> Result<(), Error> {
        let path = self.qualify(name);
        let Node::Driver(node) = self.node_mut(name)? else {
            return Err(Error::WrongKind {
                path,
                expected: "a driver",
            });
        };
        if let Some(input) = node.io.blocked_input() {
            return Err(Error::NotReady {
                path,
                input: input.to_owned(),
            });
        }
        let Some(mut driver) = node.inner.take() else {
            return Err(Error::Execution {
                path,
                cause: "driver is already running".into(),
            });
        };

        node.io.invalidate_outputs();
        let mut result = self.propagate_from(name);
        if result.is_ok() {
            info!(%path, "driver started");
            result = driver.run(&mut DriverContext::new(self, name));
        }

        if let Node::Driver(node) = self.node_mut(name)? {
            node.inner = Some(driver);
            if result.is_ok() {
                node.io.mark_executed();
                node.runs += 1;
            }
        }

        match &result {
            Ok(()) => info!(%path, "driver finished"),
            Err(err) => debug!(%path, error = %err, "driver ended early"),
        }
        result
    }

    /// Returns `true` if a child has to execute once its inputs are pulled.
    fn needs_run(&mut self, name: &str) -> Result<bool, Error> {
        if self.node(name)?.io().blocked_input().is_some() {
            return Ok(false);
        }
        self.has_work(name)
    }

    /// Returns `true` if anything a child is responsible for is out of date.
    fn has_work(&mut self, name: &str) -> Result<bool, Error> {
        let refs = match self.node_mut(name)? {
            Node::Component(c) => return Ok(c.io.has_work()),
            Node::Assembly(sub) => return sub.has_work_inside(),
            Node::Driver(d) => {
                if d.io.inputs().any(|v| !v.is_enabled()) {
                    return Ok(false);
                }
                if d.io.has_work() {
                    return Ok(true);
                }
                d.references()
            }
        };

        for path in refs.paths() {
            if !self.get_valid(path)? {
                return Ok(true);
            }
        }
        let members = self.schedule()?.order(Some(name)).to_vec();
        for member in members {
            if self.has_work(&member)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn has_work_inside(&mut self) -> Result<bool, Error> {
        if self.io.inputs().any(|v| !v.is_enabled()) {
            return Ok(false);
        }
        if self.io.has_work() {
            return Ok(true);
        }
        let members = self.schedule()?.order(None).to_vec();
        for member in members {
            if self.has_work(&member)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns `true` if the assembly can run and something in it is out of date.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution order cannot be determined.
    pub fn is_ready(&mut self) -> Result<bool, Error> {
        Ok(self.io.blocked_input().is_none() && self.has_work_inside()?)
    }

    fn pull_inputs(&mut self, name: &str) -> Result<(), Error> {
        let stale: Vec<String> = self
            .node(name)?
            .io()
            .invalid_inputs()
            .into_iter()
            .map(|v| format!("{name}.{v}"))
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        self.update_inputs(&stale)
    }

    /// Pulls values into invalid destinations from their sources.
    ///
    /// A source that is itself invalid is brought up to date first by running
    /// whatever produces it. Destinations whose source cannot be made valid
    /// are left invalid.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while bringing a source up to date.
    pub fn update_inputs(&mut self, names: &[impl AsRef<str>]) -> Result<(), Error> {
        for name in names {
            let name = name.as_ref();
            let Some(src) = self.graph.source_of(name) else {
                continue;
            };

            if !self.get_valid(&src)? {
                match src.split_once('.') {
                    // The enclosing assembly pulls boundary inputs before it
                    // runs this one, so they are as fresh as they will get.
                    None => {
                        self.io.set_valid(&src, true)?;
                    }
                    Some((child, var)) => self.update_child_outputs(child, var)?,
                }
            }
            if !self.get_valid(&src)? {
                debug!(src = %self.qualify(&src), dst = %self.qualify(name), "source still invalid");
                continue;
            }

            let value = self.get(&src)?.clone();
            trace!(src = %self.qualify(&src), dst = %self.qualify(name), "pulling value");
            self.store_pulled(name, &value)?;
        }
        Ok(())
    }

    fn store_pulled(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name.split_once('.') {
            Some((child, var)) => {
                self.node_mut(child)?.set_from_source(var, value)?;
                self.propagate_from(child)
            }
            None => {
                self.io.write_output(name, value.clone())?;
                self.io.set_valid(name, true)?;
                Ok(())
            }
        }
    }

    fn update_child_outputs(&mut self, child: &str, var: &str) -> Result<(), Error> {
        self.pull_inputs(child)?;
        if let Node::Assembly(sub) = self.node_mut(child)? {
            sub.update_outputs(&[var])?;
            return self.propagate_from(child);
        }
        if self.needs_run(child)? {
            self.execute_child(child)?;
        }
        Ok(())
    }

    /// Brings outputs up to date by running only what they depend on.
    ///
    /// Paths may name boundary outputs or child outputs at any depth.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while executing.
    pub fn update_outputs(&mut self, paths: &[impl AsRef<str>]) -> Result<(), Error> {
        for path in paths {
            let path = path.as_ref();
            match path.split_once('.') {
                None => self.update_inputs(&[path])?,
                Some((child, rest)) => self.update_child_outputs(child, rest)?,
            }
        }
        Ok(())
    }

    /// Returns the value of a variable, bringing it up to date first.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve or if bringing the
    /// variable up to date fails.
    pub fn evaluate(&mut self, path: &str) -> Result<Value, Error> {
        if let Some((child, rest)) = path.split_once('.')
            && rest.contains('.')
        {
            self.pull_inputs(child)?;
            let path_full = self.qualify(path);
            let Node::Assembly(sub) = self.node_mut(child)? else {
                return Err(Error::UnknownVariable { path: path_full });
            };
            let value = sub.evaluate(rest)?;
            self.propagate_from(child)?;
            return Ok(value);
        }

        let var = self.variable(path)?;
        if !var.is_valid() {
            match var.direction() {
                Direction::Out => self.update_outputs(&[path])?,
                Direction::In => self.update_inputs(&[path])?,
            }
        }
        Ok(self.get(path)?.clone())
    }
}
