use std::collections::VecDeque;

use tracing::debug;

use super::{Assembly, Node};
use crate::error::Error;
use crate::io::Direction;

impl Assembly {
    /// Invalidates everything downstream of the named variables.
    ///
    /// The named variables themselves are left alone. Returns the boundary
    /// outputs that turned invalid. When `notify_parent` is `false` those
    /// outputs are not queued for the enclosing assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph names a variable that no longer exists.
    pub fn invalidate_deps(
        &mut self,
        names: &[impl AsRef<str>],
        notify_parent: bool,
    ) -> Result<Vec<String>, Error> {
        let mut frontier: VecDeque<String> =
            names.iter().map(|n| n.as_ref().to_owned()).collect();
        let mut outputs = Vec::new();

        while let Some(name) = frontier.pop_front() {
            for succ in self.graph.successors(&name) {
                match succ.split_once('.') {
                    None => {
                        if self.io.direction(&succ)? == Direction::Out
                            && self.io.set_valid(&succ, false)?
                        {
                            outputs.push(succ);
                        }
                    }
                    Some((child, var)) => {
                        let node = self.node_mut(child)?;
                        if node.io().get_valid(var)? {
                            let invalidated = node.invalidate_var(var)?;
                            frontier.extend(invalidated.iter().map(|o| format!("{child}.{o}")));
                        }
                    }
                }
            }
        }

        if !outputs.is_empty() {
            debug!(path = %self.path, ?outputs, "boundary outputs invalidated");
        }
        if !notify_parent {
            self.io.take_invalidated();
        }
        Ok(outputs)
    }

    /// Disables everything downstream of the named variables.
    ///
    /// Returns the boundary outputs that turned disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph names a variable that no longer exists.
    pub fn disable_deps(&mut self, names: &[impl AsRef<str>]) -> Result<Vec<String>, Error> {
        self.propagate_enabled(names, false)
    }

    /// Enables or disables a variable and everything that depends on it.
    ///
    /// A disabled input keeps its owner from running. Disabling flows
    /// downstream like invalidation; re-enabling flows the same way once
    /// no other input of an owner is still disabled. Returns the boundary
    /// outputs of this assembly whose flag changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve.
    pub fn set_enabled(&mut self, path: &str, enabled: bool) -> Result<Vec<String>, Error> {
        let Some((child, rest)) = path.split_once('.') else {
            if !self.io.set_enabled(path, enabled)? {
                return Ok(Vec::new());
            }
            return match self.io.direction(path)? {
                Direction::In => self.propagate_enabled(&[path], enabled),
                Direction::Out => Ok(vec![path.to_owned()]),
            };
        };

        let changed = match self.node_mut(child)? {
            Node::Assembly(sub) if rest.contains('.') => sub.set_enabled(rest, enabled)?,
            node => node.set_enabled_var(rest, enabled)?,
        };
        let paths: Vec<String> = changed.iter().map(|v| format!("{child}.{v}")).collect();
        self.propagate_enabled(&paths, enabled)
    }

    pub(crate) fn propagate_enabled(
        &mut self,
        names: &[impl AsRef<str>],
        enabled: bool,
    ) -> Result<Vec<String>, Error> {
        let mut frontier: VecDeque<String> =
            names.iter().map(|n| n.as_ref().to_owned()).collect();
        let mut outputs = Vec::new();

        while let Some(name) = frontier.pop_front() {
            for succ in self.graph.successors(&name) {
                match succ.split_once('.') {
                    None => {
                        if self.io.direction(&succ)? == Direction::Out
                            && self.io.set_enabled(&succ, enabled)?
                        {
                            outputs.push(succ);
                        }
                    }
                    Some((child, var)) => {
                        let changed = self.node_mut(child)?.set_enabled_var(var, enabled)?;
                        frontier.extend(changed.iter().map(|v| format!("{child}.{v}")));
                    }
                }
            }
        }
        Ok(outputs)
    }
}
