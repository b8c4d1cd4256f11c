#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Assembly, Node};
use crate::io::{Direction, Io, Variable};
use crate::value::Value;

/// The kind of a child within an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChildKind {
    Component,
    Assembly,
    Driver,
}

/// A point-in-time copy of an assembly's state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    pub path: String,
    pub driver: Option<String>,
    pub runs: usize,
    pub variables: Vec<VariableSnapshot>,
    pub children: Vec<ChildSnapshot>,
    pub connections: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableSnapshot {
    pub name: String,
    pub direction: Direction,
    pub value: Value,
    pub valid: bool,
    pub enabled: bool,
    pub source: Option<String>,
}

impl From<&Variable> for VariableSnapshot {
    fn from(var: &Variable) -> Self {
        Self {
            name: var.name().to_owned(),
            direction: var.direction(),
            value: var.value().clone(),
            valid: var.is_valid(),
            enabled: var.is_enabled(),
            source: var.source().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChildSnapshot {
    pub name: String,
    pub kind: ChildKind,
    pub runs: usize,
    pub variables: Vec<VariableSnapshot>,
    /// Workflow members of a driver.
    pub workflow: Vec<String>,
    /// The contents of a nested assembly.
    pub assembly: Option<Box<Snapshot>>,
}

fn variables(io: &Io) -> Vec<VariableSnapshot> {
    io.variables().map(VariableSnapshot::from).collect()
}

impl Assembly {
    /// Captures variables, flags, run counts, and connections recursively.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let children = self
            .children
            .iter()
            .map(|(name, node)| ChildSnapshot {
                name: name.clone(),
                kind: node.kind(),
                runs: node.runs(),
                variables: variables(node.io()),
                workflow: match node {
                    Node::Driver(d) => d.workflow.members().to_vec(),
                    _ => Vec::new(),
                },
                assembly: match node {
                    Node::Assembly(sub) => Some(Box::new(sub.snapshot())),
                    _ => None,
                },
            })
            .collect();

        Snapshot {
            path: self.path.clone(),
            driver: self.driver.clone(),
            runs: self.runs,
            variables: variables(&self.io),
            children,
            connections: self.graph.connections(),
        }
    }
}

impl Snapshot {
    /// Finds a child snapshot by dotted path.
    #[must_use]
    pub fn child(&self, path: &str) -> Option<&ChildSnapshot> {
        let (name, rest) = match path.split_once('.') {
            Some((name, rest)) => (name, Some(rest)),
            None => (path, None),
        };
        let child = self.children.iter().find(|c| c.name == name)?;
        match rest {
            None => Some(child),
            Some(rest) => child.assembly.as_ref()?.child(rest),
        }
    }
}
