use tracing::debug;

use super::Assembly;
use crate::error::{ConfigError, Error};
use crate::io::{Direction, VarDecl};
use crate::value::Value;

/// A boundary variable created to expose a child variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passthrough {
    /// The child variable the boundary variable is connected to.
    pub target: String,
    pub direction: Direction,
}

/// One end of a connection, relative to the assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End<'a> {
    Boundary(&'a str),
    Child(&'a str, &'a str),
}

impl<'a> End<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        match path.split_once('.') {
            None if !path.is_empty() => Some(End::Boundary(path)),
            Some((child, var)) if !child.is_empty() && !var.is_empty() && !var.contains('.') => {
                Some(End::Child(child, var))
            }
            _ => None,
        }
    }

    fn owner(self) -> Option<&'a str> {
        match self {
            End::Boundary(_) => None,
            End::Child(child, _) => Some(child),
        }
    }
}

impl Assembly {
    fn unresolvable(&self, path: &str) -> Error {
        ConfigError::Unresolvable {
            path: self.qualify(path),
        }
        .into()
    }

    fn lookup(&self, end: End<'_>) -> Option<(Direction, Value)> {
        let var = match end {
            End::Boundary(name) => self.io.variable(name).ok()?,
            End::Child(child, name) => self.node(child).ok()?.io().variable(name).ok()?,
        };
        Some((var.direction(), var.value().clone()))
    }

    fn can_create(&self, end: End<'_>) -> bool {
        matches!(end, End::Boundary(name) if !self.has_child(name))
    }

    /// Connects a source variable to a destination variable.
    ///
    /// Sources are child outputs or boundary inputs; destinations are child
    /// inputs or boundary outputs. Naming a boundary variable that does not
    /// exist yet creates it as a passthrough of the other end.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either path does not resolve, the ends
    /// belong to the same child, the directions are wrong, the destination
    /// already has a source, the kinds are incompatible, or the connection
    /// would close a cycle between children.
    pub fn connect(&mut self, src: &str, dst: &str) -> Result<(), Error> {
        let s = End::parse(src).ok_or_else(|| self.unresolvable(src))?;
        let d = End::parse(dst).ok_or_else(|| self.unresolvable(dst))?;

        if s.owner() == d.owner() {
            return Err(ConfigError::SameComponent {
                src: self.qualify(src),
                dst: self.qualify(dst),
            }
            .into());
        }

        let (src_var, dst_var, created) = match (self.lookup(s), self.lookup(d)) {
            (Some(sv), Some(dv)) => (sv, dv, None),
            (None, Some(dv)) if self.can_create(s) => {
                let decl = VarDecl::input(src, dv.1.clone());
                ((Direction::In, dv.1.clone()), dv, Some((decl, dst)))
            }
            (Some(sv), None) if self.can_create(d) => {
                let decl = VarDecl::output(dst, sv.1.clone());
                (sv.clone(), (Direction::Out, sv.1), Some((decl, src)))
            }
            (None, _) => return Err(self.unresolvable(src)),
            (_, None) => return Err(self.unresolvable(dst)),
        };

        let src_ok = match s {
            End::Boundary(_) => src_var.0 == Direction::In,
            End::Child(..) => src_var.0 == Direction::Out,
        };
        if !src_ok {
            return Err(ConfigError::NotASource {
                path: self.qualify(src),
            }
            .into());
        }
        let dst_ok = match d {
            End::Boundary(_) => dst_var.0 == Direction::Out,
            End::Child(..) => dst_var.0 == Direction::In,
        };
        if !dst_ok {
            return Err(ConfigError::NotADestination {
                path: self.qualify(dst),
            }
            .into());
        }

        if let Some(from) = self.graph.source_of(dst) {
            return Err(ConfigError::AlreadyConnected {
                path: self.qualify(dst),
                from: self.qualify(&from),
            }
            .into());
        }

        let (src_kind, dst_kind) = (src_var.1.kind(), dst_var.1.kind());
        if !src_kind.feeds(dst_kind) {
            return Err(ConfigError::Incompatible {
                src: self.qualify(src),
                dst: self.qualify(dst),
                src_kind,
                dst_kind,
            }
            .into());
        }

        if let (End::Child(from, _), End::Child(to, _)) = (s, d) {
            self.graph.link(from, to).map_err(|cycle| ConfigError::Circular {
                src: self.qualify(src),
                dst: self.qualify(dst),
                components: cycle.iter().map(|c| self.qualify(c)).collect(),
            })?;
        }

        if let Some((decl, target)) = created {
            let name = decl.name.clone();
            let direction = decl.direction;
            self.io.declare(decl)?;
            self.graph.add_variable(&name);
            debug!(path = %self.qualify(&name), target, "created passthrough");
            self.passthroughs.insert(
                name,
                Passthrough {
                    target: target.to_owned(),
                    direction,
                },
            );
        }

        self.graph.connect(src, dst);
        if let End::Child(child, var) = d {
            self.node_mut(child)?.io_mut().set_source(var, src)?;
        } else {
            self.io.set_source(dst, src)?;
        }
        if let End::Child(child, var) = s {
            self.node_mut(child)?.io_mut().link_output(var)?;
        } else {
            self.io.link_output(src)?;
        }
        self.schedule = None;
        debug!(src = %self.qualify(src), dst = %self.qualify(dst), "connected");

        match d {
            End::Child(child, var) => {
                let outputs = self.node_mut(child)?.invalidate_var(var)?;
                self.propagate(child, &outputs)
            }
            End::Boundary(name) => {
                if self.get_valid(src)? {
                    let value = self.get(src)?.clone();
                    self.io.write_output(name, value)?;
                    self.io.set_valid(name, true)?;
                } else {
                    self.io.set_valid(name, false)?;
                }
                Ok(())
            }
        }
    }

    /// Removes connections.
    ///
    /// With two paths, removes the connection between them in either order.
    /// With a child name, removes every connection to or from that child.
    /// With a variable path, removes every connection touching the variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConnected`] if the two paths are not
    /// connected, or [`ConfigError::Unresolvable`] if the path names nothing.
    pub fn disconnect(&mut self, path: &str, other: Option<&str>) -> Result<(), Error> {
        let edges = match other {
            Some(other) if self.graph.has_edge(path, other) => {
                vec![(path.to_owned(), other.to_owned())]
            }
            Some(other) if self.graph.has_edge(other, path) => {
                vec![(other.to_owned(), path.to_owned())]
            }
            Some(other) => {
                return Err(ConfigError::NotConnected {
                    src: self.qualify(path),
                    dst: self.qualify(other),
                }
                .into());
            }
            None if self.has_child(path) => self.graph.edges_of_component(path),
            None if self.graph.contains(path) => self.graph.edges_of(path),
            None => return Err(self.unresolvable(path)),
        };

        for (src, dst) in edges {
            self.remove_connection(&src, &dst)?;
        }
        self.schedule = None;
        Ok(())
    }

    fn remove_connection(&mut self, src: &str, dst: &str) -> Result<(), Error> {
        self.graph.disconnect(src, dst);
        let (s, d) = (End::parse(src), End::parse(dst));

        match d {
            Some(End::Child(child, var)) => self.node_mut(child)?.io_mut().remove_source(var)?,
            Some(End::Boundary(name)) => self.io.remove_source(name)?,
            None => {}
        }
        match s {
            Some(End::Child(child, var)) => {
                self.node_mut(child)?.io_mut().unlink_output(var)?;
                if let Some(End::Child(to, _)) = d {
                    self.graph.unlink(child, to);
                }
            }
            Some(End::Boundary(name)) => self.io.unlink_output(name)?,
            None => {}
        }

        self.passthroughs.retain(|name, p| {
            !((name == src && p.target == dst) || (name == dst && p.target == src))
        });
        debug!(src = %self.qualify(src), dst = %self.qualify(dst), "disconnected");
        Ok(())
    }

    /// Exposes a child variable on the boundary and returns the boundary name.
    ///
    /// The boundary variable takes the child variable's name unless `alias`
    /// is given, and its direction matches the child variable's.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not name a child variable, the
    /// boundary name is taken, or the connection cannot be made.
    pub fn create_passthrough(&mut self, path: &str, alias: Option<&str>) -> Result<String, Error> {
        let Some(End::Child(child, var)) = End::parse(path) else {
            return Err(self.unresolvable(path));
        };
        let alias = alias.unwrap_or(var);
        if self.io.contains(alias) || self.has_child(alias) {
            return Err(ConfigError::DuplicateName {
                path: self.qualify(alias),
            }
            .into());
        }

        match self.node(child)?.io().direction(var)? {
            Direction::In => self.connect(alias, path)?,
            Direction::Out => self.connect(path, alias)?,
        }
        Ok(alias.to_owned())
    }

    /// Declares a boundary variable that is not tied to a child.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateName`] if the name is taken.
    pub fn add_variable(&mut self, decl: VarDecl) -> Result<(), Error> {
        if self.has_child(&decl.name) {
            return Err(ConfigError::DuplicateName {
                path: self.qualify(&decl.name),
            }
            .into());
        }
        let name = decl.name.clone();
        self.io.declare(decl)?;
        self.graph.add_variable(&name);
        Ok(())
    }

    /// Returns the boundary variables created as passthroughs.
    pub fn passthroughs(&self) -> impl Iterator<Item = (&str, &Passthrough)> {
        self.passthroughs.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Returns every connection as `(source, destination)` relative paths.
    #[must_use]
    pub fn connections(&self) -> Vec<(String, String)> {
        self.graph.connections()
    }

    /// Returns `true` if the variable is fed by a connection in this assembly.
    #[must_use]
    pub fn is_destination(&self, path: &str) -> bool {
        self.graph.is_destination(path)
    }
}
