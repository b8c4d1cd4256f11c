use thiserror::Error;

use crate::value::Kind;

/// A boxed error returned by component and driver implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by assemblies, workflows, and drivers.
///
/// Every message carries the fully qualified path of the offending entity.
#[derive(Debug, Error)]
pub enum Error {
    /// A structural change was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A direct set was attempted on an input that is fed by a connection.
    #[error("'{path}' is already connected to source '{from}' and cannot be directly set")]
    ConnectedInput { path: String, from: String },

    /// Two sibling drivers cannot be put in a well-defined order.
    #[error(
        "drivers '{first}' and '{second}' {} ({}), so their order cannot be determined",
        .overlap.describe(),
        .components.join(", ")
    )]
    AmbiguousOrder {
        first: String,
        second: String,
        components: Vec<String>,
        overlap: Overlap,
    },

    /// A component or driver failed while executing.
    #[error("{path}: execution failed")]
    Execution {
        path: String,
        #[source]
        cause: BoxError,
    },

    /// A cooperative stop unwound the run.
    #[error("{path}: stop requested")]
    Stopped { path: String },

    /// A component reported an external interruption.
    #[error("{path}: run interrupted")]
    Interrupted { path: String },

    /// A component was asked to execute while an input was invalid or disabled.
    #[error("{path}: cannot execute, input '{input}' is invalid or disabled")]
    NotReady { path: String, input: String },

    #[error("{path}: no such variable")]
    UnknownVariable { path: String },

    #[error("{path}: no such component")]
    UnknownComponent { path: String },

    /// A child exists but is not of the kind the operation needs.
    #[error("{path}: not {expected}")]
    WrongKind { path: String, expected: &'static str },
}

/// How two drivers' iteration sets collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Both drivers iterate over exactly the same components.
    Identical,
    /// The sets intersect but neither contains the other.
    Partial,
}

impl Overlap {
    fn describe(self) -> &'static str {
        match self {
            Overlap::Identical => "iterate over the same set of components",
            Overlap::Partial => "have overlap in their iteration sets",
        }
    }
}

/// Errors from connecting, disconnecting, or adding children.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot connect '{src}' to '{dst}': both are on the same component")]
    SameComponent { src: String, dst: String },

    #[error("'{path}' cannot be a connection source")]
    NotASource { path: String },

    #[error("'{path}' cannot be a connection destination")]
    NotADestination { path: String },

    #[error("'{path}' is already connected to '{from}'")]
    AlreadyConnected { path: String, from: String },

    #[error("'{path}' does not name a connectable variable")]
    Unresolvable { path: String },

    #[error("'{src}' is not connected to '{dst}'")]
    NotConnected { src: String, dst: String },

    #[error("'{path}' already exists")]
    DuplicateName { path: String },

    #[error(
        "circular dependency ({}) would be created by connecting '{src}' to '{dst}'",
        .components.join(", ")
    )]
    Circular {
        src: String,
        dst: String,
        components: Vec<String>,
    },

    #[error("cannot connect '{src}' ({src_kind:?}) to '{dst}' ({dst_kind:?})")]
    Incompatible {
        src: String,
        dst: String,
        src_kind: Kind,
        dst_kind: Kind,
    },
}

/// Marker error a component returns to signal an external interruption.
///
/// The enclosing run ends in the interrupted state and surfaces
/// [`Error::Interrupted`] instead of [`Error::Execution`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("interrupted")]
pub struct Interrupted;

/// Wraps an implementation error with the path of the unit that raised it.
pub(crate) fn execution(path: &str, cause: BoxError) -> Error {
    if cause.is::<Interrupted>() {
        Error::Interrupted {
            path: path.to_owned(),
        }
    } else {
        Error::Execution {
            path: path.to_owned(),
            cause,
        }
    }
}
