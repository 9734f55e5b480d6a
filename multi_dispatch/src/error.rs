//! Error types for class registration, generic definition and method dispatch.
//!
//! Registration errors are synchronous and leave the registries untouched.
//! `DispatchFailure` is fatal to the call that asked for resolution.
//! `AmbiguousDispatch` is only produced by strict resolution; the default
//! resolver tie-breaks and records a diagnostic instead.

use thiserror::Error;

/// Dispatch engine error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A class lists a parent that has not been registered.
    #[error("UndefVarError: parent class `{parent}` of `{class}` is not defined")]
    UnknownParent { class: String, parent: String },

    /// A type name is not registered in the class graph.
    #[error("UndefVarError: type `{0}` is not defined")]
    UnknownType(String),

    /// Registering the class would make it its own ancestor.
    #[error("TypeError: cyclic inheritance involving `{class}` via parent `{parent}`")]
    CyclicInheritance { class: String, parent: String },

    /// A class name collides with a pseudo-type.
    #[error("ArgumentError: `{0}` is a reserved pseudo-type name")]
    ReservedName(String),

    /// A generic was redefined with a different shape.
    #[error("ArgumentError: generic `{name}` is already defined with a different shape ({existing})")]
    DuplicateGeneric { name: String, existing: String },

    /// The generic has not been defined.
    #[error("UndefVarError: generic `{0}` is not defined")]
    UnknownGeneric(String),

    /// Dispatch/optional positions are inconsistent with the arity.
    #[error("ArgumentError: invalid shape for generic `{name}`: {reason}")]
    InvalidShape { name: String, reason: String },

    /// A method signature does not fit its generic.
    #[error("ArgumentError: invalid signature {signature} for `{generic}`: {reason}")]
    InvalidSignature {
        generic: String,
        signature: String,
        reason: String,
    },

    /// An observed tuple has the wrong number of dispatch arguments.
    #[error("MethodError: `{generic}` dispatches on {expected} argument(s), got {found}")]
    ArityMismatch {
        generic: String,
        expected: usize,
        found: usize,
    },

    /// A required dispatch argument was absent.
    #[error("MethodError: `{generic}` requires dispatch argument {position}")]
    MissingArgument { generic: String, position: usize },

    /// No registered signature applies to the observed types.
    #[error("MethodError: no method matching {generic}({})", render_args(.observed))]
    DispatchFailure {
        generic: String,
        observed: Vec<String>,
    },

    /// A configuration document could not be parsed.
    #[error("ArgumentError: invalid dispatch configuration: {0}")]
    InvalidConfig(String),

    /// A registry snapshot could not be encoded or decoded.
    #[error("SnapshotError: {0}")]
    Snapshot(String),

    /// Two or more signatures tie for the lowest score.
    #[error("{}", render_ambiguity(.generic, .observed, .candidates))]
    AmbiguousDispatch {
        generic: String,
        observed: Vec<String>,
        candidates: Vec<Vec<String>>,
    },
}

impl DispatchError {
    /// Create a dispatch failure for a generic and the observed type names.
    pub fn dispatch_failure<S: Into<String>>(generic: S, observed: Vec<String>) -> Self {
        DispatchError::DispatchFailure {
            generic: generic.into(),
            observed,
        }
    }

    /// Create an invalid signature error.
    pub fn invalid_signature<G, S, R>(generic: G, signature: S, reason: R) -> Self
    where
        G: Into<String>,
        S: Into<String>,
        R: Into<String>,
    {
        DispatchError::InvalidSignature {
            generic: generic.into(),
            signature: signature.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid shape error.
    pub fn invalid_shape<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        DispatchError::InvalidShape {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

fn render_args(types: &[String]) -> String {
    types
        .iter()
        .map(|t| format!("::{}", t))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_ambiguity(generic: &str, observed: &[String], candidates: &[Vec<String>]) -> String {
    let mut msg = format!(
        "MethodError: {}({}) is ambiguous. Candidates:",
        generic,
        render_args(observed)
    );
    for sig in candidates {
        msg.push_str(&format!("\n  {}({})", generic, render_args(sig)));
    }
    msg
}

/// Result type alias for dispatch engine operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
