use crate::host::tree::NodeId;

/// Faults raised by the host object model.
///
/// Only `ReadOnlyViolation` is meant to reach calling script once a graph is
/// instrumented. Everything else raised during the graph walk is contained by
/// the engine and logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("read-only violation: cannot assign `{field}` on {target}")]
    ReadOnlyViolation { target: String, field: String },

    #[error("introspection failure: {reason}")]
    IntrospectionFailure { reason: String },

    #[error("stringification failure: {reason}")]
    StringificationFailure { reason: String },

    #[error("cannot redefine non-configurable field `{field}`")]
    DefineRejected { field: String },

    #[error("cannot add field `{field}` to a non-extensible object")]
    NotExtensible { field: String },

    #[error("field `{field}` has a getter but no setter")]
    MissingSetter { field: String },

    #[error("prototype chain would contain a cycle")]
    PrototypeCycle,

    #[error("value is not callable")]
    NotCallable,

    /// Raised by native code (function bodies, native accessors).
    #[error("{0}")]
    Thrown(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Faults raised by structural tree operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node {0} cannot contain children")]
    NotAContainer(NodeId),

    #[error("inserting node {0} would make it its own ancestor")]
    HierarchyCycle(NodeId),

    #[error("node {0} is not a child of this node")]
    NotAChild(NodeId),

    #[error("node {0} is not an element and has no attributes")]
    NotAnElement(NodeId),

    #[error("node {0} is not a text node")]
    NotText(NodeId),
}

/// Faults raised while rendering a delivery template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unterminated tag opened at byte {offset}")]
    Unterminated { offset: usize },

    #[error("empty tag at byte {offset}")]
    EmptyTag { offset: usize },

    #[error("unsupported tag `{tag}` at byte {offset}")]
    UnsupportedTag { tag: String, offset: usize },
}
