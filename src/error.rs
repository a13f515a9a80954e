use thiserror::Error;

use crate::tree::NodeId;

/// Errors surfaced by tree mutation and (de)serialization.
///
/// Expected absences are not errors: search misses return `None` and
/// idempotent mutations on missing nodes return `false`.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A serialized child carries a type tag with no registry entry.
    #[error("unknown node type tag '{0}'")]
    UnknownTag(String),

    /// A serialized child carries no type tag at all.
    #[error("serialized child carries no type tag")]
    MissingTag,

    /// A constructor was registered under a tag it does not produce.
    #[error("constructor registered under '{tag}' produces nodes tagged '{produced}'")]
    TagMismatch { tag: String, produced: String },

    /// The node id is not present in this tree.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The target of a child operation is not a folder.
    #[error("node {0:?} is not a folder")]
    NotAFolder(NodeId),

    /// The node already has an owning folder.
    #[error("node {0:?} is already attached")]
    AlreadyAttached(NodeId),

    /// Attaching would make a node its own ancestor.
    #[error("attaching {0:?} would create a cycle")]
    WouldCycle(NodeId),

    /// The serialized form could not be decoded.
    #[error("malformed node data: {0}")]
    Malformed(#[from] serde_json::Error),
}
