//! Hierarchical folder/item tree model with tri-state selection aggregation,
//! registry-driven polymorphic (de)serialization, and scoped queries.
//!
//! The tree owns every node in an id-addressed arena and keeps one invariant
//! at all times: a folder's `selected` is a pure function of its selectable
//! children (`false` when there are none, the shared value when they agree,
//! `"mixed"` otherwise), re-established synchronously before any mutating
//! call returns. [`Tree::set_selected`] is the only downward cascade;
//! recomputation only ever pulls upward, so no update loop can form.
//!
//! - [`Tree`]: mutation (`add` / `remove` / `move_to` / `attach`), selection,
//!   the save-hidden user-intent channel, clicks, and observers.
//! - [`Node`]: item / action-item / folder payloads with open attributes.
//! - [`TypeRegistry`]: tag-to-constructor mapping for deserialization and
//!   type-filtered search.
//! - Queries: [`Tree::nested_each`], [`Tree::flatten`], [`Tree::get_item`],
//!   [`Tree::selected`].
//! - Serialization: [`Tree::serialize`] / [`Tree::deserialize`] over a
//!   JSON-compatible value format.

mod error;
mod event;
mod node;
pub mod prelude;
mod registry;
mod select;
mod serial;
mod tree;

pub use error::TreeError;
pub use event::{ClickFn, Notification, ObserverId};
pub use node::Node;
pub use registry::{Binding, NodeCtor, TypeRegistry};
pub use select::SelectState;
pub use tree::{NodeId, Tree};
