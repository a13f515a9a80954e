use std::sync::Arc;

use crate::select::SelectState;
use crate::tree::{NodeId, Tree};

/// Callback fired when a node receives a click via [`Tree::click`].
///
/// Transient: never serialized.
pub type ClickFn = Arc<dyn Fn(&Tree, NodeId) + Send + Sync>;

pub(crate) type ObserverFn = Box<dyn FnMut(&Tree, &Notification) + Send>;

/// Handle identifying a subscription made with [`Tree::observe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Notifications delivered synchronously to observers before the mutating
/// call returns, in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The node received a click.
    Click { node: NodeId },
    /// The node's stored selection value actually changed.
    SelectedChanged { node: NodeId, selected: SelectState },
    /// A child was inserted under `parent` at `index`.
    Added { parent: NodeId, node: NodeId, index: usize },
    /// A child was detached from `parent`; it sat at `index`.
    Removed { parent: NodeId, node: NodeId, index: usize },
    /// A child was relocated within `parent` from `from` to `to`.
    Moved { parent: NodeId, node: NodeId, from: usize, to: usize },
    /// A folder's hidden flag changed through the user-intent channel.
    SaveHidden { node: NodeId, hidden: bool },
}
