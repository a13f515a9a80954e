use std::ops::ControlFlow;

use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::TreeError;
use crate::event::{Notification, ObserverFn, ObserverId};
use crate::node::{Node, NodeKind, TAG_TREE};
use crate::registry::TypeRegistry;
use crate::select::SelectState;

/// Stable handle identifying a node within its [`Tree`].
///
/// Node *identity* is the handle: two nodes with equal field values are
/// still distinct members, so duplicates are permitted anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

pub(crate) struct Slot {
    pub(crate) parent: Option<NodeId>,
    pub(crate) node: Node,
}

/// The tree model: owns every node, the root presentation flags, the type
/// registry, and the observer list.
///
/// All structure lives in an id-addressed arena. Folders hold ordered child
/// handles; parent links are non-owning back-references used only for the
/// upward aggregation walk. Mutation is addressed through the tree, which
/// keeps the folder invariant — a folder's `selected` is a pure function of
/// its selectable children — re-established synchronously before any
/// mutating call returns.
///
/// Observers receive `(&Tree, &Notification)`. The shared borrow means a
/// listener can never re-enter a mutation, so the one-directional data flow
/// (children push state up via recompute, parents push state down via
/// [`Tree::set_selected`]) cannot loop.
pub struct Tree {
    pub(crate) nodes: FxHashMap<NodeId, Slot>,
    next_id: u64,
    root: NodeId,
    sortable: bool,
    show_select_all: bool,
    registry: TypeRegistry,
    observers: Vec<(ObserverId, ObserverFn)>,
    next_observer: u64,
    pending: Vec<Notification>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree with the default type registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::default())
    }

    /// Creates a tree with a caller-provided registry.
    #[must_use]
    pub fn with_registry(registry: TypeRegistry) -> Self {
        let root = NodeId(0);
        let mut nodes = FxHashMap::default();
        nodes.insert(
            root,
            Slot {
                parent: None,
                node: Node::folder().with_tag(TAG_TREE),
            },
        );
        Self {
            nodes,
            next_id: 1,
            root,
            sortable: false,
            show_select_all: false,
            registry,
            observers: Vec::new(),
            next_observer: 0,
            pending: Vec::new(),
        }
    }

    /// Returns the root node handle. The root is a folder tagged `"tree"`.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root-level sortable presentation flag.
    #[must_use]
    pub const fn sortable(&self) -> bool {
        self.sortable
    }

    /// Sets the root-level sortable presentation flag.
    pub const fn set_sortable(&mut self, sortable: bool) {
        self.sortable = sortable;
    }

    /// Returns the root-level show-select-all presentation flag.
    #[must_use]
    pub const fn show_select_all(&self) -> bool {
        self.show_select_all
    }

    /// Sets the root-level show-select-all presentation flag.
    pub const fn set_show_select_all(&mut self, show: bool) {
        self.show_select_all = show;
    }

    /// Returns the type registry.
    #[must_use]
    pub const fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Returns the type registry for registration of further tags.
    pub const fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    // =========================================================================
    // Node access
    // =========================================================================

    /// Returns the node behind `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id).map(|slot| &slot.node)
    }

    /// Returns the node behind `id` for field mutation. Selection and
    /// children are tree-owned and have no setters here.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id).map(|slot| &mut slot.node)
    }

    /// Returns the owning folder of `id`, or `None` for the root and
    /// detached nodes.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|slot| slot.parent)
    }

    /// Returns the ordered children of `id` (empty for leaves and unknown
    /// ids).
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(&id) {
            Some(slot) => slot.node.children(),
            None => &[],
        }
    }

    /// Returns whether `id` is live in this tree (attached or detached).
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the number of live nodes, the root and detached subtrees
    /// included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Subscribes `observer` to every notification; returns a handle for
    /// [`Self::unobserve`]. Delivery is synchronous and in emission order.
    pub fn observe(
        &mut self,
        observer: impl FnMut(&Self, &Notification) + Send + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Drops a subscription; returns whether it was present.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub(crate) fn note(&mut self, note: Notification) {
        self.pending.push(note);
    }

    /// Delivers buffered notifications. Observers only get a shared borrow,
    /// so none of them can start another mutation mid-dispatch.
    pub(crate) fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let notes = std::mem::take(&mut self.pending);
        let mut observers = std::mem::take(&mut self.observers);
        for note in &notes {
            log::trace!("notify: {note:?}");
            for (_, observer) in &mut observers {
                observer(self, note);
            }
        }
        self.observers = observers;
    }

    // =========================================================================
    // Structural mutation
    // =========================================================================

    /// Appends `node` as the last child of `parent`; returns the new handle.
    pub fn add(&mut self, parent: NodeId, node: Node) -> Result<NodeId, TreeError> {
        self.insert_with(parent, node, None)
    }

    /// Inserts `node` under `parent` at `index` (clamped to the child
    /// count); returns the new handle.
    pub fn add_at(&mut self, parent: NodeId, node: Node, index: usize) -> Result<NodeId, TreeError> {
        self.insert_with(parent, node, Some(index))
    }

    fn insert_with(
        &mut self,
        parent: NodeId,
        node: Node,
        at: Option<usize>,
    ) -> Result<NodeId, TreeError> {
        // Validate before allocating so a failed insert leaves no orphan.
        match self.nodes.get(&parent) {
            None => return Err(TreeError::UnknownNode(parent)),
            Some(slot) if !slot.node.is_folder() => return Err(TreeError::NotAFolder(parent)),
            Some(_) => {}
        }
        let id = self.alloc(node);
        self.attach_inner(parent, id, at)?;
        self.recompute_from(Some(parent));
        self.flush();
        Ok(id)
    }

    /// Re-attaches a detached subtree as the last child of `parent`,
    /// transferring ownership to that folder.
    pub fn attach(&mut self, parent: NodeId, id: NodeId) -> Result<(), TreeError> {
        self.attach_inner(parent, id, None)?;
        self.recompute_from(Some(parent));
        self.flush();
        Ok(())
    }

    /// Re-attaches a detached subtree at `index` (clamped).
    pub fn attach_at(&mut self, parent: NodeId, id: NodeId, index: usize) -> Result<(), TreeError> {
        self.attach_inner(parent, id, Some(index))?;
        self.recompute_from(Some(parent));
        self.flush();
        Ok(())
    }

    fn attach_inner(
        &mut self,
        parent: NodeId,
        id: NodeId,
        at: Option<usize>,
    ) -> Result<(), TreeError> {
        if id == self.root {
            // The root is the tree itself; giving it an owner can only end
            // in a cycle once its new ancestor re-attaches.
            return Err(TreeError::WouldCycle(id));
        }
        match self.nodes.get(&id) {
            None => return Err(TreeError::UnknownNode(id)),
            Some(slot) if slot.parent.is_some() => return Err(TreeError::AlreadyAttached(id)),
            Some(_) => {}
        }
        match self.nodes.get(&parent) {
            None => return Err(TreeError::UnknownNode(parent)),
            Some(slot) if !slot.node.is_folder() => return Err(TreeError::NotAFolder(parent)),
            Some(_) => {}
        }
        if self.is_ancestor(id, parent) {
            return Err(TreeError::WouldCycle(id));
        }

        let Some(children) = self.folder_children_mut(parent) else {
            return Err(TreeError::NotAFolder(parent));
        };
        let index = at.map_or(children.len(), |index| index.min(children.len()));
        children.insert(index, id);
        if let Some(slot) = self.nodes.get_mut(&id) {
            slot.parent = Some(parent);
        }
        self.note(Notification::Added {
            parent,
            node: id,
            index,
        });
        Ok(())
    }

    /// Detaches `id` from its owning folder, keeping the subtree alive for
    /// re-attachment elsewhere. The root, unknown ids, and already-detached
    /// nodes are a benign no-op reporting `false`.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            log::trace!("remove: {id:?} has no owning folder, ignoring");
            return false;
        };
        let Some(children) = self.folder_children_mut(parent) else {
            return false;
        };
        let Some(index) = children.iter().position(|&child| child == id) else {
            return false;
        };
        children.remove(index);
        if let Some(slot) = self.nodes.get_mut(&id) {
            slot.parent = None;
        }
        self.note(Notification::Removed {
            parent,
            node: id,
            index,
        });
        self.recompute_from(Some(parent));
        self.flush();
        true
    }

    /// Frees a detached subtree. Returns `false` for the root, unknown ids,
    /// and nodes still attached to a folder.
    pub fn discard(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        match self.nodes.get(&id) {
            None => false,
            Some(slot) if slot.parent.is_some() => {
                log::warn!("discard: {id:?} is still attached, refusing");
                false
            }
            Some(_) => {
                self.free_subtree(id);
                true
            }
        }
    }

    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        let Some(slot) = self.nodes.remove(&id) else {
            return;
        };
        for &child in slot.node.children() {
            self.free_subtree(child);
        }
    }

    /// Relocates `id` to position `to` within its owning folder's children.
    ///
    /// Moving to the current position, or moving a detached or unknown node,
    /// is a no-op reporting `false` with no notification. A `to` past the
    /// end clamps to the tail (splice semantics). Selection aggregation is
    /// untouched — membership does not change.
    pub fn move_to(&mut self, id: NodeId, to: usize) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let Some(children) = self.folder_children_mut(parent) else {
            return false;
        };
        let Some(from) = children.iter().position(|&child| child == id) else {
            return false;
        };
        if from == to {
            log::trace!("move_to: {id:?} already at {to}");
            return false;
        }
        children.remove(from);
        let to = to.min(children.len());
        children.insert(to, id);
        self.note(Notification::Moved {
            parent,
            node: id,
            from,
            to,
        });
        self.flush();
        true
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Sets the selection state of `id` and cascades.
    ///
    /// `Selected` and `Unselected` push down to every descendant; `Mixed`
    /// updates only the node itself (it is a folder-local value). Afterwards
    /// the node's ancestors re-aggregate upward, stopping at the first
    /// folder whose value does not change. [`Notification::SelectedChanged`]
    /// fires for every node whose stored value actually changed. Returns
    /// `false` for unknown ids.
    pub fn set_selected(&mut self, id: NodeId, selected: SelectState) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.apply_selected(id, selected);
        let parent = self.parent(id);
        self.recompute_from(parent);
        self.flush();
        true
    }

    fn apply_selected(&mut self, id: NodeId, selected: SelectState) {
        let (changed, children) = {
            let Some(slot) = self.nodes.get_mut(&id) else {
                return;
            };
            let changed = slot.node.selected != selected;
            slot.node.selected = selected;
            // "mixed" is folder-local and never cascades.
            let children: SmallVec<[NodeId; 8]> = if selected == SelectState::Mixed {
                SmallVec::new()
            } else {
                SmallVec::from_slice(slot.node.children())
            };
            (changed, children)
        };
        if changed {
            self.note(Notification::SelectedChanged { node: id, selected });
        }
        for child in children {
            self.apply_selected(child, selected);
        }
    }

    /// Pull-only aggregation: recomputes folders from `start` upward,
    /// stopping at the first folder whose stored value does not change.
    /// Never pushes state down, so no cycle with [`Self::set_selected`] can
    /// form.
    pub(crate) fn recompute_from(&mut self, start: Option<NodeId>) {
        let mut cursor = start;
        while let Some(id) = cursor {
            let Some(aggregate) = self.aggregate(id) else {
                break;
            };
            let changed = {
                let Some(slot) = self.nodes.get_mut(&id) else {
                    break;
                };
                let changed = slot.node.selected != aggregate;
                slot.node.selected = aggregate;
                changed
            };
            if !changed {
                break;
            }
            self.note(Notification::SelectedChanged {
                node: id,
                selected: aggregate,
            });
            cursor = self.parent(id);
        }
    }

    /// Recomputes one folder's own value in place, silently. Used on the
    /// deserialize reset path.
    pub(crate) fn recompute_local(&mut self, id: NodeId) {
        if let Some(aggregate) = self.aggregate(id)
            && let Some(slot) = self.nodes.get_mut(&id)
        {
            slot.node.selected = aggregate;
        }
    }

    /// Aggregate over the selectable children: none → `Unselected`, one
    /// distinct value → that value, several → `Mixed`. `None` for
    /// non-folders.
    fn aggregate(&self, id: NodeId) -> Option<SelectState> {
        let slot = self.nodes.get(&id)?;
        let NodeKind::Folder { children, .. } = &slot.node.kind else {
            return None;
        };
        let mut distinct: SmallVec<[SelectState; 3]> = SmallVec::new();
        for child in children {
            let Some(child_slot) = self.nodes.get(child) else {
                continue;
            };
            if !child_slot.node.selectable() {
                continue;
            }
            let state = child_slot.node.selected;
            if !distinct.contains(&state) {
                distinct.push(state);
            }
        }
        Some(match distinct.as_slice() {
            [] => SelectState::Unselected,
            [only] => *only,
            _ => SelectState::Mixed,
        })
    }

    // =========================================================================
    // Hidden-state channel and clicks
    // =========================================================================

    /// Sets a folder's hidden flag through the user-intent channel, emitting
    /// [`Notification::SaveHidden`] so persistence observers can tell a user
    /// click from a data load (the silent path is
    /// [`Node::set_hidden`]). Returns `false` for non-folders.
    pub fn save_hidden(&mut self, id: NodeId, hidden: bool) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        if !node.set_hidden(hidden) {
            return false;
        }
        self.note(Notification::SaveHidden { node: id, hidden });
        self.flush();
        true
    }

    /// Delivers a click to `id`: observers are notified, then the node's
    /// own callback (if any) runs with a shared borrow of the tree. Returns
    /// `false` for unknown ids.
    pub fn click(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.note(Notification::Click { node: id });
        self.flush();
        if let Some(callback) = self.node(id).and_then(|node| node.on_click().cloned()) {
            callback(self, id);
        }
        true
    }

    // =========================================================================
    // Traversal & query
    // =========================================================================

    /// Depth-first walk of every descendant of `from`, visiting the children
    /// of a folder before the folder itself. The starting node is not
    /// visited. Returning `Break` from `visit` halts the whole traversal at
    /// any depth.
    pub fn nested_each<F>(&self, from: NodeId, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &Node) -> ControlFlow<()>,
    {
        self.nested_each_inner(from, &mut visit)
    }

    fn nested_each_inner<F>(&self, from: NodeId, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &Node) -> ControlFlow<()>,
    {
        for &child in self.children(from) {
            let Some(node) = self.node(child) else {
                continue;
            };
            if node.is_folder() {
                self.nested_each_inner(child, visit)?;
            }
            visit(child, node)?;
        }
        ControlFlow::Continue(())
    }

    /// Finds the first descendant of `from` whose `"id"` attribute equals
    /// `value`. `None` is the expected miss, not an error.
    #[must_use]
    pub fn get_item(&self, from: NodeId, value: &Value) -> Option<NodeId> {
        self.get_item_by(from, "id", value, None)
    }

    /// Finds the first descendant of `from` (in [`Self::nested_each`] order)
    /// whose `field` attribute equals `value`, optionally restricted to
    /// nodes answering to `tag` (see [`Node::matches_tag`]).
    #[must_use]
    pub fn get_item_by(
        &self,
        from: NodeId,
        field: &str,
        value: &Value,
        tag: Option<&str>,
    ) -> Option<NodeId> {
        let mut found = None;
        let _ = self.nested_each(from, |id, node| {
            if let Some(tag) = tag
                && !node.matches_tag(tag)
            {
                return ControlFlow::Continue(());
            }
            if node.attribute(field).as_ref() == Some(value) {
                found = Some(id);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// Flattens the subtree rooted at `from` into a pre-order list — each
    /// node before its own children, the starting node first. With
    /// `exclude_folders`, folder nodes are omitted from the output but their
    /// children are still visited.
    #[must_use]
    pub fn flatten(&self, from: NodeId, exclude_folders: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.flatten_into(from, exclude_folders, &mut out);
        out
    }

    fn flatten_into(&self, id: NodeId, exclude_folders: bool, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !(exclude_folders && node.is_folder()) {
            out.push(id);
        }
        for &child in node.children() {
            self.flatten_into(child, exclude_folders, out);
        }
    }

    /// Returns the subset of [`Self::flatten`] that is selectable and
    /// exactly `Selected` — `Mixed` folders do not count.
    #[must_use]
    pub fn selected(&self, from: NodeId, exclude_folders: bool) -> Vec<NodeId> {
        self.flatten(from, exclude_folders)
            .into_iter()
            .filter(|&id| {
                self.node(id)
                    .is_some_and(|node| node.selectable() && node.selected().is_selected())
            })
            .collect()
    }

    // =========================================================================
    // Crate internals
    // =========================================================================

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Slot { parent: None, node });
        id
    }

    /// Replaces a folder's entire children sequence, rewiring parent links.
    /// Structural reset for the deserialize path; emits nothing.
    pub(crate) fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            if let Some(slot) = self.nodes.get_mut(&child) {
                slot.parent = Some(id);
            }
        }
        if let Some(slot) = self.nodes.get_mut(&id)
            && let NodeKind::Folder {
                children: folder_children,
                ..
            } = &mut slot.node.kind
        {
            *folder_children = children;
        }
    }

    fn folder_children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        self.nodes
            .get_mut(&id)
            .and_then(|slot| slot.node.children_mut())
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.parent(id);
        }
        false
    }
}
