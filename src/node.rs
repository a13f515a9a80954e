use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::event::ClickFn;
use crate::select::SelectState;
use crate::tree::{NodeId, Tree};

pub(crate) const TAG_ITEM: &str = "item";
pub(crate) const TAG_ACTION_ITEM: &str = "action_item";
pub(crate) const TAG_FOLDER: &str = "folder";
pub(crate) const TAG_TREE: &str = "tree";

/// Variant payload of a [`Node`].
#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    Item,
    ActionItem {
        actions: Vec<Value>,
        current_action: Option<Value>,
    },
    Folder {
        children: Vec<NodeId>,
        hidden: bool,
    },
}

/// A single tree entry: the fields every variant shares plus a closed
/// variant payload (item, action item, or folder).
///
/// Nodes are built with [`Node::item`], [`Node::action_item`], or
/// [`Node::folder`] and the `with_*` builders, then handed to
/// [`Tree::add`](crate::Tree::add). Selection is tree-owned state: there is
/// deliberately no setter for it here — use
/// [`Tree::set_selected`](crate::Tree::set_selected) so aggregation and
/// notification run.
#[derive(Clone)]
pub struct Node {
    tag: String,
    title: String,
    selectable: bool,
    pub(crate) selected: SelectState,
    on_click: Option<ClickFn>,
    extra: Map<String, Value>,
    pub(crate) kind: NodeKind,
}

impl Node {
    /// Creates a leaf item. Defaults: title `"-"`, not selectable,
    /// unselected.
    #[must_use]
    pub fn item() -> Self {
        Self {
            tag: TAG_ITEM.to_owned(),
            title: "-".to_owned(),
            selectable: false,
            selected: SelectState::Unselected,
            on_click: None,
            extra: Map::new(),
            kind: NodeKind::Item,
        }
    }

    /// Creates an action item: an item carrying a list of opaque action
    /// descriptors and an optional current-action pointer.
    #[must_use]
    pub fn action_item() -> Self {
        Self {
            tag: TAG_ACTION_ITEM.to_owned(),
            kind: NodeKind::ActionItem {
                actions: Vec::new(),
                current_action: None,
            },
            ..Self::item()
        }
    }

    /// Creates a folder. Defaults: empty title, selectable, unselected,
    /// not hidden, no children. Every folder gets its own freshly allocated
    /// children container.
    #[must_use]
    pub fn folder() -> Self {
        Self {
            tag: TAG_FOLDER.to_owned(),
            title: String::new(),
            selectable: true,
            selected: SelectState::Unselected,
            on_click: None,
            extra: Map::new(),
            kind: NodeKind::Folder {
                children: Vec::new(),
                hidden: false,
            },
        }
    }

    // =========================================================================
    // Builders (construction-time only)
    // =========================================================================

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets whether the node participates in selection aggregation.
    #[must_use]
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    /// Sets the initial selection value.
    #[must_use]
    pub fn with_selected(mut self, selected: SelectState) -> Self {
        self.selected = selected;
        self
    }

    /// Overrides the type tag. Tags are fixed at construction; this is the
    /// hook for custom types registered in a
    /// [`TypeRegistry`](crate::TypeRegistry).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Adds an application-defined attribute (for example `"id"`), queryable
    /// through [`Tree::get_item`](crate::Tree::get_item) and carried through
    /// serialization.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Attaches a click callback. Transient: excluded from serialization.
    #[must_use]
    pub fn with_click(mut self, callback: impl Fn(&Tree, NodeId) + Send + Sync + 'static) -> Self {
        self.on_click = Some(Arc::new(callback));
        self
    }

    /// Sets the action list. No effect unless the node is an action item.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<Value>) -> Self {
        let _ = self.set_actions(actions);
        self
    }

    /// Sets the current action. No effect unless the node is an action item.
    #[must_use]
    pub fn with_current_action(mut self, action: Value) -> Self {
        let _ = self.set_current_action(Some(action));
        self
    }

    /// Sets the hidden flag. No effect unless the node is a folder.
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        let _ = self.set_hidden(hidden);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the type tag (`"item"`, `"action_item"`, `"folder"`, or a
    /// custom registered tag).
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns whether the node participates in selection aggregation.
    #[inline]
    #[must_use]
    pub const fn selectable(&self) -> bool {
        self.selectable
    }

    /// Returns the current selection value.
    #[inline]
    #[must_use]
    pub const fn selected(&self) -> SelectState {
        self.selected
    }

    /// Returns `true` if the node is a folder.
    #[inline]
    #[must_use]
    pub const fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    /// Returns `true` if the node is a plain item (not an action item).
    #[inline]
    #[must_use]
    pub const fn is_item(&self) -> bool {
        matches!(self.kind, NodeKind::Item)
    }

    /// Returns `true` if the node is an action item.
    #[inline]
    #[must_use]
    pub const fn is_action_item(&self) -> bool {
        matches!(self.kind, NodeKind::ActionItem { .. })
    }

    /// Returns the hidden flag; `None` for non-folders.
    #[must_use]
    pub fn hidden(&self) -> Option<bool> {
        match &self.kind {
            NodeKind::Folder { hidden, .. } => Some(*hidden),
            _ => None,
        }
    }

    /// Returns the action descriptors; `None` for non-action nodes.
    #[must_use]
    pub fn actions(&self) -> Option<&[Value]> {
        match &self.kind {
            NodeKind::ActionItem { actions, .. } => Some(actions),
            _ => None,
        }
    }

    /// Returns the current action, if the node is an action item with one.
    #[must_use]
    pub fn current_action(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::ActionItem { current_action, .. } => current_action.as_ref(),
            _ => None,
        }
    }

    /// Returns an application-defined attribute.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Returns the click callback, if any.
    #[must_use]
    pub fn on_click(&self) -> Option<&ClickFn> {
        self.on_click.as_ref()
    }

    /// Returns the node's value for a named field: the typed fields first
    /// (`title`, `selectable`, `selected`, `constructor`, `hidden`,
    /// `actions`, `current_action`), then the open attribute map.
    #[must_use]
    pub fn attribute(&self, field: &str) -> Option<Value> {
        match field {
            "title" => Some(Value::String(self.title.clone())),
            "selectable" => Some(Value::Bool(self.selectable)),
            "selected" => Some(self.selected.into()),
            "constructor" => Some(Value::String(self.tag.clone())),
            "hidden" => self.hidden().map(Value::Bool),
            "actions" => self.actions().map(|actions| Value::Array(actions.to_vec())),
            "current_action" => self.current_action().cloned(),
            _ => self.extra.get(field).cloned(),
        }
    }

    /// Returns whether the node answers to a query tag, following the
    /// variant hierarchy: `"item"` matches items and action items,
    /// `"action_item"` only action items, `"folder"` any folder. Other tags
    /// match the node's own tag exactly.
    #[must_use]
    pub fn matches_tag(&self, tag: &str) -> bool {
        match tag {
            TAG_ITEM => matches!(self.kind, NodeKind::Item | NodeKind::ActionItem { .. }),
            TAG_ACTION_ITEM => matches!(self.kind, NodeKind::ActionItem { .. }),
            TAG_FOLDER => matches!(self.kind, NodeKind::Folder { .. }),
            _ => self.tag == tag,
        }
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Sets the display title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Sets whether the node participates in selection aggregation. Existing
    /// folder aggregates are not recomputed until the next structural or
    /// selection change.
    pub const fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    /// Sets or replaces an application-defined attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }

    /// Removes an application-defined attribute.
    pub fn remove_attr(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// Installs a click callback.
    pub fn set_on_click(&mut self, callback: impl Fn(&Tree, NodeId) + Send + Sync + 'static) {
        self.on_click = Some(Arc::new(callback));
    }

    /// Removes the click callback.
    pub fn clear_on_click(&mut self) {
        self.on_click = None;
    }

    /// Sets the hidden flag directly — the silent data-load path, emitting
    /// nothing. User-initiated changes go through
    /// [`Tree::save_hidden`](crate::Tree::save_hidden) so persistence
    /// observers hear about them. Returns `false` for non-folders.
    pub fn set_hidden(&mut self, hidden: bool) -> bool {
        match &mut self.kind {
            NodeKind::Folder { hidden: slot, .. } => {
                *slot = hidden;
                true
            }
            _ => false,
        }
    }

    /// Replaces the action list. Returns `false` for non-action nodes.
    pub fn set_actions(&mut self, actions: Vec<Value>) -> bool {
        match &mut self.kind {
            NodeKind::ActionItem { actions: slot, .. } => {
                *slot = actions;
                true
            }
            _ => false,
        }
    }

    /// Sets or clears the current action. Returns `false` for non-action
    /// nodes.
    pub fn set_current_action(&mut self, action: Option<Value>) -> bool {
        match &mut self.kind {
            NodeKind::ActionItem { current_action, .. } => {
                *current_action = action;
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // Crate internals
    // =========================================================================

    pub(crate) fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Folder { children, .. } => children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Folder { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("tag", &self.tag)
            .field("title", &self.title)
            .field("selectable", &self.selectable)
            .field("selected", &self.selected)
            .field("on_click", &self.on_click.is_some())
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn item_defaults_match_the_model() {
        let item = Node::item();

        assert_eq!(item.tag(), "item");
        assert_eq!(item.title(), "-");
        assert!(!item.selectable());
        assert_eq!(item.selected(), SelectState::Unselected);
        assert_eq!(item.hidden(), None);
    }

    #[test]
    fn folder_defaults_match_the_model() {
        let folder = Node::folder();

        assert_eq!(folder.tag(), "folder");
        assert_eq!(folder.title(), "");
        assert!(folder.selectable());
        assert_eq!(folder.hidden(), Some(false));
        assert!(folder.children().is_empty());
    }

    #[test]
    fn action_item_carries_actions() {
        let node = Node::action_item()
            .with_actions(vec![json!("open"), json!("archive")])
            .with_current_action(json!("open"));

        assert_eq!(node.tag(), "action_item");
        assert_eq!(node.actions().map(<[Value]>::len), Some(2));
        assert_eq!(node.current_action(), Some(&json!("open")));
    }

    #[test]
    fn variant_setters_reject_other_kinds() {
        let mut item = Node::item();

        assert!(!item.set_hidden(true));
        assert!(!item.set_actions(vec![json!("x")]));
        assert!(!item.set_current_action(None));
    }

    #[test]
    fn attribute_reads_typed_fields_then_extras() {
        let node = Node::item()
            .with_title("leaf")
            .with_attr("id", json!("leaf-7"));

        assert_eq!(node.attribute("title"), Some(json!("leaf")));
        assert_eq!(node.attribute("selected"), Some(json!(false)));
        assert_eq!(node.attribute("constructor"), Some(json!("item")));
        assert_eq!(node.attribute("id"), Some(json!("leaf-7")));
        assert_eq!(node.attribute("missing"), None);
    }

    #[test]
    fn tag_matching_follows_the_variant_hierarchy() {
        let item = Node::item();
        let action = Node::action_item();
        let folder = Node::folder();

        assert!(item.matches_tag("item"));
        assert!(action.matches_tag("item"));
        assert!(!item.matches_tag("action_item"));
        assert!(action.matches_tag("action_item"));
        assert!(folder.matches_tag("folder"));
        assert!(!folder.matches_tag("item"));
    }

    #[test]
    fn custom_tags_match_exactly() {
        let node = Node::item().with_tag("bookmark");

        assert!(node.matches_tag("bookmark"));
        assert!(node.matches_tag("item"));
        assert!(!node.matches_tag("folder"));
    }
}
