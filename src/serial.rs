//! Value-format serialization for trees and nodes.
//!
//! A node serializes to a flat JSON mapping of its persisted fields; folders
//! add `children`, an array of recursively serialized child mappings whose
//! `constructor` tag picks the model on the way back in. The transient click
//! callback and the registry's view artifacts never appear in the output.
//!
//! Deserialization is registry-driven and fails fast: an unregistered child
//! tag aborts the call before the target folder is touched — a silently
//! skipped child would leave a corrupt structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TreeError;
use crate::event::Notification;
use crate::node::{Node, NodeKind};
use crate::select::SelectState;
use crate::tree::{NodeId, Tree};

/// Serde model of a node's persisted fields. Absent keys act as
/// leave-as-is patches on the way in, mirroring attribute-set semantics;
/// unrecognized keys flow through the open `extra` map.
#[derive(Debug, Default, Deserialize, Serialize)]
struct NodeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    constructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selectable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<SelectState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_action: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Tree {
    /// Serializes the whole tree: the root mapping (tagged `"tree"`) plus
    /// the root-level `sortable` / `show_select_all` flags.
    #[must_use]
    pub fn serialize(&self) -> Value {
        let mut value = self.record_value(self.root()).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("sortable".to_owned(), Value::Bool(self.sortable()));
            map.insert(
                "show_select_all".to_owned(),
                Value::Bool(self.show_select_all()),
            );
        }
        value
    }

    /// Serializes the subtree rooted at `id`; `None` for unknown ids.
    #[must_use]
    pub fn serialize_node(&self, id: NodeId) -> Option<Value> {
        self.record_value(id)
    }

    /// Applies serialized `data` to the whole tree: the root's fields, a
    /// full children reset, and the root-level flags. Fails fast on unknown
    /// child tags, leaving the tree untouched.
    pub fn deserialize(&mut self, data: &Value) -> Result<(), TreeError> {
        let mut record: NodeRecord = serde_json::from_value(data.clone())?;
        let sortable = record.extra.remove("sortable").and_then(|flag| flag.as_bool());
        let show = record
            .extra
            .remove("show_select_all")
            .and_then(|flag| flag.as_bool());
        self.apply_record(self.root(), record, true)?;
        if let Some(sortable) = sortable {
            self.set_sortable(sortable);
        }
        if let Some(show) = show {
            self.set_show_select_all(show);
        }
        self.flush();
        Ok(())
    }

    /// Applies serialized `data` onto `id` in place.
    ///
    /// For folders, every entry of `data.children` is rebuilt through the
    /// registry first (all of them, before the old children are replaced —
    /// a lookup failure leaves the folder exactly as it was), the children
    /// sequence is fully reset, the derived selection re-established, and
    /// the remaining fields applied as a patch. A record with no `children`
    /// key resets the folder to empty. For leaves, fields are patched in
    /// place. Ancestors re-aggregate afterwards.
    pub fn deserialize_node(&mut self, id: NodeId, data: &Value) -> Result<(), TreeError> {
        if !self.contains(id) {
            return Err(TreeError::UnknownNode(id));
        }
        let record: NodeRecord = serde_json::from_value(data.clone())?;
        self.apply_record(id, record, true)?;
        let parent = self.parent(id);
        self.recompute_from(parent);
        self.flush();
        Ok(())
    }

    fn record_value(&self, id: NodeId) -> Option<Value> {
        let node = self.node(id)?;
        let mut record = NodeRecord {
            constructor: Some(node.tag().to_owned()),
            title: Some(node.title().to_owned()),
            selectable: Some(node.selectable()),
            selected: Some(node.selected()),
            hidden: None,
            actions: None,
            current_action: None,
            children: None,
            extra: node.extra().clone(),
        };
        match &node.kind {
            NodeKind::Item => {}
            NodeKind::ActionItem {
                actions,
                current_action,
            } => {
                record.actions = Some(actions.clone());
                record.current_action = current_action.clone();
            }
            NodeKind::Folder { children, hidden } => {
                record.hidden = Some(*hidden);
                record.children = Some(
                    children
                        .iter()
                        .filter_map(|&child| self.record_value(child))
                        .collect(),
                );
            }
        }
        serde_json::to_value(record).ok()
    }

    fn apply_record(
        &mut self,
        id: NodeId,
        record: NodeRecord,
        announce: bool,
    ) -> Result<(), TreeError> {
        let NodeRecord {
            constructor: _,
            title,
            selectable,
            selected,
            hidden,
            actions,
            current_action,
            children,
            extra,
        } = record;
        let before = self.node(id).map(Node::selected);
        let is_folder = self.node(id).is_some_and(Node::is_folder);

        if is_folder {
            // Build every replacement child before touching the old ones so
            // an unknown tag leaves the folder exactly as it was.
            let entries = children.unwrap_or_default();
            let mut fresh = Vec::with_capacity(entries.len());
            for entry in &entries {
                match self.build_child(entry) {
                    Ok(child) => fresh.push(child),
                    Err(err) => {
                        for child in fresh {
                            self.free_subtree(child);
                        }
                        return Err(err);
                    }
                }
            }
            log::debug!("deserialize: {} children rebuilt under {id:?}", fresh.len());
            let old: Vec<NodeId> = self.children(id).to_vec();
            for child in old {
                self.free_subtree(child);
            }
            self.set_children(id, fresh);
            // Reset invariant: the derived value reflects the new children
            // until (and unless) the record carries its own.
            self.recompute_local(id);
        }

        if let Some(node) = self.node_mut(id) {
            if let Some(title) = title {
                node.set_title(title);
            }
            if let Some(selectable) = selectable {
                node.set_selectable(selectable);
            }
            if let Some(hidden) = hidden {
                let _ = node.set_hidden(hidden);
            }
            if let Some(actions) = actions {
                let _ = node.set_actions(actions);
            }
            if let Some(current) = current_action {
                let _ = node.set_current_action(Some(current));
            }
            for (key, value) in extra {
                node.set_attr(key, value);
            }
            // A stored value wins over the recomputed one; applying it is a
            // plain field write, never a downward cascade.
            if let Some(selected) = selected {
                node.selected = selected;
            }
        }

        let after = self.node(id).map(Node::selected);
        if announce
            && before != after
            && let Some(selected) = after
        {
            self.note(Notification::SelectedChanged { node: id, selected });
        }
        Ok(())
    }

    fn build_child(&mut self, entry: &Value) -> Result<NodeId, TreeError> {
        let record: NodeRecord = serde_json::from_value(entry.clone())?;
        let Some(tag) = record.constructor.clone() else {
            return Err(TreeError::MissingTag);
        };
        let node = self.registry().construct(&tag)?;
        let id = self.alloc(node);
        if let Err(err) = self.apply_record(id, record, false) {
            self.free_subtree(id);
            return Err(err);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::select::SelectState;
    use crate::tree::Tree;
    use crate::Node;

    use super::*;

    /// Mixed fixture: an item, an action item, and a nested folder.
    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let folder = tree
            .add(tree.root(), Node::folder().with_title("library"))
            .unwrap();
        tree.add(
            folder,
            Node::item()
                .with_title("x")
                .with_selectable(true)
                .with_selected(SelectState::Selected)
                .with_attr("id", json!("x-id")),
        )
        .unwrap();
        tree.add(
            folder,
            Node::action_item()
                .with_title("deploy")
                .with_actions(vec![json!("run"), json!("dry-run")])
                .with_current_action(json!("run")),
        )
        .unwrap();
        let nested = tree
            .add(folder, Node::folder().with_title("archive").with_hidden(true))
            .unwrap();
        tree.add(nested, Node::item().with_title("y").with_selectable(true))
            .unwrap();
        tree
    }

    #[test]
    fn round_trip_reproduces_observable_state() {
        let tree = sample_tree();
        let data = tree.serialize();

        let mut restored = Tree::new();
        restored.deserialize(&data).unwrap();

        assert_eq!(restored.serialize(), data);
    }

    #[test]
    fn round_trip_rebuilds_child_types_in_order() {
        let tree = sample_tree();
        let mut restored = Tree::new();
        restored.deserialize(&tree.serialize()).unwrap();

        let folder = restored.children(restored.root())[0];
        let tags: Vec<String> = restored
            .children(folder)
            .iter()
            .map(|&child| restored.node(child).unwrap().tag().to_owned())
            .collect();

        assert_eq!(tags, vec!["item", "action_item", "folder"]);
        let action = restored.children(folder)[1];
        assert_eq!(
            restored.node(action).unwrap().current_action(),
            Some(&json!("run"))
        );
    }

    #[test]
    fn serialized_form_excludes_the_click_callback() {
        let mut tree = Tree::new();
        let item = tree
            .add(tree.root(), Node::item().with_click(|_, _| {}))
            .unwrap();

        let value = tree.serialize_node(item).unwrap();
        let map = value.as_object().unwrap();

        assert!(!map.contains_key("click"));
        assert!(!map.contains_key("on_click"));
        assert_eq!(map.get("constructor"), Some(&json!("item")));
    }

    #[test]
    fn extras_flatten_into_the_mapping() {
        let mut tree = Tree::new();
        let item = tree
            .add(tree.root(), Node::item().with_attr("id", json!("i-1")))
            .unwrap();

        let value = tree.serialize_node(item).unwrap();
        assert_eq!(value.get("id"), Some(&json!("i-1")));

        let mut restored = Tree::new();
        let copy = restored.root();
        restored
            .deserialize_node(copy, &json!({"constructor": "tree", "children": [value]}))
            .unwrap();
        let child = restored.children(copy)[0];
        assert_eq!(restored.node(child).unwrap().attr("id"), Some(&json!("i-1")));
    }

    #[test]
    fn mixed_folders_serialize_as_the_string_form() {
        let mut tree = Tree::new();
        let folder = tree.add(tree.root(), Node::folder()).unwrap();
        tree.add(
            folder,
            Node::item().with_selectable(true).with_selected(SelectState::Selected),
        )
        .unwrap();
        tree.add(folder, Node::item().with_selectable(true)).unwrap();

        let value = tree.serialize_node(folder).unwrap();
        assert_eq!(value.get("selected"), Some(&json!("mixed")));
    }

    #[test]
    fn tree_flags_round_trip() {
        let mut tree = sample_tree();
        tree.set_sortable(true);
        tree.set_show_select_all(true);

        let data = tree.serialize();
        assert_eq!(data.get("constructor"), Some(&json!("tree")));
        assert_eq!(data.get("sortable"), Some(&json!(true)));

        let mut restored = Tree::new();
        restored.deserialize(&data).unwrap();
        assert!(restored.sortable());
        assert!(restored.show_select_all());
        // The flags ride alongside the mapping, not inside the root's extras.
        assert_eq!(restored.node(restored.root()).unwrap().attr("sortable"), None);
    }

    #[test]
    fn unknown_child_tag_fails_fast_and_leaves_the_folder_untouched() {
        let mut tree = Tree::new();
        let folder = tree.add(tree.root(), Node::folder()).unwrap();
        let existing = tree.add(folder, Node::item().with_title("keep")).unwrap();
        let live_before = tree.node_count();

        let data = json!({
            "constructor": "folder",
            "children": [
                {"constructor": "item", "title": "new"},
                {"constructor": "mystery"},
            ],
        });
        let err = tree.deserialize_node(folder, &data).unwrap_err();

        assert!(matches!(err, TreeError::UnknownTag(tag) if tag == "mystery"));
        assert_eq!(tree.children(folder), &[existing]);
        assert_eq!(tree.node(existing).unwrap().title(), "keep");
        // The partially built replacements were freed again.
        assert_eq!(tree.node_count(), live_before);
    }

    #[test]
    fn children_without_tags_are_rejected() {
        let mut tree = Tree::new();
        let folder = tree.add(tree.root(), Node::folder()).unwrap();

        let data = json!({"constructor": "folder", "children": [{"title": "untyped"}]});
        let err = tree.deserialize_node(folder, &data).unwrap_err();

        assert!(matches!(err, TreeError::MissingTag));
    }

    #[test]
    fn missing_children_key_resets_a_folder_to_empty() {
        let mut tree = Tree::new();
        let folder = tree.add(tree.root(), Node::folder()).unwrap();
        tree.add(folder, Node::item()).unwrap();

        tree.deserialize_node(folder, &json!({"constructor": "folder", "title": "emptied"}))
            .unwrap();

        assert!(tree.children(folder).is_empty());
        assert_eq!(tree.node(folder).unwrap().title(), "emptied");
    }

    #[test]
    fn absent_fields_patch_nothing_on_leaves() {
        let mut tree = Tree::new();
        let item = tree
            .add(
                tree.root(),
                Node::item().with_title("before").with_selectable(true),
            )
            .unwrap();

        tree.deserialize_node(item, &json!({"title": "after"})).unwrap();

        let node = tree.node(item).unwrap();
        assert_eq!(node.title(), "after");
        assert!(node.selectable());
    }

    #[test]
    fn stored_selected_wins_over_the_recomputed_aggregate() {
        let mut tree = Tree::new();
        let folder = tree.add(tree.root(), Node::folder()).unwrap();

        let data = json!({
            "constructor": "folder",
            "selected": false,
            "children": [
                {"constructor": "item", "selectable": true, "selected": true},
            ],
        });
        tree.deserialize_node(folder, &data).unwrap();

        // The record's own value is applied last, as a plain field write.
        assert_eq!(tree.node(folder).unwrap().selected(), SelectState::Unselected);
        let child = tree.children(folder)[0];
        assert_eq!(tree.node(child).unwrap().selected(), SelectState::Selected);
    }

    #[test]
    fn malformed_data_is_rejected() {
        let mut tree = Tree::new();
        let root = tree.root();

        let err = tree.deserialize_node(root, &json!(["not", "a", "mapping"])).unwrap_err();
        assert!(matches!(err, TreeError::Malformed(_)));
    }

    #[test]
    fn custom_registered_types_reconstruct() {
        fn bookmark() -> Node {
            Node::item().with_tag("bookmark")
        }

        let mut tree = Tree::new();
        tree.registry_mut()
            .register("bookmark", crate::Binding::new(bookmark))
            .unwrap();

        let data = json!({
            "constructor": "tree",
            "children": [{"constructor": "bookmark", "title": "docs"}],
        });
        let root = tree.root();
        tree.deserialize_node(root, &data).unwrap();

        let child = tree.children(root)[0];
        let node = tree.node(child).unwrap();
        assert_eq!(node.tag(), "bookmark");
        assert!(node.matches_tag("item"));
    }
}
