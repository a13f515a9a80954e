use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::TreeError;
use crate::node::{Node, TAG_ACTION_ITEM, TAG_FOLDER, TAG_ITEM};

/// Constructor producing a fresh, empty node for a registered tag.
pub type NodeCtor = fn() -> Node;

/// Registry entry: the model constructor plus an opaque per-type view
/// artifact. The view is stored and handed back untouched — this crate never
/// interprets it.
#[derive(Clone)]
pub struct Binding {
    model: NodeCtor,
    view: Option<Arc<dyn Any + Send + Sync>>,
}

impl Binding {
    /// Creates a binding with no view artifact.
    #[must_use]
    pub const fn new(model: NodeCtor) -> Self {
        Self { model, view: None }
    }

    /// Attaches an opaque view artifact.
    #[must_use]
    pub fn with_view(mut self, view: Arc<dyn Any + Send + Sync>) -> Self {
        self.view = Some(view);
        self
    }

    /// Returns the model constructor.
    #[must_use]
    pub const fn model(&self) -> NodeCtor {
        self.model
    }
}

/// Mapping from type tag to node constructor, used for polymorphic
/// reconstruction during deserialization and for type-filtered queries.
///
/// [`TypeRegistry::default`] preloads the built-in `"folder"`, `"item"`, and
/// `"action_item"` tags; [`TypeRegistry::empty`] starts blank.
pub struct TypeRegistry {
    bindings: FxHashMap<String, Binding>,
}

impl TypeRegistry {
    /// Creates a registry with no tags registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bindings: FxHashMap::default(),
        }
    }

    /// Registers `binding` under `tag`.
    ///
    /// The constructor is invoked once here to verify it actually produces
    /// nodes carrying `tag`; a mismatch fails with
    /// [`TreeError::TagMismatch`] instead of corrupting later deserialized
    /// trees.
    pub fn register(&mut self, tag: impl Into<String>, binding: Binding) -> Result<(), TreeError> {
        let tag = tag.into();
        let produced = (binding.model)();
        if produced.tag() != tag {
            return Err(TreeError::TagMismatch {
                tag,
                produced: produced.tag().to_owned(),
            });
        }
        if self.bindings.contains_key(&tag) {
            log::debug!("re-registering node type '{tag}'");
        }
        self.bindings.insert(tag, binding);
        Ok(())
    }

    /// Returns the binding registered for `tag`.
    #[must_use]
    pub fn lookup(&self, tag: &str) -> Option<&Binding> {
        self.bindings.get(tag)
    }

    /// Returns whether `tag` is registered.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.bindings.contains_key(tag)
    }

    /// Constructs a fresh node for `tag`, failing fast on unknown tags.
    pub fn construct(&self, tag: &str) -> Result<Node, TreeError> {
        self.bindings
            .get(tag)
            .map(|binding| (binding.model)())
            .ok_or_else(|| TreeError::UnknownTag(tag.to_owned()))
    }

    /// Returns the opaque view artifact for `tag`, if one was registered.
    #[must_use]
    pub fn view(&self, tag: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.bindings.get(tag).and_then(|binding| binding.view.as_deref())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        // The built-in constructors produce their own tags; these cannot fail.
        let _ = registry.register(TAG_FOLDER, Binding::new(Node::folder));
        let _ = registry.register(TAG_ITEM, Binding::new(Node::item));
        let _ = registry.register(TAG_ACTION_ITEM, Binding::new(Node::action_item));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_the_builtin_tags() {
        let registry = TypeRegistry::default();

        assert!(registry.contains("folder"));
        assert!(registry.contains("item"));
        assert!(registry.contains("action_item"));
        assert!(!registry.contains("tree"));
    }

    #[test]
    fn construct_fails_fast_on_unknown_tags() {
        let registry = TypeRegistry::default();

        let err = registry.construct("mystery").unwrap_err();
        assert!(matches!(err, TreeError::UnknownTag(tag) if tag == "mystery"));
    }

    #[test]
    fn registration_checks_the_produced_tag() {
        let mut registry = TypeRegistry::empty();

        let err = registry
            .register("bookmark", Binding::new(Node::item))
            .unwrap_err();
        assert!(matches!(err, TreeError::TagMismatch { .. }));
    }

    #[test]
    fn custom_types_register_and_construct() {
        fn bookmark() -> Node {
            Node::item().with_tag("bookmark")
        }

        let mut registry = TypeRegistry::default();
        registry.register("bookmark", Binding::new(bookmark)).unwrap();

        let node = registry.construct("bookmark").unwrap();
        assert_eq!(node.tag(), "bookmark");
        assert!(node.is_item());
    }

    #[test]
    fn view_artifacts_round_trip_opaquely() {
        let mut registry = TypeRegistry::empty();
        registry
            .register(
                "item",
                Binding::new(Node::item).with_view(Arc::new("item-view")),
            )
            .unwrap();

        let view = registry.view("item").unwrap();
        assert_eq!(view.downcast_ref::<&str>(), Some(&"item-view"));
        assert!(registry.view("folder").is_none());
    }
}
