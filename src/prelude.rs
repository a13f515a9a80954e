pub use crate::{
    Binding, ClickFn, Node, NodeCtor, NodeId, Notification, ObserverId, SelectState, Tree,
    TreeError, TypeRegistry,
};
