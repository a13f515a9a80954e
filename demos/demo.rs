//! End-to-end walkthrough: build a small tree, watch notifications, toggle
//! selection, and round-trip through the value format.
//!
//! Run with `cargo run --example demo`.

use serde_json::json;

use folder_tree::{Node, Notification, SelectState, Tree};

fn main() {
    let mut tree = Tree::new();

    tree.observe(|_, note| match note {
        Notification::SelectedChanged { node, selected } => {
            println!("  selection: {node:?} -> {selected:?}");
        }
        Notification::SaveHidden { node, hidden } => {
            println!("  persist me: {node:?} hidden={hidden}");
        }
        other => println!("  event: {other:?}"),
    });

    let inbox = tree
        .add(tree.root(), Node::folder().with_title("inbox"))
        .unwrap();
    let urgent = tree
        .add(
            inbox,
            Node::item()
                .with_title("pay invoice")
                .with_selectable(true)
                .with_attr("id", json!("invoice-17"))
                .with_click(|_, id| println!("  clicked {id:?}")),
        )
        .unwrap();
    tree.add(
        inbox,
        Node::action_item()
            .with_title("weekly report")
            .with_actions(vec![json!("send"), json!("postpone")])
            .with_current_action(json!("send")),
    )
    .unwrap();

    println!("select one of two:");
    tree.set_selected(urgent, SelectState::Selected);
    assert_eq!(tree.node(inbox).unwrap().selected(), SelectState::Mixed);

    println!("select the whole folder:");
    tree.set_selected(inbox, SelectState::Selected);

    println!("user hides the folder:");
    tree.save_hidden(inbox, true);

    println!("click:");
    tree.click(urgent);

    let found = tree.get_item(tree.root(), &json!("invoice-17"));
    assert_eq!(found, Some(urgent));

    let data = tree.serialize();
    let mut restored = Tree::new();
    restored.deserialize(&data).unwrap();
    println!(
        "round-tripped {} selected item(s)",
        restored.selected(restored.root(), true).len()
    );
}
