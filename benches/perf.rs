use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use folder_tree::{Node, SelectState, Tree};

fn build_tree(folders: usize, items_per_folder: usize) -> Tree {
    let mut tree = Tree::new();
    for f in 0..folders {
        let folder = tree
            .add(tree.root(), Node::folder().with_title(format!("folder-{f}")))
            .unwrap();
        for i in 0..items_per_folder {
            tree.add(
                folder,
                Node::item()
                    .with_title(format!("item-{f}-{i}"))
                    .with_selectable(true),
            )
            .unwrap();
        }
    }
    tree
}

fn bench_cascade(c: &mut Criterion) {
    let mut tree = build_tree(64, 32);
    let root = tree.root();
    c.bench_function("set_selected cascade 64x32", |b| {
        b.iter(|| {
            tree.set_selected(root, SelectState::Selected);
            tree.set_selected(root, SelectState::Unselected);
        });
    });
}

fn bench_flatten(c: &mut Criterion) {
    let tree = build_tree(64, 32);
    let root = tree.root();
    c.bench_function("flatten 64x32", |b| {
        b.iter(|| black_box(tree.flatten(root, false)));
    });
    c.bench_function("selected 64x32", |b| {
        b.iter(|| black_box(tree.selected(root, true)));
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let tree = build_tree(16, 16);
    let data = tree.serialize();
    c.bench_function("serialize 16x16", |b| {
        b.iter(|| black_box(tree.serialize()));
    });
    c.bench_function("deserialize 16x16", |b| {
        b.iter(|| {
            let mut fresh = Tree::new();
            fresh.deserialize(black_box(&data)).unwrap();
            fresh
        });
    });
}

criterion_group!(benches, bench_cascade, bench_flatten, bench_round_trip);
criterion_main!(benches);
