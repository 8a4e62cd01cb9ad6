use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use canopy::tree::{build_merkle_tree, hasher, FileEntry, ManifestTree};

fn tree_of(n: usize) -> ManifestTree {
    let entries = (0..n)
        .map(|i| {
            let name = format!("file-{:06}", i);
            FileEntry::new(&name, hasher::hash_bytes(name.as_bytes()), 64)
        })
        .collect();
    build_merkle_tree("bench", entries)
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    for n in [100usize, 1_000, 10_000] {
        let tree = tree_of(n);
        let probe = format!("file-{:06}", n / 2);

        group.bench_with_input(BenchmarkId::new("indexed", n), &tree, |b, tree| {
            b.iter(|| black_box(tree.find_file_node(black_box(&probe))));
        });
        group.bench_with_input(BenchmarkId::new("linear", n), &tree, |b, tree| {
            b.iter(|| black_box(tree.find_file_node_linear(black_box(&probe))));
        });
    }
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_10k_incremental", |b| {
        b.iter(|| {
            let mut tree = ManifestTree::new("bench");
            for i in 0..10_000u32 {
                let name = format!("file-{:06}", i);
                tree.add_file(FileEntry::new(
                    &name,
                    hasher::hash_bytes(name.as_bytes()),
                    64,
                ));
            }
            black_box(tree.root_hash())
        });
    });
}

criterion_group!(benches, bench_lookup, bench_insert);
criterion_main!(benches);
