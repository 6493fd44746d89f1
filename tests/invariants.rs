//! Structural properties of built trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vpforest::{Error, NodeRef, PeripherySelector, RandomSelector, VPForestBuilder, VPTree};

type P = [f64; 2];

fn euclidean(a: &P, b: &P) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn points(seed: u64, n: usize) -> Vec<P> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| [rng.gen(), rng.gen()]).collect()
}

fn subtree<D>(node: &NodeRef<'_, P, f64, D>) -> Vec<usize> {
    let mut all = node.indices();
    all.push(node.vantage());
    all
}

/// Walk every node and verify the median split.
fn check_partition<D>(data: &[P], node: NodeRef<'_, P, f64, D>) -> usize {
    let vantage = &data[node.vantage()];
    let covered = node.indices();

    let mu = match node.mu() {
        None => {
            assert!(node.is_leaf());
            assert!(node.inner().is_none() && node.outer().is_none());
            assert!(covered.is_empty());
            return 1;
        }
        Some(mu) => mu,
    };

    let mut count = 1;
    let mut union = Vec::new();
    if let Some(inner) = node.inner() {
        for i in subtree(&inner) {
            assert!(euclidean(vantage, &data[i]) < mu);
            union.push(i);
        }
        count += check_partition(data, inner);
    }
    if let Some(outer) = node.outer() {
        for i in subtree(&outer) {
            assert!(euclidean(vantage, &data[i]) >= mu);
            union.push(i);
        }
        count += check_partition(data, outer);
    }
    union.sort_unstable();
    assert_eq!(union, covered, "children must partition the node exactly");
    assert!(!covered.contains(&node.vantage()));
    count
}

#[test]
fn test_partition_invariant() {
    for &n in &[1, 2, 3, 10, 257] {
        let data = points(n as u64, n);
        let tree = VPTree::new(data.clone(), euclidean, PeripherySelector::seeded(2)).unwrap();
        let visited = check_partition(&data, tree.root());
        assert_eq!(visited, n);
        assert_eq!(tree.root().indices().len() + 1, n);

        let tree = VPTree::new(data.clone(), euclidean, RandomSelector::seeded(2)).unwrap();
        assert_eq!(check_partition(&data, tree.root()), n);
    }
}

#[test]
fn test_partition_with_ties() {
    // concentric points at equal distance from the origin
    let mut data: Vec<P> = vec![[0.0, 0.0]];
    data.extend((0..8).map(|k| {
        let a = k as f64 * std::f64::consts::FRAC_PI_4;
        [a.cos(), a.sin()]
    }));
    data.extend(vec![[0.0, 0.0]; 4]);

    let tree = VPTree::new(data.clone(), euclidean, |c: &[usize]| c[0]).unwrap();
    assert_eq!(check_partition(&data, tree.root()), data.len());
}

fn same_shape<D>(a: NodeRef<'_, P, f64, D>, b: NodeRef<'_, P, f64, D>) {
    assert_eq!(a.vantage(), b.vantage());
    assert_eq!(a.mu(), b.mu());
    match (a.inner(), b.inner()) {
        (Some(x), Some(y)) => same_shape(x, y),
        (None, None) => {}
        _ => panic!("inner children differ"),
    }
    match (a.outer(), b.outer()) {
        (Some(x), Some(y)) => same_shape(x, y),
        (None, None) => {}
        _ => panic!("outer children differ"),
    }
}

#[test]
fn test_deterministic_construction() {
    let data = points(31, 500);

    let a = VPTree::new(data.clone(), euclidean, PeripherySelector::seeded(9)).unwrap();
    let b = VPTree::new(data.clone(), euclidean, PeripherySelector::seeded(9)).unwrap();
    same_shape(a.root(), b.root());
    assert_eq!(a.depth(), b.depth());

    let first = |c: &[usize]| c[0];
    let a = VPTree::new(data.clone(), euclidean, first).unwrap();
    let b = VPTree::new(data, euclidean, first).unwrap();
    same_shape(a.root(), b.root());
}

#[test]
fn test_balanced_depth() {
    let data = points(12, 1024);
    let tree = VPTree::new(data, euclidean, PeripherySelector::seeded(0)).unwrap();
    // the lower median keeps the inner side at most half of the remainder
    assert!(tree.depth() <= 11, "depth={}", tree.depth());
    assert_eq!(tree.node_count(), 1024);
}

#[test]
fn test_single_point() {
    let tree = VPTree::new(vec![[3.0, 4.0]], euclidean, PeripherySelector::seeded(0)).unwrap();
    let root = tree.root();
    assert!(root.is_leaf());
    assert_eq!(root.vantage(), 0);
    assert_eq!(root.mu(), None);
    assert_eq!(tree.depth(), 1);

    let mut visits = 0;
    assert_eq!(*tree.query(&[100.0, -2.0], Some(&mut visits)), [3.0, 4.0]);
    assert_eq!(*tree.fast_approx_query(&[0.0, 0.0], Some(&mut visits)), [3.0, 4.0]);
    assert_eq!(visits, 0);
    assert_eq!(tree.fast_approx_query_index(&[0.0, 0.0], None), (0, 5.0));
}

#[test]
fn test_counter_accumulates() {
    let data = points(77, 200);
    let tree = VPTree::new(data, euclidean, PeripherySelector::seeded(1)).unwrap();
    let q = [0.5, 0.5];

    let mut once = 0;
    tree.fast_approx_query(&q, Some(&mut once));
    assert!(once >= 1 && once < tree.depth() as u64);

    let mut twice = once;
    tree.fast_approx_query(&q, Some(&mut twice));
    assert_eq!(twice, 2 * once);
}

#[test]
fn test_counter_saturates_at_max() {
    let data = points(78, 200);
    let tree = VPTree::new(data, euclidean, PeripherySelector::seeded(2)).unwrap();
    let q = [0.25, 0.75];
    let exact = tree.query(&q, None);
    let approx = tree.fast_approx_query(&q, None);

    let mut counter = u64::MAX;
    assert_eq!(tree.query(&q, Some(&mut counter)), exact);
    assert_eq!(counter, u64::MAX);
    assert_eq!(tree.fast_approx_query(&q, Some(&mut counter)), approx);
    assert_eq!(counter, u64::MAX);
    tree.fast_approx_query_index(&q, Some(&mut counter));
    assert_eq!(counter, u64::MAX);

    let mut near_max = u64::MAX - 1;
    tree.query(&q, Some(&mut near_max));
    assert_eq!(near_max, u64::MAX);
}

#[test]
fn test_forest_rejects_full_counter() {
    let data = points(79, 200);
    let forest = VPForestBuilder::new()
        .n_estimators(4)
        .seed(3)
        .build(data, euclidean, PeripherySelector::new())
        .unwrap();
    let q = [0.5, 0.1];

    let mut counter = u64::MAX;
    assert!(matches!(forest.query(&q, 4, Some(&mut counter)), Err(Error::InvalidArgument(_))));
    assert_eq!(counter, u64::MAX);
    assert!(matches!(
        forest.par_query(&q, 4, Some(&mut counter)),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(counter, u64::MAX);

    // a counter with room left still works
    let mut counter = 0;
    assert!(forest.query(&q, 4, Some(&mut counter)).is_ok());
    assert!(counter >= 4);
}
