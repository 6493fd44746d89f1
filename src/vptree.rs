//! Vantage-Point Trees are a data structure for fast
//! nearest-neighbor searches in arbitrary metric spaces.
//!
//! The tree only ever talks to the points through the distance function it
//! was built with. That function must be symmetric, non-negative and obey
//! the triangle inequality; if it does not, [`VPTree::query`] silently stops
//! being exact.

use log::{debug, log_enabled, Level};
use std::collections::VecDeque;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

pub use num::Float;

use crate::error::{Error, Result};
use crate::median::select_lower_median;
use crate::select::VantagePointSelector;

pub trait Scalar: Float + Debug + Display {}
impl<T: Float + Debug + Display> Scalar for T {}

const ROOT: usize = 0;

/// Node in the arena. `center` is a dataset index; `inner` and `outer` are
/// arena slots.
struct VPNode<F> {
    center: usize,
    mu: Option<F>,
    inner: Option<usize>,
    outer: Option<usize>,
}

impl<F> VPNode<F> {
    fn leaf(center: usize) -> Self {
        VPNode { center, mu: None, inner: None, outer: None }
    }
}

/// Immutable vantage point tree over an indexed dataset.
pub struct VPTree<T, F, D> {
    data: Arc<[T]>,
    distance: Arc<D>,
    nodes: Vec<VPNode<F>>,
}

impl<T, F, D> VPTree<T, F, D>
where
    F: Scalar,
    D: Fn(&T, &T) -> F,
{
    /// Construct a new vantage point tree from a set of elements.
    ///
    /// Fails with [`Error::InvalidInput`] if `data` is empty.
    pub fn new<S>(data: Vec<T>, distance: D, selector: S) -> Result<Self>
    where
        S: VantagePointSelector<T, F>,
    {
        Self::from_shared(Arc::from(data), Arc::new(distance), selector)
    }

    /// Construct a tree over a dataset and distance function shared with
    /// other indexes.
    pub fn from_shared<S>(data: Arc<[T]>, distance: Arc<D>, mut selector: S) -> Result<Self>
    where
        S: VantagePointSelector<T, F>,
    {
        if data.is_empty() {
            return Err(Error::invalid_input(
                "cannot build a vantage point tree over an empty dataset",
            ));
        }

        let nodes = build_nodes(&data, &*distance, &mut selector)?;
        let tree = VPTree { data, distance, nodes };

        if log_enabled!(Level::Debug) {
            debug!(
                "built vantage point tree: points={} nodes={} depth={}",
                tree.len(),
                tree.node_count(),
                tree.depth()
            );
        }
        Ok(tree)
    }

    #[inline]
    fn dist(&self, q: &T, index: usize) -> F {
        (*self.distance)(q, &self.data[index])
    }

    /// Find the exact nearest neighbor of `q`.
    ///
    /// When `diagnostics` is given, the number of nodes enqueued beyond the
    /// root is added to it, saturating at `u64::MAX`.
    pub fn query(&self, q: &T, diagnostics: Option<&mut u64>) -> &T {
        let (index, _) = self.query_index(q, diagnostics);
        &self.data[index]
    }

    /// Exact nearest neighbor of `q` as `(dataset index, distance)`.
    ///
    /// Branch and bound over a FIFO work list: a child is only visited when
    /// the ball of radius `tau` around `q` can intersect its region.
    pub fn query_index(&self, q: &T, diagnostics: Option<&mut u64>) -> (usize, F) {
        let mut visits: u64 = 0;
        let mut tau = F::infinity();
        let mut nearest = self.nodes[ROOT].center;

        let mut to_search = VecDeque::new();
        to_search.push_back(ROOT);

        while let Some(id) = to_search.pop_front() {
            let node = &self.nodes[id];
            let d = self.dist(q, node.center);

            if d < tau {
                tau = d;
                nearest = node.center;
            }

            if let Some(mu) = node.mu {
                if let Some(inner) = node.inner {
                    if tau > d - mu {
                        to_search.push_back(inner);
                        visits += 1;
                    }
                }
                if let Some(outer) = node.outer {
                    if tau >= mu - d {
                        to_search.push_back(outer);
                        visits += 1;
                    }
                }
            }
        }

        if let Some(counter) = diagnostics {
            *counter = counter.saturating_add(visits);
        }
        (nearest, tau)
    }

    /// Approximate nearest neighbor by a single root-to-leaf descent.
    ///
    /// Never backtracks; one distance evaluation per level. Each descent to a
    /// child counts as one visit in `diagnostics`.
    pub fn fast_approx_query(&self, q: &T, diagnostics: Option<&mut u64>) -> &T {
        let mut visits = 0;
        let (index, _) = self.descend(q, &mut visits);
        if let Some(counter) = diagnostics {
            *counter = counter.saturating_add(visits);
        }
        &self.data[index]
    }

    /// Like [`fast_approx_query`](Self::fast_approx_query), but also returns
    /// the distance from `q` to the answer.
    pub fn fast_approx_query_index(&self, q: &T, diagnostics: Option<&mut u64>) -> (usize, F) {
        let mut visits = 0;
        let (index, known) = self.descend(q, &mut visits);
        if let Some(counter) = diagnostics {
            *counter = counter.saturating_add(visits);
        }
        let d = match known {
            Some(d) => d,
            None => self.dist(q, index),
        };
        (index, d)
    }

    /// Walk towards the side of `mu` that `q` falls on. Returns the final
    /// center and, when the walk stopped at an internal node, the distance
    /// already computed to it.
    fn descend(&self, q: &T, visits: &mut u64) -> (usize, Option<F>) {
        let mut id = ROOT;
        loop {
            let node = &self.nodes[id];
            let mu = match node.mu {
                Some(mu) => mu,
                None => return (node.center, None),
            };

            let d = self.dist(q, node.center);
            let next = if d < mu { node.inner } else { node.outer };
            match next {
                Some(child) => {
                    id = child;
                    *visits += 1;
                }
                None => return (node.center, Some(d)),
            }
        }
    }
}

impl<T, F, D> VPTree<T, F, D> {
    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: empty trees cannot be built.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The indexed dataset.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Number of nodes. Every point is the vantage of exactly one node, so
    /// this equals [`len`](Self::len).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(ROOT, 1)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &self.nodes[id];
            for child in node.inner.iter().chain(node.outer.iter()) {
                stack.push((*child, depth + 1));
            }
        }
        max_depth
    }

    pub fn root(&self) -> NodeRef<'_, T, F, D> {
        NodeRef { tree: self, id: ROOT }
    }
}

impl<T: Debug, F: Scalar, D> VPTree<T, F, D> {
    /// Render the tree as indented text, one tab per level.
    pub fn dump(&self) -> String {
        Dump(self).to_string()
    }
}

/// Read-only view of a single node.
pub struct NodeRef<'a, T, F, D> {
    tree: &'a VPTree<T, F, D>,
    id: usize,
}

impl<'a, T, F, D> Clone for NodeRef<'a, T, F, D> {
    fn clone(&self) -> Self {
        NodeRef { tree: self.tree, id: self.id }
    }
}

impl<'a, T, F, D> Copy for NodeRef<'a, T, F, D> {}

impl<'a, T, F: Copy, D> NodeRef<'a, T, F, D> {
    fn node(&self) -> &'a VPNode<F> {
        &self.tree.nodes[self.id]
    }

    /// Dataset index of the vantage point.
    pub fn vantage(&self) -> usize {
        self.node().center
    }

    /// The vantage point itself.
    pub fn point(&self) -> &'a T {
        &self.tree.data[self.node().center]
    }

    /// Median threshold; `None` for leaves.
    pub fn mu(&self) -> Option<F> {
        self.node().mu
    }

    pub fn is_leaf(&self) -> bool {
        self.node().mu.is_none()
    }

    /// Subtree of points strictly closer to the vantage than `mu`.
    pub fn inner(&self) -> Option<NodeRef<'a, T, F, D>> {
        self.node().inner.map(|id| NodeRef { tree: self.tree, id })
    }

    /// Subtree of points at distance `mu` or more from the vantage.
    pub fn outer(&self) -> Option<NodeRef<'a, T, F, D>> {
        self.node().outer.map(|id| NodeRef { tree: self.tree, id })
    }

    /// Sorted dataset indices below this node, excluding its own vantage.
    pub fn indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let node = self.node();
        let mut stack: Vec<usize> = node.inner.iter().chain(node.outer.iter()).cloned().collect();
        while let Some(id) = stack.pop() {
            let n = &self.tree.nodes[id];
            out.push(n.center);
            stack.extend(n.inner.iter().chain(n.outer.iter()));
        }
        out.sort_unstable();
        out
    }
}

/// Build the node arena top-down with an explicit work stack, so that
/// degenerate (deep) trees do not exhaust the call stack.
fn build_nodes<T, F, D, S>(data: &[T], distance: &D, selector: &mut S) -> Result<Vec<VPNode<F>>>
where
    F: Scalar,
    D: Fn(&T, &T) -> F,
    S: VantagePointSelector<T, F>,
{
    let mut nodes: Vec<VPNode<F>> = Vec::with_capacity(data.len());
    nodes.push(VPNode::leaf(0));

    let mut pending: Vec<(usize, Vec<usize>)> = vec![(ROOT, (0..data.len()).collect())];

    while let Some((slot, mut items)) = pending.pop() {
        if items.len() == 1 {
            nodes[slot] = VPNode::leaf(items[0]);
            continue;
        }

        let vp = selector.select(&items, data, distance);
        let pos = items.iter().position(|&i| i == vp).ok_or_else(|| {
            Error::invalid_argument(format!(
                "vantage point selector returned index {} which is not among the {} candidates",
                vp,
                items.len()
            ))
        })?;
        items.swap_remove(pos);

        let center = &data[vp];
        let distances: Vec<F> = items.iter().map(|&i| distance(center, &data[i])).collect();
        let mut scratch = distances.clone();
        let mu = select_lower_median(&mut scratch);

        // ties at mu go outside
        let mut inner = Vec::with_capacity(items.len() / 2);
        let mut outer = Vec::with_capacity(items.len() / 2 + 1);
        for (&i, &d) in items.iter().zip(distances.iter()) {
            if d < mu {
                inner.push(i);
            } else {
                outer.push(i);
            }
        }

        let inner = reserve_child(&mut nodes, &mut pending, inner);
        let outer = reserve_child(&mut nodes, &mut pending, outer);
        nodes[slot] = VPNode { center: vp, mu: Some(mu), inner, outer };
    }

    Ok(nodes)
}

fn reserve_child<F>(
    nodes: &mut Vec<VPNode<F>>,
    pending: &mut Vec<(usize, Vec<usize>)>,
    items: Vec<usize>,
) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    let slot = nodes.len();
    nodes.push(VPNode::leaf(items[0]));
    pending.push((slot, items));
    Some(slot)
}

struct Dump<'a, T, F, D>(&'a VPTree<T, F, D>);

enum DumpStep {
    Node(usize, usize),
    Label(&'static str, usize),
}

impl<'a, T: Debug, F: Scalar, D> Display for Dump<'a, T, F, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.0;
        let mut stack = vec![DumpStep::Node(ROOT, 0)];
        while let Some(step) = stack.pop() {
            match step {
                DumpStep::Label(label, depth) => {
                    writeln!(f, "{}{} ->", "\t".repeat(depth), label)?;
                }
                DumpStep::Node(id, depth) => {
                    let node = &tree.nodes[id];
                    let indent = "\t".repeat(depth);
                    writeln!(f, "{}Vantage: {:?}", indent, tree.data[node.center])?;
                    match node.mu {
                        Some(mu) => writeln!(f, "{}Mu: {}", indent, mu)?,
                        None => writeln!(f, "{}Mu: leaf", indent)?,
                    }
                    if let Some(outer) = node.outer {
                        stack.push(DumpStep::Node(outer, depth + 1));
                        stack.push(DumpStep::Label("Outer", depth));
                    }
                    if let Some(inner) = node.inner {
                        stack.push(DumpStep::Node(inner, depth + 1));
                        stack.push(DumpStep::Label("Inner", depth));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::PeripherySelector;

    fn line(a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let res = VPTree::new(Vec::<f64>::new(), line, PeripherySelector::seeded(0));
        assert!(matches!(res, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn bad_selector_is_rejected() {
        let res = VPTree::new(vec![0.0, 1.0, 2.0], line, |_: &[usize]| 99usize);
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn lower_median_split() {
        // vantage 0; remaining distances 1, 2, 3, 4 -> mu = 2
        let tree = VPTree::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], line, |c: &[usize]| c[0]).unwrap();
        let root = tree.root();
        assert_eq!(root.vantage(), 0);
        assert_eq!(root.mu(), Some(2.0));
        let inner = root.inner().unwrap();
        assert!(inner.is_leaf());
        assert_eq!(inner.vantage(), 1);
        let outer = root.outer().unwrap();
        let mut covered = outer.indices();
        covered.push(outer.vantage());
        covered.sort();
        assert_eq!(covered, vec![2, 3, 4]);
    }

    #[test]
    fn identical_points_build_deep_tree() {
        let tree = VPTree::new(vec![1.0; 2000], line, |c: &[usize]| c[0]).unwrap();
        // every split puts all ties outside
        assert_eq!(tree.depth(), 2000);
        assert_eq!(tree.node_count(), 2000);
        let mut visits = 0;
        assert_eq!(*tree.fast_approx_query(&1.0, Some(&mut visits)), 1.0);
        assert_eq!(visits, 1999);
    }

    #[test]
    fn dump_lists_every_point() {
        let tree = VPTree::new(vec![0.0, 1.0, 2.0], line, |c: &[usize]| c[0]).unwrap();
        let text = tree.dump();
        assert_eq!(text.matches("Vantage:").count(), 3);
        assert!(text.starts_with("Vantage: 0.0\nMu: 1\n"));
        assert!(text.contains("Outer ->"));
    }
}
