//! Ensembles of independently built vantage point trees.
//!
//! A forest answers queries by running the cheap single-path descent of
//! several trees and keeping the closest candidate. Each extra tree samples
//! a different partition of the space, so accuracy grows with the number of
//! trees consulted while every individual query stays O(depth).

use log::info;
use rand::Rng;
use rayon::prelude::*;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::select::{PeripherySelector, VantagePointSelector};
use crate::vptree::{Scalar, VPTree};

/// Default forest size for `n` points: `floor(n / log2(n))`, at least one.
///
/// Keeps a full forest pass at O(n) total work while each tree is O(log n)
/// deep.
pub fn default_n_estimators(n: usize) -> usize {
    if n < 2 {
        return 1;
    }
    let n = n as f64;
    ((n / n.log2()).floor() as usize).max(1)
}

/// Build configuration for a [`VPForest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VPForestBuilder {
    n_estimators: Option<usize>,
    seed: Option<u64>,
}

impl VPForestBuilder {
    /// Creates a builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of trees. Defaults to [`default_n_estimators`].
    pub fn n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = Some(n_estimators);
        self
    }

    /// Sets the base seed. Tree `i` has its selector reseeded with
    /// `seed + i`, which makes the whole forest reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Resolve the tree count and base seed for a dataset of `n` points.
    fn plan(&self, n: usize) -> Result<(usize, u64)> {
        if n == 0 {
            return Err(Error::invalid_input(
                "cannot build a vantage point forest over an empty dataset",
            ));
        }
        let n_estimators = match self.n_estimators {
            Some(0) => {
                return Err(Error::invalid_argument(
                    "a forest needs at least one estimator",
                ))
            }
            Some(k) => k,
            None => default_n_estimators(n),
        };
        let seed = match self.seed {
            Some(seed) => seed,
            None => rand::thread_rng().gen(),
        };
        Ok((n_estimators, seed))
    }

    /// Build the trees one after the other.
    pub fn build<T, F, D, S>(self, data: Vec<T>, distance: D, selector: S) -> Result<VPForest<T, F, D>>
    where
        F: Scalar,
        D: Fn(&T, &T) -> F,
        S: VantagePointSelector<T, F> + Clone,
    {
        self.build_shared(Arc::from(data), Arc::new(distance), selector)
    }

    pub fn build_shared<T, F, D, S>(
        self,
        data: Arc<[T]>,
        distance: Arc<D>,
        selector: S,
    ) -> Result<VPForest<T, F, D>>
    where
        F: Scalar,
        D: Fn(&T, &T) -> F,
        S: VantagePointSelector<T, F> + Clone,
    {
        let (n_estimators, seed) = self.plan(data.len())?;
        info!(
            "building vantage point forest: points={} estimators={} parallel=false",
            data.len(),
            n_estimators
        );

        let trees = (0..n_estimators)
            .map(|i| grow_tree(&data, &distance, &selector, seed, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(VPForest { data, distance, trees })
    }

    /// Build the trees concurrently, one rayon task per tree. Produces the
    /// same forest as [`build`](Self::build) for the same seed.
    pub fn par_build<T, F, D, S>(self, data: Vec<T>, distance: D, selector: S) -> Result<VPForest<T, F, D>>
    where
        T: Send + Sync,
        F: Scalar + Send,
        D: Fn(&T, &T) -> F + Send + Sync,
        S: VantagePointSelector<T, F> + Clone + Send + Sync,
    {
        self.par_build_shared(Arc::from(data), Arc::new(distance), selector)
    }

    pub fn par_build_shared<T, F, D, S>(
        self,
        data: Arc<[T]>,
        distance: Arc<D>,
        selector: S,
    ) -> Result<VPForest<T, F, D>>
    where
        T: Send + Sync,
        F: Scalar + Send,
        D: Fn(&T, &T) -> F + Send + Sync,
        S: VantagePointSelector<T, F> + Clone + Send + Sync,
    {
        let (n_estimators, seed) = self.plan(data.len())?;
        info!(
            "building vantage point forest: points={} estimators={} parallel=true",
            data.len(),
            n_estimators
        );

        let trees = (0..n_estimators)
            .into_par_iter()
            .map(|i| grow_tree(&data, &distance, &selector, seed, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(VPForest { data, distance, trees })
    }
}

fn grow_tree<T, F, D, S>(
    data: &Arc<[T]>,
    distance: &Arc<D>,
    selector: &S,
    seed: u64,
    i: usize,
) -> Result<VPTree<T, F, D>>
where
    F: Scalar,
    D: Fn(&T, &T) -> F,
    S: VantagePointSelector<T, F> + Clone,
{
    let mut selector = selector.clone();
    selector.reseed(seed.wrapping_add(i as u64));
    VPTree::from_shared(Arc::clone(data), Arc::clone(distance), selector)
}

/// `n_estimators` vantage point trees over one shared dataset.
pub struct VPForest<T, F, D> {
    data: Arc<[T]>,
    distance: Arc<D>,
    trees: Vec<VPTree<T, F, D>>,
}

impl<T, F, D> VPForest<T, F, D>
where
    F: Scalar,
    D: Fn(&T, &T) -> F,
{
    /// Build a forest sequentially. `n_estimators` defaults to
    /// [`default_n_estimators`] when `None`.
    pub fn new<S>(data: Vec<T>, distance: D, selector: S, n_estimators: Option<usize>) -> Result<Self>
    where
        S: VantagePointSelector<T, F> + Clone,
    {
        let mut builder = VPForestBuilder::new();
        if let Some(n) = n_estimators {
            builder = builder.n_estimators(n);
        }
        builder.build(data, distance, selector)
    }

    /// Build a forest with [`PeripherySelector::default`] picking the vantage
    /// points.
    pub fn with_default_selector(data: Vec<T>, distance: D, n_estimators: Option<usize>) -> Result<Self> {
        Self::new(data, distance, PeripherySelector::default(), n_estimators)
    }

    fn check_n_trees(&self, n_trees: usize) -> Result<&[VPTree<T, F, D>]> {
        if n_trees == 0 || n_trees > self.trees.len() {
            return Err(Error::invalid_argument(format!(
                "n_trees ({}) must be between 1 and n_estimators ({})",
                n_trees,
                self.trees.len()
            )));
        }
        Ok(&self.trees[..n_trees])
    }

    /// Approximate nearest neighbor of `q` using the first `n_trees` trees.
    ///
    /// Fails with [`Error::InvalidArgument`] unless
    /// `1 <= n_trees <= n_estimators`. `diagnostics` accumulates the visits of
    /// every tree consulted; a counter too close to `u64::MAX` to take them is
    /// rejected with [`Error::InvalidArgument`] and left untouched.
    pub fn query(&self, q: &T, n_trees: usize, diagnostics: Option<&mut u64>) -> Result<&T> {
        let (index, _) = self.query_index(q, n_trees, diagnostics)?;
        Ok(&self.data[index])
    }

    /// Like [`query`](Self::query) but returns `(dataset index, distance)`.
    pub fn query_index(&self, q: &T, n_trees: usize, diagnostics: Option<&mut u64>) -> Result<(usize, F)> {
        let trees = self.check_n_trees(n_trees)?;

        let mut visits = 0;
        let best = trees
            .iter()
            .map(|tree| tree.fast_approx_query_index(q, Some(&mut visits)))
            .fold(None, closest);

        record_visits(diagnostics, visits)?;
        best.ok_or_else(|| Error::invalid_argument("no trees consulted"))
    }

    /// Same answer as [`query_index`](Self::query_index), with the per-tree
    /// descents run on the rayon pool.
    pub fn par_query_index(&self, q: &T, n_trees: usize, diagnostics: Option<&mut u64>) -> Result<(usize, F)>
    where
        T: Send + Sync,
        F: Send + Sync,
        D: Send + Sync,
    {
        let trees = self.check_n_trees(n_trees)?;

        let candidates: Vec<(usize, F, u64)> = trees
            .par_iter()
            .map(|tree| {
                let mut visits = 0;
                let (index, d) = tree.fast_approx_query_index(q, Some(&mut visits));
                (index, d, visits)
            })
            .collect();

        let visits = candidates.iter().fold(0u64, |acc, c| acc.saturating_add(c.2));
        record_visits(diagnostics, visits)?;
        candidates
            .into_iter()
            .map(|(index, d, _)| (index, d))
            .fold(None, closest)
            .ok_or_else(|| Error::invalid_argument("no trees consulted"))
    }

    pub fn par_query(&self, q: &T, n_trees: usize, diagnostics: Option<&mut u64>) -> Result<&T>
    where
        T: Send + Sync,
        F: Send + Sync,
        D: Send + Sync,
    {
        let (index, _) = self.par_query_index(q, n_trees, diagnostics)?;
        Ok(&self.data[index])
    }
}

impl<T, F, D> VPForest<T, F, D> {
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[VPTree<T, F, D>] {
        &self.trees
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }
}

fn record_visits(diagnostics: Option<&mut u64>, visits: u64) -> Result<()> {
    if let Some(counter) = diagnostics {
        let current = *counter;
        *counter = current.checked_add(visits).ok_or_else(|| {
            Error::invalid_argument(format!(
                "diagnostics counter ({}) cannot take {} more visits",
                current, visits
            ))
        })?;
    }
    Ok(())
}

/// Keep the earlier candidate unless the new one is strictly closer.
fn closest<F: PartialOrd>(best: Option<(usize, F)>, candidate: (usize, F)) -> Option<(usize, F)> {
    match best {
        Some(b) if !(candidate.1 < b.1) => Some(b),
        _ => Some(candidate),
    }
}
