//! Benchmark harness comparing the linear scan, a single tree and a forest
//! on one dataset.
//!
//! Timings are wall-clock per query. Hit counts start at one so that the
//! root is counted. Forest accuracy is scored by rank error against the
//! linear scan.

use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::forest::{VPForest, VPForestBuilder};
use crate::linear::LinearScan;
use crate::select::VantagePointSelector;
use crate::vptree::{Scalar, VPTree};

/// Distinct tree counts to evaluate for a forest of `total` estimators:
/// `floor(total^0.8)` evenly spaced values from 1 to `total`, truncated and
/// deduplicated.
pub fn trees_to_query(total: usize) -> Vec<usize> {
    let num = (total as f64).powf(0.8) as usize;
    match num {
        0 => Vec::new(),
        1 => vec![1],
        _ => {
            let step = (total as f64 - 1.0) / (num as f64 - 1.0);
            let mut counts: Vec<usize> = (0..num)
                .map(|i| {
                    if i == num - 1 {
                        total
                    } else {
                        (1.0 + i as f64 * step) as usize
                    }
                })
                .collect();
            counts.dedup();
            counts
        }
    }
}

/// Order statistics of the rank errors over a query set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorStats {
    pub min: usize,
    pub mean: f64,
    pub median: f64,
    pub max: usize,
}

impl ErrorStats {
    /// `None` for an empty slice.
    pub fn from_ranks(ranks: &[usize]) -> Option<Self> {
        if ranks.is_empty() {
            return None;
        }
        let mut sorted = ranks.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
        } else {
            sorted[n / 2] as f64
        };
        Some(ErrorStats {
            min: sorted[0],
            mean: sorted.iter().sum::<usize>() as f64 / n as f64,
            median,
            max: sorted[n - 1],
        })
    }
}

/// Forest results at one tree count.
#[derive(Clone, Debug, PartialEq)]
pub struct ForestStats {
    pub n_trees: usize,
    pub mean_time: Duration,
    pub mean_hits: f64,
    pub error: ErrorStats,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub n: usize,
    pub linear_scan_time: Duration,
    pub vptree_time: Duration,
    pub vptree_hits: f64,
    /// Ordered by increasing `n_trees`.
    pub forest: Vec<ForestStats>,
}

impl Summary {
    /// Smallest tree count reaching the lowest median rank error.
    pub fn half_exact_trees(&self) -> Option<usize> {
        argmin_by(&self.forest, |s| s.error.median)
    }

    /// Smallest tree count reaching the lowest worst-case rank error.
    pub fn all_exact_trees(&self) -> Option<usize> {
        argmin_by(&self.forest, |s| s.error.max as f64)
    }
}

fn argmin_by<K: Fn(&ForestStats) -> f64>(stats: &[ForestStats], key: K) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for s in stats {
        let k = key(s);
        match best {
            Some((_, b)) if !(k < b) => {}
            _ => best = Some((s.n_trees, k)),
        }
    }
    best.map(|b| b.0)
}

fn mean_duration(total: Duration, n: usize) -> Duration {
    Duration::from_secs_f64(total.as_secs_f64() / n as f64)
}

/// A linear scan, a tree and a forest sharing one dataset.
pub struct Evaluation<T, F, D> {
    scan: LinearScan<T, F, D>,
    tree: VPTree<T, F, D>,
    forest: VPForest<T, F, D>,
}

impl<T, F, D> Evaluation<T, F, D>
where
    F: Scalar,
    D: Fn(&T, &T) -> F,
{
    /// Build all three indexes over `data`. The tree uses its own clone of
    /// `selector`; the forest is configured by `forest`.
    pub fn new<S>(data: Vec<T>, distance: D, selector: S, forest: VPForestBuilder) -> Result<Self>
    where
        S: VantagePointSelector<T, F> + Clone,
    {
        let data: Arc<[T]> = Arc::from(data);
        let distance = Arc::new(distance);

        info!("initializing indexes for {} points", data.len());
        let scan = LinearScan::from_shared(Arc::clone(&data), Arc::clone(&distance))?;
        let tree = VPTree::from_shared(Arc::clone(&data), Arc::clone(&distance), selector.clone())?;
        let forest = forest.build_shared(data, distance, selector)?;

        Ok(Evaluation { scan, tree, forest })
    }

    pub fn scan(&self) -> &LinearScan<T, F, D> {
        &self.scan
    }

    pub fn tree(&self) -> &VPTree<T, F, D> {
        &self.tree
    }

    pub fn forest(&self) -> &VPForest<T, F, D> {
        &self.forest
    }

    /// Run every query against every index and summarize.
    ///
    /// Fails with [`Error::InvalidArgument`] if `queries` is empty.
    pub fn run(&self, queries: &[T]) -> Result<Summary> {
        if queries.is_empty() {
            return Err(Error::invalid_argument("evaluation needs at least one query"));
        }
        let n_queries = queries.len();

        info!("LinearScan: {} queries", n_queries);
        let mut total = Duration::default();
        for q in queries {
            let tic = Instant::now();
            self.scan.query(q);
            total += tic.elapsed();
        }
        let linear_scan_time = mean_duration(total, n_queries);

        info!("VPTree: {} queries", n_queries);
        let mut total = Duration::default();
        let mut hits: u64 = 0;
        for q in queries {
            let mut ct = 1;
            let tic = Instant::now();
            self.tree.query(q, Some(&mut ct));
            total += tic.elapsed();
            hits += ct;
        }
        let vptree_time = mean_duration(total, n_queries);
        let vptree_hits = hits as f64 / n_queries as f64;

        let counts = trees_to_query(self.forest.n_estimators());
        info!(
            "VPForest: {} queries at {} tree counts ({}-{})",
            n_queries,
            counts.len(),
            counts.first().copied().unwrap_or(0),
            counts.last().copied().unwrap_or(0)
        );

        let mut forest = Vec::with_capacity(counts.len());
        for n_trees in counts {
            let mut total = Duration::default();
            let mut hits: u64 = 0;
            let mut ranks = Vec::with_capacity(n_queries);
            for q in queries {
                let mut ct = 1;
                let tic = Instant::now();
                let (index, _) = self.forest.query_index(q, n_trees, Some(&mut ct))?;
                total += tic.elapsed();
                hits += ct;
                ranks.push(self.scan.get_rank_of_index(q, index)?);
            }
            let error = ErrorStats::from_ranks(&ranks)
                .ok_or_else(|| Error::invalid_argument("evaluation needs at least one query"))?;
            forest.push(ForestStats {
                n_trees,
                mean_time: mean_duration(total, n_queries),
                mean_hits: hits as f64 / n_queries as f64,
                error,
            });
        }

        Ok(Summary {
            n: self.scan.len(),
            linear_scan_time,
            vptree_time,
            vptree_hits,
            forest,
        })
    }
}
