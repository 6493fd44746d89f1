//! Vantage point selection policies.
//!
//! A selector is consulted once per internal node during construction. It is
//! given the dataset indices still to be partitioned and must return one of
//! them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Strategy for choosing the pivot of a node.
pub trait VantagePointSelector<T, F> {
    /// Choose one member of `candidates` (never empty) as vantage point.
    ///
    /// `data` is the whole dataset; `candidates` index into it.
    fn select<D>(&mut self, candidates: &[usize], data: &[T], distance: &D) -> usize
    where
        D: Fn(&T, &T) -> F;

    /// Reset any internal randomness. Forests call this with a distinct
    /// seed per estimator so that their partitions decorrelate.
    fn reseed(&mut self, _seed: u64) {}
}

/// Any `FnMut(&[usize]) -> usize` picks from the candidate indices directly.
impl<T, F, C> VantagePointSelector<T, F> for C
where
    C: FnMut(&[usize]) -> usize,
{
    fn select<D>(&mut self, candidates: &[usize], _data: &[T], _distance: &D) -> usize
    where
        D: Fn(&T, &T) -> F,
    {
        (*self)(candidates)
    }
}

/// Randomly select an anchor among the candidates, and choose the candidate
/// furthest from that anchor.
#[derive(Clone)]
pub struct PeripherySelector {
    rng: StdRng,
}

impl PeripherySelector {
    /// Selector seeded from system entropy.
    pub fn new() -> Self {
        PeripherySelector { rng: StdRng::from_entropy() }
    }

    /// Deterministic selector.
    pub fn seeded(seed: u64) -> Self {
        PeripherySelector { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for PeripherySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PeripherySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PeripherySelector")
    }
}

impl<T, F: PartialOrd> VantagePointSelector<T, F> for PeripherySelector {
    fn select<D>(&mut self, candidates: &[usize], data: &[T], distance: &D) -> usize
    where
        D: Fn(&T, &T) -> F,
    {
        let anchor = candidates[self.rng.gen_range(0..candidates.len())];
        let anchor_item = &data[anchor];

        let mut best = anchor;
        let mut best_d = distance(anchor_item, anchor_item);
        for &i in candidates {
            let d = distance(anchor_item, &data[i]);
            if d > best_d {
                best = i;
                best_d = d;
            }
        }
        best
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

/// Pick a candidate uniformly at random.
#[derive(Clone)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Selector seeded from system entropy.
    pub fn new() -> Self {
        RandomSelector { rng: StdRng::from_entropy() }
    }

    /// Deterministic selector.
    pub fn seeded(seed: u64) -> Self {
        RandomSelector { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RandomSelector")
    }
}

impl<T, F> VantagePointSelector<T, F> for RandomSelector {
    fn select<D>(&mut self, candidates: &[usize], _data: &[T], _distance: &D) -> usize
    where
        D: Fn(&T, &T) -> F,
    {
        candidates[self.rng.gen_range(0..candidates.len())]
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}
