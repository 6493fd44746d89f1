//! Brute force scan used as ground truth for the tree indexes.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::vptree::Scalar;

/// Exact 1-NN by comparing the query against every point.
pub struct LinearScan<T, F, D> {
    data: Arc<[T]>,
    distance: Arc<D>,
    _measure: PhantomData<fn() -> F>,
}

impl<T, F, D> LinearScan<T, F, D>
where
    F: Scalar,
    D: Fn(&T, &T) -> F,
{
    /// Fails with [`Error::InvalidInput`] if `data` is empty.
    pub fn new(data: Vec<T>, distance: D) -> Result<Self> {
        Self::from_shared(Arc::from(data), Arc::new(distance))
    }

    pub fn from_shared(data: Arc<[T]>, distance: Arc<D>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::invalid_input("cannot scan an empty dataset"));
        }
        Ok(LinearScan { data, distance, _measure: PhantomData })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// The exact nearest neighbor of `q`. The first of several equidistant
    /// points wins.
    pub fn query(&self, q: &T) -> &T {
        &self.data[self.query_index(q).0]
    }

    /// Exact nearest neighbor of `q` as `(dataset index, distance)`.
    pub fn query_index(&self, q: &T) -> (usize, F) {
        let mut best = 0;
        let mut best_d = (*self.distance)(q, &self.data[0]);
        for (i, item) in self.data.iter().enumerate().skip(1) {
            let d = (*self.distance)(q, item);
            if d < best_d {
                best = i;
                best_d = d;
            }
        }
        (best, best_d)
    }

    /// Rank of the point at `index` among all points ordered by distance to
    /// `q`: its position in the ascending sort, with equidistant points
    /// sharing the lowest position. Equals the number of points strictly
    /// closer to `q`, so `0` means `index` is an exact nearest neighbor.
    pub fn get_rank_of_index(&self, q: &T, index: usize) -> Result<usize> {
        let target = self.data.get(index).ok_or(Error::NotFound)?;
        let d_target = (*self.distance)(q, target);
        Ok(self
            .data
            .iter()
            .filter(|item| (*self.distance)(q, *item) < d_target)
            .count())
    }
}

impl<T, F, D> LinearScan<T, F, D>
where
    T: PartialEq,
    F: Scalar,
    D: Fn(&T, &T) -> F,
{
    /// Rank of `point` (which must be in the dataset) by distance to `q`.
    ///
    /// Fails with [`Error::NotFound`] if `point` is not a member.
    pub fn get_rank_of(&self, q: &T, point: &T) -> Result<usize> {
        let index = self
            .data
            .iter()
            .position(|item| item == point)
            .ok_or(Error::NotFound)?;
        self.get_rank_of_index(q, index)
    }
}
