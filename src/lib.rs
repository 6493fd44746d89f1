//! Vantage point trees and forests for nearest neighbor search in any
//! metric space.
//!
//! [`VPTree`] answers exact queries by branch and bound, or approximate ones
//! by a single descent. [`VPForest`] combines the descents of several
//! independently built trees. [`LinearScan`] is the brute force baseline.

pub mod error;
pub mod evaluate;
pub mod forest;
pub mod linear;
pub mod median;
pub mod select;
pub mod vptree;

pub use error::{Error, Result};
pub use forest::{default_n_estimators, VPForest, VPForestBuilder};
pub use linear::LinearScan;
pub use median::lower_median;
pub use select::{PeripherySelector, RandomSelector, VantagePointSelector};
pub use vptree::{Float, NodeRef, Scalar, VPTree};
