//! FleetGrid placement decisions: decision groups and cluster tracking.
//!
//! A placement selects a set of managed clusters and publishes the result as
//! one or more placement decisions, each labelled with a decision group
//! (name and index). This crate turns those decisions into a partition of
//! clusters by group and keeps it current for the rollout engine.
//!
//! # Components
//!
//! - **`types`** - `GroupKey`, `ClusterGroupsMap`, decision data and labels
//! - **`getter`** - `PlacementDecisionGetter` trait and in-memory `DecisionStore`
//! - **`tracker`** - `PlacementDecisionClustersTracker` (refresh, group queries)

pub mod error;
pub mod getter;
pub mod tracker;
pub mod types;

pub use error::{PlacementError, PlacementResult};
pub use getter::{DecisionStore, PlacementDecisionGetter};
pub use tracker::{DecisionSnapshot, PlacementDecisionClustersTracker};
pub use types::*;
