//! Rollout handler: turns a strategy plus per-cluster workload state into
//! the next rollout decision.
//!
//! The handler is bound to one placement's tracker and to a caller-supplied
//! status function that maps a workload of type `T` on a cluster to a
//! [`ClusterRolloutStatus`]. Each call reads one tracker snapshot, so a
//! concurrent refresh never mixes two partitions into one decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetgrid_placement::{DecisionSnapshot, GroupKey, PlacementDecisionClustersTracker};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, RolloutError};
use crate::progressive::{progressive_per_cluster, progressive_per_group};
use crate::sizing::{calculate_rollout_size, decision_groups_to_group_keys, parse_timeout};
use crate::status::{ClusterRolloutStatus, RolloutResult, RolloutStatus};
use crate::strategy::{
    MandatoryDecisionGroup, RolloutAll, RolloutProgressive, RolloutProgressivePerGroup,
    RolloutStrategy, RolloutType,
};

/// Maps the workload on a cluster to its rollout status.
pub type ClusterRolloutStatusFunc<T> =
    Arc<dyn Fn(&str, &T) -> anyhow::Result<ClusterRolloutStatus> + Send + Sync>;

/// Computes rollout decisions for one placement.
pub struct RolloutHandler<T> {
    tracker: Arc<PlacementDecisionClustersTracker>,
    status_fn: ClusterRolloutStatusFunc<T>,
    clock: Arc<dyn Clock>,
}

impl<T> RolloutHandler<T> {
    pub fn new<F>(tracker: Arc<PlacementDecisionClustersTracker>, status_fn: F) -> Self
    where
        F: Fn(&str, &T) -> anyhow::Result<ClusterRolloutStatus> + Send + Sync + 'static,
    {
        Self {
            tracker,
            status_fn: Arc::new(status_fn),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for timeout arithmetic instead of the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decide which clusters to roll out next.
    ///
    /// `workloads` holds the caller's existing workload per cluster; clusters
    /// without one are `ToApply`. Workloads on clusters the placement no
    /// longer selects are reported in `clusters_removed`.
    ///
    /// Returns the strategy with its active payload defaulted, alongside the
    /// result. Malformed timeouts or max concurrency fail the whole call.
    pub fn get_rollout_cluster(
        &self,
        strategy: &RolloutStrategy,
        workloads: &HashMap<String, T>,
    ) -> Result<(RolloutStrategy, RolloutResult)> {
        let snapshot = self.tracker.snapshot();
        let now = self.clock.now();

        let effective = strategy.normalized();
        let mut result = match effective.rollout_type {
            RolloutType::All => {
                let all = effective.all.clone().unwrap_or_default();
                self.rollout_all(&all, &snapshot, workloads, now)?
            }
            RolloutType::Progressive => {
                let progressive = effective.progressive.clone().unwrap_or_default();
                self.rollout_progressive(&progressive, &snapshot, workloads, now)?
            }
            RolloutType::ProgressivePerGroup => {
                let per_group = effective.progressive_per_group.clone().unwrap_or_default();
                self.rollout_progressive_per_group(&per_group, &snapshot, workloads, now)?
            }
        };
        result.clusters_removed = self.removed_clusters(&snapshot, workloads)?;

        info!(
            strategy = %effective.rollout_type,
            to_rollout = result.clusters_to_rollout.len(),
            timed_out = result.clusters_time_out.len(),
            removed = result.clusters_removed.len(),
            "computed rollout clusters"
        );
        Ok((effective, result))
    }

    /// Every cluster in one batch; the state machine still classifies each.
    fn rollout_all(
        &self,
        all: &RolloutAll,
        snapshot: &DecisionSnapshot,
        workloads: &HashMap<String, T>,
        now: DateTime<Utc>,
    ) -> Result<RolloutResult> {
        let timeout = parse_timeout(&all.timeout)?;
        let groups = snapshot.existing_cluster_groups_besides(&[]);
        let length = groups.clusters().len();
        progressive_per_cluster(&groups, length, timeout, now, |cluster, key| {
            self.cluster_status(cluster, key, workloads)
        })
    }

    /// Mandatory groups first, then batches of `max_concurrency` clusters.
    fn rollout_progressive(
        &self,
        progressive: &RolloutProgressive,
        snapshot: &DecisionSnapshot,
        workloads: &HashMap<String, T>,
        now: DateTime<Utc>,
    ) -> Result<RolloutResult> {
        let timeout = parse_timeout(&progressive.timeout)?;
        let total = snapshot.existing_besides(&[]).len();
        let length = calculate_rollout_size(&progressive.max_concurrency, total)?;
        let mandatory_keys = decision_groups_to_group_keys(&progressive.mandatory_decision_groups);

        if let Some(result) = self.rollout_mandatory_groups(
            &progressive.mandatory_decision_groups,
            snapshot,
            workloads,
            now,
        )? {
            return Ok(result);
        }

        debug!(total, length, "rolling out remaining clusters in batches");
        let remaining = snapshot.existing_cluster_groups_besides(&mandatory_keys);
        progressive_per_cluster(&remaining, length, timeout, now, |cluster, key| {
            self.cluster_status(cluster, key, workloads)
        })
    }

    /// Mandatory groups first, then one whole decision group at a time.
    fn rollout_progressive_per_group(
        &self,
        per_group: &RolloutProgressivePerGroup,
        snapshot: &DecisionSnapshot,
        workloads: &HashMap<String, T>,
        now: DateTime<Utc>,
    ) -> Result<RolloutResult> {
        let timeout = parse_timeout(&per_group.timeout)?;
        let mandatory_keys = decision_groups_to_group_keys(&per_group.mandatory_decision_groups);

        if let Some(result) = self.rollout_mandatory_groups(
            &per_group.mandatory_decision_groups,
            snapshot,
            workloads,
            now,
        )? {
            return Ok(result);
        }

        let remaining = snapshot.existing_cluster_groups_besides(&mandatory_keys);
        progressive_per_group(&remaining, timeout, now, |cluster, key| {
            self.cluster_status(cluster, key, workloads)
        })
    }

    /// Roll out the mandatory groups with no timeout.
    ///
    /// Returns `None` once they have nothing left to roll out, which lets the
    /// caller move on to the remaining clusters.
    fn rollout_mandatory_groups(
        &self,
        groups: &[MandatoryDecisionGroup],
        snapshot: &DecisionSnapshot,
        workloads: &HashMap<String, T>,
        now: DateTime<Utc>,
    ) -> Result<Option<RolloutResult>> {
        if groups.is_empty() {
            return Ok(None);
        }

        let keys = decision_groups_to_group_keys(groups);
        let mandatory = snapshot.existing_cluster_groups(&keys);
        let result = progressive_per_group(&mandatory, Duration::MAX, now, |cluster, key| {
            self.cluster_status(cluster, key, workloads)
        })?;

        if result.clusters_to_rollout.is_empty() {
            debug!(groups = mandatory.len(), "mandatory decision groups completed");
            Ok(None)
        } else {
            debug!(
                to_rollout = result.clusters_to_rollout.len(),
                "mandatory decision groups still rolling out"
            );
            Ok(Some(result))
        }
    }

    fn cluster_status(
        &self,
        cluster: &str,
        group_key: &GroupKey,
        workloads: &HashMap<String, T>,
    ) -> Result<ClusterRolloutStatus> {
        let mut status = match workloads.get(cluster) {
            Some(workload) => self.workload_status(cluster, workload)?,
            None => ClusterRolloutStatus::new(RolloutStatus::ToApply),
        };
        status.cluster_name = cluster.to_string();
        status.group_key = group_key.clone();
        Ok(status)
    }

    fn workload_status(&self, cluster: &str, workload: &T) -> Result<ClusterRolloutStatus> {
        (self.status_fn)(cluster, workload).map_err(|source| RolloutError::Status {
            cluster: cluster.to_string(),
            source,
        })
    }

    fn removed_clusters(
        &self,
        snapshot: &DecisionSnapshot,
        workloads: &HashMap<String, T>,
    ) -> Result<HashMap<String, ClusterRolloutStatus>> {
        let current = snapshot.existing_besides(&[]);
        let mut removed = HashMap::new();
        for (cluster, workload) in workloads {
            if current.contains(cluster) {
                continue;
            }
            let mut status = self.workload_status(cluster, workload)?;
            status.cluster_name = cluster.clone();
            removed.insert(cluster.clone(), status);
        }
        Ok(removed)
    }
}
