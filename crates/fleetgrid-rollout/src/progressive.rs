//! Batch selection over clusters and over decision groups.

use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetgrid_placement::{ClusterGroupsMap, GroupKey};
use tracing::debug;

use crate::error::Result;
use crate::status::{ClusterRolloutStatus, RolloutDecision, RolloutResult, determine_rollout_status};

/// Pick up to `length` clusters to roll out, in cluster-name order.
///
/// Clusters already in flight count toward the batch. Timed-out clusters
/// seen before the batch fills are reported too. `length == 0` selects
/// nothing.
pub fn progressive_per_cluster<F>(
    groups: &ClusterGroupsMap,
    length: usize,
    timeout: Duration,
    now: DateTime<Utc>,
    status_of: F,
) -> Result<RolloutResult>
where
    F: Fn(&str, &GroupKey) -> Result<ClusterRolloutStatus>,
{
    let mut result = RolloutResult::default();
    if length == 0 {
        return Ok(result);
    }

    let group_of = groups.cluster_to_group_key();
    // BTreeSet iteration keeps the batch stable across calls.
    for cluster in groups.clusters() {
        let group_key = group_of.get(&cluster).cloned().unwrap_or_default();
        let status = status_of(cluster.as_str(), &group_key)?;
        match determine_rollout_status(status, timeout, now) {
            RolloutDecision::Rollout(status) => {
                result.clusters_to_rollout.insert(cluster, status);
                if result.clusters_to_rollout.len() % length == 0 {
                    break;
                }
            }
            RolloutDecision::TimedOut(status) => {
                result.clusters_time_out.insert(cluster, status);
            }
            RolloutDecision::Skip => {}
        }
    }

    debug!(
        length,
        to_rollout = result.clusters_to_rollout.len(),
        timed_out = result.clusters_time_out.len(),
        "selected cluster batch"
    );
    Ok(result)
}

/// Roll out the first group, in ascending index order, that still has work.
///
/// Every cluster of a visited group is evaluated. Groups with nothing left
/// to roll out are passed over, but their timeouts are still reported.
pub fn progressive_per_group<F>(
    groups: &ClusterGroupsMap,
    timeout: Duration,
    now: DateTime<Utc>,
    status_of: F,
) -> Result<RolloutResult>
where
    F: Fn(&str, &GroupKey) -> Result<ClusterRolloutStatus>,
{
    let mut result = RolloutResult::default();

    for (group_key, clusters) in groups.iter() {
        for cluster in clusters {
            let status = status_of(cluster.as_str(), group_key)?;
            match determine_rollout_status(status, timeout, now) {
                RolloutDecision::Rollout(status) => {
                    result.clusters_to_rollout.insert(cluster.clone(), status);
                }
                RolloutDecision::TimedOut(status) => {
                    result.clusters_time_out.insert(cluster.clone(), status);
                }
                RolloutDecision::Skip => {}
            }
        }

        if !result.clusters_to_rollout.is_empty() {
            debug!(
                group = %group_key.group_name,
                index = group_key.group_index,
                to_rollout = result.clusters_to_rollout.len(),
                "selected decision group"
            );
            break;
        }
    }

    Ok(result)
}
