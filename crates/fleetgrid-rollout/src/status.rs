//! Per-cluster rollout status and the timeout state machine.
//!
//! | status        | within timeout | past timeout |
//! |---------------|----------------|--------------|
//! | `ToApply`     | rollout        | rollout      |
//! | `Progressing` | rollout        | timed out    |
//! | `Failed`      | rollout        | timed out    |
//! | `Succeeded`   | skip           | skip         |
//! | `TimeOut`     | skip           | skip         |
//! | `Skip`        | skip           | skip         |
//! | `Unknown`     | rollout        | rollout      |

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetgrid_placement::GroupKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Canonical rollout state of a workload on one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RolloutStatus {
    /// Not yet applied; ready to roll out.
    ToApply,
    /// Applied and not yet succeeded.
    Progressing,
    Succeeded,
    /// Failed; retried until the timeout expires.
    Failed,
    /// Progressing or failed for longer than the strategy timeout.
    TimeOut,
    /// Deliberately left alone.
    Skip,
    /// A value this engine does not recognize. Treated as needing rollout.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RolloutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ToApply => "ToApply",
            Self::Progressing => "Progressing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::TimeOut => "TimeOut",
            Self::Skip => "Skip",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Rollout state of one cluster for the current reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRolloutStatus {
    pub cluster_name: String,
    #[serde(default)]
    pub group_key: GroupKey,
    pub status: RolloutStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// When a `Progressing`/`Failed` cluster times out. Set by the engine;
    /// `None` when the timeout is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_out_time: Option<DateTime<Utc>>,
}

impl ClusterRolloutStatus {
    pub fn new(status: RolloutStatus) -> Self {
        Self {
            cluster_name: String::new(),
            group_key: GroupKey::default(),
            status,
            last_transition_time: None,
            time_out_time: None,
        }
    }

    pub fn with_last_transition_time(mut self, at: DateTime<Utc>) -> Self {
        self.last_transition_time = Some(at);
        self
    }
}

/// Outcome of one rollout computation. Built fresh on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutResult {
    pub clusters_to_rollout: HashMap<String, ClusterRolloutStatus>,
    pub clusters_time_out: HashMap<String, ClusterRolloutStatus>,
    pub clusters_removed: HashMap<String, ClusterRolloutStatus>,
}

/// Where the state machine puts one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutDecision {
    Rollout(ClusterRolloutStatus),
    TimedOut(ClusterRolloutStatus),
    Skip,
}

/// Classify one cluster given the strategy timeout and the current time.
///
/// `Progressing` and `Failed` clusters get their `time_out_time` filled in
/// and become `TimeOut` once `now` reaches it. A cluster without a last
/// transition time starts its timeout window now.
pub fn determine_rollout_status(
    mut status: ClusterRolloutStatus,
    timeout: Duration,
    now: DateTime<Utc>,
) -> RolloutDecision {
    match status.status {
        RolloutStatus::ToApply => RolloutDecision::Rollout(status),
        RolloutStatus::Succeeded | RolloutStatus::TimeOut | RolloutStatus::Skip => {
            RolloutDecision::Skip
        }
        RolloutStatus::Progressing | RolloutStatus::Failed => {
            status.time_out_time = time_out_time(status.last_transition_time, timeout, now);
            match status.time_out_time {
                Some(deadline) if now >= deadline => {
                    debug!(
                        cluster = %status.cluster_name,
                        previous = %status.status,
                        %deadline,
                        "cluster rollout timed out"
                    );
                    status.status = RolloutStatus::TimeOut;
                    RolloutDecision::TimedOut(status)
                }
                _ => RolloutDecision::Rollout(status),
            }
        }
        RolloutStatus::Unknown => {
            warn!(
                cluster = %status.cluster_name,
                "unrecognized rollout status, treating as needing rollout"
            );
            RolloutDecision::Rollout(status)
        }
    }
}

/// Whether the cluster belongs in the to-rollout set.
pub fn need_to_rollout(
    status: &ClusterRolloutStatus,
    timeout: Duration,
    now: DateTime<Utc>,
) -> bool {
    matches!(
        determine_rollout_status(status.clone(), timeout, now),
        RolloutDecision::Rollout(_)
    )
}

/// `None` when the deadline is not representable, i.e. never.
fn time_out_time(
    last_transition_time: Option<DateTime<Utc>>,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let start = last_transition_time.unwrap_or(now);
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ago(secs: i64) -> DateTime<Utc> {
        now() - chrono::Duration::seconds(secs)
    }

    fn cluster(status: RolloutStatus, secs_ago: i64) -> ClusterRolloutStatus {
        ClusterRolloutStatus {
            cluster_name: "cluster1".to_string(),
            ..ClusterRolloutStatus::new(status).with_last_transition_time(ago(secs_ago))
        }
    }

    const NINETY: Duration = Duration::from_secs(90);

    #[test]
    fn to_apply_always_rolls_out() {
        let decision =
            determine_rollout_status(cluster(RolloutStatus::ToApply, 1000), NINETY, now());
        assert!(matches!(
            decision,
            RolloutDecision::Rollout(s) if s.status == RolloutStatus::ToApply
        ));
    }

    #[test]
    fn terminal_statuses_are_skipped() {
        for status in [RolloutStatus::Succeeded, RolloutStatus::TimeOut, RolloutStatus::Skip] {
            assert_eq!(
                determine_rollout_status(cluster(status, 10), NINETY, now()),
                RolloutDecision::Skip
            );
        }
    }

    #[test]
    fn progressing_within_timeout_stays_in_flight() {
        match determine_rollout_status(cluster(RolloutStatus::Progressing, 60), NINETY, now()) {
            RolloutDecision::Rollout(s) => {
                assert_eq!(s.status, RolloutStatus::Progressing);
                assert_eq!(s.time_out_time, Some(ago(60) + chrono::Duration::seconds(90)));
            }
            other => panic!("expected rollout, got {other:?}"),
        }
    }

    #[test]
    fn failed_past_timeout_times_out() {
        match determine_rollout_status(cluster(RolloutStatus::Failed, 120), NINETY, now()) {
            RolloutDecision::TimedOut(s) => {
                assert_eq!(s.status, RolloutStatus::TimeOut);
                assert_eq!(s.time_out_time, Some(ago(30)));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn failed_within_timeout_is_retried() {
        assert!(need_to_rollout(&cluster(RolloutStatus::Failed, 30), NINETY, now()));
    }

    #[test]
    fn deadline_is_inclusive() {
        let decision =
            determine_rollout_status(cluster(RolloutStatus::Progressing, 90), NINETY, now());
        assert!(matches!(decision, RolloutDecision::TimedOut(_)));
    }

    #[test]
    fn zero_timeout_times_out_immediately() {
        let fresh = ClusterRolloutStatus::new(RolloutStatus::Progressing);
        let decision = determine_rollout_status(fresh, Duration::ZERO, now());
        assert!(matches!(decision, RolloutDecision::TimedOut(_)));
        assert!(!need_to_rollout(&cluster(RolloutStatus::Failed, 0), Duration::ZERO, now()));
    }

    #[test]
    fn unbounded_timeout_never_expires() {
        let long_ago = cluster(RolloutStatus::Progressing, 10_000_000);
        match determine_rollout_status(long_ago, Duration::MAX, now()) {
            RolloutDecision::Rollout(s) => assert_eq!(s.time_out_time, None),
            other => panic!("expected rollout, got {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_permissive() {
        let status: RolloutStatus = serde_json::from_str("\"Paused\"").unwrap();
        assert_eq!(status, RolloutStatus::Unknown);
        assert!(need_to_rollout(&cluster(status, 10), NINETY, now()));
    }

    #[test]
    fn status_serializes_camel_case() {
        let s = cluster(RolloutStatus::Failed, 10);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["clusterName"], "cluster1");
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["groupKey"]["groupIndex"], 0);
        assert!(json.get("timeOutTime").is_none());
    }
}
