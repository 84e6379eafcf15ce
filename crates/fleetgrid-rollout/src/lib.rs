//! FleetGrid progressive rollout: cluster batches, decision-group gating, timeouts.
//!
//! Given a rollout strategy, the clusters a placement currently selects
//! (grouped into decision groups) and the state of a workload on each
//! cluster, this crate decides which clusters receive the change next, which
//! have timed out and which have left the placement.
//!
//! # Components
//!
//! - **`strategy`** - Strategy configuration (All, Progressive, ProgressivePerGroup)
//! - **`status`** - Per-cluster status and the timeout state machine
//! - **`sizing`** - Batch size, timeout parsing, mandatory group keys
//! - **`progressive`** - Per-cluster and per-group batch selection
//! - **`handler`** - `RolloutHandler`, the entry point
//! - **`clock`** - Injectable time source

pub mod clock;
pub mod error;
pub mod handler;
pub mod progressive;
pub mod sizing;
pub mod status;
pub mod strategy;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::RolloutError;
pub use handler::{ClusterRolloutStatusFunc, RolloutHandler};
pub use progressive::{progressive_per_cluster, progressive_per_group};
pub use sizing::{calculate_rollout_size, decision_groups_to_group_keys, parse_timeout};
pub use status::{
    ClusterRolloutStatus, RolloutDecision, RolloutResult, RolloutStatus, determine_rollout_status,
    need_to_rollout,
};
pub use strategy::{
    IntOrString, MandatoryDecisionGroup, RolloutAll, RolloutProgressive,
    RolloutProgressivePerGroup, RolloutStrategy, RolloutType,
};
