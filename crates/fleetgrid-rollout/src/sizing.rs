//! Batch sizing, timeout parsing and mandatory group resolution.

use std::sync::LazyLock;
use std::time::Duration;

use fleetgrid_placement::GroupKey;
use regex::Regex;

use crate::error::{Result, RolloutError};
use crate::strategy::{IntOrString, MandatoryDecisionGroup};

static TIMEOUT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([hms])$").ok());

/// Number of clusters to roll out per batch.
///
/// Percentages are whole numbers taken of `total` and rounded up. Anything
/// that ends up non-positive or above `total` means all of them.
pub fn calculate_rollout_size(max_concurrency: &IntOrString, total: usize) -> Result<usize> {
    let length: i128 = match max_concurrency {
        IntOrString::Int(n) => i128::from(*n),
        IntOrString::String(s) => {
            let invalid = || RolloutError::InvalidMaxConcurrency(s.clone());
            match s.trim().strip_suffix('%') {
                Some(percent) => {
                    let percent: i64 = percent.trim().parse().map_err(|_| invalid())?;
                    let scaled = i128::from(percent) * total as i128;
                    // Ceiling division; non-positive results fall through to `total`.
                    if scaled > 0 { (scaled + 99) / 100 } else { 0 }
                }
                None => i128::from(s.trim().parse::<i64>().map_err(|_| invalid())?),
            }
        }
    };

    if length <= 0 || length > total as i128 {
        Ok(total)
    } else {
        Ok(length as usize)
    }
}

/// Parse a strategy timeout. `""` and `"None"` mean wait forever.
pub fn parse_timeout(timeout: &str) -> Result<Duration> {
    if timeout.is_empty() || timeout == "None" {
        return Ok(Duration::MAX);
    }

    let invalid = || RolloutError::InvalidTimeout(timeout.to_string());
    let caps = TIMEOUT_PATTERN
        .as_ref()
        .and_then(|re| re.captures(timeout))
        .ok_or_else(invalid)?;
    let value: u64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = match &caps[2] {
        "h" => 3600,
        "m" => 60,
        _ => 1,
    };
    value
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// One group key per mandatory group, in order. Names win over indexes.
pub fn decision_groups_to_group_keys(groups: &[MandatoryDecisionGroup]) -> Vec<GroupKey> {
    groups
        .iter()
        .map(|g| {
            if g.group_name.is_empty() {
                GroupKey::by_index(g.group_index)
            } else {
                GroupKey::by_name(&g.group_name)
            }
        })
        .collect()
}
