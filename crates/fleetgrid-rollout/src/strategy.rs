//! Rollout strategies: all at once, progressive, progressive per group.
//!
//! Strategies are plain data, usually round-tripped through a custom
//! resource, so field names follow the resource's camelCase convention.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RolloutError};

/// Which rollout algorithm to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RolloutType {
    /// Every cluster at once.
    #[default]
    All,
    /// Clusters in batches bounded by max concurrency.
    Progressive,
    /// One decision group at a time.
    ProgressivePerGroup,
}

impl FromStr for RolloutType {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "All" => Ok(Self::All),
            "Progressive" => Ok(Self::Progressive),
            "ProgressivePerGroup" => Ok(Self::ProgressivePerGroup),
            other => Err(RolloutError::UnsupportedRolloutType(other.to_string())),
        }
    }
}

impl TryFrom<String> for RolloutType {
    type Error = RolloutError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RolloutType> for String {
    fn from(t: RolloutType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for RolloutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "All",
            Self::Progressive => "Progressive",
            Self::ProgressivePerGroup => "ProgressivePerGroup",
        };
        f.write_str(s)
    }
}

/// An absolute count or a string such as `"25%"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl Default for IntOrString {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A decision group that must finish before any other group starts.
///
/// When both are set, the name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryDecisionGroup {
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub group_index: i32,
}

/// Settings for [`RolloutType::All`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutAll {
    /// `""` or `"None"` waits forever; otherwise `<n>h`, `<n>m` or `<n>s`.
    #[serde(default)]
    pub timeout: String,
}

/// Settings for [`RolloutType::Progressive`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutProgressive {
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub mandatory_decision_groups: Vec<MandatoryDecisionGroup>,
    /// Batch size. Zero, negative or above the cluster count means all clusters.
    #[serde(default)]
    pub max_concurrency: IntOrString,
}

/// Settings for [`RolloutType::ProgressivePerGroup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutProgressivePerGroup {
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub mandatory_decision_groups: Vec<MandatoryDecisionGroup>,
}

/// How to roll a workload change out across the placement's clusters.
///
/// Only the payload matching `rollout_type` is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStrategy {
    #[serde(rename = "type", default)]
    pub rollout_type: RolloutType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<RolloutAll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progressive: Option<RolloutProgressive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progressive_per_group: Option<RolloutProgressivePerGroup>,
}

impl RolloutStrategy {
    pub fn all(timeout: &str) -> Self {
        Self {
            rollout_type: RolloutType::All,
            all: Some(RolloutAll {
                timeout: timeout.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn progressive(progressive: RolloutProgressive) -> Self {
        Self {
            rollout_type: RolloutType::Progressive,
            progressive: Some(progressive),
            ..Default::default()
        }
    }

    pub fn progressive_per_group(per_group: RolloutProgressivePerGroup) -> Self {
        Self {
            rollout_type: RolloutType::ProgressivePerGroup,
            progressive_per_group: Some(per_group),
            ..Default::default()
        }
    }

    /// The strategy with its active payload filled in and the others dropped.
    pub fn normalized(&self) -> Self {
        match self.rollout_type {
            RolloutType::All => Self {
                rollout_type: RolloutType::All,
                all: Some(self.all.clone().unwrap_or_default()),
                ..Default::default()
            },
            RolloutType::Progressive => {
                Self::progressive(self.progressive.clone().unwrap_or_default())
            }
            RolloutType::ProgressivePerGroup => {
                Self::progressive_per_group(self.progressive_per_group.clone().unwrap_or_default())
            }
        }
    }

    /// Parse a strategy document in TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RolloutError::Config(e.to_string()))
    }

    /// Parse a strategy document in JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| RolloutError::Config(e.to_string()))
    }

    /// Load a strategy document; `.json` files are JSON, anything else TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RolloutError::Config(e.to_string()))
    }
}
