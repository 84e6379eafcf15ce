//! Placement decision types and the decision-group partition.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Label carrying the owning placement's name on each decision.
pub const PLACEMENT_LABEL: &str = "cluster.open-cluster-management.io/placement";
/// Label carrying the decision group name.
pub const DECISION_GROUP_NAME_LABEL: &str =
    "cluster.open-cluster-management.io/decision-group-name";
/// Label carrying the decision group index.
pub const DECISION_GROUP_INDEX_LABEL: &str =
    "cluster.open-cluster-management.io/decision-group-index";

/// Equality-based label selector: every pair must be present on the target.
pub type LabelSelector = BTreeMap<String, String>;

/// Identifies one decision group by name and/or index.
///
/// Ordered by index first so that maps keyed by `GroupKey` iterate in
/// rollout order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub group_index: i32,
}

impl GroupKey {
    pub fn new(group_name: &str, group_index: i32) -> Self {
        Self {
            group_name: group_name.to_string(),
            group_index,
        }
    }

    /// A key that only names the group; resolves to every index with that name.
    pub fn by_name(group_name: &str) -> Self {
        Self::new(group_name, 0)
    }

    /// A key that only carries the index.
    pub fn by_index(group_index: i32) -> Self {
        Self::new("", group_index)
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.group_index
            .cmp(&other.group_index)
            .then_with(|| self.group_name.cmp(&other.group_name))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Partition of cluster names into decision groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterGroupsMap {
    groups: BTreeMap<GroupKey, BTreeSet<String>>,
}

impl ClusterGroupsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cluster to a group, creating the group if needed.
    pub fn insert(&mut self, key: GroupKey, cluster: &str) {
        self.groups.entry(key).or_default().insert(cluster.to_string());
    }

    /// Ensure a group exists, even with no clusters.
    pub fn insert_group(&mut self, key: GroupKey) -> &mut BTreeSet<String> {
        self.groups.entry(key).or_default()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&BTreeSet<String>> {
        self.groups.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &BTreeSet<String>)> {
        self.groups.iter()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Union of all groups' clusters.
    pub fn clusters(&self) -> BTreeSet<String> {
        self.groups.values().flatten().cloned().collect()
    }

    /// Group keys in ascending index order.
    pub fn ordered_group_keys(&self) -> Vec<GroupKey> {
        self.groups.keys().cloned().collect()
    }

    /// Invert the partition into a cluster → group lookup.
    pub fn cluster_to_group_key(&self) -> HashMap<String, GroupKey> {
        let mut lookup = HashMap::new();
        for (key, clusters) in &self.groups {
            for cluster in clusters {
                lookup.insert(cluster.clone(), key.clone());
            }
        }
        lookup
    }
}

impl FromIterator<(GroupKey, BTreeSet<String>)> for ClusterGroupsMap {
    fn from_iter<I: IntoIterator<Item = (GroupKey, BTreeSet<String>)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, clusters) in iter {
            map.insert_group(key).extend(clusters);
        }
        map
    }
}

/// Reference to the placement whose decisions are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRef {
    pub namespace: String,
    pub name: String,
}

impl PlacementRef {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Selector matching every decision owned by this placement.
    pub fn decision_selector(&self) -> LabelSelector {
        LabelSelector::from([(PLACEMENT_LABEL.to_string(), self.name.clone())])
    }
}

/// A single selected cluster inside a placement decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDecision {
    pub cluster_name: String,
    #[serde(default)]
    pub reason: String,
}

/// One page of a placement's resolved output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDecision {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub decisions: Vec<ClusterDecision>,
}

impl PlacementDecision {
    /// Build a decision labelled for `placement` and the given group.
    pub fn for_group(
        placement: &PlacementRef,
        name: &str,
        group: &GroupKey,
        clusters: &[&str],
    ) -> Self {
        let labels = BTreeMap::from([
            (PLACEMENT_LABEL.to_string(), placement.name.clone()),
            (DECISION_GROUP_NAME_LABEL.to_string(), group.group_name.clone()),
            (
                DECISION_GROUP_INDEX_LABEL.to_string(),
                group.group_index.to_string(),
            ),
        ]);
        Self {
            namespace: placement.namespace.clone(),
            name: name.to_string(),
            labels,
            decisions: clusters
                .iter()
                .map(|c| ClusterDecision {
                    cluster_name: c.to_string(),
                    reason: String::new(),
                })
                .collect(),
        }
    }

    /// Whether every selector pair is present on this decision.
    pub fn matches(&self, selector: &LabelSelector) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|value| value == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn group_keys_order_by_index_then_name() {
        let mut keys = vec![
            GroupKey::new("b", 2),
            GroupKey::new("z", 0),
            GroupKey::new("a", 2),
            GroupKey::new("canary", 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                GroupKey::new("z", 0),
                GroupKey::new("canary", 1),
                GroupKey::new("a", 2),
                GroupKey::new("b", 2),
            ]
        );
    }

    #[test]
    fn cluster_to_group_key_inverts_partition() {
        let groups: ClusterGroupsMap = [
            (GroupKey::new("canary", 0), set(&["c1", "c2"])),
            (GroupKey::new("", 1), set(&["c3"])),
        ]
        .into_iter()
        .collect();

        let lookup = groups.cluster_to_group_key();
        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup["c1"], GroupKey::new("canary", 0));
        assert_eq!(lookup["c2"], GroupKey::new("canary", 0));
        assert_eq!(lookup["c3"], GroupKey::new("", 1));
        assert_eq!(groups.clusters(), set(&["c1", "c2", "c3"]));
    }

    #[test]
    fn decision_selector_matching() {
        let placement = PlacementRef::new("default", "web");
        let d = PlacementDecision::for_group(
            &placement,
            "web-decision-1",
            &GroupKey::new("", 0),
            &["c1"],
        );
        assert!(d.matches(&placement.decision_selector()));
        assert!(!d.matches(&PlacementRef::new("default", "db").decision_selector()));
        assert!(d.matches(&LabelSelector::new()));
    }

    #[test]
    fn group_key_deserializes_partial() {
        let key: GroupKey = serde_json::from_str(r#"{"groupName":"canary"}"#).unwrap();
        assert_eq!(key, GroupKey::by_name("canary"));
        let key: GroupKey = serde_json::from_str(r#"{"groupIndex":3}"#).unwrap();
        assert_eq!(key, GroupKey::by_index(3));
    }
}
