//! Placement decision clusters tracker.
//!
//! Owns the current partition of a placement's selected clusters into
//! decision groups. [`PlacementDecisionClustersTracker::refresh`] re-reads the
//! decisions, swaps in a new immutable snapshot and reports which clusters
//! were added or removed since the previous one. Queries resolve partial
//! group keys (name-only or index-only) against the current snapshot.
//!
//! Snapshots are never mutated in place: readers clone the `Arc` under the
//! read lock, so they always see a whole partition.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::error::{PlacementError, PlacementResult};
use crate::getter::PlacementDecisionGetter;
use crate::types::{
    ClusterGroupsMap, DECISION_GROUP_INDEX_LABEL, DECISION_GROUP_NAME_LABEL, GroupKey,
    PlacementDecision, PlacementRef,
};

/// Immutable view of one partition plus its name/index projections.
///
/// Every query against the same snapshot sees the same partition, so a
/// caller that needs several answers for one decision should query a single
/// snapshot rather than the tracker.
#[derive(Debug, Default)]
pub struct DecisionSnapshot {
    groups: ClusterGroupsMap,
    clusters: BTreeSet<String>,
    index_to_name: HashMap<i32, String>,
    name_to_indexes: HashMap<String, Vec<i32>>,
}

impl DecisionSnapshot {
    fn new(groups: ClusterGroupsMap) -> Self {
        let mut index_to_name = HashMap::new();
        let mut name_to_indexes: HashMap<String, Vec<i32>> = HashMap::new();
        // Keys iterate in ascending index order, so index lists come out sorted.
        for key in groups.ordered_group_keys() {
            index_to_name.insert(key.group_index, key.group_name.clone());
            name_to_indexes
                .entry(key.group_name)
                .or_default()
                .push(key.group_index);
        }
        Self {
            clusters: groups.clusters(),
            groups,
            index_to_name,
            name_to_indexes,
        }
    }

    /// See [`PlacementDecisionClustersTracker::fulfill_group_keys`].
    pub fn fulfill_group_keys(&self, group_keys: &[GroupKey]) -> Vec<GroupKey> {
        let mut fulfilled = Vec::new();
        for key in group_keys {
            if !key.group_name.is_empty() {
                if let Some(indexes) = self.name_to_indexes.get(&key.group_name) {
                    fulfilled.extend(
                        indexes
                            .iter()
                            .map(|&index| GroupKey::new(&key.group_name, index)),
                    );
                }
            } else if let Some(name) = self.index_to_name.get(&key.group_index) {
                fulfilled.push(GroupKey::new(name, key.group_index));
            }
        }
        fulfilled
    }

    /// Clusters in the given groups. An empty key list matches nothing.
    pub fn existing(&self, group_keys: &[GroupKey]) -> BTreeSet<String> {
        self.existing_cluster_groups(group_keys).clusters()
    }

    /// Clusters outside the given groups. An empty key list matches everything.
    pub fn existing_besides(&self, group_keys: &[GroupKey]) -> BTreeSet<String> {
        if group_keys.is_empty() {
            return self.clusters.clone();
        }
        self.existing_cluster_groups_besides(group_keys).clusters()
    }

    pub fn existing_cluster_groups(&self, group_keys: &[GroupKey]) -> ClusterGroupsMap {
        self.fulfill_group_keys(group_keys)
            .into_iter()
            .filter_map(|key| self.groups.get(&key).cloned().map(|c| (key, c)))
            .collect()
    }

    pub fn existing_cluster_groups_besides(&self, group_keys: &[GroupKey]) -> ClusterGroupsMap {
        let excluded: BTreeSet<GroupKey> =
            self.fulfill_group_keys(group_keys).into_iter().collect();
        self.groups
            .iter()
            .filter(|(key, _)| !excluded.contains(*key))
            .map(|(key, clusters)| (key.clone(), clusters.clone()))
            .collect()
    }
}

/// Tracks the clusters selected by one placement, partitioned into decision groups.
pub struct PlacementDecisionClustersTracker {
    placement: Option<PlacementRef>,
    getter: Option<Arc<dyn PlacementDecisionGetter>>,
    snapshot: RwLock<Arc<DecisionSnapshot>>,
    /// Held from fetch to swap so refreshes install snapshots in list order.
    refresh_lock: Mutex<()>,
}

impl PlacementDecisionClustersTracker {
    /// Create a tracker seeded with a flat set of already-scheduled clusters.
    ///
    /// The seed clusters are all placed in group index 0 with an empty name.
    pub fn new(
        placement: Option<PlacementRef>,
        getter: Option<Arc<dyn PlacementDecisionGetter>>,
        existing_clusters: BTreeSet<String>,
    ) -> Self {
        let mut groups = ClusterGroupsMap::new();
        groups.insert_group(GroupKey::by_index(0)).extend(existing_clusters);
        Self::with_groups(placement, getter, groups)
    }

    /// Create a tracker seeded with a full group partition.
    pub fn with_groups(
        placement: Option<PlacementRef>,
        getter: Option<Arc<dyn PlacementDecisionGetter>>,
        existing_groups: ClusterGroupsMap,
    ) -> Self {
        Self {
            placement,
            getter,
            snapshot: RwLock::new(Arc::new(DecisionSnapshot::new(existing_groups))),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Re-read the placement's decisions and replace the snapshot.
    ///
    /// Returns the clusters added and removed since the previous snapshot.
    /// On error the previous snapshot is kept. Concurrent refreshes run one
    /// at a time; readers are only blocked for the final swap.
    ///
    /// A cluster listed by decisions in more than one group stays in the
    /// first group it was listed under, and the later listings are ignored.
    pub fn refresh(&self) -> PlacementResult<(BTreeSet<String>, BTreeSet<String>)> {
        let (Some(placement), Some(getter)) = (&self.placement, &self.getter) else {
            return Ok((BTreeSet::new(), BTreeSet::new()));
        };
        let _refreshing = self.refresh_lock.lock().expect("tracker refresh lock");

        let decisions = getter
            .list(&placement.decision_selector(), &placement.namespace)
            .map_err(PlacementError::List)?;

        let mut groups = ClusterGroupsMap::new();
        let mut owners: HashMap<String, GroupKey> = HashMap::new();
        for decision in &decisions {
            let key = parse_group_key(decision)?;
            groups.insert_group(key.clone());
            for selected in &decision.decisions {
                let cluster = selected.cluster_name.as_str();
                let owner = owners
                    .entry(cluster.to_string())
                    .or_insert_with(|| key.clone());
                if *owner != key {
                    warn!(
                        placement = %placement.name,
                        cluster,
                        decision = %decision.name,
                        kept_group = ?owner,
                        "cluster listed in more than one decision group"
                    );
                    continue;
                }
                groups.insert(key.clone(), cluster);
            }
        }
        let next = Arc::new(DecisionSnapshot::new(groups));

        let mut snapshot = self.snapshot.write().expect("tracker lock");
        let added: BTreeSet<String> =
            next.clusters.difference(&snapshot.clusters).cloned().collect();
        let deleted: BTreeSet<String> =
            snapshot.clusters.difference(&next.clusters).cloned().collect();
        *snapshot = next;
        drop(snapshot);

        if added.is_empty() && deleted.is_empty() {
            debug!(placement = %placement.name, "placement decisions unchanged");
        } else {
            info!(
                placement = %placement.name,
                namespace = %placement.namespace,
                added = added.len(),
                deleted = deleted.len(),
                "placement decisions changed"
            );
        }
        Ok((added, deleted))
    }

    /// The current snapshot. It stays valid after later refreshes.
    pub fn snapshot(&self) -> Arc<DecisionSnapshot> {
        self.snapshot.read().expect("tracker lock").clone()
    }

    /// Resolve partial group keys against the current groups.
    ///
    /// A name-only key expands to every index with that name (ascending); an
    /// index-only key picks up the index's current name. Unknown keys are dropped.
    pub fn fulfill_group_keys(&self, group_keys: &[GroupKey]) -> Vec<GroupKey> {
        self.snapshot().fulfill_group_keys(group_keys)
    }

    /// Clusters in the given groups. An empty key list matches nothing.
    pub fn existing(&self, group_keys: &[GroupKey]) -> BTreeSet<String> {
        self.snapshot().existing(group_keys)
    }

    /// Clusters outside the given groups. An empty key list matches everything.
    pub fn existing_besides(&self, group_keys: &[GroupKey]) -> BTreeSet<String> {
        self.snapshot().existing_besides(group_keys)
    }

    /// The given groups with their clusters.
    pub fn existing_cluster_groups(&self, group_keys: &[GroupKey]) -> ClusterGroupsMap {
        self.snapshot().existing_cluster_groups(group_keys)
    }

    /// Every group except the given ones, with their clusters.
    pub fn existing_cluster_groups_besides(&self, group_keys: &[GroupKey]) -> ClusterGroupsMap {
        self.snapshot().existing_cluster_groups_besides(group_keys)
    }
}

fn parse_group_key(decision: &PlacementDecision) -> PlacementResult<GroupKey> {
    let group_name = decision
        .labels
        .get(DECISION_GROUP_NAME_LABEL)
        .cloned()
        .unwrap_or_default();
    let raw_index = decision
        .labels
        .get(DECISION_GROUP_INDEX_LABEL)
        .map(String::as_str)
        .unwrap_or_default();
    let group_index = raw_index
        .parse::<i32>()
        .map_err(|_| PlacementError::InvalidGroupIndex {
            decision: decision.name.clone(),
            value: raw_index.to_string(),
        })?;
    Ok(GroupKey {
        group_name,
        group_index,
    })
}
