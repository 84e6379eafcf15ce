//! Placement decision sources.
//!
//! The tracker reads decisions through [`PlacementDecisionGetter`]. In a
//! controller this is backed by a watch-fed cache; [`DecisionStore`] is the
//! in-memory implementation used for tests and simulations.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::types::{LabelSelector, PlacementDecision};

/// Read-only source of placement decisions.
pub trait PlacementDecisionGetter: Send + Sync {
    /// List the decisions in `namespace` whose labels match `selector`.
    fn list(
        &self,
        selector: &LabelSelector,
        namespace: &str,
    ) -> anyhow::Result<Vec<PlacementDecision>>;
}

/// Thread-safe in-memory decision store.
#[derive(Clone, Default)]
pub struct DecisionStore {
    decisions: Arc<RwLock<BTreeMap<(String, String), PlacementDecision>>>,
}

impl DecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a decision, keyed by namespace/name.
    pub fn upsert(&self, decision: PlacementDecision) {
        let key = (decision.namespace.clone(), decision.name.clone());
        let mut decisions = self.decisions.write().expect("decision store lock");
        debug!(namespace = %key.0, name = %key.1, "upserted placement decision");
        decisions.insert(key, decision);
    }

    /// Remove a decision. Returns whether it existed.
    pub fn remove(&self, namespace: &str, name: &str) -> bool {
        let mut decisions = self.decisions.write().expect("decision store lock");
        decisions
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.decisions.read().expect("decision store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlacementDecisionGetter for DecisionStore {
    fn list(
        &self,
        selector: &LabelSelector,
        namespace: &str,
    ) -> anyhow::Result<Vec<PlacementDecision>> {
        let decisions = self.decisions.read().expect("decision store lock");
        Ok(decisions
            .values()
            .filter(|d| d.namespace == namespace && d.matches(selector))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupKey, PlacementRef};

    fn decision(placement: &PlacementRef, name: &str, clusters: &[&str]) -> PlacementDecision {
        PlacementDecision::for_group(placement, name, &GroupKey::by_index(0), clusters)
    }

    #[test]
    fn list_filters_by_namespace_and_selector() {
        let store = DecisionStore::new();
        let web = PlacementRef::new("default", "web");
        let db = PlacementRef::new("default", "db");
        let other_ns = PlacementRef::new("prod", "web");

        store.upsert(decision(&web, "web-1", &["c1"]));
        store.upsert(decision(&db, "db-1", &["c2"]));
        store.upsert(decision(&other_ns, "web-1", &["c3"]));
        assert_eq!(store.len(), 3);

        let listed = store.list(&web.decision_selector(), "default").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "web-1");
        assert_eq!(listed[0].decisions[0].cluster_name, "c1");
    }

    #[test]
    fn upsert_replaces_and_remove_deletes() {
        let store = DecisionStore::new();
        let web = PlacementRef::new("default", "web");
        store.upsert(decision(&web, "web-1", &["c1"]));
        store.upsert(decision(&web, "web-1", &["c1", "c2"]));
        assert_eq!(store.len(), 1);

        let listed = store.list(&web.decision_selector(), "default").unwrap();
        assert_eq!(listed[0].decisions.len(), 2);

        assert!(store.remove("default", "web-1"));
        assert!(!store.remove("default", "web-1"));
        assert!(store.is_empty());
    }
}
