//! Relation storage (edge list with indexes).
//!
//! Edges are directed `parent -[relation]-> child` and carry string key/value
//! data. Each relation graph is simple: there is at most one edge per
//! `(parent, relation, child)` triple, and re-adding it replaces its data.
//! Removed edges are tombstoned so edge ids stay stable.

use std::collections::BTreeMap;

use ahash::AHashMap;
use roaring::RoaringBitmap;

use crate::{ObjectId, StrId};

/// Per-edge data ("edge options"), e.g. `role = "trajectory_following"`.
pub type EdgeInfo = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub relation: StrId,
    pub parent: ObjectId,
    pub child: ObjectId,
    pub info: EdgeInfo,
}

#[derive(Debug, Default)]
pub struct RelationStore {
    edges: Vec<Option<Edge>>,
    /// Forward index: (parent, relation) -> edge IDs
    forward_index: AHashMap<(ObjectId, StrId), Vec<u32>>,
    /// Backward index: (child, relation) -> edge IDs
    backward_index: AHashMap<(ObjectId, StrId), Vec<u32>>,
    /// Type index: relation -> live edge IDs
    type_index: AHashMap<StrId, RoaringBitmap>,
    /// object -> relation -> number of incident edges
    incident: AHashMap<ObjectId, BTreeMap<StrId, usize>>,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live edges.
    pub fn len(&self) -> usize {
        self.type_index.values().map(|ids| ids.len() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live edges for a given relation.
    pub fn relation_count(&self, relation: StrId) -> usize {
        self.type_index
            .get(&relation)
            .map(|ids| ids.len() as usize)
            .unwrap_or(0)
    }

    fn edge_id(&self, parent: ObjectId, relation: StrId, child: ObjectId) -> Option<u32> {
        let ids = self.forward_index.get(&(parent, relation))?;
        ids.iter().copied().find(|&id| {
            self.edges
                .get(id as usize)
                .and_then(|e| e.as_ref())
                .is_some_and(|e| e.child == child)
        })
    }

    /// Add an edge, or replace the data of an existing one. Returns the edge ID.
    pub fn add(
        &mut self,
        relation: StrId,
        parent: ObjectId,
        child: ObjectId,
        info: EdgeInfo,
    ) -> u32 {
        if let Some(id) = self.edge_id(parent, relation, child) {
            if let Some(Some(edge)) = self.edges.get_mut(id as usize) {
                edge.info = info;
            }
            return id;
        }

        let id = self.edges.len() as u32;
        self.forward_index
            .entry((parent, relation))
            .or_default()
            .push(id);
        self.backward_index
            .entry((child, relation))
            .or_default()
            .push(id);
        self.type_index.entry(relation).or_default().insert(id);
        *self
            .incident
            .entry(parent)
            .or_default()
            .entry(relation)
            .or_insert(0) += 1;
        *self
            .incident
            .entry(child)
            .or_default()
            .entry(relation)
            .or_insert(0) += 1;

        self.edges.push(Some(Edge {
            relation,
            parent,
            child,
            info,
        }));
        id
    }

    fn release_incident(&mut self, object: ObjectId, relation: StrId) {
        let Some(per_rel) = self.incident.get_mut(&object) else {
            return;
        };
        if let Some(count) = per_rel.get_mut(&relation) {
            *count -= 1;
            if *count == 0 {
                per_rel.remove(&relation);
            }
        }
        if per_rel.is_empty() {
            self.incident.remove(&object);
        }
    }

    fn remove_by_id(&mut self, id: u32) -> Option<Edge> {
        let edge = self.edges.get_mut(id as usize)?.take()?;
        if let Some(ids) = self.forward_index.get_mut(&(edge.parent, edge.relation)) {
            ids.retain(|&e| e != id);
            if ids.is_empty() {
                self.forward_index.remove(&(edge.parent, edge.relation));
            }
        }
        if let Some(ids) = self.backward_index.get_mut(&(edge.child, edge.relation)) {
            ids.retain(|&e| e != id);
            if ids.is_empty() {
                self.backward_index.remove(&(edge.child, edge.relation));
            }
        }
        if let Some(ids) = self.type_index.get_mut(&edge.relation) {
            ids.remove(id);
        }
        self.release_incident(edge.parent, edge.relation);
        self.release_incident(edge.child, edge.relation);
        Some(edge)
    }

    /// Remove `parent -[relation]-> child`, returning the removed edge.
    pub fn remove(&mut self, parent: ObjectId, relation: StrId, child: ObjectId) -> Option<Edge> {
        let id = self.edge_id(parent, relation, child)?;
        self.remove_by_id(id)
    }

    /// Drop every edge incident to `object`. Returns the removed edges.
    pub fn remove_object(&mut self, object: ObjectId) -> Vec<Edge> {
        let relations: Vec<StrId> = self.relations_of(object);
        let mut ids: Vec<u32> = Vec::new();
        for relation in relations {
            if let Some(out) = self.forward_index.get(&(object, relation)) {
                ids.extend(out.iter().copied());
            }
            if let Some(inc) = self.backward_index.get(&(object, relation)) {
                ids.extend(inc.iter().copied());
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.remove_by_id(id))
            .collect()
    }

    fn resolve(&self, ids: Option<&Vec<u32>>) -> Vec<&Edge> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|&id| self.edges.get(id as usize).and_then(|e| e.as_ref()))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Edges leaving `parent` in `relation`.
    pub fn children(&self, parent: ObjectId, relation: StrId) -> Vec<&Edge> {
        self.resolve(self.forward_index.get(&(parent, relation)))
    }

    /// Edges entering `child` in `relation`.
    pub fn parents(&self, child: ObjectId, relation: StrId) -> Vec<&Edge> {
        self.resolve(self.backward_index.get(&(child, relation)))
    }

    /// Relations in which `object` has at least one incident edge, sorted.
    pub fn relations_of(&self, object: ObjectId) -> Vec<StrId> {
        self.incident
            .get(&object)
            .map(|per_rel| per_rel.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The edge `parent -[relation]-> child`, if present.
    pub fn edge(&self, parent: ObjectId, relation: StrId, child: ObjectId) -> Option<&Edge> {
        let id = self.edge_id(parent, relation, child)?;
        self.edges.get(id as usize)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(value: &str) -> EdgeInfo {
        EdgeInfo::from([("role".to_string(), value.to_string())])
    }

    #[test]
    fn re_adding_an_edge_replaces_its_info() {
        let dep = StrId::new(0);
        let mut store = RelationStore::new();
        let a = store.add(dep, 1, 2, role("x"));
        let b = store.add(dep, 1, 2, role("y"));
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.edge(1, dep, 2).map(|e| &e.info), Some(&role("y")));
    }

    #[test]
    fn incident_relations_follow_removal() {
        let (dep, planned) = (StrId::new(0), StrId::new(1));
        let mut store = RelationStore::new();
        store.add(dep, 1, 2, EdgeInfo::new());
        store.add(planned, 3, 1, EdgeInfo::new());

        assert_eq!(store.relations_of(1), vec![dep, planned]);
        assert_eq!(store.parents(2, dep).len(), 1);
        assert_eq!(store.children(3, planned)[0].child, 1);

        assert!(store.remove(1, dep, 2).is_some());
        assert_eq!(store.relations_of(1), vec![planned]);
        assert!(store.relations_of(2).is_empty());
        assert!(store.remove(1, dep, 2).is_none());
    }

    #[test]
    fn remove_object_drops_every_incident_edge() {
        let dep = StrId::new(0);
        let mut store = RelationStore::new();
        store.add(dep, 1, 2, EdgeInfo::new());
        store.add(dep, 2, 3, EdgeInfo::new());
        store.add(dep, 4, 3, EdgeInfo::new());

        let removed = store.remove_object(2);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.relations_of(1).is_empty());
        assert_eq!(store.parents(3, dep).len(), 1);
        assert_eq!(store.relation_count(dep), 1);
    }
}
