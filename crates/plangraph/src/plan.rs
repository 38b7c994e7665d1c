//! The plan: an arena of tasks and events linked by typed relations.
//!
//! Every mutation goes through `Plan` so that the `PlanIndex` stays in sync
//! with the objects' models, owners and state.

use anyhow::{anyhow, Result};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::index::PlanIndex;
use crate::model::ModelRegistry;
use crate::relations::{EdgeInfo, RelationStore};
use crate::state::{Lifecycle, ObjectKind, ObjectState};
use crate::view::{IndexView, PlanView};
use crate::{ObjectId, StrId, StringInterner};

fn default_local_peer() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Peer name of this plan instance; objects owned only by it (or by
    /// nobody) are self-owned.
    #[serde(default = "default_local_peer")]
    pub local_peer: String,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            local_peer: default_local_peer(),
        }
    }
}

impl PlanConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone)]
struct PlanObject {
    model: StrId,
    /// Sorted, deduplicated.
    owners: Vec<StrId>,
    state: ObjectState,
}

pub struct Plan {
    config: PlanConfig,
    interner: StringInterner,
    models: ModelRegistry,
    objects: Vec<Option<PlanObject>>,
    live: RoaringBitmap,
    edges: RelationStore,
    index: PlanIndex,
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl Plan {
    pub fn new() -> Self {
        Self::with_config(PlanConfig::default())
    }

    pub fn with_config(config: PlanConfig) -> Self {
        Self {
            config,
            interner: StringInterner::new(),
            models: ModelRegistry::new(),
            objects: Vec::new(),
            live: RoaringBitmap::new(),
            edges: RelationStore::new(),
            index: PlanIndex::new(),
        }
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn index(&self) -> &PlanIndex {
        &self.index
    }

    /// Read access to the edge store. Edges change only through `Plan`.
    pub fn edges(&self) -> &RelationStore {
        &self.edges
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn object(&self, id: ObjectId) -> Result<&PlanObject> {
        self.objects
            .get(id as usize)
            .and_then(|o| o.as_ref())
            .ok_or_else(|| anyhow!("unknown object id {id}"))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut PlanObject> {
        self.objects
            .get_mut(id as usize)
            .and_then(|o| o.as_mut())
            .ok_or_else(|| anyhow!("unknown object id {id}"))
    }

    /// Declare `model` as fulfilling `supermodels`.
    ///
    /// Existing instances of `model` (and of its submodels) are registered
    /// under the newly reachable supermodels.
    pub fn declare_model(&mut self, model: &str, supermodels: &[&str]) {
        let model_id = self.interner.intern(model);
        let sup_ids: Vec<StrId> = supermodels
            .iter()
            .map(|s| self.interner.intern(s))
            .collect();
        self.models.declare(model_id, &sup_ids);

        for id in self.live.iter() {
            let Some(Some(obj)) = self.objects.get(id as usize) else {
                continue;
            };
            if !self.models.fulfills(obj.model, model_id) {
                continue;
            }
            for fulfilled in self.models.fulfilled(obj.model) {
                self.index.add_model(id, fulfilled);
            }
        }
        tracing::debug!(model, ?supermodels, "declared model");
    }

    /// Add an object of `model`, owned by `owners`, in the given state.
    pub fn add_object(&mut self, model: &str, owners: &[&str], state: ObjectState) -> ObjectId {
        let id = self.objects.len() as ObjectId;
        let model_id = self.interner.intern(model);
        let mut owner_ids: Vec<StrId> = owners.iter().map(|p| self.interner.intern(p)).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();

        let fulfilled = self.models.fulfilled(model_id);
        self.index.add(id, &fulfilled, &owner_ids, &state);
        self.objects.push(Some(PlanObject {
            model: model_id,
            owners: owner_ids,
            state,
        }));
        self.live.insert(id);
        tracing::debug!(id, model, "added plan object");
        id
    }

    /// Add an unowned task.
    pub fn add_task(&mut self, model: &str, state: ObjectState) -> ObjectId {
        self.add_object(model, &[], state)
    }

    /// Add an unowned, not yet emitted event.
    pub fn add_event(&mut self, model: &str) -> ObjectId {
        self.add_object(model, &[], ObjectState::event())
    }

    /// Remove an object and every edge touching it.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        self.object(id)?;
        let removed_edges = self.edges.remove_object(id);
        self.index.remove(id);
        self.objects[id as usize] = None;
        self.live.remove(id);
        tracing::debug!(id, edges = removed_edges.len(), "removed plan object");
        Ok(())
    }

    /// Add `parent -[relation]-> child`, or replace its edge data.
    pub fn add_relation(
        &mut self,
        relation: &str,
        parent: ObjectId,
        child: ObjectId,
        info: EdgeInfo,
    ) -> Result<u32> {
        self.object(parent)?;
        self.object(child)?;
        let relation_id = self.interner.intern(relation);
        let edge = self.edges.add(relation_id, parent, child, info);
        tracing::trace!(relation, parent, child, "added edge");
        Ok(edge)
    }

    /// Remove `parent -[relation]-> child`. Returns whether an edge existed.
    pub fn remove_relation(
        &mut self,
        relation: &str,
        parent: ObjectId,
        child: ObjectId,
    ) -> Result<bool> {
        self.object(parent)?;
        self.object(child)?;
        let Some(relation_id) = self.interner.id_of(relation) else {
            return Ok(false);
        };
        Ok(self.edges.remove(parent, relation_id, child).is_some())
    }

    /// Replace an object's state and re-evaluate its indexed predicates.
    pub fn set_state(&mut self, id: ObjectId, state: ObjectState) -> Result<()> {
        let obj = self.object_mut(id)?;
        obj.state = state;
        let state = obj.state.clone();
        self.index.refresh_predicates(id, &state);
        Ok(())
    }

    pub fn set_lifecycle(&mut self, id: ObjectId, lifecycle: Lifecycle) -> Result<()> {
        let state = self.object(id)?.state.clone().with_lifecycle(lifecycle);
        self.set_state(id, state)?;
        tracing::debug!(id, ?lifecycle, "lifecycle changed");
        Ok(())
    }

    /// Emit an event.
    pub fn emit(&mut self, event: ObjectId) -> Result<()> {
        let obj = self.object(event)?;
        if obj.state.kind != ObjectKind::Event {
            return Err(anyhow!("object {event} is not an event"));
        }
        self.set_lifecycle(event, Lifecycle::Succeeded)
    }

    pub fn add_owner(&mut self, id: ObjectId, peer: &str) -> Result<()> {
        let peer_id = self.interner.intern(peer);
        let obj = self.object_mut(id)?;
        if let Err(pos) = obj.owners.binary_search(&peer_id) {
            obj.owners.insert(pos, peer_id);
        }
        self.index.add_owner(id, peer_id);
        Ok(())
    }

    pub fn remove_owner(&mut self, id: ObjectId, peer: &str) -> Result<()> {
        self.object(id)?;
        let Some(peer_id) = self.interner.id_of(peer) else {
            return Ok(());
        };
        let obj = self.object_mut(id)?;
        obj.owners.retain(|&p| p != peer_id);
        self.index.remove_owner(id, peer_id);
        Ok(())
    }

    /// Data of the edge `parent -[relation]-> child`, if it exists.
    pub fn edge_info(&self, relation: &str, parent: ObjectId, child: ObjectId) -> Option<&EdgeInfo> {
        let relation_id = self.interner.id_of(relation)?;
        self.edges.edge(parent, relation_id, child).map(|e| &e.info)
    }

    fn names(&self, ids: &[StrId]) -> Vec<String> {
        ids.iter().filter_map(|&id| self.interner.lookup(id)).collect()
    }
}

impl PlanView for Plan {
    fn contains(&self, object: ObjectId) -> bool {
        self.live.contains(object)
    }

    fn object_ids(&self) -> RoaringBitmap {
        self.live.clone()
    }

    fn fulfills(&self, object: ObjectId, models: &[String]) -> bool {
        let Ok(obj) = self.object(object) else {
            return false;
        };
        models.iter().all(|name| {
            self.interner
                .id_of(name)
                .is_some_and(|required| self.models.fulfills(obj.model, required))
        })
    }

    fn owners(&self, object: ObjectId) -> Vec<String> {
        self.object(object)
            .map(|obj| self.names(&obj.owners))
            .unwrap_or_default()
    }

    fn local_peer(&self) -> &str {
        &self.config.local_peer
    }

    fn state(&self, object: ObjectId) -> Option<&ObjectState> {
        self.object(object).ok().map(|obj| &obj.state)
    }

    fn relations(&self, object: ObjectId) -> Vec<String> {
        self.names(&self.edges.relations_of(object))
    }

    fn parents(&self, object: ObjectId, relation: &str) -> Vec<(ObjectId, &EdgeInfo)> {
        let Some(relation_id) = self.interner.id_of(relation) else {
            return Vec::new();
        };
        self.edges
            .parents(object, relation_id)
            .into_iter()
            .map(|e| (e.parent, &e.info))
            .collect()
    }

    fn children(&self, object: ObjectId, relation: &str) -> Vec<(ObjectId, &EdgeInfo)> {
        let Some(relation_id) = self.interner.id_of(relation) else {
            return Vec::new();
        };
        self.edges
            .children(object, relation_id)
            .into_iter()
            .map(|e| (e.child, &e.info))
            .collect()
    }
}

impl IndexView for Plan {
    fn by_model(&self, model: &str) -> Option<&RoaringBitmap> {
        self.index.model_set(self.interner.id_of(model)?)
    }

    fn by_owner(&self, peer: &str) -> Option<&RoaringBitmap> {
        self.index.owner_set(self.interner.id_of(peer)?)
    }

    fn by_predicate(&self, name: &str) -> Option<&RoaringBitmap> {
        self.index.predicate_set(name)
    }
}
