//! PlanIndex: live identity-keyed object sets.
//!
//! The index maintains, for the current plan contents:
//! - `model -> {objects fulfilling it}`
//! - `owner peer -> {objects owned by it}`
//! - `indexed predicate -> {objects for which it holds}`
//!
//! Sets are Roaring bitmaps of object ids. Ids are arena indexes, so set
//! membership is object identity, not structural equality.
//!
//! The plan calls into this module on every mutation; the index itself never
//! looks at the plan. Emptied sets are kept as empty entries, so a model that
//! once had instances still answers with a size-0 set.

use ahash::AHashMap;
use roaring::RoaringBitmap;

use crate::state::INDEXED_PREDICATES;
use crate::{ObjectId, ObjectState, StrId};

#[derive(Debug, Clone)]
pub struct PlanIndex {
    by_model: AHashMap<StrId, RoaringBitmap>,
    by_owner: AHashMap<StrId, RoaringBitmap>,
    by_predicate: AHashMap<&'static str, RoaringBitmap>,
}

impl Default for PlanIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanIndex {
    pub fn new() -> Self {
        let by_predicate = INDEXED_PREDICATES
            .iter()
            .map(|p| (p.name, RoaringBitmap::new()))
            .collect();
        Self {
            by_model: AHashMap::new(),
            by_owner: AHashMap::new(),
            by_predicate,
        }
    }

    /// Register a new object under its fulfilled models, owners and every
    /// indexed predicate that holds for `state`.
    pub fn add(
        &mut self,
        object: ObjectId,
        fulfilled_models: &[StrId],
        owners: &[StrId],
        state: &ObjectState,
    ) {
        for &model in fulfilled_models {
            self.add_model(object, model);
        }
        for &peer in owners {
            self.add_owner(object, peer);
        }
        self.refresh_predicates(object, state);
    }

    /// Remove an object from every set it belongs to.
    pub fn remove(&mut self, object: ObjectId) {
        for set in self.by_model.values_mut() {
            set.remove(object);
        }
        for set in self.by_owner.values_mut() {
            set.remove(object);
        }
        for set in self.by_predicate.values_mut() {
            set.remove(object);
        }
    }

    pub fn add_model(&mut self, object: ObjectId, model: StrId) {
        self.by_model.entry(model).or_default().insert(object);
    }

    pub fn add_owner(&mut self, object: ObjectId, peer: StrId) {
        self.by_owner.entry(peer).or_default().insert(object);
    }

    pub fn remove_owner(&mut self, object: ObjectId, peer: StrId) {
        if let Some(set) = self.by_owner.get_mut(&peer) {
            set.remove(object);
        }
    }

    /// Re-evaluate every indexed predicate for `object` after a state change.
    pub fn refresh_predicates(&mut self, object: ObjectId, state: &ObjectState) {
        for predicate in INDEXED_PREDICATES {
            let set = self.by_predicate.entry(predicate.name).or_default();
            let flipped = if (predicate.holds)(state) {
                set.insert(object)
            } else {
                set.remove(object)
            };
            if flipped {
                tracing::trace!(object, predicate = predicate.name, "indexed predicate flipped");
            }
        }
    }

    pub fn model_set(&self, model: StrId) -> Option<&RoaringBitmap> {
        self.by_model.get(&model)
    }

    pub fn owner_set(&self, peer: StrId) -> Option<&RoaringBitmap> {
        self.by_owner.get(&peer)
    }

    pub fn predicate_set(&self, name: &str) -> Option<&RoaringBitmap> {
        self.by_predicate.get(name)
    }
}
