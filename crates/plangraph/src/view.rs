//! Read-only contracts consumed by the query engine.
//!
//! `PlanView` is the per-object graph interface used for exact evaluation;
//! `IndexView` exposes the live identity-keyed sets used for index-backed
//! narrowing. Both take names (`&str`) rather than interned ids so that a
//! query can mention a model, peer or relation the plan has never seen: such
//! names simply resolve to "nothing matches".

use roaring::RoaringBitmap;

use crate::{EdgeInfo, ObjectId, ObjectState};

pub trait PlanView {
    /// Whether `object` is a live object of this plan.
    fn contains(&self, object: ObjectId) -> bool;

    /// All live objects.
    fn object_ids(&self) -> RoaringBitmap;

    /// Whether `object` fulfills every model in `models`.
    fn fulfills(&self, object: ObjectId, models: &[String]) -> bool;

    /// Peers owning `object`. Empty for unowned objects.
    fn owners(&self, object: ObjectId) -> Vec<String>;

    /// The peer name of this plan instance.
    fn local_peer(&self) -> &str;

    fn state(&self, object: ObjectId) -> Option<&ObjectState>;

    /// Relations in which `object` currently has at least one edge.
    fn relations(&self, object: ObjectId) -> Vec<String>;

    /// `(parent, edge data)` for every edge entering `object` in `relation`.
    fn parents(&self, object: ObjectId, relation: &str) -> Vec<(ObjectId, &EdgeInfo)>;

    /// `(child, edge data)` for every edge leaving `object` in `relation`.
    fn children(&self, object: ObjectId, relation: &str) -> Vec<(ObjectId, &EdgeInfo)>;
}

pub trait IndexView {
    /// Objects fulfilling `model`.
    fn by_model(&self, model: &str) -> Option<&RoaringBitmap>;

    /// Objects owned by `peer`. `None` when the index has no entry for the peer.
    fn by_owner(&self, peer: &str) -> Option<&RoaringBitmap>;

    /// Objects for which the indexed predicate `name` currently holds.
    fn by_predicate(&self, name: &str) -> Option<&RoaringBitmap>;
}
