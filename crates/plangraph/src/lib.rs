//! Plangraph: a live, mutable execution plan of tasks, events and typed relations.
//!
//! The plan is the substrate that plan queries run against. It owns:
//!
//! 1. **Objects**: tasks and events stored in an arena; the arena index is the
//!    object's identity (two objects that look alike are still distinct ids)
//! 2. **Relations**: typed, directed edges `parent -[relation]-> child` that
//!    carry per-edge data (`EdgeInfo`)
//! 3. **Models**: a declared hierarchy of structural classifications; an object
//!    fulfills its own model and every supermodel of it
//! 4. **Index**: per-model, per-owner and per-predicate Roaring bitmaps that are
//!    kept in sync with every mutation, so queries can narrow candidate sets
//!    without scanning the plan
//!
//! ## Module Organization
//!
//! - `model`: model hierarchy and fulfilled-model closure
//! - `state`: task/event lifecycle and the indexed predicate table
//! - `relations`: edge storage with forward/backward indexes
//! - `index`: the live identity-keyed sets consumed by the query engine
//! - `plan`: the `Plan` itself and its configuration
//! - `view`: read-only contracts (`PlanView`, `IndexView`) the query engine consumes

pub mod index;
pub mod model;
pub mod plan;
pub mod relations;
pub mod state;
pub mod view;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

pub use index::PlanIndex;
pub use model::ModelRegistry;
pub use plan::{Plan, PlanConfig};
pub use relations::{Edge, EdgeInfo, RelationStore};
pub use state::{
    indexed_predicate, IndexedPredicate, Lifecycle, ObjectKind, ObjectState, INDEXED_PREDICATES,
};
pub use view::{IndexView, PlanView};

/// Identity of a plan object: its arena index.
///
/// Ids are never reused after removal, so a stale id can't alias a newer object.
pub type ObjectId = u32;

// ============================================================================
// String Interning
// ============================================================================

/// Interned string ID for model, peer and relation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Name table shared by models, peers and relations.
///
/// Mutations intern names as they introduce them. Queries only ever call
/// `id_of`: a name that was never interned cannot be in any index set, so the
/// read path answers "nothing" for it without growing the table.
pub struct StringInterner {
    ids: DashMap<Box<str>, StrId>,
    names: DashMap<StrId, Box<str>>,
    next: AtomicU32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            names: DashMap::new(),
            next: AtomicU32::new(0),
        }
    }

    /// The id of `name`, allocating one the first time it is seen.
    pub fn intern(&self, name: &str) -> StrId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        // The entry guard serializes concurrent first sightings of a name.
        *self.ids.entry(name.into()).or_insert_with(|| {
            let id = StrId(self.next.fetch_add(1, Ordering::Relaxed));
            self.names.insert(id, name.into());
            id
        })
    }

    pub fn id_of(&self, name: &str) -> Option<StrId> {
        self.ids.get(name).map(|id| *id)
    }

    pub fn lookup(&self, id: StrId) -> Option<String> {
        self.names.get(&id).map(|name| name.value().to_string())
    }

    /// Number of distinct names interned so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
