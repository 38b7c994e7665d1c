//! PredicateRegistry: the query vocabulary of named boolean predicates.
//!
//! Each declaration binds a name to an evaluation function and, optionally, to
//! the index key under which the plan's `IndexView` keeps the predicate's live
//! true-set. `MatcherSpec` resolves predicate names through the registry, so
//! asserting a predicate is the same code path for every name; the registry is
//! the only place that knows whether a name is index-backed.
//!
//! The standard registry is built once per process. Applications that need
//! more predicates start from `PredicateRegistry::builder()`, which is
//! pre-populated with the standard table, and freeze the result into an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use plangraph::{indexed_predicate, ObjectId, ObjectState, PlanView, INDEXED_PREDICATES};

use crate::error::{QueryError, Result};

/// Position of a declaration inside its registry.
pub type PredicateId = usize;

#[derive(Clone, Copy)]
pub enum PredicateEval {
    /// Evaluated from the object's state; false for objects without one.
    State(fn(&ObjectState) -> bool),
    /// Evaluated against the whole plan view.
    View(fn(&dyn PlanView, ObjectId) -> bool),
}

impl std::fmt::Debug for PredicateEval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredicateEval::State(_) => f.write_str("State(..)"),
            PredicateEval::View(_) => f.write_str("View(..)"),
        }
    }
}

impl PredicateEval {
    pub fn evaluate(&self, plan: &dyn PlanView, object: ObjectId) -> bool {
        match self {
            PredicateEval::State(f) => plan.state(object).is_some_and(|s| f(s)),
            PredicateEval::View(f) => f(plan, object),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredicateDecl {
    pub name: String,
    /// Key of the index set tracking this predicate, if any.
    pub index_key: Option<String>,
    pub eval: PredicateEval,
}

impl PredicateDecl {
    pub fn is_indexed(&self) -> bool {
        self.index_key.is_some()
    }
}

/// Owned by nobody, or only by the local plan instance.
fn is_self_owned(plan: &dyn PlanView, object: ObjectId) -> bool {
    let local = plan.local_peer();
    plan.owners(object).iter().all(|peer| peer == local)
}

#[derive(Debug)]
pub struct PredicateRegistry {
    decls: Vec<PredicateDecl>,
    by_name: HashMap<String, PredicateId>,
}

impl PredicateRegistry {
    /// The shared standard registry.
    pub fn standard() -> Arc<PredicateRegistry> {
        static STANDARD: OnceLock<Arc<PredicateRegistry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Arc::new(PredicateRegistryBuilder::standard().into_registry()))
            .clone()
    }

    /// A builder pre-populated with the standard predicates.
    pub fn builder() -> PredicateRegistryBuilder {
        PredicateRegistryBuilder::standard()
    }

    pub fn id_of(&self, name: &str) -> Option<PredicateId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: PredicateId) -> Option<&PredicateDecl> {
        self.decls.get(id)
    }

    pub fn lookup(&self, name: &str) -> Result<(PredicateId, &PredicateDecl)> {
        self.id_of(name)
            .and_then(|id| self.decls.get(id).map(|decl| (id, decl)))
            .ok_or_else(|| QueryError::UnknownPredicate {
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredicateDecl> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Evaluate predicate `id` on `object`. Unknown ids never hold.
    pub fn evaluate(&self, id: PredicateId, plan: &dyn PlanView, object: ObjectId) -> bool {
        self.decls
            .get(id)
            .is_some_and(|decl| decl.eval.evaluate(plan, object))
    }
}

#[derive(Debug, Default)]
pub struct PredicateRegistryBuilder {
    decls: Vec<PredicateDecl>,
}

impl PredicateRegistryBuilder {
    /// A builder with no declarations at all.
    pub fn empty() -> Self {
        Self::default()
    }

    fn standard() -> Self {
        let mut decls: Vec<PredicateDecl> = INDEXED_PREDICATES
            .iter()
            .map(|p| PredicateDecl {
                name: p.name.to_string(),
                index_key: Some(p.name.to_string()),
                eval: PredicateEval::State(p.holds),
            })
            .collect();
        decls.push(PredicateDecl {
            name: "self_owned".to_string(),
            index_key: None,
            eval: PredicateEval::View(is_self_owned),
        });
        decls.push(PredicateDecl {
            name: "mission".to_string(),
            index_key: None,
            eval: PredicateEval::State(|s| s.mission),
        });
        decls.push(PredicateDecl {
            name: "permanent".to_string(),
            index_key: None,
            eval: PredicateEval::State(|s| s.permanent),
        });
        Self { decls }
    }

    /// Declare a predicate. `index_key` names the index set that tracks it;
    /// `None` makes the predicate evaluation-only.
    ///
    /// `index_key` must be one of the `INDEXED_PREDICATES` sets the plan
    /// index maintains.
    pub fn declare(
        mut self,
        name: impl Into<String>,
        index_key: Option<&str>,
        eval: PredicateEval,
    ) -> Result<Self> {
        let name = name.into();
        if self.decls.iter().any(|d| d.name == name) {
            return Err(QueryError::DuplicatePredicate { name });
        }
        if let Some(key) = index_key {
            if indexed_predicate(key).is_none() {
                return Err(QueryError::UnmaintainedIndexKey {
                    name,
                    key: key.to_string(),
                });
            }
        }
        self.decls.push(PredicateDecl {
            name,
            index_key: index_key.map(str::to_string),
            eval,
        });
        Ok(self)
    }

    fn into_registry(self) -> PredicateRegistry {
        let by_name = self
            .decls
            .iter()
            .enumerate()
            .map(|(id, decl)| (decl.name.clone(), id))
            .collect();
        PredicateRegistry {
            decls: self.decls,
            by_name,
        }
    }

    pub fn build(self) -> Arc<PredicateRegistry> {
        Arc::new(self.into_registry())
    }
}
