//! Plan object matchers.
//!
//! `MatcherSpec` accumulates match criteria with a consuming builder API and
//! is frozen into an immutable `Matcher` by `build()`. A `Matcher` is cheap to
//! clone and can be shared across threads; sub-queries (`with_child` /
//! `with_parent`) are stored frozen.
//!
//! ```text
//! MatcherSpec::new()
//!     .with_model(["GoTo"])
//!     .pending()?
//!     .owned_by(["alice"])
//!     .with_child(MatcherSpec::new().running()?, "depends_on")
//!     .build()
//! ```
//!
//! ## Indexed queries
//!
//! A spec starts out fully indexed (unless it targets an explicit instance)
//! and loses that property, permanently, as soon as a criterion is added that
//! the index cannot answer: a predicate without an index key (positive or
//! negated) or any relation sub-query. A fully indexed matcher's `filter`
//! result is exact and does not need to be re-checked with `matches`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use plangraph::ObjectId;

use crate::error::{QueryError, Result};
use crate::predicate::{PredicateId, PredicateRegistry};

/// Which edges a relation sub-query looks at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationKey {
    /// Any relation the object currently takes part in.
    Any,
    Specific(String),
}

impl From<&str> for RelationKey {
    fn from(value: &str) -> Self {
        RelationKey::Specific(value.to_string())
    }
}

impl From<String> for RelationKey {
    fn from(value: String) -> Self {
        RelationKey::Specific(value)
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKey::Any => f.write_str("*"),
            RelationKey::Specific(name) => f.write_str(name),
        }
    }
}

/// Required edge data: every entry must be present, with the same value, on
/// the edge being traversed.
pub type EdgeOptions = BTreeMap<String, String>;

/// One `(sub-matcher, edge options)` pair of a relation clause.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub matcher: Matcher,
    pub options: Option<EdgeOptions>,
}

#[derive(Debug, Clone)]
pub(crate) struct MatcherData {
    pub(crate) registry: Arc<PredicateRegistry>,
    pub(crate) instance: Option<ObjectId>,
    pub(crate) models: Vec<String>,
    pub(crate) owners: Vec<String>,
    pub(crate) predicates: Vec<PredicateId>,
    pub(crate) neg_predicates: Vec<PredicateId>,
    /// Index keys of the index-backed entries of `predicates`.
    pub(crate) indexed_predicates: Vec<String>,
    /// Index keys of the index-backed entries of `neg_predicates`.
    pub(crate) indexed_neg_predicates: Vec<String>,
    pub(crate) parents: BTreeMap<RelationKey, Vec<SubQuery>>,
    pub(crate) children: BTreeMap<RelationKey, Vec<SubQuery>>,
    pub(crate) indexed_query: bool,
}

/// Query builder.
#[derive(Debug, Clone)]
pub struct MatcherSpec {
    data: MatcherData,
}

impl Default for MatcherSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl MatcherSpec {
    /// An empty spec over the standard predicate registry. Matches everything.
    pub fn new() -> Self {
        Self::with_registry(PredicateRegistry::standard())
    }

    pub fn with_registry(registry: Arc<PredicateRegistry>) -> Self {
        Self {
            data: MatcherData {
                registry,
                instance: None,
                models: Vec::new(),
                owners: Vec::new(),
                predicates: Vec::new(),
                neg_predicates: Vec::new(),
                indexed_predicates: Vec::new(),
                indexed_neg_predicates: Vec::new(),
                parents: BTreeMap::new(),
                children: BTreeMap::new(),
                indexed_query: true,
            },
        }
    }

    /// A spec that only matches `object`. Never fully indexed.
    pub fn for_instance(object: ObjectId) -> Self {
        Self::new().with_instance(object)
    }

    pub fn is_fully_indexed(&self) -> bool {
        self.data.indexed_query
    }

    /// Restrict the query to one exact object. The other criteria still apply.
    pub fn with_instance(mut self, object: ObjectId) -> Self {
        self.data.instance = Some(object);
        self.data.indexed_query = false;
        self
    }

    /// Set the models the object must fulfill, replacing any earlier set.
    pub fn with_model<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.models.clear();
        for model in models {
            let model = model.into();
            if !self.data.models.contains(&model) {
                self.data.models.push(model);
            }
        }
        self
    }

    /// Add peers to the allowed owner set.
    ///
    /// Matches objects whose owners are all in the set; see `self_owned` for
    /// the local plan instance.
    pub fn owned_by<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for peer in peers {
            let peer = peer.into();
            if !self.data.owners.contains(&peer) {
                self.data.owners.push(peer);
            }
        }
        self
    }

    /// Require predicate `name` to hold.
    pub fn with_predicate(mut self, name: &str) -> Result<Self> {
        let (id, index_key) = self
            .data
            .registry
            .lookup(name)
            .map(|(id, decl)| (id, decl.index_key.clone()))?;
        if self.data.neg_predicates.contains(&id) {
            return Err(QueryError::ContradictoryPredicate {
                name: name.to_string(),
            });
        }
        if self.data.predicates.contains(&id) {
            return Ok(self);
        }

        self.data.predicates.push(id);
        match index_key {
            Some(key) => self.data.indexed_predicates.push(key),
            None => self.data.indexed_query = false,
        }
        Ok(self)
    }

    /// Require predicate `name` not to hold.
    pub fn without_predicate(mut self, name: &str) -> Result<Self> {
        let (id, index_key) = self
            .data
            .registry
            .lookup(name)
            .map(|(id, decl)| (id, decl.index_key.clone()))?;
        if self.data.predicates.contains(&id) {
            return Err(QueryError::ContradictoryPredicate {
                name: name.to_string(),
            });
        }
        if self.data.neg_predicates.contains(&id) {
            return Ok(self);
        }

        self.data.neg_predicates.push(id);
        match index_key {
            Some(key) => self.data.indexed_neg_predicates.push(key),
            None => self.data.indexed_query = false,
        }
        Ok(self)
    }

    /// Require at least one child matching `query` in `relation`.
    pub fn with_child(self, query: impl Into<Matcher>, relation: impl Into<RelationKey>) -> Self {
        self.with_child_edge(query, relation, None)
    }

    /// Like `with_child`, additionally requiring the edge data to match `options`.
    pub fn with_child_edge(
        mut self,
        query: impl Into<Matcher>,
        relation: impl Into<RelationKey>,
        options: Option<EdgeOptions>,
    ) -> Self {
        self.data
            .children
            .entry(relation.into())
            .or_default()
            .push(SubQuery {
                matcher: query.into(),
                options,
            });
        self.data.indexed_query = false;
        self
    }

    /// Require at least one parent matching `query` in `relation`.
    pub fn with_parent(self, query: impl Into<Matcher>, relation: impl Into<RelationKey>) -> Self {
        self.with_parent_edge(query, relation, None)
    }

    /// Like `with_parent`, additionally requiring the edge data to match `options`.
    pub fn with_parent_edge(
        mut self,
        query: impl Into<Matcher>,
        relation: impl Into<RelationKey>,
        options: Option<EdgeOptions>,
    ) -> Self {
        self.data
            .parents
            .entry(relation.into())
            .or_default()
            .push(SubQuery {
                matcher: query.into(),
                options,
            });
        self.data.indexed_query = false;
        self
    }

    /// Freeze the spec.
    pub fn build(self) -> Matcher {
        Matcher {
            data: Arc::new(self.data),
        }
    }
}

macro_rules! predicate_sugar {
    ($($method:ident, $not_method:ident => $name:literal;)*) => {
        impl MatcherSpec {
            $(
                #[doc = concat!("Matches objects for which `", $name, "` holds.")]
                pub fn $method(self) -> Result<Self> {
                    self.with_predicate($name)
                }

                #[doc = concat!("Matches objects for which `", $name, "` does not hold.")]
                pub fn $not_method(self) -> Result<Self> {
                    self.without_predicate($name)
                }
            )*
        }
    };
}

predicate_sugar! {
    executable, not_executable => "executable";
    abstract_task, not_abstract_task => "abstract";
    pending, not_pending => "pending";
    starting, not_starting => "starting";
    running, not_running => "running";
    finishing, not_finishing => "finishing";
    finished, not_finished => "finished";
    success, not_success => "success";
    failed, not_failed => "failed";
    self_owned, not_self_owned => "self_owned";
    mission, not_mission => "mission";
    permanent, not_permanent => "permanent";
}

/// A frozen query.
#[derive(Debug, Clone)]
pub struct Matcher {
    pub(crate) data: Arc<MatcherData>,
}

impl From<MatcherSpec> for Matcher {
    fn from(spec: MatcherSpec) -> Self {
        spec.build()
    }
}

impl Matcher {
    /// Whether `filter` alone gives the exact answer.
    pub fn is_fully_indexed(&self) -> bool {
        self.data.indexed_query
    }

    pub fn instance(&self) -> Option<ObjectId> {
        self.data.instance
    }

    pub fn models(&self) -> &[String] {
        &self.data.models
    }

    pub fn owners(&self) -> &[String] {
        &self.data.owners
    }

    fn names(&self, ids: &[PredicateId]) -> Vec<&str> {
        ids.iter()
            .filter_map(|&id| self.data.registry.get(id))
            .map(|decl| decl.name.as_str())
            .collect()
    }

    pub fn predicates(&self) -> Vec<&str> {
        self.names(&self.data.predicates)
    }

    pub fn neg_predicates(&self) -> Vec<&str> {
        self.names(&self.data.neg_predicates)
    }

    pub fn indexed_predicates(&self) -> &[String] {
        &self.data.indexed_predicates
    }

    pub fn indexed_neg_predicates(&self) -> &[String] {
        &self.data.indexed_neg_predicates
    }

    pub fn parents(&self) -> &BTreeMap<RelationKey, Vec<SubQuery>> {
        &self.data.parents
    }

    pub fn children(&self) -> &BTreeMap<RelationKey, Vec<SubQuery>> {
        &self.data.children
    }

    pub fn registry(&self) -> &Arc<PredicateRegistry> {
        &self.data.registry
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = &self.data;
        let head = match (data.instance, data.models.as_slice()) {
            (Some(object), _) => format!("#{object}"),
            (None, [model]) => model.clone(),
            (None, models) => format!("({})", models.join(",")),
        };
        let mut parts = vec![head];
        parts.extend(self.predicates().into_iter().map(str::to_string));
        parts.extend(
            self.neg_predicates()
                .into_iter()
                .map(|name| format!("not_{name}")),
        );
        f.write_str(&parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_indexed_unless_instance_given() {
        assert!(MatcherSpec::new().is_fully_indexed());
        assert!(!MatcherSpec::for_instance(3).is_fully_indexed());
        assert!(!MatcherSpec::new().with_instance(3).is_fully_indexed());
    }

    #[test]
    fn indexed_predicates_keep_the_query_indexed() -> Result<()> {
        let spec = MatcherSpec::new().pending()?.not_failed()?.executable()?;
        assert!(spec.is_fully_indexed());

        let m = spec.build();
        assert_eq!(m.predicates(), vec!["pending", "executable"]);
        assert_eq!(m.neg_predicates(), vec!["failed"]);
        assert_eq!(m.indexed_predicates(), ["pending", "executable"]);
        assert_eq!(m.indexed_neg_predicates(), ["failed"]);
        Ok(())
    }

    #[test]
    fn non_indexed_predicates_are_absorbing() -> Result<()> {
        let spec = MatcherSpec::new().not_self_owned()?;
        assert!(!spec.is_fully_indexed());
        let spec = spec.running()?.with_model(["Task"]);
        assert!(!spec.is_fully_indexed());

        let m = spec.build();
        assert_eq!(m.indexed_predicates(), ["running"]);
        assert!(m.indexed_neg_predicates().is_empty());
        Ok(())
    }

    #[test]
    fn relation_clauses_clear_indexing() -> Result<()> {
        let sub = MatcherSpec::new().running()?;
        assert!(sub.is_fully_indexed());
        let spec = MatcherSpec::new().with_child(sub, "depends_on");
        assert!(!spec.is_fully_indexed());

        let spec = MatcherSpec::new().with_parent(MatcherSpec::new(), RelationKey::Any);
        assert!(!spec.is_fully_indexed());
        let m = spec.build();
        assert_eq!(m.parents().get(&RelationKey::Any).map(|v| v.len()), Some(1));
        Ok(())
    }

    #[test]
    fn contradictions_fail_in_both_orders() -> Result<()> {
        let err = MatcherSpec::new().running()?.not_running().unwrap_err();
        assert_eq!(
            err,
            QueryError::ContradictoryPredicate {
                name: "running".to_string()
            }
        );
        assert_eq!(err.to_string(), "trying to match (running & !running)");

        let err = MatcherSpec::new().not_self_owned()?.self_owned().unwrap_err();
        assert!(matches!(err, QueryError::ContradictoryPredicate { .. }));
        Ok(())
    }

    #[test]
    fn repeated_assertions_are_no_ops() -> Result<()> {
        let m = MatcherSpec::new().running()?.running()?.not_failed()?.not_failed()?.build();
        assert_eq!(m.predicates(), vec!["running"]);
        assert_eq!(m.indexed_predicates(), ["running"]);
        assert_eq!(m.neg_predicates(), vec!["failed"]);
        Ok(())
    }

    #[test]
    fn unknown_predicates_are_rejected() {
        let err = MatcherSpec::new().with_predicate("teleporting").unwrap_err();
        assert!(matches!(err, QueryError::UnknownPredicate { .. }));
    }

    #[test]
    fn models_replace_and_owners_accumulate() {
        let m = MatcherSpec::new()
            .with_model(["A", "B"])
            .with_model(["C"])
            .owned_by(["alice"])
            .owned_by(["bob", "alice"])
            .build();
        assert_eq!(m.models(), ["C"]);
        assert_eq!(m.owners(), ["alice", "bob"]);
    }

    #[test]
    fn description_lists_head_and_predicates() -> Result<()> {
        let m = MatcherSpec::new()
            .with_model(["GoTo"])
            .pending()?
            .not_self_owned()?
            .build();
        assert_eq!(m.to_string(), "GoTo.pending.not_self_owned");

        let m = MatcherSpec::new().with_model(["A", "B"]).build();
        assert_eq!(m.to_string(), "(A,B)");

        let m = MatcherSpec::for_instance(7).running()?.build();
        assert_eq!(m.to_string(), "#7.running");

        assert_eq!(MatcherSpec::new().build().to_string(), "()");
        Ok(())
    }
}
