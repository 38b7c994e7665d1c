//! Exact evaluation of a matcher against one object.

use plangraph::{EdgeInfo, ObjectId, PlanView};

use crate::matcher::{EdgeOptions, Matcher, RelationKey, SubQuery};

/// Whether `info` carries every entry of `options` with the same value.
pub fn edge_options_match(options: &EdgeOptions, info: &EdgeInfo) -> bool {
    options
        .iter()
        .all(|(key, value)| info.get(key).is_some_and(|v| v == value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Parents,
    Children,
}

impl Matcher {
    /// Whether `object` satisfies every criterion of this matcher.
    ///
    /// Clauses are checked in a fixed order (instance, models, parents,
    /// children, predicates, owners) and evaluation stops at the first one
    /// that fails.
    pub fn matches(&self, plan: &dyn PlanView, object: ObjectId) -> bool {
        let data = &self.data;

        if data.instance.is_some_and(|instance| instance != object) {
            return false;
        }

        if !data.models.is_empty() && !plan.fulfills(object, &data.models) {
            return false;
        }

        for (relation, queries) in &data.parents {
            if !relation_clause(plan, object, relation, queries, Direction::Parents) {
                return false;
            }
        }

        for (relation, queries) in &data.children {
            if !relation_clause(plan, object, relation, queries, Direction::Children) {
                return false;
            }
        }

        if !data
            .predicates
            .iter()
            .all(|&id| data.registry.evaluate(id, plan, object))
        {
            return false;
        }
        if data
            .neg_predicates
            .iter()
            .any(|&id| data.registry.evaluate(id, plan, object))
        {
            return false;
        }

        if !data.owners.is_empty()
            && !plan
                .owners(object)
                .iter()
                .all(|peer| data.owners.contains(peer))
        {
            return false;
        }

        true
    }
}

/// One relation clause: every sub-query under `relation` must be satisfied by
/// at least one neighbour.
fn relation_clause(
    plan: &dyn PlanView,
    object: ObjectId,
    relation: &RelationKey,
    queries: &[SubQuery],
    direction: Direction,
) -> bool {
    match relation {
        RelationKey::Specific(name) => queries
            .iter()
            .all(|query| has_matching_neighbour(plan, object, name, query, direction)),
        RelationKey::Any => {
            let relations = plan.relations(object);
            if relations.is_empty() {
                return false;
            }
            queries.iter().all(|query| {
                relations
                    .iter()
                    .any(|name| has_matching_neighbour(plan, object, name, query, direction))
            })
        }
    }
}

fn has_matching_neighbour(
    plan: &dyn PlanView,
    object: ObjectId,
    relation: &str,
    query: &SubQuery,
    direction: Direction,
) -> bool {
    let neighbours = match direction {
        Direction::Parents => plan.parents(object, relation),
        Direction::Children => plan.children(object, relation),
    };
    neighbours.into_iter().any(|(other, info)| {
        query.matcher.matches(plan, other)
            && query
                .options
                .as_ref()
                .map_or(true, |options| edge_options_match(options, info))
    })
}
