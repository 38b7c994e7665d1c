//! Random-plan checks of `filter` and `execute` against brute-force `matches` scans.
//!
//! `execute` is compared with generated owner clauses included. Raw `filter`
//! answers an owner clause with the objects owned by *every* listed peer,
//! while evaluation accepts any owner subset (unowned objects included), so
//! the `filter` properties are checked on the owner-free part of each query.

use plangraph::{EdgeInfo, Lifecycle, ObjectState, Plan, PlanView};
use plangraph_query::{Matcher, MatcherSpec, RelationKey};
use proptest::prelude::*;
use roaring::RoaringBitmap;

const MODELS: &[&str] = &["Task", "Navigation", "GoTo", "Planning"];
const PEERS: &[&str] = &["local", "alice"];
/// Peers a query may name; "bob" never owns anything.
const QUERY_PEERS: &[&str] = &["local", "alice", "bob"];
const RELATIONS: &[&str] = &["depends_on", "planned_by"];
const ROLES: &[&str] = &["x", "y"];
const PREDICATES: &[&str] = &[
    "executable",
    "abstract",
    "pending",
    "starting",
    "running",
    "finishing",
    "finished",
    "success",
    "failed",
    "self_owned",
    "mission",
    "permanent",
];
const LIFECYCLES: &[Lifecycle] = &[
    Lifecycle::Pending,
    Lifecycle::Starting,
    Lifecycle::Running,
    Lifecycle::Finishing,
    Lifecycle::Succeeded,
    Lifecycle::Failed,
];

#[derive(Debug, Clone)]
enum Op {
    Add {
        model: usize,
        owners: Vec<usize>,
        abstract_task: bool,
        mission: bool,
    },
    Remove(usize),
    SetLifecycle(usize, usize),
    Relate {
        relation: usize,
        parent: usize,
        child: usize,
        role: Option<usize>,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (
            0usize..MODELS.len(),
            prop::collection::vec(0usize..PEERS.len(), 0..=2),
            any::<bool>(),
            any::<bool>()
        )
            .prop_map(|(model, owners, abstract_task, mission)| Op::Add {
                model,
                owners,
                abstract_task,
                mission
            }),
        1 => (0usize..24).prop_map(Op::Remove),
        2 => (0usize..24, 0usize..LIFECYCLES.len()).prop_map(|(o, l)| Op::SetLifecycle(o, l)),
        2 => (
            0usize..RELATIONS.len(),
            0usize..24,
            0usize..24,
            prop::option::of(0usize..ROLES.len())
        )
            .prop_map(|(relation, parent, child, role)| Op::Relate {
                relation,
                parent,
                child,
                role
            }),
    ]
}

fn build_plan(ops: &[Op]) -> Plan {
    let mut plan = Plan::new();
    plan.declare_model("Navigation", &["Task"]);
    plan.declare_model("GoTo", &["Navigation"]);
    plan.declare_model("Planning", &["Task"]);

    let mut ids: Vec<u32> = Vec::new();
    for op in ops {
        match op {
            Op::Add {
                model,
                owners,
                abstract_task,
                mission,
            } => {
                let owners: Vec<&str> = owners.iter().map(|&p| PEERS[p]).collect();
                let mut state = ObjectState::task();
                if *abstract_task {
                    state = state.abstract_placeholder();
                }
                state.mission = *mission;
                ids.push(plan.add_object(MODELS[*model], &owners, state));
            }
            // Operations on removed or missing objects fail and are ignored.
            Op::Remove(o) => {
                if let Some(&id) = ids.get(*o) {
                    let _ = plan.remove_object(id);
                }
            }
            Op::SetLifecycle(o, l) => {
                if let Some(&id) = ids.get(*o) {
                    let _ = plan.set_lifecycle(id, LIFECYCLES[*l]);
                }
            }
            Op::Relate {
                relation,
                parent,
                child,
                role,
            } => {
                if let (Some(&parent), Some(&child)) = (ids.get(*parent), ids.get(*child)) {
                    let mut info = EdgeInfo::new();
                    if let Some(role) = role {
                        info.insert("role".to_string(), ROLES[*role].to_string());
                    }
                    let _ = plan.add_relation(RELATIONS[*relation], parent, child, info);
                }
            }
        }
    }
    plan
}

/// 0: not mentioned, 1: asserted, 2: negated.
type Polarities = Vec<u8>;

#[derive(Debug, Clone)]
struct RelationClause {
    child: bool,
    relation: Option<usize>,
    role: Option<usize>,
    sub: Polarities,
}

#[derive(Debug, Clone)]
struct QueryShape {
    models: Vec<usize>,
    owners: Vec<usize>,
    predicates: Polarities,
    relations: Vec<RelationClause>,
}

fn polarities(mentioned: u8) -> impl Strategy<Value = Polarities> {
    // Weighted towards "not mentioned" so that most queries stay selective
    // but non-empty.
    prop::collection::vec(
        prop_oneof![u32::from(mentioned) => Just(0u8), 1 => Just(1u8), 1 => Just(2u8)],
        PREDICATES.len(),
    )
}

fn clause_strategy() -> impl Strategy<Value = RelationClause> {
    (
        any::<bool>(),
        prop::option::of(0usize..RELATIONS.len()),
        prop::option::of(0usize..ROLES.len()),
        polarities(10),
    )
        .prop_map(|(child, relation, role, sub)| RelationClause {
            child,
            relation,
            role,
            sub,
        })
}

fn shape_strategy() -> impl Strategy<Value = QueryShape> {
    (
        prop::collection::vec(0usize..MODELS.len(), 0..=2),
        prop::collection::vec(0usize..QUERY_PEERS.len(), 0..=2),
        polarities(6),
        prop::collection::vec(clause_strategy(), 0..=2),
    )
        .prop_map(|(models, owners, predicates, relations)| QueryShape {
            models,
            owners,
            predicates,
            relations,
        })
}

fn apply_predicates(mut spec: MatcherSpec, polarities: &[u8]) -> MatcherSpec {
    for (name, polarity) in PREDICATES.iter().zip(polarities) {
        spec = match polarity {
            1 => spec.with_predicate(name),
            2 => spec.without_predicate(name),
            _ => Ok(spec),
        }
        .expect("each predicate is mentioned at most once");
    }
    spec
}

fn build_matcher(shape: &QueryShape) -> Matcher {
    let mut spec = MatcherSpec::new();
    if !shape.models.is_empty() {
        spec = spec.with_model(shape.models.iter().map(|&m| MODELS[m]));
    }
    spec = spec.owned_by(shape.owners.iter().map(|&p| QUERY_PEERS[p]));
    spec = apply_predicates(spec, &shape.predicates);

    for clause in &shape.relations {
        let sub = apply_predicates(MatcherSpec::new(), &clause.sub);
        let relation = match clause.relation {
            Some(r) => RelationKey::from(RELATIONS[r]),
            None => RelationKey::Any,
        };
        let options = clause
            .role
            .map(|r| [("role".to_string(), ROLES[r].to_string())].into_iter().collect());
        spec = if clause.child {
            spec.with_child_edge(sub, relation, options)
        } else {
            spec.with_parent_edge(sub, relation, options)
        };
    }
    spec.build()
}

fn brute_force(plan: &Plan, matcher: &Matcher, universe: &RoaringBitmap) -> RoaringBitmap {
    universe
        .iter()
        .filter(|&object| matcher.matches(plan, object))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 192, .. ProptestConfig::default() })]

    #[test]
    fn filter_never_drops_a_match(
        ops in prop::collection::vec(op_strategy(), 0..48),
        shape in shape_strategy(),
    ) {
        let plan = build_plan(&ops);
        let matcher = build_matcher(&QueryShape { owners: Vec::new(), ..shape });

        for object in plan.object_ids().iter() {
            if matcher.matches(&plan, object) {
                let single: RoaringBitmap = [object].into_iter().collect();
                prop_assert!(matcher.filter(&single, &plan, true).contains(object));
                prop_assert!(matcher.filter(&single, &plan, false).contains(object));
            }
        }
    }

    #[test]
    fn filter_over_live_set_is_a_superset_of_the_matches(
        ops in prop::collection::vec(op_strategy(), 0..48),
        shape in shape_strategy(),
    ) {
        let plan = build_plan(&ops);
        let matcher = build_matcher(&QueryShape { owners: Vec::new(), ..shape });
        let live = plan.object_ids();

        let expected = brute_force(&plan, &matcher, &live);
        let filtered = matcher.filter(&live, &plan, true);
        prop_assert!(expected.is_subset(&filtered));
        prop_assert!(filtered.is_subset(&live));

        if matcher.is_fully_indexed() {
            prop_assert_eq!(&filtered, &expected);
        }
    }

    #[test]
    fn execute_equals_a_full_scan(
        ops in prop::collection::vec(op_strategy(), 0..48),
        shape in shape_strategy(),
    ) {
        let plan = build_plan(&ops);
        let matcher = build_matcher(&shape);
        let expected = brute_force(&plan, &matcher, &plan.object_ids());
        prop_assert_eq!(matcher.execute(&plan, &plan), expected);
    }

    #[test]
    fn fully_indexed_filter_is_exact_on_partial_universes(
        ops in prop::collection::vec(op_strategy(), 0..48),
        shape in shape_strategy(),
        keep in prop::collection::vec(any::<bool>(), 48),
    ) {
        let plan = build_plan(&ops);
        let shape = QueryShape { owners: Vec::new(), relations: Vec::new(), ..shape };
        let matcher = build_matcher(&shape);
        prop_assume!(matcher.is_fully_indexed());

        let universe: RoaringBitmap = plan
            .object_ids()
            .iter()
            .filter(|&object| keep.get(object as usize).copied().unwrap_or(true))
            .collect();
        prop_assert_eq!(
            matcher.filter(&universe, &plan, false),
            brute_force(&plan, &matcher, &universe)
        );
    }

    #[test]
    fn matches_is_idempotent(
        ops in prop::collection::vec(op_strategy(), 0..48),
        shape in shape_strategy(),
    ) {
        let plan = build_plan(&ops);
        let matcher = build_matcher(&shape);
        for object in plan.object_ids().iter() {
            prop_assert_eq!(matcher.matches(&plan, object), matcher.matches(&plan, object));
        }
    }
}
