//! Plan queries: declarative matchers over a `plangraph` plan.
//!
//! A query is assembled with [`MatcherSpec`] and frozen into a [`Matcher`].
//! A matcher can then be used two ways:
//!
//! - **Exact evaluation**: [`Matcher::matches`] decides whether a single object
//!   satisfies every clause (instance, models, relation sub-queries,
//!   predicates, owners).
//! - **Index filtering**: [`Matcher::filter`] narrows a candidate set using
//!   the plan's live identity-keyed sets. The result never loses a real match;
//!   it is exact when the matcher [is fully indexed](Matcher::is_fully_indexed).
//!
//! [`Matcher::execute`] combines both. Predicate names are resolved through a
//! [`PredicateRegistry`], which also records which predicates the index tracks.

pub mod error;
pub mod eval;
pub mod filter;
pub mod matcher;
pub mod predicate;
pub mod query;

pub use error::{QueryError, Result};
pub use eval::edge_options_match;
pub use matcher::{EdgeOptions, Matcher, MatcherSpec, RelationKey, SubQuery};
pub use predicate::{
    PredicateDecl, PredicateEval, PredicateId, PredicateRegistry, PredicateRegistryBuilder,
};
