use thiserror::Error;

/// Errors raised while building a query.
///
/// Evaluation and filtering never fail; every failure is a precondition
/// violation reported to the builder's caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("trying to match ({name} & !{name})")]
    ContradictoryPredicate { name: String },

    #[error("unknown predicate `{name}`")]
    UnknownPredicate { name: String },

    #[error("predicate `{name}` is already declared")]
    DuplicatePredicate { name: String },

    #[error("predicate `{name}` uses index key `{key}`, which the plan index does not maintain")]
    UnmaintainedIndexKey { name: String, key: String },
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
