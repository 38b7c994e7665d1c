//! Running a matcher against a whole plan.

use plangraph::{IndexView, ObjectId, PlanView};
use roaring::RoaringBitmap;

use crate::matcher::Matcher;

impl Matcher {
    /// Every live object of `plan` that this matcher accepts.
    ///
    /// The index narrows the live set first. Survivors are re-checked with
    /// `matches` unless the index answer is already exact: the matcher is fully
    /// indexed and has no owner clause.
    pub fn execute<I: IndexView + ?Sized>(&self, plan: &dyn PlanView, index: &I) -> RoaringBitmap {
        let owner_clause = !self.owners().is_empty();
        let candidates = self.narrow(&plan.object_ids(), index, true, !owner_clause);
        if self.is_fully_indexed() && !owner_clause {
            tracing::debug!(query = %self, matched = candidates.len(), "indexed query");
            return candidates;
        }

        let candidate_count = candidates.len();
        let matched: RoaringBitmap = candidates
            .into_iter()
            .filter(|&object| plan.contains(object) && self.matches(plan, object))
            .collect();
        tracing::debug!(
            query = %self,
            candidates = candidate_count,
            matched = matched.len(),
            "query"
        );
        matched
    }

    /// The matching object with the smallest id.
    pub fn first<I: IndexView + ?Sized>(&self, plan: &dyn PlanView, index: &I) -> Option<ObjectId> {
        self.execute(plan, index).min()
    }

    pub fn count<I: IndexView + ?Sized>(&self, plan: &dyn PlanView, index: &I) -> u64 {
        self.execute(plan, index).len()
    }
}
