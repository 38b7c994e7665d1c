//! Index-accelerated narrowing of candidate sets.
//!
//! `Matcher::filter` never drops a candidate that the index-backed clauses
//! accept; when the matcher is fully indexed its result is exact, otherwise
//! callers re-check the survivors with `Matcher::matches`.
//!
//! Intersections are driven by the smallest positive set: its members are
//! checked against the negative union and every other positive set, so the
//! work is bounded by `|smallest| * number_of_sets`.

use std::borrow::Cow;

use plangraph::IndexView;
use roaring::RoaringBitmap;

use crate::matcher::Matcher;

impl Matcher {
    /// Resolve the positive (intersection) and negative (difference) sets.
    ///
    /// Returns `None` when an owner constraint names a peer the index has no
    /// entry for. Missing model and predicate entries resolve to `empty`.
    /// Owner sets are only used when `owner_sets` is true.
    fn indexed_sets<'a, I: IndexView + ?Sized>(
        &self,
        index: &'a I,
        empty: &'a RoaringBitmap,
        owner_sets: bool,
    ) -> Option<(Vec<&'a RoaringBitmap>, Vec<&'a RoaringBitmap>)> {
        let data = &self.data;
        let mut positive: Vec<&'a RoaringBitmap> = Vec::new();

        for model in &data.models {
            positive.push(index.by_model(model).unwrap_or(empty));
        }

        if owner_sets {
            for peer in &data.owners {
                positive.push(index.by_owner(peer)?);
            }
        }

        for key in &data.indexed_predicates {
            positive.push(index.by_predicate(key).unwrap_or(empty));
        }

        let negative = data
            .indexed_neg_predicates
            .iter()
            .map(|key| index.by_predicate(key).unwrap_or(empty))
            .collect();

        Some((positive, negative))
    }

    /// Narrow `initial` using the index.
    ///
    /// The result contains every member of `initial` that passes the
    /// index-backed clauses. When `initial_is_complete` is true the caller
    /// guarantees that `initial` already holds every possible candidate, and it
    /// is only intersected when no other positive set exists.
    pub fn filter<I: IndexView + ?Sized>(
        &self,
        initial: &RoaringBitmap,
        index: &I,
        initial_is_complete: bool,
    ) -> RoaringBitmap {
        self.narrow(initial, index, initial_is_complete, true)
    }

    /// `filter`, optionally leaving the owner sets out of the intersection.
    ///
    /// The owner sets hold objects owned by each listed peer, while an owner
    /// clause accepts any subset of the peers (unowned objects included), so
    /// callers that need every match narrow without them and re-check.
    pub(crate) fn narrow<I: IndexView + ?Sized>(
        &self,
        initial: &RoaringBitmap,
        index: &I,
        initial_is_complete: bool,
        owner_sets: bool,
    ) -> RoaringBitmap {
        let empty = RoaringBitmap::new();
        let Some((mut positive, negative_sets)) = self.indexed_sets(index, &empty, owner_sets)
        else {
            tracing::debug!(query = %self, "owner missing from index, nothing can match");
            return RoaringBitmap::new();
        };

        if positive.is_empty() || !initial_is_complete {
            positive.push(initial);
        }

        let negative: Cow<'_, RoaringBitmap> = match negative_sets.as_slice() {
            [] => Cow::Owned(RoaringBitmap::new()),
            [single] => Cow::Borrowed(*single),
            many => {
                let mut union = RoaringBitmap::new();
                for set in many {
                    union |= *set;
                }
                Cow::Owned(union)
            }
        };

        positive.sort_by_key(|set| set.len());
        let Some((driver, rest)) = positive.split_first() else {
            return RoaringBitmap::new();
        };

        let result: RoaringBitmap = driver
            .iter()
            .filter(|&object| {
                !negative.contains(object) && rest.iter().all(|set| set.contains(object))
            })
            .collect();

        tracing::trace!(
            query = %self,
            driver = driver.len(),
            intersected = rest.len(),
            excluded = negative.len(),
            result = result.len(),
            "index filter"
        );
        result
    }
}
