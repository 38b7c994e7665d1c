//! Model hierarchy.
//!
//! A model is a structural classification (think "task type" or "interface").
//! Each object is created with exactly one model; it fulfills that model and,
//! transitively, every supermodel declared for it. Models that were never
//! declared are roots with no supermodels.

use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::StrId;

#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    /// model -> direct supermodels
    supermodels: AHashMap<StrId, Vec<StrId>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `model` with its direct supermodels. Re-declaring adds to the
    /// existing list.
    pub fn declare(&mut self, model: StrId, supermodels: &[StrId]) {
        let entry = self.supermodels.entry(model).or_default();
        for &sup in supermodels {
            if sup != model && !entry.contains(&sup) {
                entry.push(sup);
            }
        }
    }

    pub fn direct_supermodels(&self, model: StrId) -> &[StrId] {
        self.supermodels
            .get(&model)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    /// Every model fulfilled by an instance of `model`, including itself.
    ///
    /// The result is sorted; cycles in the declarations are tolerated.
    pub fn fulfilled(&self, model: StrId) -> Vec<StrId> {
        let mut seen: BTreeSet<StrId> = BTreeSet::new();
        let mut stack = vec![model];
        while let Some(m) = stack.pop() {
            if !seen.insert(m) {
                continue;
            }
            stack.extend(self.direct_supermodels(m).iter().copied());
        }
        seen.into_iter().collect()
    }

    /// Whether an instance of `model` fulfills `required`.
    pub fn fulfills(&self, model: StrId, required: StrId) -> bool {
        model == required || self.fulfilled(model).binary_search(&required).is_ok()
    }
}
