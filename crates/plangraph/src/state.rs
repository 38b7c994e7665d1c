//! Object state and the indexed predicate table.
//!
//! `INDEXED_PREDICATES` is the single definition of which state predicates the
//! index keeps live sets for. The index maintenance code and the query
//! engine's predicate registry both evaluate predicates through these
//! accessors, so an index set and a direct evaluation can never disagree.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Task,
    Event,
}

/// Task lifecycle. Events use `Pending` until emitted, then `Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Pending,
    Starting,
    Running,
    Finishing,
    Succeeded,
    Failed,
}

impl Lifecycle {
    pub fn is_finished(self) -> bool {
        matches!(self, Lifecycle::Succeeded | Lifecycle::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectState {
    pub kind: ObjectKind,
    pub lifecycle: Lifecycle,
    pub executable: bool,
    pub abstract_task: bool,
    pub mission: bool,
    pub permanent: bool,
}

impl ObjectState {
    pub fn task() -> Self {
        Self {
            kind: ObjectKind::Task,
            lifecycle: Lifecycle::Pending,
            executable: true,
            abstract_task: false,
            mission: false,
            permanent: false,
        }
    }

    pub fn event() -> Self {
        Self {
            kind: ObjectKind::Event,
            ..Self::task()
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Abstract tasks are placeholders and can never be executed.
    pub fn abstract_placeholder(mut self) -> Self {
        self.abstract_task = true;
        self.executable = false;
        self
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    pub fn is_abstract(&self) -> bool {
        self.abstract_task
    }

    pub fn is_pending(&self) -> bool {
        self.lifecycle == Lifecycle::Pending
    }

    pub fn is_starting(&self) -> bool {
        self.lifecycle == Lifecycle::Starting
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn is_finishing(&self) -> bool {
        self.lifecycle == Lifecycle::Finishing
    }

    pub fn is_finished(&self) -> bool {
        self.lifecycle.is_finished()
    }

    pub fn is_success(&self) -> bool {
        self.lifecycle == Lifecycle::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.lifecycle == Lifecycle::Failed
    }
}

/// A predicate whose true-set is maintained by the index.
#[derive(Debug, Clone, Copy)]
pub struct IndexedPredicate {
    pub name: &'static str,
    pub holds: fn(&ObjectState) -> bool,
}

pub const INDEXED_PREDICATES: &[IndexedPredicate] = &[
    IndexedPredicate {
        name: "executable",
        holds: ObjectState::is_executable,
    },
    IndexedPredicate {
        name: "abstract",
        holds: ObjectState::is_abstract,
    },
    IndexedPredicate {
        name: "pending",
        holds: ObjectState::is_pending,
    },
    IndexedPredicate {
        name: "starting",
        holds: ObjectState::is_starting,
    },
    IndexedPredicate {
        name: "running",
        holds: ObjectState::is_running,
    },
    IndexedPredicate {
        name: "finishing",
        holds: ObjectState::is_finishing,
    },
    IndexedPredicate {
        name: "finished",
        holds: ObjectState::is_finished,
    },
    IndexedPredicate {
        name: "success",
        holds: ObjectState::is_success,
    },
    IndexedPredicate {
        name: "failed",
        holds: ObjectState::is_failed,
    },
];

pub fn indexed_predicate(name: &str) -> Option<&'static IndexedPredicate> {
    INDEXED_PREDICATES.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_covers_both_outcomes() {
        let ok = ObjectState::task().with_lifecycle(Lifecycle::Succeeded);
        let ko = ObjectState::task().with_lifecycle(Lifecycle::Failed);
        assert!(ok.is_finished() && ok.is_success() && !ok.is_failed());
        assert!(ko.is_finished() && ko.is_failed() && !ko.is_success());
        assert!(!ObjectState::task().is_finished());
    }

    #[test]
    fn indexed_predicate_names_are_unique() {
        for (i, p) in INDEXED_PREDICATES.iter().enumerate() {
            assert!(INDEXED_PREDICATES[i + 1..].iter().all(|q| q.name != p.name));
        }
        assert!(indexed_predicate("running").is_some());
        assert!(indexed_predicate("self_owned").is_none());
    }
}
