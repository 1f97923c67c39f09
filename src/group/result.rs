//! # Group result.
//!
//! [`GroupResult`] maps each task's submission index to its [`TaskResult`] and tracks:
//! - the first error reported by any task (first write wins, in completion order);
//! - the index of the first task that completed, and of the first that completed without error;
//! - whether the group's *wait* was cancelled or timed out.
//!
//! Once a wait has ended early the result is frozen: tasks finishing afterwards are not
//! recorded (the group's done counter still counts them).

use std::collections::BTreeMap;

use crate::error::TaskError;
use crate::tasks::TaskResult;

/// Snapshot of a group's collected results.
#[derive(Clone, Debug, Default)]
pub struct GroupResult {
    error: Option<TaskError>,
    first_ok_idx: Option<usize>,
    first_done_idx: Option<usize>,
    results: BTreeMap<usize, TaskResult>,
    canceled: bool,
    timeout: bool,
}

impl GroupResult {
    pub(crate) fn is_frozen(&self) -> bool {
        self.canceled || self.timeout
    }

    pub(crate) fn put(&mut self, idx: usize, result: TaskResult) {
        if self.is_frozen() {
            return;
        }

        self.first_done_idx.get_or_insert(idx);
        match result.error() {
            Some(err) => {
                if self.error.is_none() {
                    self.error = Some(err.clone());
                }
            }
            None => {
                self.first_ok_idx.get_or_insert(idx);
            }
        }
        self.results.insert(idx, result);
    }

    /// Records the reason a wait ended early. Only the first call has an effect.
    pub(crate) fn cancel(&mut self, reason: TaskError) {
        if self.is_frozen() {
            return;
        }
        self.canceled = reason == TaskError::Canceled;
        self.timeout = reason == TaskError::DeadlineExceeded;
        if self.error.is_none() {
            self.error = Some(reason);
        }
    }

    /// First error reported by a task, or the wait's own error if it ended early first.
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// True if the wait was cancelled.
    pub fn canceled(&self) -> bool {
        self.canceled
    }

    /// True if the wait timed out.
    pub fn timeout(&self) -> bool {
        self.timeout
    }

    /// Index of the first task that completed without error.
    pub fn first_ok_idx(&self) -> Option<usize> {
        self.first_ok_idx
    }

    /// Index of the first task that completed, successfully or not.
    pub fn first_done_idx(&self) -> Option<usize> {
        self.first_done_idx
    }

    pub fn first_ok(&self) -> Option<&TaskResult> {
        self.first_ok_idx.and_then(|idx| self.results.get(&idx))
    }

    pub fn first_done(&self) -> Option<&TaskResult> {
        self.first_done_idx.and_then(|idx| self.results.get(&idx))
    }

    /// Result of the task submitted at `idx`, if it was recorded.
    pub fn get(&self, idx: usize) -> Option<&TaskResult> {
        self.results.get(&idx)
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Recorded results keyed by submission index.
    pub fn to_map(&self) -> BTreeMap<usize, TaskResult> {
        self.results.clone()
    }

    /// Recorded results in submission order. Missing indices are skipped.
    pub fn to_vec(&self) -> Vec<TaskResult> {
        self.results.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_firsts_in_completion_order() {
        let mut r = GroupResult::default();
        r.put(5, TaskResult::from_error(TaskError::fail("a")));
        r.put(2, TaskResult::ok(2i32));
        r.put(0, TaskResult::from_error(TaskError::fail("b")));

        assert_eq!(r.first_done_idx(), Some(5));
        assert_eq!(r.first_ok_idx(), Some(2));
        assert_eq!(r.error(), Some(&TaskError::fail("a")));
        assert_eq!(r.first_ok().and_then(|x| x.i32().ok()), Some(2));
        assert_eq!(r.len(), 3);
        assert_eq!(r.to_map().keys().copied().collect::<Vec<_>>(), vec![0, 2, 5]);
    }

    #[test]
    fn cancel_freezes_and_keeps_task_error() {
        let mut r = GroupResult::default();
        r.put(0, TaskResult::from_error(TaskError::fail("a")));
        r.cancel(TaskError::DeadlineExceeded);
        r.put(1, TaskResult::ok(1i32));
        r.cancel(TaskError::Canceled);

        assert!(r.timeout());
        assert!(!r.canceled());
        assert_eq!(r.error(), Some(&TaskError::fail("a")));
        assert_eq!(r.len(), 1);
        assert!(r.get(1).is_none());
    }

    #[test]
    fn cancel_sets_error_when_none_recorded() {
        let mut r = GroupResult::default();
        r.cancel(TaskError::Canceled);
        assert!(r.canceled());
        assert_eq!(r.error(), Some(&TaskError::Canceled));
        assert!(r.is_empty());
        assert!(r.first_done().is_none());
    }
}
