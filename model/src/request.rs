//! Judge request envelope: the message enqueued onto the priority-queue
//! fabric (component C12) and consumed by a worker.
//!
//! Grounded on `examples/original_source/treadmill/models.py`'s
//! `JudgeRequest` and `treadmill/worker.py`'s `NORMAL_QUEUE` /
//! `REJUDGE_QUEUE` / `RETRY_QUEUE` queue names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to judge one submission against one problem.
///
/// Serializes to the queue message JSON shape
/// `{"id", "problem_id", "submission_id", "created_at"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub id: i64,
    pub problem_id: i64,
    pub submission_id: i64,
    pub created_at: DateTime<Utc>,
}

impl JudgeRequest {
    pub fn new(id: i64, problem_id: i64, submission_id: i64, created_at: DateTime<Utc>) -> Self {
        JudgeRequest {
            id,
            problem_id,
            submission_id,
            created_at,
        }
    }
}

/// Which of the three priority queues a request travels through.
///
/// Priorities mirror `treadmill/worker.py`'s `HIGH_PRIO`/`NORMAL_PRIO`/
/// `LOW_PRIO` constants (lower number sorts first).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum QueueKind {
    /// Fresh submissions, judged as they arrive.
    Normal,
    /// Operator-triggered rejudge of an already-judged submission.
    Rejudge,
    /// A task retried after `RetryLaterOp`, re-enqueued with a delay.
    Retry,
}

impl QueueKind {
    pub fn queue_name(&self) -> &'static str {
        match self {
            QueueKind::Normal => "treadmill_normal",
            QueueKind::Rejudge => "treadmill_rejudge",
            QueueKind::Retry => "treadmill_retry",
        }
    }

    /// Priority within the queue's sorted set; lower runs first.
    pub fn priority(&self) -> u32 {
        match self {
            QueueKind::Normal => 50,
            QueueKind::Rejudge => 100,
            QueueKind::Retry => 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_expected_shape() {
        let req = JudgeRequest::new(1, 2, 3, "2026-01-01T00:00:00Z".parse().unwrap());
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["problem_id"], 2);
        assert_eq!(json["submission_id"], 3);
    }

    #[test]
    fn retry_queue_has_lower_priority_than_normal() {
        assert!(QueueKind::Retry.priority() > QueueKind::Normal.priority());
    }

    #[test]
    fn rejudge_and_retry_share_the_low_priority_class() {
        assert_eq!(QueueKind::Rejudge.priority(), QueueKind::Retry.priority());
    }
}
