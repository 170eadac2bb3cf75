//! Judge outcomes: overall status, per-testset and per-testcase results.
//!
//! Grounded on `examples/original_source/treadmill/models.py`'s
//! `JudgeStatus`, `TestCaseJudgeStatus`, `JudgeResult`, `TestSetJudgeResult`
//! and `TestCaseJudgeResult`, and on the teacher's `Verdict` enum
//! (`judge/src/lib.rs`) for the "first failure wins" aggregation idiom.

use serde::{Deserialize, Serialize};

/// Overall status of a judge request, as reported through the internal API.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgeStatus {
    Enqueued,
    InProgress,
    CompileError,
    Passed,
    Failed,
    InternalError,
}

/// Outcome of a single test case.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestCaseJudgeStatus {
    NotJudged,
    RuntimeError,
    WrongAnswer,
    MemoryLimitExceeded,
    TimeLimitExceeded,
    Passed,
}

impl TestCaseJudgeStatus {
    /// Whether this status counts as a pass for scoring and for the
    /// all-or-nothing testset rule (spec.md §8.1).
    pub fn is_passed(&self) -> bool {
        matches!(self, TestCaseJudgeStatus::Passed)
    }
}

/// Result of judging a single test case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCaseJudgeResult {
    pub testcase_id: i64,
    pub status: TestCaseJudgeStatus,
    pub time_seconds: Option<f64>,
    pub memory_bytes: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of judging one test set: all-or-nothing, the set's score is
/// either its full weight or zero (spec.md §8.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSetJudgeResult {
    pub testset_id: i64,
    pub score: u32,
    pub testcases: Vec<TestCaseJudgeResult>,
}

impl TestSetJudgeResult {
    /// `true` if every testcase passed; the point at which `JudgeTestSetTask`
    /// breaks out of its loop having seen a failure (spec.md §4.9).
    pub fn all_passed(&self) -> bool {
        self.testcases.iter().all(TestCaseJudgeResult::passed)
    }
}

impl TestCaseJudgeResult {
    fn passed(&self) -> bool {
        self.status.is_passed()
    }
}

/// Aggregate result of judging a whole submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    pub request_id: i64,
    pub status: JudgeStatus,
    pub score: u32,
    pub total_score: u32,
    pub testsets: Vec<TestSetJudgeResult>,
    pub total_time_seconds: f64,
    pub max_rss_bytes: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl JudgeResult {
    /// Score is the sum of passed testsets' weights; never exceeds
    /// `total_score` (spec.md §8.2).
    pub fn compute_score(testsets: &[TestSetJudgeResult]) -> u32 {
        testsets
            .iter()
            .filter(|t| t.all_passed())
            .map(|t| t.score)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passed_case(id: i64) -> TestCaseJudgeResult {
        TestCaseJudgeResult {
            testcase_id: id,
            status: TestCaseJudgeStatus::Passed,
            time_seconds: Some(0.01),
            memory_bytes: Some(1024),
            error: None,
        }
    }

    fn failed_case(id: i64) -> TestCaseJudgeResult {
        TestCaseJudgeResult {
            testcase_id: id,
            status: TestCaseJudgeStatus::WrongAnswer,
            time_seconds: Some(0.01),
            memory_bytes: Some(1024),
            error: None,
        }
    }

    #[test]
    fn testset_is_all_or_nothing() {
        let passed_set = TestSetJudgeResult {
            testset_id: 1,
            score: 40,
            testcases: vec![passed_case(1), passed_case(2)],
        };
        let failed_set = TestSetJudgeResult {
            testset_id: 2,
            score: 60,
            testcases: vec![passed_case(3), failed_case(4)],
        };

        assert!(passed_set.all_passed());
        assert!(!failed_set.all_passed());
        assert_eq!(JudgeResult::compute_score(&[passed_set, failed_set]), 40);
    }

    #[test]
    fn score_never_exceeds_total() {
        let sets = vec![
            TestSetJudgeResult { testset_id: 1, score: 50, testcases: vec![passed_case(1)] },
            TestSetJudgeResult { testset_id: 2, score: 50, testcases: vec![passed_case(2)] },
        ];
        assert_eq!(JudgeResult::compute_score(&sets), 100);
    }
}
