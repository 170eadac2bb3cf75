//! Problem/submission static data: what to judge and against which tests.
//!
//! Grounded on `examples/original_source/treadmill/models.py`'s
//! `TestCase`, `TestSet`, `Grader`, `JudgeSpec`, `Problem` and `Submission`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Language;

/// A single input/expected-output pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub input_key: String,
    pub output_key: String,
    pub created_at: DateTime<Utc>,
}

/// A group of test cases judged all-or-nothing for a fixed score
/// (spec.md §8.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSet {
    pub id: i64,
    pub score: u32,
    pub testcases: Vec<TestCase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A problem-supplied checker program run against the submission's output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grader {
    pub src_key: String,
    pub lang: Language,
}

/// Resource limits and test layout for a problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgeSpec {
    #[serde(default = "JudgeSpec::default_total_score")]
    pub total_score: u32,
    pub testsets: Vec<TestSet>,
    pub grader: Option<Grader>,
    pub mem_limit_bytes: u64,
    pub time_limit_seconds: f64,
    /// `None` means unlimited (spec.md §6's "optional file-size limit").
    #[serde(default)]
    pub file_size_limit_kilos: Option<u64>,
    #[serde(default = "JudgeSpec::default_pid_limits")]
    pub pid_limits: u32,
    pub updated_at: DateTime<Utc>,
}

impl JudgeSpec {
    fn default_total_score() -> u32 {
        100
    }

    fn default_pid_limits() -> u32 {
        1
    }
}

/// A problem: its metadata plus the spec used to judge submissions to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub judge_spec: JudgeSpec,
}

/// A single submission: one program, in one language, against one problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub problem: Problem,
    pub src_key: String,
    pub lang: Language,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_spec_fills_in_defaults() {
        let json = serde_json::json!({
            "testsets": [],
            "grader": null,
            "mem_limit_bytes": 268_435_456u64,
            "time_limit_seconds": 1.0,
            "updated_at": "2026-01-01T00:00:00Z",
        });

        let spec: JudgeSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.total_score, 100);
        assert_eq!(spec.file_size_limit_kilos, None);
        assert_eq!(spec.pid_limits, 1);
    }
}
