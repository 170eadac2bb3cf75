//! Typed judge request/spec/result data model (component C2 of the design),
//! plus parsing of the `isolate` sandbox's `k:v` exec-meta report.
//!
//! Grounded on `examples/original_source/treadmill/models.py`: the same
//! shapes (`JudgeRequest`, `Submission`, `Problem`, `JudgeSpec`, `TestSet`,
//! `TestCase`, `Grader`, `JudgeResult`, `TestSetJudgeResult`,
//! `TestCaseJudgeResult`, `IsolateExecMeta`) carried over field-for-field,
//! expressed as plain Rust records the way spec.md §9 asks ("metaclass-
//! driven slots/schema → replace with plain record types").

#[macro_use]
extern crate error_chain;

pub mod language;
pub mod request;
pub mod result;
pub mod spec;

pub use language::{ConfigProfile, Language};
pub use request::{JudgeRequest, QueueKind};
pub use result::{
    JudgeResult, JudgeStatus, TestCaseJudgeResult, TestCaseJudgeStatus, TestSetJudgeResult,
};
pub use spec::{Grader, JudgeSpec, Problem, Submission, TestCase, TestSet};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    errors {
        MalformedIsolateMeta(line: String) {
            description("malformed isolate meta line")
            display("malformed isolate meta line: {:?}", line)
        }
    }
}

/// Key recognized by the isolate meta-file parser. Unrecognized keys are
/// ignored per spec.md §6 ("Recognized keys: ...").
const RECOGNIZED_KEYS: &[&str] = &[
    "time",
    "time-wall",
    "max-rss",
    "csw-voluntary",
    "csw-forced",
    "exitcode",
    "exitsig",
    "killed",
    "message",
    "cg-mem",
];

/// Parsed contents of the meta-file that `isolate --meta=<file>` writes
/// after a run. Missing keys are `None`; `max_rss`/`cg_mem` are converted
/// from kB to bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IsolateExecMeta {
    /// CPU time used, in seconds.
    pub time: Option<f64>,

    /// Wall clock time used, in seconds.
    pub time_wall: Option<f64>,

    /// Peak resident set size, in bytes (converted from the meta-file's kB).
    pub max_rss: Option<u64>,

    /// Total memory used by the whole control group, in bytes (converted
    /// from the meta-file's kB). Present only when control groups (`--cg`)
    /// are enabled.
    pub cg_mem: Option<u64>,

    /// Exit code of the sandboxed process, if it exited normally.
    pub exitcode: Option<i32>,

    /// Signal that terminated the sandboxed process, if any.
    pub exitsig: Option<i32>,

    /// Whether the sandbox itself killed the process (e.g. time limit).
    pub killed: bool,

    /// Free-form status message, not meant for machine processing.
    pub message: Option<String>,

    pub csw_voluntary: Option<u64>,
    pub csw_forced: Option<u64>,
}

impl IsolateExecMeta {
    /// Parse the `key:value\n` contents of an isolate meta-file. Blank
    /// lines are ignored; unrecognized keys are ignored (round-trip
    /// invariant of spec.md §8.4).
    pub fn parse(contents: &str) -> Result<Self> {
        let mut meta = IsolateExecMeta::default();

        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| Error::from(ErrorKind::MalformedIsolateMeta(line.to_owned())))?;

            if !RECOGNIZED_KEYS.contains(&key) {
                continue;
            }

            match key {
                "time" => meta.time = value.parse().ok(),
                "time-wall" => meta.time_wall = value.parse().ok(),
                "max-rss" => meta.max_rss = value.parse::<u64>().ok().map(|kb| kb * 1024),
                "cg-mem" => meta.cg_mem = value.parse::<u64>().ok().map(|kb| kb * 1024),
                "exitcode" => meta.exitcode = value.parse().ok(),
                "exitsig" => meta.exitsig = value.parse().ok(),
                "killed" => meta.killed = true,
                "message" => meta.message = Some(value.to_owned()),
                "csw-voluntary" => meta.csw_voluntary = value.parse().ok(),
                "csw-forced" => meta.csw_forced = value.parse().ok(),
                _ => unreachable!("filtered by RECOGNIZED_KEYS above"),
            }
        }

        Ok(meta)
    }

    /// Serialize back into the isolate meta-file format. Exists to support
    /// the round-trip property test (spec.md §8.4); the real sandbox never
    /// writes this format itself, `isolate` does.
    pub fn serialize(&self) -> String {
        let mut lines = Vec::new();
        if let Some(t) = self.time {
            lines.push(format!("time:{}", t));
        }
        if let Some(t) = self.time_wall {
            lines.push(format!("time-wall:{}", t));
        }
        if let Some(v) = self.max_rss {
            lines.push(format!("max-rss:{}", v / 1024));
        }
        if let Some(v) = self.cg_mem {
            lines.push(format!("cg-mem:{}", v / 1024));
        }
        if let Some(v) = self.exitcode {
            lines.push(format!("exitcode:{}", v));
        }
        if let Some(v) = self.exitsig {
            lines.push(format!("exitsig:{}", v));
        }
        if self.killed {
            lines.push("killed:1".to_owned());
        }
        if let Some(ref m) = self.message {
            lines.push(format!("message:{}", m));
        }
        if let Some(v) = self.csw_voluntary {
            lines.push(format!("csw-voluntary:{}", v));
        }
        if let Some(v) = self.csw_forced {
            lines.push(format!("csw-forced:{}", v));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_normal_execution_meta() {
        let meta = IsolateExecMeta::parse(
            "time:0.008\ntime-wall:0.015\nmax-rss:1692\ncsw-voluntary:5\ncsw-forced:1\nexitcode:0\n",
        )
        .unwrap();

        assert_eq!(meta.time, Some(0.008));
        assert_eq!(meta.time_wall, Some(0.015));
        assert_eq!(meta.max_rss, Some(1692 * 1024));
        assert_eq!(meta.exitcode, Some(0));
        assert!(!meta.killed);
    }

    #[test]
    fn parses_killed_meta() {
        let meta = IsolateExecMeta::parse("status:TO\ntime:3.000\ntime-wall:3.012\nkilled:1\nmessage:Time limit exceeded\n")
            .unwrap();

        assert!(meta.killed);
        assert_eq!(meta.message.as_deref(), Some("Time limit exceeded"));
        // `status` is not in the recognized-key list and must be ignored.
    }

    #[test]
    fn round_trips_through_serialize() {
        let meta = IsolateExecMeta {
            time: Some(1.5),
            time_wall: Some(2.0),
            max_rss: Some(2048 * 1024),
            cg_mem: Some(4096 * 1024),
            exitcode: Some(1),
            killed: true,
            message: Some("oom".to_owned()),
            ..Default::default()
        };

        let reparsed = IsolateExecMeta::parse(&meta.serialize()).unwrap();
        assert_eq!(meta, reparsed);
    }

    #[test]
    fn ignores_blank_lines() {
        let meta = IsolateExecMeta::parse("time:1.0\n\nexitcode:0\n\n").unwrap();
        assert_eq!(meta.time, Some(1.0));
        assert_eq!(meta.exitcode, Some(0));
    }
}
