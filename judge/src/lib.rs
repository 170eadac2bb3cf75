//! Judge worker core (components C6 through C11): workspace staging,
//! compilation, per-case execution and the end-to-end pipeline built on top
//! of `tm-task`'s `Environ`/operation layer.
//!
//! Grounded on `examples/original_source/treadmill/tasks/{workspace,
//! container,judge,composite,pipeline}.py`.

#[macro_use]
extern crate error_chain;

pub mod compile;
pub mod execute;
pub mod pipeline;
pub mod workspace;

error_chain! {
    links {
        Task(tm_task::Error, tm_task::ErrorKind);
        Sandbox(tm_sandbox::Error, tm_sandbox::ErrorKind);
        Container(tm_container::Error, tm_container::ErrorKind);
        Api(tm_api::Error, tm_api::ErrorKind);
    }

    errors {
        /// Submission failed to compile (spec.md §4.8); terminal, reported
        /// as `JudgeStatus::CompileError` with the captured compiler output.
        SubmissionCompileError(output: Vec<u8>) {
            description("submission failed to compile")
            display("submission failed to compile: {}", String::from_utf8_lossy(output))
        }

        /// Grader failed to compile. Unlike `SubmissionCompileError`, this is
        /// a server fault (spec.md §7: only the submission's own compile
        /// failure is a terminal, user-facing verdict) — reported as
        /// `INTERNAL_ERROR` and retried, the same as any other unexpected
        /// failure.
        GraderCompileError(output: Vec<u8>) {
            description("grader failed to compile")
            display("grader failed to compile: {}", String::from_utf8_lossy(output))
        }

        /// `isolate` itself reported an internal failure (exit code >= 2),
        /// distinct from the sandboxed program failing (spec.md §4.6's
        /// exit-code table). Always a server fault.
        IsolateExecutionError(output: Vec<u8>) {
            description("isolate reported an internal failure")
            display("isolate reported an internal failure: {}", String::from_utf8_lossy(output))
        }

        /// The submission ran to completion but exited nonzero without
        /// tripping a resource limit (spec.md §4.9's RUNTIME_ERROR case).
        SubmissionRuntimeError(detail: String) {
            description("submission exited nonzero")
            display("submission exited nonzero: {}", detail)
        }

        /// The grader itself crashed; a server fault, not a verdict on the
        /// submission (spec.md §4.9: "a grader crash is a server fault, not
        /// a WRONG_ANSWER").
        GraderRuntimeError(output: Vec<u8>) {
            description("grader exited nonzero")
            display("grader exited nonzero: {}", String::from_utf8_lossy(output))
        }
    }
}
