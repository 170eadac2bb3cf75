//! The per-run ambient context (`JudgeContext`) and task-stack tracking.
//!
//! Grounded on `examples/original_source/treadmill/context.py`'s
//! `ContextMixin`/thread-local context and `tasks/base.py`'s
//! `push_environ`/`pop_environ`/`get_active_environs`.

use std::sync::Arc;

use tm_api::ApiClient;
use tm_container::ContainerDriver;
use tm_model::{ConfigProfile, Grader, JudgeRequest, JudgeSpec, Language, QueueKind, Submission};
use tm_path::PathContext;

/// Abstraction over the broker's enqueue operation (spec.md §4.2's
/// `RetryLater`/`Enqueue`), implemented concretely with `redis` in the
/// `treadmill` binary (component C12) so `tm-task` itself stays broker-
/// agnostic. Grounded on
/// `examples/original_source/treadmill/tasks/ops/message.py`'s
/// `RetryLaterOp`/`EnqueueOp`, which both just build a `dramatiq.Message`
/// and hand it to the broker.
#[async_trait::async_trait]
pub trait QueueClient: Send + Sync {
    async fn enqueue(&self, queue: QueueKind, request: &JudgeRequest) -> crate::Result<()>;
}

/// Stack of active task/environ names, indexed per in-flight request (one
/// `JudgeContext`, and thus one stack, per Tokio task). The top names
/// "where we are" and is attached to error reports (spec.md §4.3).
#[derive(Clone, Debug, Default)]
pub struct TaskStack {
    frames: Vec<&'static str>,
}

impl TaskStack {
    pub fn push(&mut self, name: &'static str) {
        self.frames.push(name);
    }

    pub fn pop(&mut self) -> Option<&'static str> {
        self.frames.pop()
    }

    pub fn frames(&self) -> &[&'static str] {
        &self.frames
    }

    /// Render like Python's `traceback.print_exc()` fallback in
    /// `context.py::log_current_error` when no telemetry sink is
    /// configured: innermost frame last.
    pub fn render(&self) -> String {
        self.frames.join(" > ")
    }
}

/// Crash-telemetry client (spec.md §6's `TM_SENTRY_DSN`, "optional
/// telemetry sink"). Grounded on `context.py`'s `sentry_client` /
/// `raven.Client`: when a DSN is configured, tags the active
/// submission/problem as user context and would report unhandled
/// exceptions to that sink; when not configured, falls back to logging the
/// task stack, matching `log_current_error`'s `traceback.print_exc()`
/// fallback.
#[derive(Clone, Debug, Default)]
pub struct TelemetryClient {
    dsn: Option<String>,
}

impl TelemetryClient {
    pub fn new(dsn: Option<String>) -> Self {
        TelemetryClient { dsn }
    }

    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }

    /// Tag the current submission/problem as user context
    /// (`context.py::user_context`).
    pub fn set_user_context(&self, submission_id: i64, problem_id: i64) {
        if let Some(dsn) = &self.dsn {
            log::debug!(
                "telemetry[{}]: user_context submission_id={} problem_id={}",
                dsn,
                submission_id,
                problem_id
            );
        }
    }

    /// Report the current error and task stack. Without a configured sink,
    /// this just logs at error level (`log_current_error`'s fallback).
    pub fn log_current_error(&self, error: &str, stack: &TaskStack) {
        match &self.dsn {
            Some(dsn) => log::error!(
                "telemetry[{}]: {} (stack: {})",
                dsn,
                error,
                stack.render()
            ),
            None => log::error!("{} (stack: {})", error, stack.render()),
        }
    }
}

/// Ambient state every Task/Environ/Operation sees (spec.md §4.3's
/// "JudgeContext"): the request, the loaded submission/spec, cumulative
/// counters, and the clients needed to talk to Docker and the front-office
/// API. One instance per in-flight judge request; set on pipeline entry,
/// dropped on exit.
pub struct JudgeContext {
    pub request: JudgeRequest,
    pub submission: Option<Submission>,
    pub judge_spec: Option<JudgeSpec>,
    pub grader: Option<Grader>,
    pub grader_lang: Option<Language>,

    /// Accumulated score across testsets judged so far (spec.md §3:
    /// "cumulative time/memory aggregate only over PASSED cases").
    pub total_score: u32,
    pub total_time: f64,
    pub max_rss: u64,

    pub api_client: ApiClient,
    pub container_driver: ContainerDriver,
    pub path_ctx: PathContext,
    pub telemetry: TelemetryClient,
    pub queue_client: Arc<dyn QueueClient>,

    /// `TM_CONFIG` profile (spec.md §6), deciding which image tags the
    /// compile/execute stages pull.
    pub profile: ConfigProfile,

    pub stack: TaskStack,
}

impl JudgeContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request: JudgeRequest,
        api_client: ApiClient,
        container_driver: ContainerDriver,
        path_ctx: PathContext,
        telemetry: TelemetryClient,
        queue_client: Arc<dyn QueueClient>,
        profile: ConfigProfile,
    ) -> Self {
        JudgeContext {
            request,
            submission: None,
            judge_spec: None,
            grader: None,
            grader_lang: None,
            total_score: 0,
            total_time: 0.0,
            max_rss: 0,
            api_client,
            container_driver,
            path_ctx,
            telemetry,
            queue_client,
            profile,
            stack: TaskStack::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_stack_renders_innermost_last() {
        let mut stack = TaskStack::default();
        stack.push("JudgePipeline");
        stack.push("JudgeStage");
        stack.push("ExecuteSubmission");
        assert_eq!(stack.render(), "JudgePipeline > JudgeStage > ExecuteSubmission");
        stack.pop();
        assert_eq!(stack.render(), "JudgePipeline > JudgeStage");
    }

    #[test]
    fn telemetry_without_dsn_is_disabled() {
        let telemetry = TelemetryClient::new(None);
        assert!(!telemetry.is_enabled());
    }
}
