//! Judge pipeline (component C11): end-to-end flow, failure taxonomy
//! mapping, and the distinct retry-dispatch pipeline.
//!
//! Grounded on `examples/original_source/treadmill/tasks/pipeline.py`'s
//! `JudgePipeline` and `worker.py::_retry`'s `EnqueuePipeline` call.

use tm_model::{JudgeRequest, JudgeStatus};
use tm_task::{context::JudgeContext, with_environ};

use crate::workspace::WorkspaceEnviron;
use crate::{compile, execute, Error, ErrorKind, Result};

/// Runs one judge request end to end (spec.md §4.10):
/// `FetchSubmission` → `UpdateJudgeResult(IN_PROGRESS)` → `Workspace { Compile; Judge }`,
/// with each error category mapped to its terminal status (spec.md §7).
pub async fn run_judge_pipeline(ctx: &mut JudgeContext) -> Result<()> {
    let problem_id = ctx.request.problem_id;
    let submission_id = ctx.request.submission_id;

    tm_task::ops::fetch_submission(ctx, problem_id, submission_id).await?;
    tm_task::ops::update_judge_result(ctx, JudgeStatus::InProgress, None).await?;

    let outcome: std::result::Result<Result<()>, tm_task::Error> = with_environ(WorkspaceEnviron::new(), ctx, |_env, ctx| {
        Box::pin(async move {
            let inner: Result<()> = async {
                compile::compile_all(ctx).await?;
                execute::judge_all(ctx).await?;
                Ok(())
            }
            .await;
            Ok(inner)
        })
    })
    .await;

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(stage_err)) => handle_failure(ctx, stage_err).await,
        Err(task_err) => handle_failure(ctx, Error::from(task_err)).await,
    }
}

/// `EnqueuePipeline` (spec.md §4.12's retry actor): flips status back to
/// `ENQUEUED` and pushes the request back onto the normal queue, without
/// re-running the judge pipeline directly — kept as its own pipeline to
/// mirror the original's separation of the retry actor from the judge
/// actor.
pub async fn run_retry_dispatch_pipeline(ctx: &mut JudgeContext, request: &JudgeRequest) -> Result<()> {
    tm_task::ops::update_judge_result(ctx, JudgeStatus::Enqueued, None).await?;
    tm_task::ops::enqueue(ctx, request).await?;
    Ok(())
}

/// Maps a failed pipeline run onto spec.md §7's three outcomes: a
/// *submission* compile failure is a definite verdict (`COMPILE_ERROR`); an
/// API error is transient and must propagate so the broker redelivers;
/// everything else — including a grader compile failure — is an unexpected
/// server fault, reported as `INTERNAL_ERROR` and put back on the retry
/// queue.
async fn handle_failure(ctx: &mut JudgeContext, err: Error) -> Result<()> {
    ctx.telemetry.log_current_error(&err.to_string(), &ctx.stack);

    match err.kind() {
        ErrorKind::SubmissionCompileError(output) => {
            let message = String::from_utf8_lossy(output).into_owned();
            tm_task::ops::update_judge_result(ctx, JudgeStatus::CompileError, Some(message)).await?;
            Ok(())
        }
        ErrorKind::Api(_) => Err(err),
        _ => {
            tm_task::ops::update_judge_result(ctx, JudgeStatus::InternalError, Some(err.to_string())).await?;
            let request = ctx.request.clone();
            tm_task::ops::retry_later(ctx, &request).await?;
            Ok(())
        }
    }
}
