//! Operation layer (component C7): small, describable side-effecting
//! steps. Grounded on `examples/original_source/treadmill/tasks/ops/
//! {base,files,api,message}.py`.

use std::path::Path;

use tm_model::{
    JudgeRequest, JudgeResult, JudgeStatus, QueueKind, TestCaseJudgeResult, TestCaseJudgeStatus,
    TestSetJudgeResult,
};
use tm_path::Afp;

use crate::context::JudgeContext;
use crate::{Error, ErrorKind, Result};

// --- Filesystem operations (files.py) ---------------------------------

/// `CheckFileExistsOp`: fails if the host path is absent.
pub fn check_file_exists(ctx: &JudgeContext, afp: &Afp) -> Result<()> {
    let path = afp.host_path(&ctx.path_ctx);
    if path.exists() {
        Ok(())
    } else {
        Err(Error::from(ErrorKind::FileNotFound(path)))
    }
}

/// `CreateFileOp`: makes parent dirs (0755), creates an empty file, chmods
/// if `mode` is given.
pub fn create_file(ctx: &JudgeContext, afp: &Afp, mode: Option<u32>) -> Result<()> {
    let path = afp.host_path(&ctx.path_ctx);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::File::create(&path)?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// `MakeDirectoryOp`: fails if the directory exists and `exist_ok` is
/// false.
pub fn make_directory(ctx: &JudgeContext, afp: &Afp, exist_ok: bool) -> Result<()> {
    let path = afp.host_path(&ctx.path_ctx);
    if path.exists() {
        if exist_ok {
            return Ok(());
        }
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )
        .into());
    }
    std::fs::create_dir_all(&path)?;
    Ok(())
}

/// `CreateSymlinkOp`, one of the two staging strategies (spec.md §9 open
/// question 3: this implementation picks symlink staging).
pub fn create_symlink(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(src, dest)?;
    #[cfg(not(unix))]
    std::fs::copy(src, dest).map(|_| ())?;
    Ok(())
}

/// `ReadFileOp`.
pub fn read_file(ctx: &JudgeContext, afp: &Afp) -> Result<String> {
    let path = afp.host_path(&ctx.path_ctx);
    std::fs::read_to_string(&path).map_err(|e| e.into())
}

/// `CompareFileOp`, resolved per spec.md §9 open question 2 as
/// whitespace-stripped equality of whole files (not byte-exact
/// `filecmp.cmp(shallow=False)`).
pub fn compare_file(ctx: &JudgeContext, target: &Afp, expected: &Afp) -> Result<bool> {
    let a = std::fs::read_to_string(target.host_path(&ctx.path_ctx))?;
    let b = std::fs::read_to_string(expected.host_path(&ctx.path_ctx))?;
    Ok(a.trim_end() == b.trim_end())
}

/// `RemoveDirectoryOp`: best-effort, no error if absent.
pub fn remove_directory(ctx: &JudgeContext, afp: &Afp) -> Result<()> {
    let path = afp.host_path(&ctx.path_ctx);
    if path.is_dir() {
        std::fs::remove_dir_all(&path)?;
    }
    Ok(())
}

// --- API operations (api.py) -------------------------------------------

/// `FetchSubmissionOp`: loads the submission into context, normalizing
/// legacy memory limits (values `<= 300000` are kB, not bytes).
pub async fn fetch_submission(ctx: &mut JudgeContext, problem_id: i64, submission_id: i64) -> Result<()> {
    let mut submission = ctx
        .api_client
        .get_submission(problem_id, submission_id)
        .await?;

    const LEGACY_KB_THRESHOLD: u64 = 300_000;
    if submission.problem.judge_spec.mem_limit_bytes <= LEGACY_KB_THRESHOLD {
        submission.problem.judge_spec.mem_limit_bytes *= 1024;
    }

    ctx.judge_spec = Some(submission.problem.judge_spec.clone());
    ctx.grader = submission.problem.judge_spec.grader.clone();
    ctx.grader_lang = ctx.grader.as_ref().map(|g| g.lang);
    ctx.telemetry.set_user_context(submission.id, submission.problem.id);
    ctx.submission = Some(submission);

    Ok(())
}

/// `UpdateJudgeResultOp` with only `status`/`error` set: overall result.
pub async fn update_judge_result(ctx: &JudgeContext, status: JudgeStatus, error: Option<String>) -> Result<()> {
    let result = JudgeResult {
        request_id: ctx.request.id,
        status,
        score: ctx.total_score,
        total_score: ctx.judge_spec.as_ref().map(|s| s.total_score).unwrap_or(0),
        testsets: Vec::new(),
        total_time_seconds: ctx.total_time,
        max_rss_bytes: ctx.max_rss,
        error,
    };
    ctx.api_client.set_judge_result(ctx.request.id, &result).await?;
    Ok(())
}

/// `UpdateJudgeResultOp` with `testset_id` but no `testcase_id`:
/// per-testset result. Accumulates `ctx.total_score`.
pub async fn update_testset_result(ctx: &mut JudgeContext, testset_id: i64, score: u32) -> Result<()> {
    ctx.total_score += score;

    let result = TestSetJudgeResult {
        testset_id,
        score,
        testcases: Vec::new(),
    };
    ctx.api_client
        .set_testset_judge_result(ctx.request.id, testset_id, &result)
        .await?;
    Ok(())
}

/// `UpdateJudgeResultOp` with both `testset_id` and `testcase_id` set:
/// per-testcase result. Accumulates `ctx.total_time`/`ctx.max_rss` only on
/// `PASSED` (spec.md §3).
pub async fn update_testcase_result(
    ctx: &mut JudgeContext,
    testset_id: i64,
    testcase_id: i64,
    status: TestCaseJudgeStatus,
    time_seconds: Option<f64>,
    memory_bytes: Option<u64>,
    error: Option<String>,
) -> Result<()> {
    if status.is_passed() {
        ctx.total_time += time_seconds.unwrap_or(0.0);
        ctx.max_rss = ctx.max_rss.max(memory_bytes.unwrap_or(0));
    }

    let result = TestCaseJudgeResult {
        testcase_id,
        status,
        time_seconds,
        memory_bytes,
        error,
    };
    ctx.api_client
        .set_testcase_judge_result(ctx.request.id, testset_id, testcase_id, &result)
        .await?;
    Ok(())
}

// --- Message operations (message.py) -----------------------------------

/// `RetryLaterOp`: push the request back onto the retry queue.
pub async fn retry_later(ctx: &JudgeContext, request: &JudgeRequest) -> Result<()> {
    ctx.queue_client.enqueue(QueueKind::Retry, request).await
}

/// `EnqueueOp`: push the request onto the normal queue (used by the retry
/// actor's `EnqueuePipeline`, not by the judge pipeline itself).
pub async fn enqueue(ctx: &JudgeContext, request: &JudgeRequest) -> Result<()> {
    ctx.queue_client.enqueue(QueueKind::Normal, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tm_path::PathContext;

    fn ctx_stub() -> (tempfile::TempDir, PathContext) {
        let dir = tempdir().unwrap();
        let path_ctx = PathContext::new(dir.path().to_path_buf(), dir.path().to_path_buf(), 1);
        (dir, path_ctx)
    }

    #[test]
    fn compare_file_strips_trailing_whitespace() {
        let (_dir, path_ctx) = ctx_stub();
        std::fs::create_dir_all(path_ctx.workspace_root()).unwrap();

        let a = Afp::new(["a.txt"], false);
        let b = Afp::new(["b.txt"], false);
        std::fs::write(a.host_path(&path_ctx), "hello\n").unwrap();
        std::fs::write(b.host_path(&path_ctx), "hello").unwrap();

        let ctx = JudgeContext::new(
            JudgeRequest::new(1, 1, 1, chrono::Utc::now()),
            tm_api::ApiClient::new("http://localhost", "test-secret").unwrap(),
            tm_container::ContainerDriver::connect().unwrap(),
            path_ctx,
            crate::context::TelemetryClient::default(),
            std::sync::Arc::new(NoopQueue),
            tm_model::ConfigProfile::default(),
        );

        assert!(compare_file(&ctx, &a, &b).unwrap());
    }

    struct NoopQueue;

    #[async_trait::async_trait]
    impl crate::context::QueueClient for NoopQueue {
        async fn enqueue(&self, _queue: QueueKind, _request: &JudgeRequest) -> Result<()> {
            Ok(())
        }
    }
}
