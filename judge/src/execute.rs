//! Execute stage / per-case judging (component C10): run the submission
//! under the sandbox, optionally run the grader, and map the outcome to a
//! test case verdict.
//!
//! Grounded on `examples/original_source/treadmill/tasks/judge.py`'s
//! `JudgeTestSetTask` and `tasks/composite.py`'s `JudgeAllTask`, refined by
//! spec.md §4.9's precise outcome-mapping table (the original's simple
//! `filecmp.cmp` comparison is the fallback path when there is no grader).

use tm_model::{IsolateExecMeta, TestCaseJudgeStatus};
use tm_path::Afp;
use tm_sandbox::{ExecLimits, SandboxEnviron};
use tm_task::context::JudgeContext;
use tm_task::ops;

use crate::{Error, ErrorKind, Result};

/// Run every test set in declared order; each test set short-circuits on
/// its first non-pass outcome (spec.md §4.9's "Short-circuit rule").
/// Returns `Ok(())` once every set has been judged (or short-circuited);
/// server-fault outcomes propagate as an `Err` (spec.md's "ServerFault...
/// NOT_JUDGED + re-raise").
pub async fn judge_all(ctx: &mut JudgeContext) -> Result<()> {
    let submission = ctx
        .submission
        .as_ref()
        .expect("judge_all called before FetchSubmission");
    let subm_lang = submission.lang;
    let grader_lang = ctx.grader_lang;
    let grader = ctx.grader.clone();
    let judge_spec = ctx.judge_spec.clone().expect("judge_all called before FetchSubmission");

    let mut subm_sandbox = SandboxEnviron::new(ctx.container_driver.clone(), subm_lang, ctx.profile, true);
    subm_sandbox.setup(&ctx.path_ctx.workspace_root()).await?;

    let mut grader_sandbox = match &grader {
        Some(g) => {
            let mut sb = SandboxEnviron::new(ctx.container_driver.clone(), g.lang, ctx.profile, false);
            if let Err(e) = sb.setup(&ctx.path_ctx.workspace_root()).await {
                subm_sandbox.teardown().await.ok();
                return Err(e.into());
            }
            Some(sb)
        }
        None => None,
    };

    let result = judge_testsets(ctx, &subm_sandbox, grader_sandbox.as_ref(), grader_lang, &judge_spec).await;

    if let Some(mut sb) = grader_sandbox.take() {
        sb.teardown().await.ok();
    }
    subm_sandbox.teardown().await.ok();

    result?;

    let passed = ctx.total_score == judge_spec.total_score;
    ops::update_judge_result(
        ctx,
        if passed { tm_model::JudgeStatus::Passed } else { tm_model::JudgeStatus::Failed },
        None,
    )
    .await?;

    Ok(())
}

async fn judge_testsets(
    ctx: &mut JudgeContext,
    subm_sandbox: &SandboxEnviron,
    grader_sandbox: Option<&SandboxEnviron>,
    grader_lang: Option<tm_model::Language>,
    judge_spec: &tm_model::JudgeSpec,
) -> Result<()> {
    let submission = ctx.submission.as_ref().unwrap();
    let subm_lang = submission.lang;
    let subm_bin = Afp::submission_binary(subm_lang.bin_file_name());
    let grader_bin = grader_lang.map(|l| Afp::grader_binary(l.bin_file_name()));

    let limits = ExecLimits {
        mem_limit_bytes: judge_spec.mem_limit_bytes,
        time_limit_seconds: judge_spec.time_limit_seconds,
        file_size_limit_kilos: judge_spec.file_size_limit_kilos,
        pid_limits: judge_spec.pid_limits,
    };

    for testset in &judge_spec.testsets {
        let mut set_score = testset.score;

        for testcase in &testset.testcases {
            let exec_id = uuid::Uuid::new_v4().to_string();
            let input_basename = testcase.input_key.rsplit('/').next().unwrap_or(&testcase.input_key).to_owned();
            let output_basename = testcase.output_key.rsplit('/').next().unwrap_or(&testcase.output_key).to_owned();

            let input_afp = Afp::test_input(testset.id, &input_basename, &testcase.input_key);
            let expected_afp = Afp::test_output(testset.id, &output_basename, &testcase.output_key);

            let outcome = judge_one_case(
                ctx,
                subm_sandbox,
                grader_sandbox,
                &subm_bin,
                grader_bin.as_ref(),
                &input_afp,
                &expected_afp,
                subm_lang.needs_etc_mount(),
                &limits,
                &exec_id,
            )
            .await;

            let (status, time_seconds, memory_bytes, error) = match outcome {
                Ok(o) => o,
                Err(e) => {
                    ops::update_testcase_result(
                        ctx,
                        testset.id,
                        testcase.id,
                        TestCaseJudgeStatus::NotJudged,
                        None,
                        None,
                        Some(e.to_string()),
                    )
                    .await?;
                    return Err(e);
                }
            };

            let is_pass = status.is_passed();
            ops::update_testcase_result(ctx, testset.id, testcase.id, status, time_seconds, memory_bytes, error)
                .await?;

            if !is_pass {
                set_score = 0;
                break;
            }
        }

        ops::update_testset_result(ctx, testset.id, set_score).await?;
    }

    Ok(())
}

type CaseOutcome = (TestCaseJudgeStatus, Option<f64>, Option<u64>, Option<String>);

#[allow(clippy::too_many_arguments)]
async fn judge_one_case(
    ctx: &JudgeContext,
    subm_sandbox: &SandboxEnviron,
    grader_sandbox: Option<&SandboxEnviron>,
    subm_bin: &Afp,
    grader_bin: Option<&Afp>,
    input_afp: &Afp,
    expected_afp: &Afp,
    needs_etc_mount: bool,
    limits: &ExecLimits,
    exec_id: &str,
) -> Result<CaseOutcome> {
    let stdout_afp = Afp::exec_log("stdout", exec_id);
    let stderr_afp = Afp::exec_log("stderr", exec_id);
    let meta_afp = Afp::exec_log("meta", exec_id);

    let etc_mount = if needs_etc_mount {
        let etc_afp = Afp::etc_passwd_stub();
        let etc_dir_container = etc_afp
            .container_path()
            .parent()
            .expect("etc passwd stub AFP always has a parent directory")
            .to_string_lossy()
            .into_owned();
        Some(("/etc".to_owned(), etc_dir_container))
    } else {
        None
    };

    let result = subm_sandbox
        .exec_subm(
            &subm_bin.sandbox_path().unwrap().to_string_lossy(),
            &input_afp.sandbox_path().unwrap().to_string_lossy(),
            &stdout_afp.sandbox_path().unwrap().to_string_lossy(),
            &stderr_afp.sandbox_path().unwrap().to_string_lossy(),
            &meta_afp.container_path().to_string_lossy(),
            etc_mount.as_ref().map(|(a, b)| (a.as_str(), b.as_str())),
            *limits,
        )
        .await?;

    if result.exit_code >= 2 {
        return Err(Error::from(ErrorKind::IsolateExecutionError(result.output)));
    }

    let meta_contents = ops::read_file(ctx, &meta_afp)?;
    let meta = IsolateExecMeta::parse(&meta_contents).map_err(|e| Error::from(e.to_string()))?;

    if meta.time_wall.unwrap_or(0.0) > limits.time_limit_seconds {
        return Ok((TestCaseJudgeStatus::TimeLimitExceeded, meta.time, meta.max_rss, None));
    }

    if meta.cg_mem.unwrap_or(0) >= limits.mem_limit_bytes && result.exit_code == 1 {
        return Ok((TestCaseJudgeStatus::MemoryLimitExceeded, meta.time, meta.max_rss, None));
    }

    if result.exit_code != 0 {
        let stderr = ops::read_file(ctx, &stderr_afp).unwrap_or_default();
        let stdout = ops::read_file(ctx, &stdout_afp).unwrap_or_default();
        return Err(Error::from(ErrorKind::SubmissionRuntimeError(format!(
            "exit {}; stdout: {}; stderr: {}",
            result.exit_code, stdout, stderr
        ))));
    }

    let passed = match (grader_sandbox, grader_bin) {
        (Some(sandbox), Some(bin)) => {
            let grader_stdout_afp = Afp::exec_log("stdout", &format!("{}-grader", exec_id));
            let grader_result = sandbox
                .exec_grader(
                    &bin.container_path().to_string_lossy(),
                    &input_afp.container_path().to_string_lossy(),
                    &stdout_afp.container_path().to_string_lossy(),
                    &expected_afp.container_path().to_string_lossy(),
                    &grader_stdout_afp.container_path().to_string_lossy(),
                )
                .await?;

            if grader_result.exit_code != 0 {
                return Err(Error::from(ErrorKind::GraderRuntimeError(grader_result.output)));
            }

            let verdict = ops::read_file(ctx, &grader_stdout_afp)?;
            verdict.trim_end() == "1"
        }
        _ => ops::compare_file(ctx, &stdout_afp, expected_afp)?,
    };

    if passed {
        Ok((TestCaseJudgeStatus::Passed, meta.time, meta.max_rss, None))
    } else {
        Ok((TestCaseJudgeStatus::WrongAnswer, meta.time, meta.max_rss, None))
    }
}
