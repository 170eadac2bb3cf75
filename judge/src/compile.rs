//! Compile stage (component C9): builder environ(s) for the submission and,
//! if present, the grader.
//!
//! Grounded on `examples/original_source/treadmill/tasks/composite.py`'s
//! `CompileAllTask` and `tasks/container.py`'s `CompileTask`. Reusing the
//! builder container when submission and grader share a language is a
//! deliberate optimization kept from the original (spec.md §4.8: "cheap ...
//! but image load is not").

use tm_path::Afp;
use tm_sandbox::BuilderEnviron;
use tm_task::context::JudgeContext;

use crate::{Error, ErrorKind, Result};

/// Runs the compile stage against an already-staged workspace. Fails with
/// `SubmissionCompileError`/`GraderCompileError` on nonzero compiler exit,
/// each carrying the captured compiler output (spec.md §4.8).
pub async fn compile_all(ctx: &mut JudgeContext) -> Result<()> {
    let submission = ctx
        .submission
        .as_ref()
        .expect("compile_all called before FetchSubmission");
    let subm_lang = submission.lang;
    let grader_lang = ctx.grader_lang;

    let subm_src = Afp::submission_source(subm_lang.src_file_name(), &submission.src_key);
    let subm_bin = Afp::submission_binary(subm_lang.bin_file_name());

    if subm_lang.needs_compile() {
        let mut builder = BuilderEnviron::new(ctx.container_driver.clone(), subm_lang, ctx.profile);
        builder.setup(&ctx.path_ctx.workspace_root()).await?;

        let compile_result = builder
            .compile(
                &subm_src.container_path().to_string_lossy(),
                &subm_bin.container_path().to_string_lossy(),
            )
            .await;
        let compile_result = match compile_result {
            Ok(r) => r,
            Err(e) => {
                builder.teardown().await.ok();
                return Err(e.into());
            }
        };
        if compile_result.exit_code != 0 {
            builder.teardown().await.ok();
            return Err(Error::from(ErrorKind::SubmissionCompileError(compile_result.output)));
        }

        if let Some(grader) = ctx.grader.clone() {
            if grader_lang == Some(subm_lang) {
                let grader_src = Afp::grader_source(grader.lang.src_file_name(), &grader.src_key);
                let grader_bin = Afp::grader_binary(grader.lang.bin_file_name());
                let result = builder
                    .compile(
                        &grader_src.container_path().to_string_lossy(),
                        &grader_bin.container_path().to_string_lossy(),
                    )
                    .await?;
                builder.teardown().await.ok();
                if result.exit_code != 0 {
                    return Err(Error::from(ErrorKind::GraderCompileError(result.output)));
                }
                return Ok(());
            }
        }

        builder.teardown().await.ok();
    }

    if let Some(grader) = ctx.grader.clone() {
        let lang = grader.lang;
        if lang.needs_compile() {
            let mut builder = BuilderEnviron::new(ctx.container_driver.clone(), lang, ctx.profile);
            builder.setup(&ctx.path_ctx.workspace_root()).await?;

            let grader_src = Afp::grader_source(lang.src_file_name(), &grader.src_key);
            let grader_bin = Afp::grader_binary(lang.bin_file_name());
            let result = builder
                .compile(
                    &grader_src.container_path().to_string_lossy(),
                    &grader_bin.container_path().to_string_lossy(),
                )
                .await;
            builder.teardown().await.ok();

            let result = result?;
            if result.exit_code != 0 {
                return Err(Error::from(ErrorKind::GraderCompileError(result.output)));
            }
        }
    }

    Ok(())
}
