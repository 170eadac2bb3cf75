//! Workspace environ (component C6): per-request on-disk tree, staged
//! inputs, guaranteed teardown.
//!
//! Grounded on `examples/original_source/treadmill/tasks/workspace.py`'s
//! `WorkspaceContext`.

use tm_path::Afp;
use tm_task::{context::JudgeContext, ops, Environ};

/// Creates the workspace root and symlinks submission/test/grader sources
/// from the object-store mount in; tears it down (recursive remove) on
/// exit regardless of outcome (spec.md §4.7).
pub struct WorkspaceEnviron;

impl WorkspaceEnviron {
    pub fn new() -> Self {
        WorkspaceEnviron
    }
}

impl Default for WorkspaceEnviron {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Environ for WorkspaceEnviron {
    fn name(&self) -> &'static str {
        "WorkspaceEnviron"
    }

    async fn setup(&mut self, ctx: &mut JudgeContext) -> tm_task::Result<()> {
        let root = ctx.path_ctx.workspace_root();
        std::fs::create_dir_all(&root).map_err(tm_task::Error::from)?;

        let submission = ctx
            .submission
            .as_ref()
            .expect("WorkspaceEnviron::setup called before FetchSubmission");
        let judge_spec = ctx
            .judge_spec
            .as_ref()
            .expect("WorkspaceEnviron::setup called before FetchSubmission");

        let src_afp = Afp::submission_source(submission.lang.src_file_name(), &submission.src_key);
        stage(ctx, &src_afp)?;

        for testset in &judge_spec.testsets {
            for testcase in &testset.testcases {
                let input_basename = basename(&testcase.input_key);
                let output_basename = basename(&testcase.output_key);

                let input_afp = Afp::test_input(testset.id, &input_basename, &testcase.input_key);
                stage(ctx, &input_afp)?;

                let output_afp = Afp::test_output(testset.id, &output_basename, &testcase.output_key);
                stage(ctx, &output_afp)?;
            }
        }

        if let Some(grader) = &ctx.grader {
            let grader_afp = Afp::grader_source(grader.lang.src_file_name(), &grader.src_key);
            stage(ctx, &grader_afp)?;
        }

        if submission.lang.needs_etc_mount() {
            let etc_afp = Afp::etc_passwd_stub();
            ops::create_file(ctx, &etc_afp, None)?;
        }

        Ok(())
    }

    async fn teardown(&mut self, ctx: &mut JudgeContext) -> tm_task::Result<()> {
        let root = ctx.path_ctx.workspace_root();
        if root.is_dir() {
            std::fs::remove_dir_all(&root).map_err(tm_task::Error::from)?;
        }
        Ok(())
    }
}

/// Stage one AFP from its object-store source into the workspace. This
/// implementation picks symlink staging over copy (spec.md §9 open
/// question 3: "Copy is safer under isolate's pivot_root; symlink is
/// faster. Pick per deployment" — see `DESIGN.md`).
fn stage(ctx: &JudgeContext, afp: &Afp) -> tm_task::Result<()> {
    let source = afp
        .source_path(&ctx.path_ctx)
        .ok_or("AFP has no object-store source")?;
    let dest = afp.host_path(&ctx.path_ctx);
    ops::create_symlink(&source, &dest)
}

fn basename(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_owned()
}
