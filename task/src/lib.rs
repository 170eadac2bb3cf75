//! Task/Environ runtime (component C8), the operation layer (component
//! C7), and the per-run `JudgeContext` they share.
//!
//! Grounded on `examples/original_source/treadmill/tasks/base.py`'s
//! `Task`/`Environ`/active-environ-stack and `tasks/ops/*.py`'s individual
//! operations. Per spec.md §9's redesign note ("Generator-based task
//! composition... in an imperative target... use language-native
//! coroutines/fibers"), suspension is modeled with `async`/`await`: a task
//! body is just an `async fn`, and its suspension points are exactly its
//! `.await`s on operation futures, which is what the Python generator's
//! `yield` boundary meant. The ambient `JudgeContext` that the original
//! carried via a thread-local (`context.py`) is instead an explicit
//! `&mut JudgeContext` parameter, per spec.md §9's second redesign note.

#[macro_use]
extern crate error_chain;

pub mod context;
pub mod ops;

pub use context::{JudgeContext, TaskStack};

error_chain! {
    links {
        Container(tm_container::Error, tm_container::ErrorKind);
        Api(tm_api::Error, tm_api::ErrorKind);
    }

    foreign_links {
        Io(std::io::Error);
    }

    errors {
        /// Expected file missing; spec.md §7's "Precondition" category,
        /// "become server-fault with a task-stack attached".
        FileNotFound(path: std::path::PathBuf) {
            description("expected file does not exist")
            display("expected file does not exist: {}", path.display())
        }
    }
}

/// A scoped resource with guaranteed teardown: `setup` runs on entry,
/// `teardown` runs on every exit path (spec.md §4.3's "guaranteed
/// teardown"). Implementors are the builder/sandbox/workspace environs in
/// `tm-sandbox`/`tm-judge`.
#[async_trait::async_trait]
pub trait Environ: Send {
    /// Human-readable name pushed onto the active-task stack while this
    /// environ is entered (spec.md §4.3's "stack tracking").
    fn name(&self) -> &'static str;

    async fn setup(&mut self, ctx: &mut JudgeContext) -> Result<()>;
    async fn teardown(&mut self, ctx: &mut JudgeContext) -> Result<()>;
}

/// Run `body` inside `environ`'s scope: push the environ's name, run
/// `setup`, run `body`, then *always* run `teardown` and pop the stack —
/// regardless of whether `setup` or `body` failed (spec.md §4.3: "If
/// `setup` partially succeeds and then raises, the environ is popped...
/// `teardown` runs, and the failure propagates").
pub async fn with_environ<E, F, T>(mut environ: E, ctx: &mut JudgeContext, body: F) -> Result<T>
where
    E: Environ,
    F: for<'a> FnOnce(&'a mut E, &'a mut JudgeContext) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T>> + Send + 'a>>,
{
    ctx.stack.push(environ.name());

    let setup_result = environ.setup(ctx).await;
    let result = match setup_result {
        Ok(()) => body(&mut environ, ctx).await,
        Err(e) => Err(e),
    };

    let teardown_result = environ.teardown(ctx).await;
    ctx.stack.pop();

    match (result, teardown_result) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), _) => Err(e),
    }
}
