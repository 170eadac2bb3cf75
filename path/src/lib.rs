//! Abstract File Path (AFP): one path expressed in three coordinate systems
//! shared by the host, the running container and the isolated sandbox.
//!
//! Grounded on `examples/original_source/treadmill/tasks/path.py`'s `AFP`
//! class: a path is a list of path segments relative to the workspace root,
//! optionally visible from inside the `isolate` sandbox, optionally backed
//! by an object-store (S3) key used to stage it.

#[macro_use]
extern crate error_chain;

use std::path::PathBuf;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
}

/// Root of the workspace as seen by the running container.
const CONTAINER_ROOT: &str = "/workspace";

/// Root of the sandboxed process's own view, as remapped by `isolate`.
const SANDBOX_ROOT: &str = "/sandbox";

/// Path segment prepended to host/container paths of files that must be
/// visible from inside the sandbox.
const SANDBOX_PREFIX: &str = "sandbox";

/// Resolves AFP values to host paths. One instance per judge request: it
/// pins down the request's workspace root and the mount exposing
/// object-store keys as files.
#[derive(Clone, Debug)]
pub struct PathContext {
    /// `<TM_HOST_WORKSPACE_ROOT>`.
    host_workspace_root: PathBuf,

    /// `<TM_S3FS_ROOT>`.
    s3fs_root: PathBuf,

    /// Identifier of the request; the workspace root is
    /// `<host_workspace_root>/<request_id>`.
    request_id: i64,
}

impl PathContext {
    pub fn new(host_workspace_root: PathBuf, s3fs_root: PathBuf, request_id: i64) -> Self {
        PathContext {
            host_workspace_root,
            s3fs_root,
            request_id,
        }
    }

    /// Host path to the root of this request's workspace.
    pub fn workspace_root(&self) -> PathBuf {
        self.host_workspace_root.join(self.request_id.to_string())
    }
}

/// An Abstract File Path: a path-triple (host / container / sandbox) plus
/// an optional object-store source used to resolve its initial contents.
#[derive(Clone, Debug)]
pub struct Afp {
    segments: Vec<String>,
    sandbox_visible: bool,
    source_key: Option<String>,
}

impl Afp {
    /// Create an AFP with no object-store backing, e.g. a file the judge
    /// itself produces (compiler output, sandbox stdout/meta).
    pub fn new<I, S>(segments: I, sandbox_visible: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Afp {
            segments: segments.into_iter().map(Into::into).collect(),
            sandbox_visible,
            source_key: None,
        }
    }

    /// Create an AFP staged from an object-store key.
    pub fn from_object_store<I, S>(segments: I, sandbox_visible: bool, source_key: S) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut afp = Afp::new(segments, sandbox_visible);
        afp.source_key = Some(source_key.into());
        afp
    }

    /// Path to the submission's source, staged at `subm/<lang.src_name>`.
    pub fn submission_source(src_file_name: &str, object_key: &str) -> Self {
        Afp::from_object_store(["subm", src_file_name], true, object_key)
    }

    /// Path to the submission's compiled binary (or interpreted source, for
    /// languages that need no compilation).
    pub fn submission_binary(bin_file_name: &str) -> Self {
        Afp::new(["subm", bin_file_name], true)
    }

    /// Path to the grader's source, staged at `grader/<lang.src_name>`.
    pub fn grader_source(src_file_name: &str, object_key: &str) -> Self {
        Afp::from_object_store(["grader", src_file_name], true, object_key)
    }

    /// Path to the grader's compiled binary.
    pub fn grader_binary(bin_file_name: &str) -> Self {
        Afp::new(["grader", bin_file_name], true)
    }

    /// Path to a test case's input file, staged at
    /// `sandbox/data/<set_id>/<basename(input)>`.
    pub fn test_input(testset_id: i64, basename: &str, object_key: &str) -> Self {
        Afp::from_object_store(["data", &testset_id.to_string(), basename], true, object_key)
    }

    /// Path to a test case's expected-output file. Not sandbox-visible: the
    /// contestant's program and, via the sandbox, any judge under test must
    /// never be able to read the answer.
    pub fn test_output(testset_id: i64, basename: &str, object_key: &str) -> Self {
        Afp::from_object_store(["data", &testset_id.to_string(), basename], false, object_key)
    }

    /// A staging file under `etc/`, used to give python3 a `/etc/passwd`
    /// stub inside the sandbox.
    pub fn etc_passwd_stub() -> Self {
        Afp::new(["etc", "passwd"], false)
    }

    /// A log/meta file produced by a single test case execution.
    /// `stdin`/`stdout`/`stderr` are sandbox-visible (`isolate` redirects
    /// them from inside the box); `meta` is not, so the contestant's
    /// program can never read its own resource report (spec.md §4.6).
    pub fn exec_log(kind: &str, exec_id: &str) -> Self {
        let sandbox_visible = kind != "meta";
        Afp::new(["logs", &format!("{}.{}", exec_id, kind)], sandbox_visible)
    }

    pub fn is_sandbox_visible(&self) -> bool {
        self.sandbox_visible
    }

    pub fn object_store_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    fn relative(&self) -> PathBuf {
        let mut p = PathBuf::new();
        if self.sandbox_visible {
            p.push(SANDBOX_PREFIX);
        }
        for seg in &self.segments {
            p.push(seg);
        }
        p
    }

    /// Real path on the machine running containers.
    pub fn host_path(&self, ctx: &PathContext) -> PathBuf {
        ctx.workspace_root().join(self.relative())
    }

    /// Path as seen from inside the running container.
    pub fn container_path(&self) -> PathBuf {
        let mut p = PathBuf::from(CONTAINER_ROOT);
        p.push(self.relative());
        p
    }

    /// Path as seen from inside the isolated sandbox process, or `None` if
    /// this AFP is not sandbox-visible (per spec: undefined otherwise).
    pub fn sandbox_path(&self) -> Option<PathBuf> {
        if !self.sandbox_visible {
            return None;
        }
        let mut p = PathBuf::from(SANDBOX_ROOT);
        for seg in &self.segments {
            p.push(seg);
        }
        Some(p)
    }

    /// Path under the object-store mount (`TM_S3FS_ROOT`) this AFP is
    /// sourced from, if any.
    pub fn source_path(&self, ctx: &PathContext) -> Option<PathBuf> {
        self.source_key.as_ref().map(|key| ctx.s3fs_root.join(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PathContext {
        PathContext::new(PathBuf::from("/workspaces"), PathBuf::from("/mnt/s3fs"), 42)
    }

    #[test]
    fn submission_source_paths() {
        let ctx = ctx();
        let afp = Afp::submission_source("main.cpp", "subm/123/main.cpp");

        assert_eq!(afp.host_path(&ctx), PathBuf::from("/workspaces/42/sandbox/subm/main.cpp"));
        assert_eq!(afp.container_path(), PathBuf::from("/workspace/sandbox/subm/main.cpp"));
        assert_eq!(afp.sandbox_path(), Some(PathBuf::from("/sandbox/subm/main.cpp")));
        assert_eq!(afp.source_path(&ctx), Some(PathBuf::from("/mnt/s3fs/subm/123/main.cpp")));
    }

    #[test]
    fn meta_log_is_outside_the_sandbox_bind_mount() {
        let ctx = ctx();
        let stdout_afp = Afp::exec_log("stdout", "abc");
        let meta_afp = Afp::exec_log("meta", "abc");

        assert_eq!(stdout_afp.container_path(), PathBuf::from("/workspace/sandbox/logs/abc.stdout"));
        assert_eq!(stdout_afp.sandbox_path(), Some(PathBuf::from("/sandbox/logs/abc.stdout")));

        assert_eq!(meta_afp.container_path(), PathBuf::from("/workspace/logs/abc.meta"));
        assert_eq!(meta_afp.host_path(&ctx), PathBuf::from("/workspaces/42/logs/abc.meta"));
        assert_eq!(meta_afp.sandbox_path(), None);
    }

    #[test]
    fn expected_output_is_not_sandbox_visible() {
        let ctx = ctx();
        let afp = Afp::test_output(1, "1.out", "tests/1/1.out");

        assert_eq!(afp.host_path(&ctx), PathBuf::from("/workspaces/42/data/1/1.out"));
        assert_eq!(afp.container_path(), PathBuf::from("/workspace/data/1/1.out"));
        assert_eq!(afp.sandbox_path(), None);
    }
}
