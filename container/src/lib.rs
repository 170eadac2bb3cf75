//! Ephemeral container driver (component C4): run/exec/kill containers with
//! the workspace bind-mounted, on top of the Docker engine.
//!
//! Grounded on `examples/original_source/treadmill/tasks/ops/container.py`'s
//! `RunDockerContainerOp`/`ExecInDockerContainerOp`/`KillDockerContainerOp`,
//! using `bollard` (async Docker client) as enriched from the pack's
//! `In-Saiyan-AlgoJudge` manifest, since the rest of the stack runs under
//! `tokio` (see `tm-judge`'s async `Task`/`Environ` runtime).

#[macro_use]
extern crate error_chain;

use std::path::Path;

use bollard::container::{
    Config, KillContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;

error_chain! {
    foreign_links {
        Docker(bollard::errors::Error);
    }

    errors {
        ContainerDead(id: String) {
            description("container is not running")
            display("container {} is not running", id)
        }
    }
}

/// A container started by [`ContainerDriver::run`]. Killing it is
/// idempotent: `kill` on an already-dead container is a no-op, matching
/// `KillDockerContainerOp`'s `status != 'end'` guard.
#[derive(Clone, Debug)]
pub struct RunningContainer {
    pub id: String,
}

/// Result of [`ContainerDriver::exec`]: combined stdout+stderr, matching
/// `container.exec_run`'s default `demux=False` behavior.
#[derive(Clone, Debug)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: Vec<u8>,
}

/// Thin wrapper over the Docker engine. One instance is shared across all
/// in-flight judge requests (spec.md §5: "the container-engine client...
/// must be safe for concurrent use" — `bollard::Docker` is `Clone + Send +
/// Sync`, backed by a connection pool).
#[derive(Clone)]
pub struct ContainerDriver {
    docker: Docker,
}

impl ContainerDriver {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(ContainerDriver { docker })
    }

    /// Start a detached container from `image`, kept alive via `/bin/sh`
    /// (`stdin_open`), with image-layer changes discarded on stop.
    pub async fn run(
        &self,
        image: &str,
        workspace_host_path: Option<&Path>,
        privileged: bool,
    ) -> Result<RunningContainer> {
        let mut host_config = HostConfig {
            privileged: Some(privileged),
            ..Default::default()
        };

        if let Some(ws) = workspace_host_path {
            host_config.binds = Some(vec![format!(
                "{}:/workspace:rw",
                ws.to_string_lossy()
            )]);
        }

        let config = Config {
            image: Some(image.to_owned()),
            tty: Some(true),
            open_stdin: Some(true),
            cmd: Some(vec!["/bin/sh".to_owned()]),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container::<String, String>(None, config)
            .await?;
        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        log::debug!("started container {} from image {}", created.id, image);
        Ok(RunningContainer { id: created.id })
    }

    /// Run `/bin/sh -c <argv joined by spaces>` inside `container`.
    pub async fn exec(&self, container: &RunningContainer, argv: &[String]) -> Result<ExecOutput> {
        let cmd = vec![
            "/bin/sh".to_owned(),
            "-c".to_owned(),
            argv.join(" "),
        ];

        let created = self
            .docker
            .create_exec(
                &container.id,
                CreateExecOptions {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut output = Vec::new();
        if let StartExecResults::Attached { output: mut stream, .. } =
            self.docker.start_exec(&created.id, None).await?
        {
            while let Some(Ok(chunk)) = stream.next().await {
                output.extend_from_slice(chunk.into_bytes().as_ref());
            }
        }

        let inspect = self.docker.inspect_exec(&created.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutput { exit_code, output })
    }

    /// Kill and remove `container`; a no-op if it is already gone.
    pub async fn kill(&self, container: &RunningContainer) -> Result<()> {
        match self
            .docker
            .kill_container(&container.id, None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => {}
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                return Ok(());
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 409, .. }) => {
                // Already stopped.
            }
            Err(e) => return Err(e.into()),
        }

        let _ = self
            .docker
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        Ok(())
    }
}
