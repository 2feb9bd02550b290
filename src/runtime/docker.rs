//! Docker-backed `ContainerRunner`, talking to a local daemon via `bollard`.

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogsOptions, RemoveContainerOptions,
    WaitContainerOptions,
};
use bollard::secret::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tokio_util::io::StreamReader;
use tracing::warn;

use super::{ContainerHandle, ContainerRunner, LogReader, Result, RuntimeError};
use crate::jobspec::JobConfig;

pub struct DockerHandle {
    container_id: String,
}

pub struct DockerRunner {
    client: Docker,
}

impl DockerRunner {
    pub fn connect() -> Result<Self> {
        let client = Docker::connect_with_local_defaults()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn spawn_job(&self, config: &JobConfig) -> Result<ContainerHandle> {
        let env: Vec<String> = config.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let binds = vec![format!("{}:/job", config.workspace_dir)];

        let container_config = ContainerConfig {
            image: Some(config.image.clone()),
            cmd: Some(config.argv.clone()),
            env: Some(env),
            working_dir: Some(config.working_dir.clone()),
            host_config: Some(HostConfig {
                binds: Some(binds),
                ..Default::default()
            }),
            ..Default::default()
        };

        let name = format!("reactorcide-{}", uuid::Uuid::now_v7());
        let created = self
            .client
            .create_container(Some(CreateContainerOptions { name: name.clone(), platform: None }), container_config)
            .await
            .map_err(|e| RuntimeError::SpawnFailed(e.to_string()))?;

        self.client
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|e| RuntimeError::SpawnFailed(e.to_string()))?;

        Ok(ContainerHandle::Docker(DockerHandle { container_id: created.id }))
    }

    async fn stream_logs(&self, handle: &mut ContainerHandle) -> Result<(LogReader, LogReader)> {
        let ContainerHandle::Docker(docker) = handle else {
            unreachable!("DockerRunner only produces ContainerHandle::Docker");
        };

        let stdout_opts = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: false,
            ..Default::default()
        };
        let stderr_opts = LogsOptions::<String> {
            follow: true,
            stdout: false,
            stderr: true,
            ..Default::default()
        };

        let stdout_stream = self
            .client
            .logs(&docker.container_id, Some(stdout_opts))
            .map(log_output_to_io_result);
        let stderr_stream = self
            .client
            .logs(&docker.container_id, Some(stderr_opts))
            .map(log_output_to_io_result);

        let stdout: LogReader = Box::pin(tokio::io::BufReader::new(StreamReader::new(stdout_stream)));
        let stderr: LogReader = Box::pin(tokio::io::BufReader::new(StreamReader::new(stderr_stream)));
        Ok((stdout, stderr))
    }

    async fn wait_for_completion(&self, handle: &mut ContainerHandle) -> Result<i32> {
        let ContainerHandle::Docker(docker) = handle else {
            unreachable!("DockerRunner only produces ContainerHandle::Docker");
        };
        let mut stream = self.client.wait_container(&docker.container_id, None::<WaitContainerOptions<String>>);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code as i32),
            Some(Err(e)) => Err(RuntimeError::Docker(e)),
            None => Ok(-1),
        }
    }

    async fn terminate(&self, handle: &mut ContainerHandle) -> Result<()> {
        let ContainerHandle::Docker(docker) = handle else {
            unreachable!("DockerRunner only produces ContainerHandle::Docker");
        };
        if let Err(e) = self.client.stop_container(&docker.container_id, None).await {
            warn!(error = %e, container_id = %docker.container_id, "failed to stop container");
        }
        Ok(())
    }

    async fn cleanup(&self, handle: ContainerHandle) -> Result<()> {
        let ContainerHandle::Docker(docker) = handle else {
            unreachable!("DockerRunner only produces ContainerHandle::Docker");
        };
        let opts = RemoveContainerOptions { force: true, ..Default::default() };
        if let Err(e) = self.client.remove_container(&docker.container_id, Some(opts)).await {
            warn!(error = %e, container_id = %docker.container_id, "cleanup failed (best-effort)");
        }
        Ok(())
    }
}

fn log_output_to_io_result(
    item: std::result::Result<bollard::container::LogOutput, bollard::errors::Error>,
) -> std::result::Result<bytes::Bytes, std::io::Error> {
    item.map(|output| output.into_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}
