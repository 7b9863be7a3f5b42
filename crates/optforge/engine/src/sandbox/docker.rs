// Optforge
// Copyright (C) 2025 Optforge Contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Docker-backed sandbox executor

use super::{Invocation, Sandbox, SandboxError};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use optforge_common::EngineConfig;
use tracing::{debug, warn};
use uuid::Uuid;

/// Runs one command per container with network disabled, a memory
/// ceiling, a CPU quota, a non-root user and no privilege escalation.
/// The container is force-removed on every exit path.
pub struct DockerSandbox {
    docker: Docker,
    config: EngineConfig,
}

impl DockerSandbox {
    /// Connect to the local container daemon
    pub fn new(config: EngineConfig) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| SandboxError::Daemon(e.to_string()))?;
        Ok(Self { docker, config })
    }

    /// Pull the image if it is not present locally
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| SandboxError::Launch(format!("failed to pull image {image}: {e}")))?;
        }

        Ok(())
    }

    async fn collect_output(&self, container_id: &str) -> String {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        });

        let mut combined = String::new();
        let mut stream = self.docker.logs(container_id, options);
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    combined.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("log stream ended early: {e}");
                    break;
                }
            }
        }
        combined
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn execute(&self, invocation: Invocation) -> Result<String, SandboxError> {
        self.ensure_image(&invocation.image).await?;

        let name = format!("optforge-{}", Uuid::new_v4());
        let bind = format!("{}:{}:rw", invocation.scratch_dir.display(), super::SANDBOX_IO_DIR);

        let host_config = HostConfig {
            memory: Some(self.config.memory_limit_bytes),
            cpu_period: Some(self.config.cpu_period_us),
            cpu_quota: Some(self.config.cpu_quota_us),
            binds: Some(vec![bind]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            ..Default::default()
        };

        let config = Config {
            image: Some(invocation.image.clone()),
            cmd: Some(invocation.command.clone()),
            user: Some(self.config.sandbox_user.clone()),
            working_dir: Some(invocation.workdir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| SandboxError::Launch(format!("create failed: {e}")))?;
        let container_id = container.id;

        debug!(container = %container_id, command = ?invocation.command, "sandbox created");

        // From this point the container must be removed on every path.
        let outcome = async {
            self.docker
                .start_container(&container_id, None::<StartContainerOptions<String>>)
                .await
                .map_err(|e| SandboxError::Launch(format!("start failed: {e}")))?;

            let output = self.collect_output(&container_id).await;

            // Drain the wait stream so the exit status is settled before
            // removal. A non-zero status is the tool's business, not ours.
            let wait_options = Some(WaitContainerOptions { condition: "not-running" });
            let mut wait_stream = self.docker.wait_container(&container_id, wait_options);
            if let Some(Ok(response)) = wait_stream.next().await {
                debug!(container = %container_id, status = response.status_code, "sandbox exited");
            }

            Ok(output)
        }
        .await;

        let remove_options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        if let Err(e) = self.docker.remove_container(&container_id, remove_options).await {
            warn!(container = %container_id, "failed to remove sandbox container: {e}");
        }

        outcome
    }
}
