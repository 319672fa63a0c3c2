// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container-backed process execution.
//!
//! Each invocation creates a fresh container from the configured
//! image, hands it the event through its environment, waits for it to
//! exit, and harvests stderr as the invocation's logs.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::Docker;
use futures_util::StreamExt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use weir_core::{Event, ExitStatus, Process, ProcessConfig, ProcessError, ProcessStatus};

const IMAGE_KEY: &str = "image";
const ENV_KEY: &str = "env";

/// Environment variable carrying the base64-encoded event JSON into
/// the container.
const EVENT_ENV: &str = "PIPELINE_EVENT";

/// Construction failures for [`ContainerProcess`].
#[derive(Debug, Error)]
pub enum ContainerProcessError {
    /// The execution context has no `image` key. Set one to the
    /// container image this process should run.
    #[error("container image missing")]
    ImageMissing,
    /// No usable container runtime endpoint could be discovered from
    /// the environment.
    #[error("container runtime unavailable: {0}")]
    Runtime(String),
}

/// Runs one container per event against the local Docker daemon.
#[derive(Debug)]
pub struct ContainerProcess {
    image: String,
    extra_env: Vec<String>,
    docker: Docker,
    config: ProcessConfig,
}

impl ContainerProcess {
    /// Read the image and optional extra environment out of the
    /// config's execution context, and open a client to the container
    /// runtime using environment-provided endpoint discovery
    /// (`DOCKER_HOST` et al).
    pub fn new(config: ProcessConfig) -> Result<Self, ContainerProcessError> {
        let image = config
            .execution_context
            .get(IMAGE_KEY)
            .cloned()
            .ok_or(ContainerProcessError::ImageMissing)?;

        let extra_env = split_env(config.execution_context.get(ENV_KEY).map(String::as_str));

        let docker = Docker::connect_with_defaults()
            .map_err(|e| ContainerProcessError::Runtime(e.to_string()))?;

        Ok(Self {
            image,
            extra_env,
            docker,
            config,
        })
    }

    /// Fetch the container's stderr and split it into lines. Stdout
    /// is discarded; workloads are expected to report through stderr.
    async fn stderr_lines(&self, container: &str) -> Result<Vec<String>, ProcessError> {
        let options = LogsOptions {
            stdout: false,
            stderr: true,
            ..Default::default()
        };

        let mut logs = self.docker.logs(container, Some(options));
        let mut stderr = Vec::new();
        while let Some(chunk) = logs.next().await {
            let chunk = chunk.map_err(|e| ProcessError::Runtime(e.to_string()))?;
            if let LogOutput::StdErr { message } = chunk {
                stderr.extend_from_slice(&message);
            }
        }

        Ok(String::from_utf8_lossy(&stderr)
            .split('\n')
            .map(str::to_string)
            .collect())
    }

    /// Best-effort teardown for a cancelled invocation.
    async fn tear_down(&self, container: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(err) = self.docker.remove_container(container, Some(options)).await {
            tracing::warn!(container, error = %err, "failed to remove cancelled container");
        }
    }
}

#[async_trait]
impl Process for ContainerProcess {
    fn id(&self) -> String {
        self.config.id().to_string()
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        event: Event,
    ) -> Result<ProcessStatus, ProcessError> {
        let name = instance_name(&self.id());
        let mut status = ProcessStatus {
            name: name.clone(),
            status: ExitStatus::Unstarted,
            logs: Vec::new(),
        };

        let body = ContainerCreateBody {
            image: Some(self.image.clone()),
            env: Some(build_env(&event, &self.extra_env)),
            attach_stdout: Some(false),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                network_mode: Some("host".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: Some(name.clone()),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| ProcessError::Runtime(e.to_string()))?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| ProcessError::Runtime(e.to_string()))?;

        status.status = ExitStatus::Unknown;

        let mut wait = self
            .docker
            .wait_container(&created.id, None::<WaitContainerOptions>);
        let exited = tokio::select! {
            _ = cancel.cancelled() => {
                self.tear_down(&created.id).await;
                status.status = ExitStatus::Fail;
                return Err(ProcessError::Cancelled);
            }
            exited = wait.next() => exited,
        };

        let exited = match exited {
            Some(Ok(exited)) => exited,
            Some(Err(err)) => {
                status.status = ExitStatus::Fail;
                return Err(ProcessError::Runtime(err.to_string()));
            }
            None => {
                status.status = ExitStatus::Fail;
                return Err(ProcessError::Runtime(
                    "wait ended without an exit status".to_string(),
                ));
            }
        };

        status.logs = self.stderr_lines(&created.id).await?;

        match exited.status_code {
            0 => {
                status.status = ExitStatus::Success;
                Ok(status)
            }
            code => {
                status.status = ExitStatus::Fail;
                Err(ProcessError::NonZeroExit(code))
            }
        }
    }
}

/// Instance names are the process ID plus the current epoch
/// microseconds. The runtime rejects the rare within-microsecond
/// collision at creation time.
fn instance_name(id: &str) -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();

    format!("{id}_{micros}")
}

/// The environment delivered to the container: the event, base64
/// encoded, followed by any configured extras.
fn build_env(event: &Event, extra: &[String]) -> Vec<String> {
    let mut env = Vec::with_capacity(extra.len() + 1);
    if let Ok(json) = event.to_json() {
        env.push(format!("{EVENT_ENV}={}", BASE64.encode(json)));
    }
    env.extend(extra.iter().cloned());

    env
}

/// Split a comma-separated list of KEY=VALUE assignments, dropping
/// empty segments.
fn split_env(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .filter(|assignment| !assignment.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod container_tests;
