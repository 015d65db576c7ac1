//! Container runtime used by the lifecycle controller.
//!
//! The controller only talks to [`ContainerRuntime`]; [`DockerRuntime`] is the
//! production implementation on top of bollard.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use futures::TryStreamExt;

use crate::error::{RuntimeError, SetupError};

/// What to create for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub name: String,
    pub image: String,
    /// Port the service listens on inside the container.
    pub container_port: u16,
    /// Host port the container port is published on.
    pub host_port: u16,
    /// Host interface to bind; `0.0.0.0` for all interfaces.
    pub host_ip: String,
}

/// Operations the lifecycle needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fetch an image, waiting until the pull has finished.
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create (but do not start) an instance; returns its runtime id.
    async fn create_instance(&self, spec: &InstanceSpec) -> Result<String, RuntimeError>;

    async fn start_instance(&self, container_id: &str) -> Result<(), RuntimeError>;

    async fn stop_instance(&self, container_id: &str) -> Result<(), RuntimeError>;

    async fn remove_instance(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Command an operator can run to remove a stuck instance by hand.
    fn remediation_hint(&self, container_id: &str) -> String {
        format!("docker rm -f {}", container_id)
    }
}

/// Connect to the local Docker daemon and check it answers.
pub async fn connect_docker() -> Result<Docker, SetupError> {
    let docker = Docker::connect_with_local_defaults().map_err(|e| {
        SetupError::DockerUnavailable {
            reason: e.to_string(),
        }
    })?;
    docker
        .ping()
        .await
        .map_err(|e| SetupError::DockerUnavailable {
            reason: e.to_string(),
        })?;
    Ok(docker)
}

/// Docker-backed runtime.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    /// Grace period in seconds before Docker kills a stopping container.
    stop_grace_secs: i64,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            stop_grace_secs: 10,
        }
    }

    /// Connect to the local daemon.
    pub async fn connect() -> Result<Self, SetupError> {
        Ok(Self::new(connect_docker().await?))
    }
}

/// Container config exposing `spec.container_port` on `spec.host_ip:spec.host_port`.
pub(crate) fn container_config(spec: &InstanceSpec) -> Config<String> {
    let port_key = format!("{}/tcp", spec.container_port);

    let host_config = HostConfig {
        port_bindings: Some(HashMap::from([(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some(spec.host_ip.clone()),
                host_port: Some(spec.host_port.to_string()),
            }]),
        )])),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        exposed_ports: Some(HashMap::from([(port_key, HashMap::new())])),
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        tracing::info!(image = %image, "Pulling image");
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| RuntimeError::PullFailed {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn create_instance(&self, spec: &InstanceSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await
            .map_err(|e| RuntimeError::CreateFailed {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, "Docker warning: {}", warning);
        }

        Ok(response.id)
    }

    async fn start_instance(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container::<String>(container_id, None)
            .await
            .map_err(|e| RuntimeError::StartFailed {
                container_id: container_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn stop_instance(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(
                container_id,
                Some(StopContainerOptions {
                    t: self.stop_grace_secs,
                }),
            )
            .await
            .map_err(|e| RuntimeError::StopFailed {
                container_id: container_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove_instance(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| RuntimeError::RemoveFailed {
                container_id: container_id.to_string(),
                reason: e.to_string(),
            })
    }
}
