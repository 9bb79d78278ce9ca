//! Docker-backed runtime using bollard.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::ListImagesOptions;
use bollard::models::{ContainerInspectResponse, HostConfig, PortBinding};
use futures::TryStreamExt;
use tokio::sync::RwLock;

use crate::error::RuntimeError;
use crate::launch::LaunchSpec;
use crate::runtime::{ContainerRuntime, ImageInfo};

/// Connect to the local Docker daemon.
///
/// Tries bollard's defaults (`DOCKER_HOST` or `/var/run/docker.sock`) first,
/// then the per-user sockets used by Docker Desktop, Colima and rootless Docker.
pub async fn connect_docker() -> Result<Docker, RuntimeError> {
    #[allow(unused_mut)]
    let mut last_error = match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    #[cfg(unix)]
    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        let Some(path) = socket.to_str() else {
            continue;
        };
        match Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION) {
            Ok(docker) if docker.ping().await.is_ok() => {
                tracing::debug!("Connected to Docker via {}", path);
                return Ok(docker);
            }
            Ok(_) => last_error = format!("{} did not answer ping", path),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(RuntimeError::Unavailable { reason: last_error })
}

#[cfg(unix)]
fn fallback_sockets() -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Some(home) = dirs::home_dir() {
        sockets.push(home.join(".docker/run/docker.sock"));
        sockets.push(home.join(".colima/default/docker.sock"));
    }
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        sockets.push(PathBuf::from(runtime_dir).join("docker.sock"));
    }
    sockets
}

fn map_error(id: &str, err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound { id: id.to_string() },
        other => RuntimeError::Api(other.to_string()),
    }
}

/// [`ContainerRuntime`] over a bollard connection.
pub struct DockerRuntime {
    docker: RwLock<Option<Docker>>,
}

impl DockerRuntime {
    /// Open a connection to the local daemon.
    pub async fn connect() -> Result<Self, RuntimeError> {
        let docker = connect_docker().await?;
        Ok(Self::with_client(docker))
    }

    pub fn with_client(docker: Docker) -> Self {
        Self {
            docker: RwLock::new(Some(docker)),
        }
    }

    async fn client(&self) -> Result<Docker, RuntimeError> {
        self.docker
            .read()
            .await
            .clone()
            .ok_or_else(|| RuntimeError::Unavailable {
                reason: "runtime connection closed".to_string(),
            })
    }

    fn container_config(spec: &LaunchSpec) -> Config<String> {
        let exposed_ports = spec
            .exposed_port
            .map(|port| HashMap::from([(port.key(), HashMap::new())]));

        let port_bindings = spec.exposed_port.map(|port| {
            HashMap::from([(
                port.key(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: None,
                }]),
            )])
        });

        let host_config = HostConfig {
            port_bindings,
            readonly_rootfs: Some(spec.readonly_rootfs),
            network_mode: spec.network_mode.clone(),
            // Removal is explicit so logs survive a stopped container.
            auto_remove: Some(false),
            ..Default::default()
        };

        Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            exposed_ports,
            labels: Some(spec.labels.clone().into_iter().collect()),
            host_config: Some(host_config),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_container(&self, name: &str, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        let docker = self.client().await?;
        let options = CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        };
        let response = docker
            .create_container(Some(options), Self::container_config(spec))
            .await
            .map_err(|e| map_error(name, e))?;
        for warning in &response.warnings {
            tracing::warn!("Docker warning for {}: {}", name, warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.client()
            .await?
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_error(id, e))
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, RuntimeError> {
        self.client()
            .await?
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_error(id, e))
    }

    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let chunks: Vec<_> = self
            .client()
            .await?
            .logs(id, Some(options))
            .try_collect()
            .await
            .map_err(|e| map_error(id, e))?;
        Ok(chunks.into_iter().map(|chunk| chunk.to_string()).collect())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        match self
            .client()
            .await?
            .stop_container(id, None::<StopContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(DockerError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_error(id, e)),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.client()
            .await?
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| map_error(id, e))
    }

    async fn list_images(&self, label: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
        let filters = HashMap::from([("label".to_string(), vec![format!("{}={}", label, value)])]);
        let images = self
            .client()
            .await?
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        Ok(images
            .into_iter()
            .map(|image| ImageInfo {
                id: image.id,
                tags: image.repo_tags,
                labels: image.labels,
            })
            .collect())
    }

    async fn close(&self) {
        if self.docker.write().await.take().is_some() {
            tracing::debug!("Docker runtime connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::PortExposure;
    use crate::types::{ConnectionRole, Transport};
    use std::collections::BTreeMap;

    fn spec(exposed: Option<PortExposure>) -> LaunchSpec {
        LaunchSpec {
            role: ConnectionRole::Server,
            image: "openssl-server:3.2.0".to_string(),
            cmd: vec!["s_server".to_string(), "-accept".to_string(), "4433".to_string()],
            exposed_port: exposed,
            readonly_rootfs: true,
            labels: BTreeMap::from([("server_type".to_string(), "openssl".to_string())]),
            network_mode: None,
        }
    }

    #[test]
    fn test_container_config_publishes_port() {
        let config = DockerRuntime::container_config(&spec(Some(PortExposure {
            container_port: 4433,
            transport: Transport::Tcp,
        })));

        assert!(config.exposed_ports.unwrap().contains_key("4433/tcp"));
        let host_config = config.host_config.unwrap();
        assert_eq!(host_config.readonly_rootfs, Some(true));
        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["4433/tcp"].as_ref().unwrap()[0].clone();
        assert_eq!(binding.host_port, None);
        assert_eq!(
            config.labels.unwrap().get("server_type").map(String::as_str),
            Some("openssl")
        );
    }

    #[test]
    fn test_container_config_without_port() {
        let config = DockerRuntime::container_config(&spec(None));
        assert!(config.exposed_ports.is_none());
        assert!(config.host_config.unwrap().port_bindings.is_none());
    }

    #[test]
    fn test_not_found_mapping() {
        let err = map_error(
            "abc",
            DockerError::DockerResponseServerError {
                status_code: 404,
                message: "No such container: abc".to_string(),
            },
        );
        assert!(matches!(err, RuntimeError::NotFound { ref id } if id == "abc"));
    }

    #[tokio::test]
    async fn test_closed_runtime_is_unavailable() {
        // connect_with_local_defaults does not dial until the first request.
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        let runtime = DockerRuntime::with_client(docker);
        runtime.close().await;
        let err = runtime.start_container("abc").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Unavailable { .. }));
    }
}
