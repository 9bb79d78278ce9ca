//! Container runtime boundary.
//!
//! The provisioner only talks to a [`ContainerRuntime`]. [`DockerRuntime`]
//! drives a real Docker daemon through bollard; tests use
//! [`FakeRuntime`](crate::testing::FakeRuntime).

mod docker;

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::models::ContainerInspectResponse;

use crate::error::RuntimeError;
use crate::launch::LaunchSpec;

pub use docker::{DockerRuntime, connect_docker};

/// An image as seen by version discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: String,
    pub tags: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// Capabilities the provisioner needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create (but do not start) a container. Returns its id.
    async fn create_container(&self, name: &str, spec: &LaunchSpec) -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, RuntimeError>;

    /// Combined stdout and stderr collected so far.
    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError>;

    /// Stop a container. Stopping an already stopped container succeeds.
    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Images carrying `label=value`.
    async fn list_images(&self, label: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError>;

    /// Release the connection. Later calls fail with `Unavailable`.
    async fn close(&self) {}
}
