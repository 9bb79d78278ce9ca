//! Test support: an in-memory container runtime.
//!
//! Provides:
//! - [`FakeRuntime`]: a [`ContainerRuntime`] that records every call and
//!   simulates containers, port mappings, logs and images
//! - [`RuntimeCall`]: the recorded calls, for asserting side effects
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tls_fixtures::testing::FakeRuntime;
//!
//! let runtime = Arc::new(FakeRuntime::new().with_host_port("4433/tcp", 49153));
//! // hand `runtime.clone()` to a Provisioner, then inspect `runtime.calls()`
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, ContainerState, NetworkSettings, PortBinding};

use crate::error::RuntimeError;
use crate::launch::LaunchSpec;
use crate::runtime::{ContainerRuntime, ImageInfo};

/// A call received by [`FakeRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Create { name: String, image: String },
    Start(String),
    Inspect(String),
    Logs(String),
    Stop(String),
    Remove(String),
    ListImages { label: String, value: String },
}

#[derive(Debug, Clone)]
struct FakeContainer {
    name: String,
    spec: Option<LaunchSpec>,
    running: bool,
}

#[derive(Debug, Default)]
struct Inner {
    containers: HashMap<String, FakeContainer>,
    created: Vec<LaunchSpec>,
    calls: Vec<RuntimeCall>,
    next_id: u32,
    closed: bool,
}

/// In-memory [`ContainerRuntime`].
///
/// Every container reports the same configured port mappings and logs.
#[derive(Debug)]
pub struct FakeRuntime {
    inner: Mutex<Inner>,
    host_ports: HashMap<String, Vec<u16>>,
    network_settings: bool,
    logs: String,
    images: Vec<ImageInfo>,
    create_error: Option<String>,
    start_error: Option<String>,
    list_error: Option<String>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            inner: Mutex::default(),
            host_ports: HashMap::new(),
            network_settings: true,
            logs: String::new(),
            images: Vec::new(),
            create_error: None,
            start_error: None,
            list_error: None,
        }
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish container port `key` (e.g. `4433/tcp`) on `host_port`.
    pub fn with_host_port(self, key: &str, host_port: u16) -> Self {
        self.with_host_ports(key, &[host_port])
    }

    /// Publish container port `key` on several host ports, in binding order.
    pub fn with_host_ports(mut self, key: &str, host_ports: &[u16]) -> Self {
        self.host_ports.insert(key.to_string(), host_ports.to_vec());
        self
    }

    /// Inspection returns no network settings at all.
    pub fn without_network_settings(mut self) -> Self {
        self.network_settings = false;
        self
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    pub fn with_image(mut self, labels: &[(&str, &str)]) -> Self {
        let id = format!("sha256:{:064}", self.images.len());
        self.images.push(ImageInfo {
            id,
            tags: Vec::new(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    pub fn fail_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    pub fn fail_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn fail_list_images(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: RuntimeCall) -> Result<MutexGuard<'_, Inner>, RuntimeError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(RuntimeError::Unavailable {
                reason: "runtime connection closed".to_string(),
            });
        }
        inner.calls.push(call);
        Ok(inner)
    }

    /// Insert a running container without recording a call. Returns its id.
    pub fn seed_running_container(&self) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("fake-{}", inner.next_id);
        inner.containers.insert(
            id.clone(),
            FakeContainer {
                name: id.clone(),
                spec: None,
                running: true,
            },
        );
        id
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    /// Launch specs passed to `create_container`, in order.
    pub fn created(&self) -> Vec<LaunchSpec> {
        self.lock().created.clone()
    }

    /// Containers created and not yet removed.
    pub fn live_containers(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn port_map(&self) -> HashMap<String, Option<Vec<PortBinding>>> {
        self.host_ports
            .iter()
            .map(|(key, ports)| {
                let bindings = ports
                    .iter()
                    .map(|port| PortBinding {
                        host_ip: Some("0.0.0.0".to_string()),
                        host_port: Some(port.to_string()),
                    })
                    .collect();
                (key.clone(), Some(bindings))
            })
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_container(&self, name: &str, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        let mut inner = self.record(RuntimeCall::Create {
            name: name.to_string(),
            image: spec.image.clone(),
        })?;
        if let Some(message) = &self.create_error {
            return Err(RuntimeError::Api(message.clone()));
        }
        inner.next_id += 1;
        let id = format!("fake-{}", inner.next_id);
        inner.created.push(spec.clone());
        inner.containers.insert(
            id.clone(),
            FakeContainer {
                name: name.to_string(),
                spec: Some(spec.clone()),
                running: false,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut inner = self.record(RuntimeCall::Start(id.to_string()))?;
        if let Some(message) = &self.start_error {
            return Err(RuntimeError::Api(message.clone()));
        }
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })?;
        container.running = true;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, RuntimeError> {
        let inner = self.record(RuntimeCall::Inspect(id.to_string()))?;
        let container = inner
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })?;

        // Docker only publishes ports the launch spec exposed.
        let mut ports = self.port_map();
        if let Some(spec) = &container.spec {
            let exposed = spec.exposed_port.map(|p| p.key());
            ports.retain(|key, _| exposed.as_deref() == Some(key.as_str()));
        }

        Ok(ContainerInspectResponse {
            id: Some(id.to_string()),
            name: Some(format!("/{}", container.name)),
            state: Some(ContainerState {
                running: Some(container.running),
                ..Default::default()
            }),
            network_settings: self.network_settings.then(|| NetworkSettings {
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError> {
        let inner = self.record(RuntimeCall::Logs(id.to_string()))?;
        if !inner.containers.contains_key(id) {
            return Err(RuntimeError::NotFound { id: id.to_string() });
        }
        Ok(self.logs.clone())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut inner = self.record(RuntimeCall::Stop(id.to_string()))?;
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })?;
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut inner = self.record(RuntimeCall::Remove(id.to_string()))?;
        inner
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })
    }

    async fn list_images(&self, label: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
        drop(self.record(RuntimeCall::ListImages {
            label: label.to_string(),
            value: value.to_string(),
        })?);
        if let Some(message) = &self.list_error {
            return Err(RuntimeError::Api(message.clone()));
        }
        Ok(self
            .images
            .iter()
            .filter(|image| image.labels.get(label).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
