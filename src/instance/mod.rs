//! Lifecycle of one fixture container.
//!
//! ```text
//! Created ──start()──▶ Started ──stop()──▶ Stopped ──remove()──▶ Removed
//!    │                    │                                   ▲
//!    └────────────────────┴──────────────remove()─────────────┘
//! ```
//!
//! Transitions only move forward; there is no restart in place. `stop()` and
//! `remove()` are no-ops when the instance is already past that state.

pub mod port;
pub mod strategy;

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::endpoint::{RequestedEndpoint, ResolvedEndpoint};
use crate::error::{ProvisionError, Result, RuntimeError};
use crate::launch::LaunchSpec;
use crate::profile::ParameterProfile;
use crate::readiness::Readiness;
use crate::runtime::ContainerRuntime;
use crate::types::{ConnectionRole, ImplementationType};

pub use port::PortPolicy;
pub use strategy::{ClientStrategy, RoleStrategy, ServerStrategy, strategy_for};

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Launch spec built, no container yet.
    Created,
    /// Container created and started.
    Started,
    Stopped,
    Removed,
}

/// Handle to one fixture container, exclusively owned by the caller.
pub struct Instance {
    runtime: Arc<dyn ContainerRuntime>,
    strategy: Arc<dyn RoleStrategy>,
    name: String,
    kind: ImplementationType,
    version: String,
    profile: Arc<ParameterProfile>,
    spec: LaunchSpec,
    request: RequestedEndpoint,
    container_id: Option<String>,
    state: InstanceState,
    endpoint: Option<ResolvedEndpoint>,
    /// Logs captured right before removal.
    final_logs: Option<String>,
    auto_remove: bool,
    detached: bool,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("role", &self.spec.role)
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("container_id", &self.container_id)
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Instance {
    /// Wrap a launch spec. Nothing is created until [`start`](Self::start).
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        strategy: Arc<dyn RoleStrategy>,
        kind: ImplementationType,
        version: impl Into<String>,
        profile: Arc<ParameterProfile>,
        spec: LaunchSpec,
        request: RequestedEndpoint,
    ) -> Self {
        let name = format!(
            "tls-fixtures-{}-{}-{}",
            spec.role,
            kind,
            uuid::Uuid::new_v4().simple()
        );
        Self {
            runtime,
            strategy,
            name,
            kind,
            version: version.into(),
            profile,
            spec,
            request,
            container_id: None,
            state: InstanceState::Created,
            endpoint: None,
            final_logs: None,
            auto_remove: true,
            detached: false,
        }
    }

    /// Whether [`teardown`](Self::teardown) also removes the container.
    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    /// Create and start the container, then resolve where it listens.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != InstanceState::Created || self.container_id.is_some() {
            return Err(ProvisionError::InvalidArgument(format!(
                "instance '{}' cannot be started from state {:?}",
                self.name, self.state
            )));
        }

        let id = self
            .runtime
            .create_container(&self.name, &self.spec)
            .await
            .map_err(|e| ProvisionError::lifecycle(&self.name, "create", e))?;
        self.container_id = Some(id.clone());

        self.runtime
            .start_container(&id)
            .await
            .map_err(|e| ProvisionError::lifecycle(&self.name, "start", e))?;
        self.state = InstanceState::Started;
        tracing::info!("Started {} container: {} ({})", self.spec.role, self.name, self.spec.image);

        self.endpoint = self
            .strategy
            .resolve_endpoint(self.runtime.as_ref(), &id, &self.spec, &self.request)
            .await?;
        if let Some(endpoint) = &self.endpoint {
            tracing::debug!("Container {} reachable at {}", self.name, endpoint);
        }
        Ok(())
    }

    /// Wait until the instance is usable, aborting when `cancel` resolves.
    pub async fn await_ready_until(
        &self,
        cancel: BoxFuture<'static, ()>,
    ) -> Result<Option<Readiness>> {
        self.strategy.await_ready(self, cancel).await
    }

    /// Wait until the instance is usable.
    pub async fn await_ready(&self) -> Result<Option<Readiness>> {
        self.await_ready_until(std::future::pending::<()>().boxed()).await
    }

    /// Container output. Still available after the container stopped or was
    /// removed through this handle.
    pub async fn logs(&self) -> Result<String> {
        let Some(id) = self.container_id.as_deref() else {
            return Ok(String::new());
        };
        if let Some(logs) = &self.final_logs {
            return Ok(logs.clone());
        }
        self.runtime
            .container_logs(id)
            .await
            .map_err(|e| ProvisionError::lifecycle(&self.name, "read logs of", e))
    }

    /// Stop the container. Idempotent.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            InstanceState::Stopped | InstanceState::Removed => return Ok(()),
            InstanceState::Created | InstanceState::Started => {}
        }

        if let Some(id) = self.container_id.as_deref() {
            match self.runtime.stop_container(id).await {
                Ok(()) | Err(RuntimeError::NotFound { .. }) => {}
                Err(e) => return Err(ProvisionError::lifecycle(&self.name, "stop", e)),
            }
            tracing::info!("Stopped container: {}", self.name);
        }

        self.state = InstanceState::Stopped;
        Ok(())
    }

    /// Remove the container, keeping its logs. Idempotent.
    pub async fn remove(&mut self) -> Result<()> {
        if self.state == InstanceState::Removed {
            return Ok(());
        }

        if let Some(id) = self.container_id.clone() {
            if self.final_logs.is_none() {
                match self.runtime.container_logs(&id).await {
                    Ok(logs) => self.final_logs = Some(logs),
                    Err(e) => tracing::debug!("Could not capture logs of {}: {}", self.name, e),
                }
            }
            match self.runtime.remove_container(&id).await {
                Ok(()) | Err(RuntimeError::NotFound { .. }) => {}
                Err(e) => return Err(ProvisionError::lifecycle(&self.name, "remove", e)),
            }
            tracing::info!("Removed container: {}", self.name);
        }

        self.state = InstanceState::Removed;
        Ok(())
    }

    /// Stop, then remove when auto-remove is enabled.
    pub async fn teardown(&mut self) -> Result<()> {
        self.stop().await?;
        if self.auto_remove {
            self.remove().await?;
        }
        Ok(())
    }

    /// Give up the handle without stopping the container. Returns its id.
    pub fn detach(mut self) -> Option<String> {
        self.detached = true;
        self.container_id.take()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    pub fn role(&self) -> ConnectionRole {
        self.spec.role
    }

    pub fn kind(&self) -> ImplementationType {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn profile(&self) -> &ParameterProfile {
        &self.profile
    }

    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.spec
    }

    pub fn request(&self) -> &RequestedEndpoint {
        &self.request
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Reachable endpoint; `None` for clients and before start.
    pub fn endpoint(&self) -> Option<&ResolvedEndpoint> {
        self.endpoint.as_ref()
    }

    pub fn port(&self) -> Option<u16> {
        self.endpoint.as_ref().map(ResolvedEndpoint::port)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if self.state == InstanceState::Started && !self.detached {
            tracing::warn!(
                "Instance '{}' dropped without teardown(), container may remain running",
                self.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::LaunchSpecBuilder;
    use crate::properties::ImageProperties;
    use crate::readiness::ReadinessPoller;
    use crate::testing::{FakeRuntime, RuntimeCall};
    use std::path::PathBuf;
    use std::time::Duration;

    fn profile() -> Arc<ParameterProfile> {
        Arc::new(
            ParameterProfile::parse(
                &PathBuf::from("openssl.profile"),
                "name = \"openssl\"\nrole = \"server\"\ntype = \"openssl\"\n[[parameters]]\ncmd = \"-accept [port]\"\n",
            )
            .unwrap(),
        )
    }

    fn instance(runtime: &Arc<FakeRuntime>, policy: PortPolicy) -> Instance {
        let properties = ImageProperties {
            role: ConnectionRole::Server,
            kind: ImplementationType::OpenSsl,
            image: "openssl-server".to_string(),
            internal_port: Some(4433),
            use_ip: false,
            cert_path: None,
            key_path: None,
        };
        let request = RequestedEndpoint::server();
        let profile = profile();
        let spec = LaunchSpecBuilder::default()
            .build("3.2.0", &profile, &properties, &request, None)
            .unwrap();
        let strategy = strategy_for(
            ConnectionRole::Server,
            policy,
            "127.0.0.1",
            &ReadinessPoller::new(Duration::from_millis(10), Duration::from_millis(100)),
        );
        let runtime: Arc<dyn ContainerRuntime> = runtime.clone();
        Instance::new(
            runtime,
            strategy,
            ImplementationType::OpenSsl,
            "3.2.0",
            profile,
            spec,
            request,
        )
    }

    #[tokio::test]
    async fn test_start_resolves_dynamic_port() {
        let runtime = Arc::new(FakeRuntime::new().with_host_port("4433/tcp", 40123));
        let mut instance = instance(&runtime, PortPolicy::Dynamic);
        assert_eq!(instance.state(), InstanceState::Created);
        assert_eq!(instance.port(), None);

        instance.start().await.unwrap();

        assert_eq!(instance.state(), InstanceState::Started);
        assert_eq!(instance.port(), Some(40123));
        assert!(instance.name().starts_with("tls-fixtures-server-openssl-"));
        instance.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut instance = instance(&runtime, PortPolicy::Static);
        instance.start().await.unwrap();
        assert!(matches!(
            instance.start().await,
            Err(ProvisionError::InvalidArgument(_))
        ));
        instance.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_failure_carries_runtime_message() {
        let runtime = Arc::new(FakeRuntime::new().fail_start("image has no entrypoint"));
        let mut instance = instance(&runtime, PortPolicy::Static);
        let err = instance.start().await.unwrap_err();
        assert!(err.is_lifecycle());
        assert!(err.to_string().contains("image has no entrypoint"));
        assert_eq!(instance.state(), InstanceState::Created);
        assert!(instance.container_id().is_some());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut instance = instance(&runtime, PortPolicy::Static);
        instance.start().await.unwrap();

        instance.stop().await.unwrap();
        let calls_after_first = runtime.calls();
        instance.stop().await.unwrap();

        assert_eq!(instance.state(), InstanceState::Stopped);
        assert_eq!(runtime.calls(), calls_after_first);
        let stops = calls_after_first
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Stop(_)))
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn test_logs_survive_removal() {
        let runtime = Arc::new(FakeRuntime::new().with_logs("ACCEPT\n"));
        let mut instance = instance(&runtime, PortPolicy::Static);
        instance.start().await.unwrap();
        instance.teardown().await.unwrap();
        instance.teardown().await.unwrap();

        assert_eq!(instance.state(), InstanceState::Removed);
        assert_eq!(instance.logs().await.unwrap(), "ACCEPT\n");
        assert_eq!(runtime.live_containers(), 0);
    }

    #[tokio::test]
    async fn test_logs_before_start_are_empty() {
        let runtime = Arc::new(FakeRuntime::new());
        let instance = instance(&runtime, PortPolicy::Static);
        assert_eq!(instance.logs().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_await_ready_timeout_includes_logs() {
        // Nothing listens on the resolved port.
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = reserved.local_addr().unwrap().port();
        drop(reserved);
        let runtime = Arc::new(
            FakeRuntime::new()
                .with_logs("bind: permission denied\n")
                .with_host_port("4433/tcp", port),
        );

        let mut instance = instance(&runtime, PortPolicy::Dynamic);
        instance.start().await.unwrap();
        let err = instance.await_ready().await.unwrap_err();

        match err {
            ProvisionError::DidNotStart { logs, reason, .. } => {
                assert_eq!(logs, "bind: permission denied\n");
                assert!(matches!(reason, crate::error::NotReadyReason::Timeout(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        instance.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_detach_leaves_container_running() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut instance = instance(&runtime, PortPolicy::Static);
        instance.start().await.unwrap();

        let id = instance.detach().unwrap();
        assert!(id.starts_with("fake-"));
        assert_eq!(runtime.live_containers(), 1);
        assert!(
            !runtime
                .calls()
                .iter()
                .any(|c| matches!(c, RuntimeCall::Stop(_) | RuntimeCall::Remove(_)))
        );
    }
}
