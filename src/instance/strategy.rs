//! Role-specific behavior plugged into the generic instance lifecycle.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::endpoint::{RequestedEndpoint, ResolvedEndpoint};
use crate::error::{ProvisionError, Result};
use crate::instance::Instance;
use crate::instance::port::PortPolicy;
use crate::launch::{LaunchSpec, LaunchSpecBuilder};
use crate::profile::ParameterProfile;
use crate::properties::ImageProperties;
use crate::readiness::{Readiness, ReadinessPoller};
use crate::runtime::ContainerRuntime;
use crate::types::{ConnectionRole, Transport};

/// Capabilities that differ between clients and servers.
#[async_trait]
pub trait RoleStrategy: Send + Sync + fmt::Debug {
    fn role(&self) -> ConnectionRole;

    fn build_launch_spec(
        &self,
        builder: &LaunchSpecBuilder,
        version: &str,
        profile: &ParameterProfile,
        properties: &ImageProperties,
        request: &RequestedEndpoint,
        additional_parameters: Option<&str>,
    ) -> Result<LaunchSpec> {
        if properties.role != self.role() {
            return Err(ProvisionError::InvalidArgument(format!(
                "{} strategy cannot launch {} properties",
                self.role(),
                properties.role
            )));
        }
        builder.build(version, profile, properties, request, additional_parameters)
    }

    /// Where the started container can be reached, if it listens at all.
    async fn resolve_endpoint(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
        spec: &LaunchSpec,
        request: &RequestedEndpoint,
    ) -> Result<Option<ResolvedEndpoint>>;

    /// Block until the instance is usable. `None` when nothing was polled.
    async fn await_ready(
        &self,
        instance: &Instance,
        cancel: BoxFuture<'static, ()>,
    ) -> Result<Option<Readiness>>;
}

/// Clients connect outward: no port, nothing to wait for.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientStrategy;

#[async_trait]
impl RoleStrategy for ClientStrategy {
    fn role(&self) -> ConnectionRole {
        ConnectionRole::Client
    }

    async fn resolve_endpoint(
        &self,
        _runtime: &dyn ContainerRuntime,
        _container_id: &str,
        _spec: &LaunchSpec,
        _request: &RequestedEndpoint,
    ) -> Result<Option<ResolvedEndpoint>> {
        Ok(None)
    }

    async fn await_ready(
        &self,
        _instance: &Instance,
        _cancel: BoxFuture<'static, ()>,
    ) -> Result<Option<Readiness>> {
        Ok(None)
    }
}

/// Servers publish their internal port and are polled until they accept.
#[derive(Debug, Clone)]
pub struct ServerStrategy {
    pub port_policy: PortPolicy,
    /// Host the harness dials.
    pub reachable_host: String,
    pub poller: ReadinessPoller,
}

#[async_trait]
impl RoleStrategy for ServerStrategy {
    fn role(&self) -> ConnectionRole {
        ConnectionRole::Server
    }

    async fn resolve_endpoint(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
        spec: &LaunchSpec,
        request: &RequestedEndpoint,
    ) -> Result<Option<ResolvedEndpoint>> {
        let exposure = spec.exposed_port.ok_or_else(|| {
            ProvisionError::InvalidArgument("server launch spec exposes no port".to_string())
        })?;

        let port = self
            .port_policy
            .resolve(runtime, container_id, &exposure)
            .await?;

        let host = match self.port_policy {
            PortPolicy::Static => request
                .hostname
                .clone()
                .unwrap_or_else(|| self.reachable_host.clone()),
            PortPolicy::Dynamic => self.reachable_host.clone(),
        };

        Ok(Some(ResolvedEndpoint::new(
            host,
            port,
            exposure.container_port,
            exposure.transport,
        )))
    }

    async fn await_ready(
        &self,
        instance: &Instance,
        cancel: BoxFuture<'static, ()>,
    ) -> Result<Option<Readiness>> {
        let endpoint = instance.endpoint().ok_or_else(|| {
            ProvisionError::InvalidArgument(format!(
                "server '{}' has no resolved endpoint; start it first",
                instance.name()
            ))
        })?;

        if endpoint.transport() == Transport::Udp {
            tracing::info!(
                "Skipping readiness check for UDP server '{}' at {}",
                instance.name(),
                endpoint
            );
            return Ok(None);
        }

        match self.poller.wait(&endpoint.address(), cancel).await {
            Ok(readiness) => {
                tracing::info!(
                    "Server '{}' ready at {} after {} attempt(s) in {:?}",
                    instance.name(),
                    endpoint,
                    readiness.attempts,
                    readiness.elapsed
                );
                Ok(Some(readiness))
            }
            Err(reason) => {
                let logs = instance
                    .logs()
                    .await
                    .unwrap_or_else(|e| format!("<logs unavailable: {}>", e));
                tracing::error!("Could not start '{}' ({}):\n\n{}", instance.name(), reason, logs);
                Err(ProvisionError::DidNotStart {
                    container: instance.name().to_string(),
                    reason,
                    logs,
                })
            }
        }
    }
}

/// Pick the strategy for a role.
pub fn strategy_for(
    role: ConnectionRole,
    port_policy: PortPolicy,
    reachable_host: &str,
    poller: &ReadinessPoller,
) -> Arc<dyn RoleStrategy> {
    match role {
        ConnectionRole::Client => Arc::new(ClientStrategy),
        ConnectionRole::Server => Arc::new(ServerStrategy {
            port_policy,
            reachable_host: reachable_host.to_string(),
            poller: poller.clone(),
        }),
    }
}
