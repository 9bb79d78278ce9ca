//! Entry point composing profile and property lookup, launch spec building,
//! the container lifecycle and readiness polling.
//!
//! Each step depends on the previous one succeeding; the first failure
//! aborts the request. A container that was created before a later step
//! failed is not cleaned up here: the error names it and tearing it down is
//! left to the caller.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::config::ProvisionerConfig;
use crate::endpoint::RequestedEndpoint;
use crate::error::{ProvisionError, Result};
use crate::instance::{Instance, strategy_for};
use crate::launch::LaunchSpecBuilder;
use crate::profile::ProfileStore;
use crate::properties::PropertyStore;
use crate::readiness::ReadinessPoller;
use crate::runtime::ContainerRuntime;
use crate::types::{ConnectionRole, ImplementationType};

/// Provisions client and server fixtures. Cheap to share across tasks.
pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    profiles: Arc<ProfileStore>,
    properties: Arc<PropertyStore>,
    config: ProvisionerConfig,
    builder: LaunchSpecBuilder,
    poller: ReadinessPoller,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("profiles", &self.profiles.len())
            .field("properties", &self.properties.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Provisioner {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        profiles: ProfileStore,
        properties: PropertyStore,
        config: ProvisionerConfig,
    ) -> Self {
        Self {
            runtime,
            profiles: Arc::new(profiles),
            properties: Arc::new(properties),
            builder: config.launch_spec_builder(),
            poller: config.readiness_poller(),
            config,
        }
    }

    /// Load profiles and properties from `config.resources_dir`.
    ///
    /// A broken profile document is skipped; a missing or broken property
    /// file fails the whole load.
    pub fn from_config(
        runtime: Arc<dyn ContainerRuntime>,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        let profiles = ProfileStore::load(&config.profiles_dir());
        let properties = PropertyStore::load(&config.properties_file())?;
        tracing::info!(
            "Loaded {} profiles and {} image properties from {}",
            profiles.len(),
            properties.len(),
            config.resources_dir.display()
        );
        Ok(Self::new(runtime, profiles, properties, config))
    }

    /// Replace the readiness poller, e.g. to install a custom probe.
    pub fn with_poller(mut self, poller: ReadinessPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Start a client that connects to `request`'s address.
    pub async fn get_client(
        &self,
        kind: ImplementationType,
        version: &str,
        request: RequestedEndpoint,
        additional_parameters: Option<&str>,
    ) -> Result<Instance> {
        self.provision(
            ConnectionRole::Client,
            kind,
            version,
            request,
            additional_parameters,
        )
        .await
    }

    /// Start a server and wait until it accepts connections.
    pub async fn get_server(
        &self,
        kind: ImplementationType,
        version: &str,
        request: RequestedEndpoint,
        additional_parameters: Option<&str>,
    ) -> Result<Instance> {
        self.provision(
            ConnectionRole::Server,
            kind,
            version,
            request,
            additional_parameters,
        )
        .await
    }

    pub async fn provision(
        &self,
        role: ConnectionRole,
        kind: ImplementationType,
        version: &str,
        request: RequestedEndpoint,
        additional_parameters: Option<&str>,
    ) -> Result<Instance> {
        self.provision_until(
            role,
            kind,
            version,
            request,
            additional_parameters,
            std::future::pending::<()>(),
        )
        .await
    }

    /// Like [`provision`](Self::provision), but a readiness wait still in
    /// progress when `cancel` resolves fails with
    /// [`NotReadyReason::Interrupted`](crate::error::NotReadyReason::Interrupted).
    pub async fn provision_until<C>(
        &self,
        role: ConnectionRole,
        kind: ImplementationType,
        version: &str,
        request: RequestedEndpoint,
        additional_parameters: Option<&str>,
        cancel: C,
    ) -> Result<Instance>
    where
        C: Future<Output = ()> + Send + 'static,
    {
        let profile = self.profiles.resolve(kind, version, role)?;
        let properties = self.properties.resolve(role, kind)?;
        tracing::debug!(
            "Resolved {} {} {} to profile '{}' and image '{}'",
            role,
            kind,
            version,
            profile.name(),
            properties.image
        );

        let strategy = strategy_for(
            role,
            self.config.port_policy,
            &self.config.reachable_host,
            &self.poller,
        );
        let spec = strategy.build_launch_spec(
            &self.builder,
            version,
            &profile,
            &properties,
            &request,
            additional_parameters,
        )?;

        let mut instance = Instance::new(
            Arc::clone(&self.runtime),
            strategy,
            kind,
            version,
            profile,
            spec,
            request,
        )
        .with_auto_remove(self.config.auto_remove);

        instance.start().await?;
        instance.await_ready_until(cancel.boxed()).await?;
        Ok(instance)
    }

    /// Versions of `kind` available as local images for `role`.
    ///
    /// Distinct values of the role's version label, in the order the runtime
    /// listed the images. Images without a version label are ignored.
    pub async fn list_available_versions(
        &self,
        role: ConnectionRole,
        kind: ImplementationType,
    ) -> Result<Vec<String>> {
        let images = self
            .runtime
            .list_images(role.type_label(), kind.as_str())
            .await
            .map_err(|e| ProvisionError::Discovery {
                role,
                kind,
                reason: e.to_string(),
            })?;

        let mut versions: Vec<String> = Vec::new();
        for image in images {
            if let Some(version) = image.labels.get(role.version_label())
                && !versions.contains(version)
            {
                versions.push(version.clone());
            }
        }
        Ok(versions)
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Release the runtime connection. Instances still alive can no longer
    /// be torn down through it.
    pub async fn close(&self) {
        self.runtime.close().await;
    }
}
