//! Disposable TLS client and server endpoints in Docker containers.
//!
//! A [`Provisioner`] turns an implementation, a role and a version into a
//! running container:
//!
//! 1. the [`ProfileStore`] picks the parameter profile for the version,
//!    falling back to the implementation's default profile;
//! 2. the [`PropertyStore`] supplies image name, internal port and
//!    addressing mode;
//! 3. a [`LaunchSpec`](launch::LaunchSpec) is built from both;
//! 4. the [`Instance`] creates and starts the container and, for servers,
//!    resolves the reachable port;
//! 5. servers are polled until they accept a TCP connection.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tls_fixtures::{DockerRuntime, ImplementationType, Provisioner, ProvisionerConfig, RequestedEndpoint};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let runtime = Arc::new(DockerRuntime::connect().await?);
//! let provisioner = Provisioner::from_config(runtime, ProvisionerConfig::default())?;
//! let mut server = provisioner
//!     .get_server(ImplementationType::OpenSsl, "3.2.0", RequestedEndpoint::server(), None)
//!     .await?;
//! if let Some(endpoint) = server.endpoint() {
//!     println!("dial {}", endpoint);
//! }
//! server.teardown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod instance;
pub mod launch;
pub mod profile;
pub mod properties;
pub mod provisioner;
pub mod readiness;
pub mod runtime;
pub mod testing;
pub mod types;

pub use config::ProvisionerConfig;
pub use endpoint::{RequestedEndpoint, ResolvedEndpoint};
pub use error::{NotReadyReason, ProvisionError};
pub use instance::{Instance, InstanceState, PortPolicy};
pub use profile::{ParameterProfile, ProfileStore};
pub use properties::{ImageProperties, PropertyStore};
pub use provisioner::Provisioner;
pub use runtime::{ContainerRuntime, DockerRuntime};
pub use types::{ConnectionRole, ImplementationType, Transport};
