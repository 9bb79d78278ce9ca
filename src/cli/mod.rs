//! CLI command handling.
//!
//! Provides subcommands for:
//! - Starting a server fixture and holding it until Ctrl-C (`server`)
//! - Starting a client fixture (`client`)
//! - Listing locally available image versions (`versions`)
//! - Listing loaded parameter profiles (`profiles`)

mod discovery;
mod fixture;

pub use discovery::{run_profiles_command, run_versions_command};
pub use fixture::{run_client_command, run_server_command};

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

use crate::config::ProvisionerConfig;
use crate::endpoint::DEFAULT_PORT;
use crate::instance::PortPolicy;
use crate::types::{ConnectionRole, ImplementationType};

#[derive(Parser, Debug)]
#[command(name = "tls-fixtures")]
#[command(about = "Disposable TLS client and server endpoints in Docker containers")]
#[command(
    long_about = "Provisions TLS implementations as throwaway containers for TLS test harnesses.\nExamples:\n  tls-fixtures server openssl 3.2.0\n  tls-fixtures versions server openssl"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Resource root holding profiles/ and properties.toml
    #[arg(long, global = true, env = "TLS_FIXTURES_RESOURCES")]
    pub resources: Option<PathBuf>,

    /// How server ports are resolved: "static" or "dynamic"
    #[arg(long, global = true)]
    pub port_policy: Option<PortPolicy>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    pub fn provisioner_config(&self) -> anyhow::Result<ProvisionerConfig> {
        let mut config = ProvisionerConfig::resolve()?;
        if let Some(resources) = &self.resources {
            config = config.with_resources_dir(resources);
        }
        if let Some(policy) = self.port_policy {
            config = config.with_port_policy(policy);
        }
        Ok(config)
    }
}

/// Where a fixture listens or connects to.
#[derive(clap::Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Hostname to use instead of the IP
    #[arg(long)]
    pub hostname: Option<String>,

    /// Requested port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Use UDP instead of TCP
    #[arg(long)]
    pub udp: bool,

    /// Extra parameters appended to the command line
    #[arg(long, allow_hyphen_values = true)]
    pub extra: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a server and hold it until Ctrl-C
    #[command(
        about = "Start a TLS server",
        long_about = "Starts a server container, waits until it accepts connections and prints its endpoint.\nExample: tls-fixtures server openssl 3.2.0 --port 4433"
    )]
    Server {
        /// Implementation, e.g. "openssl"
        kind: ImplementationType,

        /// Implementation version (image tag)
        version: String,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Leave the container behind on exit
        #[arg(long)]
        keep: bool,
    },

    /// Start a client connecting to a server
    #[command(
        about = "Start a TLS client",
        long_about = "Starts a client container that connects to the given address.\nExample: tls-fixtures client openssl 3.2.0 --ip 172.17.0.2 --follow"
    )]
    Client {
        /// Implementation, e.g. "openssl"
        kind: ImplementationType,

        /// Implementation version (image tag)
        version: String,

        /// IP of the server to connect to
        #[arg(long)]
        ip: String,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Print the client's output until Ctrl-C
        #[arg(short, long)]
        follow: bool,
    },

    /// List available image versions
    #[command(
        about = "List available versions",
        long_about = "Lists the versions of an implementation available as local images.\nExample: tls-fixtures versions server openssl"
    )]
    Versions {
        /// "client" or "server"
        role: ConnectionRole,

        /// Implementation, e.g. "openssl"
        kind: ImplementationType,
    },

    /// List loaded parameter profiles
    #[command(
        about = "List parameter profiles",
        long_about = "Lists the parameter profiles found in the resource tree.\nExample: tls-fixtures profiles --role server"
    )]
    Profiles {
        /// Only show profiles for this role
        #[arg(long)]
        role: Option<ConnectionRole>,
    },
}
