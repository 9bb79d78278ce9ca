use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tls_fixtures::{
    DockerRuntime, ProfileStore, Provisioner,
    cli::{
        Cli, Command, run_client_command, run_profiles_command, run_server_command,
        run_versions_command,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tls_fixtures=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let config = cli.provisioner_config()?;

    // Listing profiles needs no container runtime.
    if let Command::Profiles { role } = &cli.command {
        let profiles = ProfileStore::load(&config.profiles_dir());
        return run_profiles_command(&profiles, *role, cli.json);
    }

    let runtime = Arc::new(DockerRuntime::connect().await?);
    let provisioner = Provisioner::from_config(runtime, config)?;

    let result = match &cli.command {
        Command::Server {
            kind,
            version,
            endpoint,
            keep,
        } => run_server_command(&provisioner, *kind, version, endpoint, *keep, cli.json).await,
        Command::Client {
            kind,
            version,
            ip,
            endpoint,
            follow,
        } => {
            run_client_command(&provisioner, *kind, version, ip, endpoint, *follow, cli.json).await
        }
        Command::Versions { role, kind } => {
            run_versions_command(&provisioner, *role, *kind, cli.json).await
        }
        Command::Profiles { .. } => Ok(()),
    };

    provisioner.close().await;
    result
}
