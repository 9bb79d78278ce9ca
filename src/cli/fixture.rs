//! `server` and `client` commands.

use std::future::Future;
use std::time::Duration;

use crate::cli::EndpointArgs;
use crate::endpoint::RequestedEndpoint;
use crate::instance::Instance;
use crate::provisioner::Provisioner;
use crate::types::{ConnectionRole, ImplementationType, Transport};

const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

fn apply_endpoint_args(mut request: RequestedEndpoint, args: &EndpointArgs) -> RequestedEndpoint {
    if let Some(hostname) = &args.hostname {
        request = request.with_hostname(hostname.clone());
    }
    if args.udp {
        request = request.with_transport(Transport::Udp);
    }
    request.with_port(args.port)
}

/// Resolve when `signal` fires; never resolve if it could not be installed.
async fn interrupted_by<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!("Could not listen for Ctrl-C, startup cannot be interrupted: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Start a server, print its endpoint and hold it until Ctrl-C.
pub async fn run_server_command(
    provisioner: &Provisioner,
    kind: ImplementationType,
    version: &str,
    endpoint: &EndpointArgs,
    keep: bool,
    json: bool,
) -> anyhow::Result<()> {
    let request = apply_endpoint_args(RequestedEndpoint::server(), endpoint);
    let interrupt = interrupted_by(tokio::signal::ctrl_c());

    let mut server = provisioner
        .provision_until(
            ConnectionRole::Server,
            kind,
            version,
            request,
            endpoint.extra.as_deref(),
            interrupt,
        )
        .await?;

    print_instance(&server, json)?;
    if !json {
        println!("Press Ctrl-C to stop.");
    }

    tokio::signal::ctrl_c().await?;
    finish(&mut server, keep).await
}

/// Start a client; with `follow`, stream its output until Ctrl-C.
pub async fn run_client_command(
    provisioner: &Provisioner,
    kind: ImplementationType,
    version: &str,
    ip: &str,
    endpoint: &EndpointArgs,
    follow: bool,
    json: bool,
) -> anyhow::Result<()> {
    let request = apply_endpoint_args(RequestedEndpoint::client(ip), endpoint);
    let mut client = provisioner
        .get_client(kind, version, request, endpoint.extra.as_deref())
        .await?;

    print_instance(&client, json)?;

    if !follow {
        if let Some(id) = client.detach() {
            println!("Left running: {}", id);
        }
        return Ok(());
    }

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut printed = 0;
    loop {
        let logs = client.logs().await?;
        if let Some(new) = logs.get(printed..) {
            print!("{}", new);
        }
        printed = logs.len();

        tokio::select! {
            _ = tokio::time::sleep(FOLLOW_INTERVAL) => {}
            _ = &mut interrupt => break,
        }
    }
    finish(&mut client, false).await
}

fn print_instance(instance: &Instance, json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "name": instance.name(),
            "container_id": instance.container_id(),
            "role": instance.role(),
            "type": instance.kind(),
            "version": instance.version(),
            "profile": instance.profile().name(),
            "image": instance.launch_spec().image,
            "endpoint": instance.endpoint(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Container: {}", instance.name());
    println!("  Image:    {}", instance.launch_spec().image);
    println!("  Profile:  {}", instance.profile().name());
    println!("  Command:  {}", instance.launch_spec().cmd.join(" "));
    if let Some(endpoint) = instance.endpoint() {
        println!("  Endpoint: {}", endpoint);
    }
    Ok(())
}

async fn finish(instance: &mut Instance, keep: bool) -> anyhow::Result<()> {
    if keep {
        instance.stop().await?;
        println!("Stopped {} (kept)", instance.name());
    } else {
        instance.teardown().await?;
        println!("Removed {}", instance.name());
    }
    Ok(())
}
