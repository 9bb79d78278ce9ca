//! `versions` and `profiles` commands.

use std::sync::Arc;

use crate::profile::ProfileStore;
use crate::provisioner::Provisioner;
use crate::types::{ConnectionRole, ImplementationType};

/// Print the versions of `kind` available as local images.
pub async fn run_versions_command(
    provisioner: &Provisioner,
    role: ConnectionRole,
    kind: ImplementationType,
    json: bool,
) -> anyhow::Result<()> {
    let versions = provisioner.list_available_versions(role, kind).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No {} images found for {}.", role, kind);
        return Ok(());
    }
    for version in versions {
        println!("{}", version);
    }
    Ok(())
}

/// Print the loaded profiles, optionally for one role only.
pub fn run_profiles_command(
    profiles: &ProfileStore,
    role: Option<ConnectionRole>,
    json: bool,
) -> anyhow::Result<()> {
    let roles: Vec<ConnectionRole> = match role {
        Some(role) => vec![role],
        None => ConnectionRole::ALL.to_vec(),
    };

    if json {
        let entries: Vec<serde_json::Value> = roles
            .iter()
            .flat_map(|role| profiles.profiles(*role))
            .map(|p| {
                serde_json::json!({
                    "name": p.name(),
                    "role": p.role(),
                    "type": p.kind(),
                    "versions": p.versions(),
                    "default": profiles
                        .resolve_default(p.kind(), p.role())
                        .is_ok_and(|d| Arc::ptr_eq(&d, p)),
                    "description": p.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<32} {:<7} {:<14} {:<20} DESCRIPTION", "NAME", "ROLE", "TYPE", "VERSIONS");
    println!("{}", "-".repeat(100));
    for role in roles {
        for p in profiles.profiles(role) {
            let versions = if p.is_version_specific() {
                p.versions().join(", ")
            } else {
                "-".to_string()
            };
            println!(
                "{:<32} {:<7} {:<14} {:<20} {}",
                p.name(),
                p.role(),
                p.kind(),
                versions,
                p.description()
            );
        }
    }
    Ok(())
}
