//! The resource tree shipped in `resources/` loads cleanly and is complete.

use tls_fixtures::config::default_resources_dir;
use tls_fixtures::{ConnectionRole, ImplementationType, ProfileStore, PropertyStore};

fn stores() -> (ProfileStore, PropertyStore) {
    let root = default_resources_dir();
    let profiles = ProfileStore::load(&root.join("profiles"));
    let properties = PropertyStore::load(&root.join("properties.toml")).unwrap();
    (profiles, properties)
}

#[test]
fn every_profile_document_loads() {
    let (profiles, _) = stores();
    let on_disk: usize = ConnectionRole::ALL
        .iter()
        .map(|role| {
            std::fs::read_dir(default_resources_dir().join("profiles").join(role.as_str()))
                .unwrap()
                .count()
        })
        .sum();
    assert_eq!(profiles.len(), on_disk);
}

#[test]
fn every_property_entry_has_a_default_profile() {
    let (profiles, properties) = stores();
    assert!(!properties.is_empty());

    for role in ConnectionRole::ALL {
        for kind in ImplementationType::ALL {
            if properties.resolve(role, *kind).is_ok() {
                assert!(
                    profiles.has_default(*kind, role),
                    "{role} {kind} has properties but no default profile"
                );
            }
        }
    }
}

#[test]
fn legacy_openssl_versions_use_their_own_profile() {
    let (profiles, _) = stores();

    let legacy = profiles
        .resolve(ImplementationType::OpenSsl, "1.0.2u", ConnectionRole::Server)
        .unwrap();
    assert_eq!(legacy.name(), "openssl-1.0-server");

    let current = profiles
        .resolve(ImplementationType::OpenSsl, "3.2.0", ConnectionRole::Server)
        .unwrap();
    assert_eq!(current.name(), "openssl-server");

    // Full-string match: a prefixed version is not 1.0.x.
    let prefixed = profiles
        .resolve(ImplementationType::OpenSsl, "v1.0.2", ConnectionRole::Server)
        .unwrap();
    assert_eq!(prefixed.name(), "openssl-server");
}
