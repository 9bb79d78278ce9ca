//! Parameter profiles: how to invoke a TLS implementation as a command line.
//!
//! Profiles live in a resource tree with one directory per role:
//!
//! ```text
//! profiles/
//! ├── client/
//! │   └── openssl.profile        default for (openssl, client)
//! └── server/
//!     ├── openssl.profile        default for (openssl, server)
//!     └── openssl-1.0.profile    versions = ['0\.9\..*', '1\.0\..*']
//! ```
//!
//! Resolution tries version-specific profiles first (full-string regex, first
//! match in filename order) and then the `{type}.profile` default.

pub mod document;
pub mod store;

pub use document::{Parameter, ParameterKind, ParameterProfile, TemplateInput};
pub use store::{ProfileStore, default_profile_filename};
