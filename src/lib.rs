//! gRPC laptop catalog with JWT authentication and role-based access control.
//!
//! The server keeps laptops, ratings and users in memory and writes uploaded
//! images to disk. Every call passes through [`auth::AuthLayer`], which
//! verifies bearer tokens and enforces the [`auth::AccessPolicy`] before any
//! handler runs. The client side attaches tokens via
//! [`client::ClientAuthInterceptor`], which refreshes them in the background.

/// Generated protobuf messages and gRPC stubs.
pub mod proto {
    #![allow(missing_docs)]
    #![allow(clippy::all)]
    tonic::include_proto!("pcbook");

    /// Encoded descriptors of every `pcbook` service, served over reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("pcbook_descriptor");
}

/// Token issuing, verification and access control.
pub mod auth;

/// Client-side helpers: login, token refresh and catalog calls.
pub mod client;

/// Per-call cancellation and deadlines.
pub mod context;

/// Crate-wide error type.
pub mod error;

/// Random sample data.
pub mod sample;

/// Catalog and authentication services.
pub mod server;

/// In-memory stores and image persistence.
pub mod store;

pub use error::{Error, Result};
