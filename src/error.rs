//! Error types for the laptop catalog.

use tonic::Status;

/// Main error type for the library.
///
/// Every variant maps onto exactly one gRPC status code; the conversion
/// happens once, at the RPC boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request field is malformed or a payload is too large.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced user or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record with the same identifier is already stored.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The caller presented no token, or an invalid or expired one.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller's role may not invoke the method.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The caller gave up on the call.
    #[error("request is cancelled")]
    Cancelled,

    /// The call's deadline passed before it completed.
    #[error("deadline is exceeded")]
    DeadlineExceeded,

    /// Store, signing or hashing fault.
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem fault while persisting image data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failure on the underlying stream.
    #[error("stream error: {0}")]
    Unknown(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(msg) => Status::invalid_argument(msg),
            Error::NotFound(msg) => Status::not_found(msg),
            Error::AlreadyExists(msg) => Status::already_exists(msg),
            Error::Unauthenticated(msg) => Status::unauthenticated(msg),
            Error::PermissionDenied(msg) => Status::permission_denied(msg),
            Error::Cancelled => Status::cancelled("request is cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("deadline is exceeded"),
            Error::Internal(msg) => Status::internal(msg),
            Error::Io(e) => Status::internal(format!("I/O error: {e}")),
            Error::Unknown(msg) => Status::unknown(msg),
        }
    }
}
