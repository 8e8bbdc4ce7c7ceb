/// Remote login.
pub mod auth_client;

/// Client configuration.
pub mod config;

/// Token-attaching interceptor.
pub mod interceptor;

/// Catalog calls.
pub mod laptop_client;

pub use auth_client::{AuthClient, Login, LOGIN_TIMEOUT};
pub use config::ClientConfig;
pub use interceptor::ClientAuthInterceptor;
pub use laptop_client::{LaptopClient, CHUNK_SIZE};
