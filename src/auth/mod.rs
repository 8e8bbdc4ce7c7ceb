/// Access token issuance and verification.
pub mod jwt;

/// Password hashing.
pub mod password;

/// Per-method role table.
pub mod policy;

/// Server-side interceptor and tower layer.
pub mod interceptor;

pub use interceptor::{AuthInterceptor, AuthLayer, AuthMiddleware};
pub use jwt::{Claims, TokenManager};
pub use policy::{catalog_method, AccessPolicy, ROLE_ADMIN, ROLE_USER};
