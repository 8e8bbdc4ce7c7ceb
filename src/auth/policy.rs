//! Static per-method role table.

use std::collections::{HashMap, HashSet};

/// Fully-qualified path prefix of the catalog service.
pub const LAPTOP_SERVICE_PATH: &str = "/pcbook.LaptopService/";

/// Role allowed to manage the catalog.
pub const ROLE_ADMIN: &str = "admin";
/// Role allowed to rate laptops.
pub const ROLE_USER: &str = "user";

/// Immutable mapping from method path to the roles allowed to call it.
///
/// A method without an entry is public: no token is required. This is what
/// keeps `Login` and `SearchLaptop` reachable for anonymous callers.
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    roles: HashMap<String, HashSet<String>>,
}

impl AccessPolicy {
    /// Builds a policy from `(method path, allowed roles)` pairs.
    pub fn new<M, R, I>(entries: impl IntoIterator<Item = (M, I)>) -> Self
    where
        M: Into<String>,
        R: Into<String>,
        I: IntoIterator<Item = R>,
    {
        let roles = entries
            .into_iter()
            .map(|(method, roles)| {
                (
                    method.into(),
                    roles.into_iter().map(Into::into).collect::<HashSet<_>>(),
                )
            })
            .collect();

        Self { roles }
    }

    /// The catalog's table: creating and uploading need `admin`, rating needs
    /// `admin` or `user`.
    pub fn catalog_default() -> Self {
        Self::new([
            (catalog_method("CreateLaptop"), vec![ROLE_ADMIN]),
            (catalog_method("UploadImage"), vec![ROLE_ADMIN]),
            (catalog_method("RateLaptop"), vec![ROLE_ADMIN, ROLE_USER]),
        ])
    }

    /// Roles allowed to call `method`, or `None` if the method is public.
    pub fn allowed_roles(&self, method: &str) -> Option<&HashSet<String>> {
        self.roles.get(method)
    }

    /// Returns true if `method` requires an authenticated caller.
    pub fn requires_auth(&self, method: &str) -> bool {
        self.roles.contains_key(method)
    }

    /// Returns true if a caller holding `role` may invoke `method`.
    pub fn permits(&self, method: &str, role: &str) -> bool {
        self.allowed_roles(method)
            .map_or(true, |roles| roles.contains(role))
    }

    /// Method paths that require a token, for configuring clients.
    pub fn protected_methods(&self) -> HashSet<String> {
        self.roles.keys().cloned().collect()
    }
}

/// Fully-qualified path of a `LaptopService` method.
pub fn catalog_method(name: &str) -> String {
    format!("{LAPTOP_SERVICE_PATH}{name}")
}
