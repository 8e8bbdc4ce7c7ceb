use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::password::{hash_password, verify_password};
use crate::{Error, Result};

/// A registered user.
///
/// Immutable once created. The store only ever hands out clones, so a caller
/// can never modify the stored record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    username: String,
    hashed_password: String,
    role: String,
}

impl User {
    /// Creates a user, hashing `password`.
    pub fn new(username: &str, password: &str, role: &str) -> Result<Self> {
        Ok(Self::with_hash(username, &hash_password(password)?, role))
    }

    /// Creates a user from an already hashed password.
    pub fn with_hash(username: &str, hashed_password: &str, role: &str) -> Self {
        Self {
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
            role: role.to_string(),
        }
    }

    /// Unique login name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Role used for authorization decisions.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Checks `password` against the stored hash.
    pub fn is_correct_password(&self, password: &str) -> Result<bool> {
        verify_password(password, &self.hashed_password)
    }
}

/// Credential store keyed by username.
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl UserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `user`; fails with `AlreadyExists` if the username is taken.
    pub async fn save(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.username) {
            return Err(Error::AlreadyExists(format!(
                "user '{}' already exists",
                user.username
            )));
        }

        users.insert(user.username.clone(), user);
        Ok(())
    }

    /// Returns a copy of the user named `username`.
    pub async fn find(&self, username: &str) -> Option<User> {
        let users = self.users.read().await;
        users.get(username).cloned()
    }
}
