/// Laptop catalog gRPC service.
pub mod laptop_service;

/// Login gRPC service.
pub mod auth_service;

/// Server configuration.
pub mod config;

use tracing::info;

use crate::store::{User, UserStore};
use crate::Result;

pub use auth_service::AuthServiceImpl;
pub use config::{SeedUser, ServerConfig};
pub use laptop_service::LaptopServiceImpl;

/// Hashes and stores every seed account.
pub async fn seed_users(users: &UserStore, seeds: &[SeedUser]) -> Result<()> {
    for seed in seeds {
        users
            .save(User::new(&seed.username, &seed.password, &seed.role)?)
            .await?;
        info!(username = %seed.username, role = %seed.role, "seeded user");
    }

    Ok(())
}
