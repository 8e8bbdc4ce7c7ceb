use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{ROLE_ADMIN, ROLE_USER};

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server listening settings.
    pub server: ServerSettings,
    /// Token signing settings.
    pub auth: AuthSettings,
    /// Image storage settings.
    pub storage: StorageSettings,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
    /// Accounts created at startup.
    pub users: Vec<SeedUser>,
}

/// Server listening settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl ServerSettings {
    /// Converts host and port into a socket address.
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Token signing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret used to sign access tokens.
    pub secret_key: String,
    /// Lifetime of an issued token, in seconds.
    pub token_duration_secs: u64,
}

impl AuthSettings {
    /// Token lifetime as a [`Duration`].
    pub fn token_duration(&self) -> Duration {
        Duration::from_secs(self.token_duration_secs)
    }
}

/// Image storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Folder uploaded images are written to.
    pub image_folder: PathBuf,
}

/// Metrics exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for metrics server.
    pub host: String,
    /// Port number for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Converts host and port into a socket address for metrics server.
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// An account created when the server starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedUser {
    /// Login name.
    pub username: String,
    /// Plaintext password, hashed before it is stored.
    pub password: String,
    /// Role granted to the account.
    pub role: String,
}

impl SeedUser {
    fn new(username: &str, password: &str, role: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role: role.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            auth: AuthSettings {
                secret_key: "secret".to_string(),
                token_duration_secs: 15 * 60,
            },
            storage: StorageSettings {
                image_folder: PathBuf::from("img"),
            },
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
            users: vec![
                SeedUser::new("admin1", "secret", ROLE_ADMIN),
                SeedUser::new("user1", "secret", ROLE_USER),
            ],
        }
    }
}

impl ServerConfig {
    /// Loads configuration from TOML file and environment variables.
    ///
    /// Configuration priority: environment variables > TOML file > defaults.
    /// Nested keys use a double underscore, e.g. `SERVER_AUTH__SECRET_KEY`.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("config/server.toml").nested())
            .merge(Env::prefixed("SERVER_").split("__"))
            .extract()
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth.secret_key.is_empty() {
            return Err("auth.secret_key cannot be empty".to_string());
        }

        if self.auth.token_duration_secs == 0 {
            return Err("auth.token_duration_secs cannot be zero".to_string());
        }

        if self.storage.image_folder.as_os_str().is_empty() {
            return Err("storage.image_folder cannot be empty".to_string());
        }

        if let Some(user) = self.users.iter().find(|u| u.username.is_empty()) {
            return Err(format!("seed user with role '{}' has no username", user.role));
        }

        self.server
            .addr()
            .map_err(|e| format!("invalid server address: {e}"))?;

        if self.metrics.enabled {
            self.metrics
                .addr()
                .map_err(|e| format!("invalid metrics address: {e}"))?;
        }

        Ok(())
    }
}
