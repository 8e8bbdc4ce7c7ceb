use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint, e.g. `http://127.0.0.1:8080`.
    pub server: String,
    /// Account used to log in.
    pub username: String,
    /// Password of the account.
    pub password: String,
    /// Seconds between background token refreshes.
    pub refresh_interval_secs: u64,
    /// Token lifetime granted by the server, in seconds.
    pub token_duration_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8080".to_string(),
            username: "admin1".to_string(),
            password: "secret".to_string(),
            refresh_interval_secs: 30,
            token_duration_secs: 15 * 60,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `config/client.toml` and `CLIENT_` variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("config/client.toml"))
            .merge(Env::prefixed("CLIENT_"))
            .extract()
    }

    /// Interval between background token refreshes.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Token lifetime as a [`Duration`].
    pub fn token_duration(&self) -> Duration {
        Duration::from_secs(self.token_duration_secs)
    }

    /// Rejects settings the client cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.is_empty() {
            return Err("server endpoint cannot be empty".to_string());
        }

        if self.refresh_interval_secs == 0 {
            return Err("refresh_interval_secs cannot be zero".to_string());
        }

        if self.refresh_interval_secs >= self.token_duration_secs {
            return Err(format!(
                "refresh interval ({}s) must be shorter than the token duration ({}s)",
                self.refresh_interval_secs, self.token_duration_secs
            ));
        }

        Ok(())
    }
}
