//! Signed access tokens.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::store::User;
use crate::{Error, Result};

/// Only HMAC-SHA256 tokens are issued or accepted.
const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Identity and role asserted by an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the authenticated user.
    pub username: String,
    /// Role granted to the user.
    pub role: String,
    /// Issue time, seconds since UNIX epoch.
    pub iat: u64,
    /// Expiry time, seconds since UNIX epoch. Always `iat + token_duration`.
    pub exp: u64,
}

/// Issues and verifies access tokens with a symmetric secret.
///
/// Holds no mutable state, so a single instance can be shared across every
/// call without synchronization.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_duration: Duration,
}

impl TokenManager {
    /// Creates a token manager signing with `secret`.
    pub fn new(secret: &str, token_duration: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_duration,
        }
    }

    /// Lifetime of every issued token.
    pub fn token_duration(&self) -> Duration {
        self.token_duration
    }

    /// Issues a token for `user` valid from now.
    pub fn generate(&self, user: &User) -> Result<String> {
        self.generate_at(user, unix_now())
    }

    /// Issues a token for `user` as if the current time were `now`.
    pub fn generate_at(&self, user: &User, now: u64) -> Result<String> {
        let claims = Claims {
            username: user.username().to_string(),
            role: user.role().to_string(),
            iat: now,
            exp: now.saturating_add(self.token_duration.as_secs()),
        };

        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("cannot sign access token: {e}")))
    }

    /// Verifies signature, algorithm and expiry of `token`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, unix_now())
    }

    /// Verifies `token` as if the current time were `now`.
    ///
    /// A token stays valid up to and including its expiry second.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims> {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Unauthenticated(format!("invalid access token: {e}")))?;

        if now > data.claims.exp {
            return Err(Error::Unauthenticated(
                "access token has expired".to_string(),
            ));
        }

        Ok(data.claims)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| unreachable!("System time is after UNIX_EPOCH"))
        .as_secs()
}
