use std::time::Duration;

use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::debug;

use crate::proto::auth_service_client::AuthServiceClient;
use crate::proto::LoginRequest;

/// How long a single login call may take.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of fresh access tokens.
#[tonic::async_trait]
pub trait Login: Send + Sync + 'static {
    /// Obtains a new access token.
    async fn login(&self) -> Result<String, Status>;
}

/// Logs in against the remote `AuthService` with fixed credentials.
#[derive(Clone)]
pub struct AuthClient {
    service: AuthServiceClient<Channel>,
    username: String,
    password: String,
}

impl AuthClient {
    /// Creates a login client over an established channel.
    pub fn new(channel: Channel, username: &str, password: &str) -> Self {
        Self {
            service: AuthServiceClient::new(channel),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[tonic::async_trait]
impl Login for AuthClient {
    async fn login(&self) -> Result<String, Status> {
        let mut request = Request::new(LoginRequest {
            username: self.username.clone(),
            password: self.password.clone(),
        });
        request.set_timeout(LOGIN_TIMEOUT);

        let response = self.service.clone().login(request).await?;
        debug!(username = %self.username, "logged in");

        Ok(response.into_inner().access_token)
    }
}
