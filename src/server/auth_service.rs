use std::sync::Arc;

use metrics::counter;
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use crate::auth::TokenManager;
use crate::proto::auth_service_server::AuthService;
use crate::proto::{LoginRequest, LoginResponse};
use crate::store::UserStore;

/// gRPC service issuing access tokens in exchange for credentials.
#[derive(Clone)]
pub struct AuthServiceImpl {
    users: UserStore,
    tokens: Arc<TokenManager>,
}

impl AuthServiceImpl {
    /// Creates a login service over a credential store and token manager.
    pub fn new(users: UserStore, tokens: Arc<TokenManager>) -> Self {
        Self { users, tokens }
    }
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        counter!("auth.login.requests").increment(1);
        let req = request.into_inner();

        let user = match self.users.find(&req.username).await {
            Some(user) => user,
            None => {
                counter!("auth.login.failure").increment(1);
                warn!(username = %req.username, "login with unknown username");
                return Err(Status::not_found("incorrect username/password"));
            }
        };

        let correct = user.is_correct_password(&req.password).map_err(|e| {
            error!(username = %req.username, "cannot check password: {e}");
            Status::internal("cannot check password")
        })?;

        if !correct {
            counter!("auth.login.failure").increment(1);
            warn!(username = %req.username, "login with wrong password");
            return Err(Status::not_found("incorrect username/password"));
        }

        let access_token = self.tokens.generate(&user).map_err(|e| {
            error!(username = %req.username, "cannot generate access token: {e}");
            Status::internal("cannot generate access token")
        })?;

        counter!("auth.login.success").increment(1);
        info!(username = %req.username, role = user.role(), "user logged in");

        Ok(Response::new(LoginResponse { access_token }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tonic::Code;

    use super::*;
    use crate::auth::ROLE_ADMIN;
    use crate::store::User;

    async fn service() -> (AuthServiceImpl, Arc<TokenManager>) {
        let users = UserStore::new();
        users
            .save(User::new("admin1", "secret", ROLE_ADMIN).unwrap())
            .await
            .unwrap();

        let tokens = Arc::new(TokenManager::new("key", Duration::from_secs(60)));
        (AuthServiceImpl::new(users, tokens.clone()), tokens)
    }

    fn login_request(username: &str, password: &str) -> Request<LoginRequest> {
        Request::new(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn correct_credentials_yield_a_verifiable_token() {
        let (service, tokens) = service().await;

        let response = service
            .login(login_request("admin1", "secret"))
            .await
            .unwrap();

        let claims = tokens.verify(&response.get_ref().access_token).unwrap();
        assert_eq!(claims.username, "admin1");
        assert_eq!(claims.role, ROLE_ADMIN);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (service, _) = service().await;

        let wrong = service
            .login(login_request("admin1", "guess"))
            .await
            .unwrap_err();
        let unknown = service
            .login(login_request("nobody", "secret"))
            .await
            .unwrap_err();

        assert_eq!(wrong.code(), Code::NotFound);
        assert_eq!(unknown.code(), Code::NotFound);
        assert_eq!(wrong.message(), unknown.message());
    }
}
