//! Server-side authentication and authorization.
//!
//! [`AuthInterceptor`] decides whether a call may proceed; [`AuthLayer`]
//! applies that decision to every request reaching the tonic router, unary
//! and streaming alike, before any handler code runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::HeaderMap;
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::jwt::{Claims, TokenManager};
use super::policy::AccessPolicy;

const AUTHORIZATION_HEADER: &str = "authorization";
const BEARER_PREFIX: &str = "Bearer ";

/// Authenticates callers and enforces the [`AccessPolicy`].
#[derive(Clone)]
pub struct AuthInterceptor {
    tokens: Arc<TokenManager>,
    policy: Arc<AccessPolicy>,
}

impl AuthInterceptor {
    /// Creates an interceptor over a token manager and access table.
    pub fn new(tokens: Arc<TokenManager>, policy: Arc<AccessPolicy>) -> Self {
        Self { tokens, policy }
    }

    /// Decides whether a call to `method` carrying `headers` may proceed.
    ///
    /// Returns `Ok(None)` for public methods, `Ok(Some(claims))` for an
    /// authorized caller, `Unauthenticated` for a missing or invalid token and
    /// `PermissionDenied` for a valid token whose role is not allowed.
    #[allow(clippy::result_large_err)]
    pub fn authorize(&self, method: &str, headers: &HeaderMap) -> Result<Option<Claims>, Status> {
        let Some(allowed_roles) = self.policy.allowed_roles(method) else {
            debug!(method, "public method, skipping authentication");
            return Ok(None);
        };

        let token = bearer_token(headers)?;

        let claims = self
            .tokens
            .verify(token)
            .map_err(|e| Status::unauthenticated(format!("access token is invalid: {e}")))?;

        if !allowed_roles.contains(&claims.role) {
            return Err(Status::permission_denied(
                "no permission to access this RPC",
            ));
        }

        debug!(method, username = %claims.username, "call authorized");
        Ok(Some(claims))
    }
}

#[allow(clippy::result_large_err)]
fn bearer_token(headers: &HeaderMap) -> Result<&str, Status> {
    let value = headers
        .get(AUTHORIZATION_HEADER)
        .ok_or_else(|| Status::unauthenticated("authorization token is not provided"))?;

    let value = value
        .to_str()
        .map_err(|_| Status::unauthenticated("authorization token is malformed"))?;

    value
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Status::unauthenticated("authorization token is malformed"))
}

/// Tower layer running [`AuthInterceptor`] in front of the wrapped service.
#[derive(Clone)]
pub struct AuthLayer {
    interceptor: AuthInterceptor,
}

impl AuthLayer {
    /// Creates the layer.
    pub fn new(interceptor: AuthInterceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Service produced by [`AuthLayer`].
///
/// Rejected calls are answered with a trailers-only gRPC status response;
/// accepted calls carry their [`Claims`] in the request extensions. The
/// wrapped future covers the whole call, including streamed bodies.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    interceptor: AuthInterceptor,
}

impl<S, B> Service<http::Request<B>> for AuthMiddleware<S>
where
    S: Service<http::Request<B>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // The readied service must be the one that handles this request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let method = req.uri().path().to_string();
        let decision = self.interceptor.authorize(&method, req.headers());

        Box::pin(async move {
            match decision {
                Ok(Some(claims)) => {
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Ok(None) => inner.call(req).await,
                Err(status) => {
                    warn!(%method, code = ?status.code(), "call rejected");
                    Ok(status.into_http())
                }
            }
        })
    }
}
