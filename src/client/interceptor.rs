//! Client-side token attachment with background refresh.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::{GrpcMethod, Request, Status};
use tracing::{debug, info, warn};

use super::auth_client::Login;

const AUTHORIZATION_HEADER: &str = "authorization";

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(token: String, token_duration: Duration) -> Self {
        Self {
            token,
            expires_at: Instant::now() + token_duration,
        }
    }
}

/// Aborts the refresh task once the last interceptor clone is gone.
#[derive(Debug)]
struct RefreshTask(JoinHandle<()>);

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Attaches a cached bearer token to calls that require authentication.
///
/// Construction logs in once; afterwards a background task logs in again on
/// every refresh tick. A failed refresh keeps the previous token. Clones share
/// the cache and the refresh task.
#[derive(Clone, Debug)]
pub struct ClientAuthInterceptor {
    auth_methods: Arc<HashSet<String>>,
    token: Arc<Mutex<CachedToken>>,
    refresher: Arc<RefreshTask>,
}

impl ClientAuthInterceptor {
    /// Logs in and starts refreshing the token every `refresh_interval`.
    ///
    /// `auth_methods` holds full method paths such as
    /// `/pcbook.LaptopService/CreateLaptop`. `token_duration` is the lifetime
    /// the server grants, used to track expiry locally.
    pub async fn new<L: Login>(
        login: L,
        auth_methods: HashSet<String>,
        refresh_interval: Duration,
        token_duration: Duration,
    ) -> Result<Self, Status> {
        let token = login.login().await?;
        info!("obtained initial access token");

        let token = Arc::new(Mutex::new(CachedToken::new(token, token_duration)));
        let handle = tokio::spawn(refresh(
            login,
            Arc::clone(&token),
            refresh_interval,
            token_duration,
        ));

        Ok(Self {
            auth_methods: Arc::new(auth_methods),
            token,
            refresher: Arc::new(RefreshTask(handle)),
        })
    }

    /// Stops the background refresh. The cached token stays usable until it
    /// expires.
    pub fn shutdown(&self) {
        self.refresher.0.abort();
    }

    /// Returns the cached token unless it has expired locally.
    pub fn current_token(&self) -> Option<String> {
        let cached = lock(&self.token);

        if Instant::now() > cached.expires_at {
            return None;
        }
        Some(cached.token.clone())
    }
}

fn lock(token: &Mutex<CachedToken>) -> MutexGuard<'_, CachedToken> {
    token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn refresh<L: Login>(
    login: L,
    token: Arc<Mutex<CachedToken>>,
    every: Duration,
    token_duration: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match login.login().await {
            Ok(fresh) => {
                *lock(&token) = CachedToken::new(fresh, token_duration);
                info!("access token refreshed");
            }
            Err(status) => {
                warn!(code = ?status.code(), "cannot refresh access token, keeping the current one");
            }
        }
    }
}

impl Interceptor for ClientAuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let Some(method) = request.extensions().get::<GrpcMethod<'static>>() else {
            return Ok(request);
        };

        let path = format!("/{}/{}", method.service(), method.method());
        if !self.auth_methods.contains(&path) {
            return Ok(request);
        }

        let token = self
            .current_token()
            .ok_or_else(|| Status::unauthenticated("cached access token has expired"))?;

        let value = AsciiMetadataValue::try_from(format!("Bearer {token}"))
            .map_err(|_| Status::internal("access token is not valid metadata"))?;
        request.metadata_mut().insert(AUTHORIZATION_HEADER, value);

        debug!(%path, "attached access token");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const METHOD: &str = "/pcbook.LaptopService/CreateLaptop";

    /// Hands out `token-1`, `token-2`, ... and fails once `fail_after` logins
    /// have succeeded.
    #[derive(Clone)]
    struct CountingLogin {
        calls: Arc<AtomicUsize>,
        fail_after: usize,
    }

    impl CountingLogin {
        fn new(fail_after: usize) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail_after,
            }
        }
    }

    #[tonic::async_trait]
    impl Login for CountingLogin {
        async fn login(&self) -> Result<String, Status> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n > self.fail_after {
                return Err(Status::unavailable("auth server is down"));
            }
            Ok(format!("token-{n}"))
        }
    }

    fn request_for(service: &'static str, method: &'static str) -> Request<()> {
        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(GrpcMethod::new(service, method));
        request
    }

    fn bearer(request: &Request<()>) -> Option<String> {
        request
            .metadata()
            .get(AUTHORIZATION_HEADER)
            .map(|value| value.to_str().unwrap().to_string())
    }

    async fn interceptor(login: CountingLogin, refresh: Duration) -> ClientAuthInterceptor {
        ClientAuthInterceptor::new(
            login,
            HashSet::from([METHOD.to_string()]),
            refresh,
            Duration::from_secs(60),
        )
        .await
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn attaches_token_only_to_listed_methods() {
        let mut interceptor = interceptor(CountingLogin::new(usize::MAX), Duration::from_secs(30)).await;

        let protected = interceptor
            .call(request_for("pcbook.LaptopService", "CreateLaptop"))
            .unwrap();
        assert_eq!(bearer(&protected).as_deref(), Some("Bearer token-1"));

        let public = interceptor
            .call(request_for("pcbook.LaptopService", "SearchLaptop"))
            .unwrap();
        assert_eq!(bearer(&public), None);

        let untagged = interceptor.call(Request::new(())).unwrap();
        assert_eq!(bearer(&untagged), None);
    }

    #[tokio::test]
    async fn failed_initial_login_is_returned() {
        let result = ClientAuthInterceptor::new(
            CountingLogin::new(0),
            HashSet::new(),
            Duration::from_secs(30),
            Duration::from_secs(60),
        )
        .await;

        assert_eq!(result.unwrap_err().code(), tonic::Code::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_the_cached_token() {
        let login = CountingLogin::new(usize::MAX);
        let interceptor = interceptor(login.clone(), Duration::from_secs(30)).await;
        assert_eq!(interceptor.current_token().as_deref(), Some("token-1"));

        time::sleep(Duration::from_secs(31)).await;
        assert_eq!(interceptor.current_token().as_deref(), Some("token-2"));
        assert_eq!(login.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_the_old_token() {
        let interceptor = interceptor(CountingLogin::new(1), Duration::from_secs(30)).await;

        time::sleep(Duration::from_secs(31)).await;
        assert_eq!(interceptor.current_token().as_deref(), Some("token-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_fails_locally() {
        let mut interceptor = interceptor(CountingLogin::new(1), Duration::from_secs(30)).await;

        time::sleep(Duration::from_secs(61)).await;

        let status = interceptor
            .call(request_for("pcbook.LaptopService", "CreateLaptop"))
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_last_clone_stops_refreshing() {
        let login = CountingLogin::new(usize::MAX);
        let interceptor = interceptor(login.clone(), Duration::from_secs(30)).await;
        let clone = interceptor.clone();

        drop(interceptor);
        time::sleep(Duration::from_secs(31)).await;
        assert_eq!(login.calls.load(Ordering::SeqCst), 2);

        drop(clone);
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(login.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_refreshing() {
        let login = CountingLogin::new(usize::MAX);
        let interceptor = interceptor(login.clone(), Duration::from_secs(30)).await;

        interceptor.shutdown();
        time::sleep(Duration::from_secs(120)).await;

        assert_eq!(login.calls.load(Ordering::SeqCst), 1);
        assert_eq!(interceptor.current_token(), None);
    }
}
