//! Common test utilities shared across integration tests.

use std::sync::Arc;
use std::time::Duration;

use laptop_catalog::auth::{AccessPolicy, AuthInterceptor, AuthLayer, TokenManager, ROLE_ADMIN, ROLE_USER};
use laptop_catalog::proto::{self, auth_service_server::AuthServiceServer};
use laptop_catalog::proto::laptop_service_server::LaptopServiceServer;
use laptop_catalog::server::{self, AuthServiceImpl, LaptopServiceImpl, SeedUser};
use laptop_catalog::store::{DiskImageStore, LaptopStore, RatingStore, UserStore};
use tempfile::TempDir;
use tonic::transport::{Channel, Server};
use tower::ServiceBuilder;

/// Password of every seeded account.
pub const PASSWORD: &str = "secret";

/// Initialize test tracing (call once at the beginning of tests).
///
/// Only logs from the catalog crate are shown, filtering out HTTP/2 and tower
/// noise. Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("laptop_catalog=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// A catalog server listening on an ephemeral port.
pub struct TestServer {
    pub url: String,
    pub laptops: LaptopStore,
    pub images: DiskImageStore,
    pub tokens: Arc<TokenManager>,
    _image_dir: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Opens a channel to the server.
    pub async fn channel(&self) -> Channel {
        Channel::from_shared(self.url.clone())
            .unwrap()
            .connect()
            .await
            .expect("Failed to connect to server")
    }
}

/// Starts a server with `admin1` (admin) and `user1` (user) accounts.
pub async fn start_test_server() -> TestServer {
    start_test_server_with(Duration::from_secs(60)).await
}

/// Starts a server whose tokens live for `token_duration`.
pub async fn start_test_server_with(token_duration: Duration) -> TestServer {
    init_tracing();

    let image_dir = tempfile::tempdir().unwrap();
    let laptops = LaptopStore::new();
    let images = DiskImageStore::new(image_dir.path());
    let users = UserStore::new();
    let seeds = [
        SeedUser {
            username: "admin1".to_string(),
            password: PASSWORD.to_string(),
            role: ROLE_ADMIN.to_string(),
        },
        SeedUser {
            username: "user1".to_string(),
            password: PASSWORD.to_string(),
            role: ROLE_USER.to_string(),
        },
    ];
    server::seed_users(&users, &seeds).await.unwrap();

    let tokens = Arc::new(TokenManager::new("test-secret", token_duration));
    let interceptor = AuthInterceptor::new(
        Arc::clone(&tokens),
        Arc::new(AccessPolicy::catalog_default()),
    );

    let auth_service = AuthServiceImpl::new(users, Arc::clone(&tokens));
    let laptop_service =
        LaptopServiceImpl::new(laptops.clone(), images.clone(), RatingStore::new());

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        Server::builder()
            .layer(ServiceBuilder::new().layer(AuthLayer::new(interceptor)).into_inner())
            .add_service(reflection_service)
            .add_service(AuthServiceServer::new(auth_service))
            .add_service(LaptopServiceServer::new(laptop_service))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    TestServer {
        url: format!("http://{local_addr}"),
        laptops,
        images,
        tokens,
        _image_dir: image_dir,
        _handle: handle,
    }
}
