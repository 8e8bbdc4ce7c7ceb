use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use laptop_catalog::auth::{AccessPolicy, AuthInterceptor, AuthLayer, TokenManager};
use laptop_catalog::proto::{self, auth_service_server::AuthServiceServer};
use laptop_catalog::proto::laptop_service_server::LaptopServiceServer;
use laptop_catalog::server::{self, AuthServiceImpl, LaptopServiceImpl, ServerConfig};
use laptop_catalog::store::{DiskImageStore, LaptopStore, RatingStore, UserStore};
use tokio::signal;
use tonic::transport::Server;
use tonic_health::server::{health_reporter, HealthReporter};
use tower::ServiceBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Laptop catalog gRPC server", long_about = None)]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Folder uploaded images are written to
    #[arg(long, env = "SERVER_IMAGE_FOLDER")]
    image_folder: Option<PathBuf>,

    /// Secret used to sign access tokens
    #[arg(long, env = "SERVER_SECRET_KEY")]
    secret_key: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "SERVER_TOKEN_DURATION")]
    token_duration: Option<u64>,

    /// Enable metrics endpoint
    #[arg(long, env = "METRICS_ENABLED")]
    metrics: bool,

    /// Metrics port
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(folder) = self.image_folder {
            config.storage.image_folder = folder;
        }
        if let Some(secret) = self.secret_key {
            config.auth.secret_key = secret;
        }
        if let Some(secs) = self.token_duration {
            config.auth.token_duration_secs = secs;
        }
        if self.metrics {
            config.metrics.enabled = true;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = port;
        }
    }
}

fn println_colored(color: Color, text: &str) {
    let mut stdout = io::stdout();
    execute!(stdout, SetForegroundColor(color), Print(text), ResetColor).ok();
    println!();
    stdout.flush().ok();
}

fn display_banner(config: &ServerConfig) {
    println!();
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println_colored(
        Color::Cyan,
        "|               Laptop Catalog gRPC Server                |",
    );
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println_colored(
        Color::White,
        &format!("  Images: {}", config.storage.image_folder.display()),
    );
    println_colored(
        Color::White,
        &format!("  Token lifetime: {}s", config.auth.token_duration_secs),
    );
    println_colored(
        Color::White,
        &format!(
            "  Metrics: {}",
            if config.metrics.enabled {
                "enabled"
            } else {
                "disabled"
            }
        ),
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ServerConfig::default()
    });
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        println_colored(Color::Red, &format!("Configuration validation failed: {e}"));
        return Err(format!("Invalid configuration: {e}").into());
    }

    display_banner(&config);

    tokio::fs::create_dir_all(&config.storage.image_folder).await?;

    let users = UserStore::new();
    server::seed_users(&users, &config.users).await?;

    let tokens = Arc::new(TokenManager::new(
        &config.auth.secret_key,
        config.auth.token_duration(),
    ));
    let interceptor = AuthInterceptor::new(
        Arc::clone(&tokens),
        Arc::new(AccessPolicy::catalog_default()),
    );

    let auth_service = AuthServiceImpl::new(users, tokens);
    let laptop_service = LaptopServiceImpl::new(
        LaptopStore::new(),
        DiskImageStore::new(&config.storage.image_folder),
        RatingStore::new(),
    );

    if config.metrics.enabled {
        let metrics_addr = config.metrics.addr()?;
        if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
        {
            error!("Failed to start metrics server: {e}");
        } else {
            info!("Metrics server started on {metrics_addr}");
        }
    }

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<LaptopServiceServer<LaptopServiceImpl>>()
        .await;
    health_reporter
        .set_serving::<AuthServiceServer<AuthServiceImpl>>()
        .await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
        .register_encoded_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let addr = config.server.addr()?;
    println_colored(Color::Green, &format!("Server starting on {addr}"));

    let result = Server::builder()
        .layer(ServiceBuilder::new().layer(AuthLayer::new(interceptor)).into_inner())
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(AuthServiceServer::new(auth_service))
        .add_service(LaptopServiceServer::new(laptop_service))
        .serve_with_shutdown(addr, shutdown_signal(health_reporter))
        .await;

    match result {
        Ok(()) => println_colored(Color::Green, "Server shutdown complete. Goodbye!"),
        Err(e) => {
            println_colored(Color::Red, &format!("Server error: {e}"));
            return Err(e.into());
        }
    }

    Ok(())
}

async fn shutdown_signal(mut health_reporter: HealthReporter) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    health_reporter
        .set_not_serving::<LaptopServiceServer<LaptopServiceImpl>>()
        .await;
    health_reporter
        .set_not_serving::<AuthServiceServer<AuthServiceImpl>>()
        .await;

    info!("Initiating graceful shutdown (allowing in-flight requests to complete)");

    tokio::time::sleep(Duration::from_secs(2)).await;
}
