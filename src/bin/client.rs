use std::path::PathBuf;

use clap::{Parser, Subcommand};
use laptop_catalog::auth::AccessPolicy;
use laptop_catalog::client::{AuthClient, ClientAuthInterceptor, ClientConfig, LaptopClient};
use laptop_catalog::proto::memory::Unit;
use laptop_catalog::proto::{Filter, Memory};
use laptop_catalog::sample;
use tonic::transport::Endpoint;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Laptop catalog client", long_about = None)]
struct Cli {
    /// Server endpoint
    #[arg(short, long, env = "CLIENT_SERVER")]
    server: Option<String>,

    /// Account to log in as
    #[arg(short, long, env = "CLIENT_USERNAME")]
    username: Option<String>,

    /// Password of the account
    #[arg(short, long, env = "CLIENT_PASSWORD")]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create random sample laptops
    Create {
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Search laptops matching a filter
    Search {
        #[arg(long, default_value = "3000")]
        max_price: f64,

        #[arg(long, default_value = "4")]
        min_cores: u32,

        #[arg(long, default_value = "2.5")]
        min_ghz: f64,

        #[arg(long, default_value = "8")]
        min_ram_gb: u64,
    },

    /// Upload an image for a laptop, creating a sample laptop if none is given
    UploadImage {
        #[arg(short = 'f', long)]
        path: PathBuf,

        #[arg(short, long)]
        laptop_id: Option<String>,
    },

    /// Create sample laptops and rate each of them with random scores
    Rate {
        #[arg(short, long, default_value = "3")]
        count: usize,

        #[arg(short, long, default_value = "2")]
        rounds: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ClientConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        ClientConfig::default()
    });
    if let Some(server) = cli.server {
        config.server = server;
    }
    if let Some(username) = cli.username {
        config.username = username;
    }
    if let Some(password) = cli.password {
        config.password = password;
    }
    config.validate()?;

    let channel = Endpoint::from_shared(config.server.clone())?
        .connect()
        .await?;

    let interceptor = ClientAuthInterceptor::new(
        AuthClient::new(channel.clone(), &config.username, &config.password),
        AccessPolicy::catalog_default().protected_methods(),
        config.refresh_interval(),
        config.token_duration(),
    )
    .await?;
    let client = LaptopClient::new(channel, interceptor.clone());

    match cli.command {
        Commands::Create { count } => {
            for _ in 0..count {
                let id = client.create_laptop(sample::new_laptop()).await?;
                println!("Created laptop {id}");
            }
        }

        Commands::Search {
            max_price,
            min_cores,
            min_ghz,
            min_ram_gb,
        } => {
            let filter = Filter {
                max_price_usd: max_price,
                min_cpu_cores: min_cores,
                min_cpu_ghz: min_ghz,
                min_ram: Some(Memory {
                    value: min_ram_gb,
                    unit: Unit::Gigabyte as i32,
                }),
            };

            let laptops = client.search_laptop(filter).await?;
            println!("Found {} laptop(s)", laptops.len());

            for laptop in laptops {
                let cores = laptop.cpu.as_ref().map_or(0, |cpu| cpu.number_cores);
                let ram = laptop.ram.as_ref().map_or(0, |ram| ram.value);
                println!(
                    "  {} {} {} | {} cores | {} GB RAM | ${:.2}",
                    laptop.id, laptop.brand, laptop.name, cores, ram, laptop.price_usd
                );
            }
        }

        Commands::UploadImage { path, laptop_id } => {
            let laptop_id = match laptop_id {
                Some(id) => id,
                None => client.create_laptop(sample::new_laptop()).await?,
            };

            let image_type = path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            let data = tokio::fs::read(&path).await?;

            let response = client.upload_image(&laptop_id, &image_type, &data).await?;
            println!(
                "Uploaded image {} ({} bytes) for laptop {laptop_id}",
                response.id, response.size
            );
        }

        Commands::Rate { count, rounds } => {
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(client.create_laptop(sample::new_laptop()).await?);
            }

            for round in 1..=rounds {
                let ratings: Vec<_> = ids
                    .iter()
                    .map(|id| (id.clone(), sample::random_score()))
                    .collect();

                println!("Round {round}");
                for response in client.rate_laptop(&ratings).await? {
                    println!(
                        "  {} rated {} time(s), average {:.2}",
                        response.laptop_id, response.rated_count, response.average_score
                    );
                }
            }
        }
    }

    interceptor.shutdown();
    Ok(())
}
