use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use medivault::api;
use medivault::blob::{BlobBackend, BlobStore};
use medivault::chat::{CompletionProvider, GroqProvider};
use medivault::config::{Config, ConfigManager};
use medivault::identity::{IdentityProvider, MemoryIdentity};
use medivault::record::MemoryRecordStore;
use medivault::service::{HealthRecordService, HOSPITAL_TABLE, NOTE_TABLE, PROFILE_TABLE};

#[derive(Parser)]
#[command(name = "medivault", about = "Personal health-record service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Path to a TOML or JSON config file
        #[arg(long)]
        config: Option<String>,
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config_path, port_override) = match cli.command {
        Some(Command::Serve { config, port }) => (config, port),
        None => (None, None),
    };

    let mut manager = ConfigManager::new();
    if let Some(path) = &config_path {
        manager.load(path).await?;
    }
    let mut config = manager.get().await;
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let level = config
        .logging
        .level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    serve(config).await
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let service = Arc::new(build_service(&config).await?);

    let identity: Arc<dyn IdentityProvider> = Arc::new(MemoryIdentity::new());

    let api_key = std::env::var(&config.chat.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        warn!(
            env = %config.chat.api_key_env,
            "chat credential not set; /chat will return errors"
        );
    }
    let chat: Arc<dyn CompletionProvider> = Arc::new(GroqProvider::new(
        &api_key,
        &config.chat.model,
        &config.chat.base_url,
    ));

    let app = api::routes()
        .layer(axum::Extension(service))
        .layer(axum::Extension(identity))
        .layer(axum::Extension(chat))
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("medivault listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_service(config: &Config) -> Result<HealthRecordService, Box<dyn std::error::Error>> {
    let backend = match config.storage.backend.as_str() {
        "local" => {
            std::fs::create_dir_all(&config.storage.data_dir)?;
            BlobBackend::Local(config.storage.data_dir.clone().into())
        }
        "memory" => BlobBackend::Memory,
        other => return Err(format!("unknown storage backend '{}'", other).into()),
    };

    let records = MemoryRecordStore::new();
    records.declare_unique(PROFILE_TABLE, &["user_id"]).await;
    records
        .declare_unique(HOSPITAL_TABLE, &["user_id", "name"])
        .await;
    records.declare_unique(NOTE_TABLE, &["hospital_id"]).await;

    let files = BlobStore::with_backend(&backend, "medical-files", &config.storage.public_base_url)?;
    let avatars =
        BlobStore::with_backend(&backend, "profile-images", &config.storage.public_base_url)?;

    Ok(HealthRecordService::new(Arc::new(records), files, avatars))
}
