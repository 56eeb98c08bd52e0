use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bemidb_pg_catalog::{CatalogCache, MemoryMaterializedViewStore};
use bemidb_postgres::{bootstrap_engine, serve, GatewayConfig};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use lake_pg::duck::DuckDbEngine;
use log::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "bemidb",
    version,
    about = "Postgres-compatible gateway over a lakehouse catalog"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: StartOptions,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gateway server (default).
    Start(StartOptions),
    /// Print the version and exit.
    Version,
}

#[derive(Debug, Args)]
struct StartOptions {
    /// Listen address.
    #[arg(long, env = "BEMIDB_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port.
    #[arg(long, env = "BEMIDB_PORT", default_value_t = 54321)]
    port: u16,

    /// Database name clients must connect to.
    #[arg(long, env = "BEMIDB_DATABASE", default_value = "bemidb")]
    database: String,

    /// Role clients authenticate as.
    #[arg(long, env = "BEMIDB_USER", default_value = "bemidb")]
    user: String,

    /// Optional cleartext password; without it clients are trusted.
    #[arg(long, env = "BEMIDB_PASSWORD")]
    password: Option<String>,

    /// Maximum number of concurrent client connections.
    #[arg(long, env = "BEMIDB_MAX_CONNECTIONS", default_value_t = 100)]
    max_connections: usize,

    /// Per-statement engine timeout, in seconds.
    #[arg(long, env = "BEMIDB_QUERY_TIMEOUT", default_value_t = 300)]
    query_timeout: u64,

    /// Engine memory limit, e.g. 4GB.
    #[arg(long, env = "BEMIDB_MEMORY_LIMIT")]
    memory_limit: Option<String>,

    /// Engine spill directory.
    #[arg(long, env = "BEMIDB_TEMP_DIRECTORY")]
    temp_directory: Option<String>,

    /// Engine thread count.
    #[arg(long, env = "BEMIDB_THREADS")]
    threads: Option<u16>,

    /// Connection URL of the lakehouse catalog database.
    #[arg(long, env = "BEMIDB_DUCKLAKE_CATALOG_URL")]
    ducklake_catalog_url: Option<String>,

    /// Object storage prefix holding the columnar data files.
    #[arg(long, env = "BEMIDB_DUCKLAKE_DATA_PATH")]
    ducklake_data_path: Option<String>,

    #[arg(long, env = "BEMIDB_R2_ENDPOINT")]
    r2_endpoint: Option<String>,

    #[arg(long, env = "BEMIDB_R2_ACCESS_KEY_ID")]
    r2_access_key_id: Option<String>,

    #[arg(long, env = "BEMIDB_R2_SECRET_ACCESS_KEY")]
    r2_secret_access_key: Option<String>,

    #[arg(long, env = "BEMIDB_R2_BUCKET")]
    r2_bucket: Option<String>,
}

impl StartOptions {
    fn into_config(self) -> GatewayConfig {
        GatewayConfig::new()
            .with_host(self.host)
            .with_port(self.port)
            .with_database(self.database)
            .with_user(self.user)
            .with_password(self.password)
            .with_max_connections(self.max_connections)
            .with_query_timeout(Duration::from_secs(self.query_timeout))
            .with_memory_limit(self.memory_limit)
            .with_temp_directory(self.temp_directory)
            .with_threads(self.threads)
            .with_ducklake_catalog_url(self.ducklake_catalog_url)
            .with_ducklake_data_path(self.ducklake_data_path)
            .with_r2_endpoint(self.r2_endpoint)
            .with_r2_access_key_id(self.r2_access_key_id)
            .with_r2_secret_access_key(self.r2_secret_access_key)
            .with_r2_bucket(self.r2_bucket)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::new().filter_or(
        "BEMIDB_LOG",
        "bemidb=info,bemidb_postgres=info,bemidb_pg_catalog=info",
    ))
    .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Version) => {
            println!("BemiDB {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some(Command::Start(options)) => start(options.into_config()).await,
        None => start(cli.options.into_config()).await,
    }
}

async fn start(config: GatewayConfig) -> ExitCode {
    if let Err(message) = config.validate_for_start() {
        error!("invalid configuration: {message}");
        return ExitCode::from(2);
    }

    let config = Arc::new(config);
    let engine = match DuckDbEngine::open_in_memory() {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("failed to open engine: {e}");
            return ExitCode::FAILURE;
        }
    };
    let cache = Arc::new(CatalogCache::new(config.catalog_config()));
    let store = Arc::new(MemoryMaterializedViewStore::new());

    if let Err(e) = bootstrap_engine(engine.as_ref(), &cache, &config).await {
        error!("engine bootstrap failed: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "BemiDB {} serving database {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.database(),
        config.host(),
        config.port()
    );

    match serve(engine, cache, store, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
