use checkout_engine::application::engine::{CheckoutEngine, Collaborators};
use checkout_engine::config::AppConfig;
use checkout_engine::domain::ports::{InventoryStore, OrderStore};
use checkout_engine::gateway::GatewayRegistry;
use checkout_engine::infrastructure::catalog::{
    CatalogSeed, InMemoryCatalog, InMemoryCouponRepository, StaticSessions,
};
use checkout_engine::infrastructure::id::{SystemClock, UlidGenerator};
use checkout_engine::infrastructure::in_memory::InMemoryStore;
use checkout_engine::infrastructure::notifier::LogNotifier;
#[cfg(feature = "storage-rocksdb")]
use checkout_engine::infrastructure::rocksdb::RocksDBStore;
use checkout_engine::interfaces::csv::event_reader::EventReader;
use checkout_engine::interfaces::csv::order_writer::OrderWriter;
use checkout_engine::interfaces::csv::replay::Replayer;
use checkout_engine::{interfaces, telemetry};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog seed JSON (plans, resources, coupons, sessions)
    #[arg(long, global = true, env = "CHECKOUT_CATALOG")]
    catalog: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "CHECKOUT_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the checkout HTTP API
    Serve {
        /// Listen address, overrides CHECKOUT_BIND
        #[arg(long)]
        bind: Option<String>,
    },
    /// Replay an events CSV offline and print the resulting orders as CSV
    Replay {
        /// Input events CSV file
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            telemetry::init("info,tower_http=info");
            let config = AppConfig::from_env().into_diagnostic()?;
            let gateways = config.gateways().into_diagnostic()?;
            let engine = open_engine(cli.db_path, cli.catalog.as_deref(), gateways).await?;
            let bind = bind.unwrap_or(config.bind);
            interfaces::http::serve(engine, &bind)
                .await
                .into_diagnostic()?;
        }
        Command::Replay { input } => {
            telemetry::init("warn");
            let engine =
                open_engine(cli.db_path, cli.catalog.as_deref(), GatewayRegistry::new()).await?;
            replay(engine, &input).await?;
        }
    }

    Ok(())
}

async fn replay(engine: CheckoutEngine, input: &Path) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = EventReader::new(file);
    let mut replayer = Replayer::new(engine);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                if let Err(e) = replayer.apply(event).await {
                    eprintln!("Error processing event: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading event: {}", e);
            }
        }
    }

    let orders = replayer.finish().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(&orders).into_diagnostic()?;
    Ok(())
}

async fn open_engine(
    db_path: Option<PathBuf>,
    catalog: Option<&Path>,
    gateways: GatewayRegistry,
) -> Result<CheckoutEngine> {
    if let Some(db_path) = db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            return build_engine(store, catalog, gateways).await;
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        {
            let _ = db_path;
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }
    }
    build_engine(InMemoryStore::new(), catalog, gateways).await
}

async fn build_engine<S>(
    store: S,
    catalog_path: Option<&Path>,
    gateways: GatewayRegistry,
) -> Result<CheckoutEngine>
where
    S: OrderStore + InventoryStore + Clone + 'static,
{
    let catalog = InMemoryCatalog::new();
    let coupons = InMemoryCouponRepository::new();
    let sessions = StaticSessions::new();
    if let Some(path) = catalog_path {
        CatalogSeed::from_path(path)
            .into_diagnostic()?
            .apply(&catalog, &coupons, &sessions, &store)
            .await
            .into_diagnostic()?;
    }

    Ok(CheckoutEngine::new(
        Collaborators {
            orders: Arc::new(store),
            catalog: Arc::new(catalog),
            coupons: Arc::new(coupons),
            notifier: Arc::new(LogNotifier),
            identity: Arc::new(sessions),
            ids: Arc::new(UlidGenerator::new()),
            clock: Arc::new(SystemClock),
        },
        gateways,
    ))
}
