use clap::{Parser, Subcommand};
use menu_import::auth::AuthService;
use menu_import::config::Config;
use menu_import::importer::build_import;
use menu_import::logging;
use menu_import::server;
use menu_import::staging::StagingStore;
use menu_import::storage::{InMemoryStore, ItemStore, SqliteStore};
use menu_import::tasks::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "menu-import")]
#[command(about = "Restaurant menu bulk-import, staging and approval service")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Use the transient in-memory store instead of SQLite
        #[arg(long)]
        in_memory: bool,
    },
    /// One-shot import: parse a JSON file and persist it to the store
    Import {
        /// Path to the JSON payload
        file: PathBuf,
    },
    /// Create the SQLite database and schema
    InitDb,
}

fn build_state(config: &Config, in_memory: bool) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn ItemStore> = if in_memory {
        info!("Using transient in-memory item store");
        Arc::new(InMemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&config.database.path)?)
    };

    let state = AppState {
        store,
        staging: StagingStore::new(Duration::from_secs(config.staging.ttl_minutes * 60)),
        auth: AuthService::new(Duration::from_secs(config.auth.session_ttl_minutes * 60)),
        upload_root: PathBuf::from(&config.server.upload_root),
    };
    state
        .auth
        .seed_admin(&config.auth.admin_email, &config.auth.admin_password);
    Ok(Arc::new(state))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve { port, in_memory } => {
            let state = build_state(&config, in_memory)?;
            let port = port.unwrap_or(config.server.port);
            server::start_server(state, port).await?;
        }
        Commands::Import { file } => {
            println!("📥 Importing {}...", file.display());
            let json = std::fs::read_to_string(&file)?;
            let state = build_state(&config, false)?;

            match build_import(&json) {
                Ok(batch) => {
                    let restaurants = batch.restaurants.len();
                    let menu_items = batch.menu_items.len();
                    let committed = tasks::persist_batch(&state, batch).await?;
                    println!("\n📊 Import results for {}:", file.display());
                    println!("   Restaurants: {restaurants}");
                    println!("   Menu items:  {menu_items}");
                    println!("   Committed:   {committed}");
                }
                Err(e) => {
                    error!("Import failed: {}", e);
                    println!("❌ Import failed: {e}");
                }
            }
        }
        Commands::InitDb => {
            SqliteStore::open(&config.database.path)?;
            println!("✅ Database ready at {}", config.database.path);
        }
    }

    Ok(())
}
