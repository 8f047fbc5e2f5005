use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use veneer_server::config::Config;
use veneer_server::engine::state::StateStore;
use veneer_server::server::{access_log, serve, RouterSnapshot};
use veneer_server::{convert, reload};

#[derive(Parser, Debug)]
#[command(name = "veneer", version, about = "Declarative HTTP mock & proxy server")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server from a config file
    Start {
        /// Path to the config file (.json, .yaml or .yml)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Convert a config file between JSON and YAML
    Convert {
        /// Input config file
        #[arg(short, long)]
        input: PathBuf,
        /// Output config file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    match cli.command {
        Command::Start { config } => start(config).await,
        Command::Convert { input, output } => {
            if let Err(e) = convert::run(&input, &output) {
                error!("convert failed: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn start(config_path: PathBuf) {
    let config_path = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.clone());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config: {e:#}");
            std::process::exit(1);
        }
    };

    tracing::debug!(
        "effective config: {}",
        serde_json::to_string(&config.masked()).unwrap_or_default()
    );

    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let snapshot = match RouterSnapshot::build(&config, &base_dir) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("failed to build routes: {e:#}");
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let holder = Arc::new(RwLock::new(Arc::new(snapshot)));
    let state = Arc::new(StateStore::new());
    let log_tx = access_log::start();

    info!("starting veneer on port {}", config.server.port);

    tokio::select! {
        result = serve(addr, holder.clone(), state, log_tx) => {
            if let Err(e) = result {
                error!("server error: {e:#}");
                std::process::exit(1);
            }
        }
        _ = reload::watch_config(config_path, holder) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("signal received, shutting down");
        }
    }
}
