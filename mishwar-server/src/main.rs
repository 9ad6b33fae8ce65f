use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use mishwar_core::{DialogueEngine, MishwarConfig, SessionStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "mishwar.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match MishwarConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Collaborator clients (keys from GOOGLE_MAPS_API_KEY / OPENAI_API_KEY)
    let engine = match DialogueEngine::from_config(&config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Failed to initialize collaborator clients: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(filter) = engine.region() {
        tracing::info!(region = %filter.name_ar, "region-restricted mode enabled");
    }

    let store = SessionStore::new();

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Spawn the session sweeper
    let sweeper_store = store.clone();
    let sweeper_config = config.session.clone();
    let sweeper_shutdown = tx.subscribe();
    tokio::spawn(async move {
        mishwar_server::subsystems::sweeper::run_sweeper_loop(
            sweeper_store,
            sweeper_config,
            sweeper_shutdown,
        )
        .await;
    });

    mishwar_server::http::start_http_server(store, engine, config, tx.subscribe()).await?;

    Ok(())
}
