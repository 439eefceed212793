// src/main.rs — PathMentor entry point

use std::sync::Arc;

use clap::Parser;

use pathmentor::cli::{self, Cli, Commands};
use pathmentor::infra::config::Config;
use pathmentor::infra::{logger, paths};
use pathmentor::mentor::{MentorOptions, SessionManager};
use pathmentor::provider::build_provider;
use pathmentor::store;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    let user_id = cli::resolve_user(cli.user.as_deref(), &config);

    paths::ensure_dirs().await?;
    let store = Arc::new(store::open_handle(&config.store.db_path())?);

    match cli.command {
        Some(Commands::Sessions) => cli::sessions::run_sessions(store.as_ref(), &user_id).await,
        Some(Commands::Show { ref id }) => {
            cli::sessions::run_show(store.as_ref(), &user_id, id).await
        }
        Some(Commands::Delete { ref id }) => {
            cli::sessions::run_delete(store.as_ref(), &user_id, id).await
        }
        Some(Commands::Chat { ref session }) => {
            let manager = build_manager(&config, store, user_id);
            cli::chat::run_chat(manager, session.as_deref()).await
        }
        None => {
            let manager = build_manager(&config, store, user_id);
            cli::chat::run_chat(manager, None).await
        }
    }
}

fn build_manager(config: &Config, store: Arc<store::StoreHandle>, user_id: String) -> SessionManager {
    SessionManager::new(
        store,
        build_provider(config),
        Some(user_id),
        MentorOptions::from_config(&config.mentor),
    )
}
