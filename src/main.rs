use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use tablechat::{
    ChannelEmitter, ChatHistory, ChatRouter, Config, Database, TableRegistry, TokenRewriter,
    LOBBY_ROOM,
};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = tablechat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        tablechat::logging::init_console_only(&config.logging.level);
    }

    info!("tablechat starting");

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {}", config.database.path, e);
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(TableRegistry::new(config.chat.table_chat_limit));
    let emitter = Arc::new(ChannelEmitter::new());
    let rewriter = TokenRewriter::from_config(&config.bridge);
    let router = ChatRouter::new(
        registry,
        emitter.clone(),
        db.clone(),
        rewriter.clone(),
        config.chat.clone(),
    );
    let history = ChatHistory::new(db.clone(), emitter, rewriter, &config.chat);

    // The lobby backlog is what every new session gets first
    match history
        .fetch_persisted(LOBBY_ROOM, config.chat.lobby_history_count)
        .await
    {
        Ok(backlog) => info!(messages = backlog.list.len(), "lobby history readable"),
        Err(e) => {
            error!("Failed to read lobby history: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!(
        bridge = config.bridge.enabled,
        table_chat_limit = config.chat.table_chat_limit,
        "chat ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    router
        .broadcast_from_server("The server is shutting down.")
        .await;
    db.close().await;

    ExitCode::SUCCESS
}
