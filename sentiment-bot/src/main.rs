use sentiment_bot::{
    BotConfig, BotError, ChatServer, CommandHandler, RecurringJobScheduler, SessionRegistry,
    SubscriptionStore, TokioTimer,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    if let Err(error) = run().await {
        error!(%error, "sentiment-bot failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BotError> {
    let config = BotConfig::from_env();
    info!(?config, "starting sentiment-bot");

    let analyzer = Arc::new(config.sentiment.build_pipeline()?);
    let store = Arc::new(SubscriptionStore::load(&config.data_file));
    let sessions = Arc::new(SessionRegistry::default());
    let scheduler = Arc::new(RecurringJobScheduler::new(
        Arc::new(TokioTimer),
        analyzer.clone(),
        sessions.clone(),
    ));
    let handler = CommandHandler::new(
        analyzer,
        store,
        scheduler.clone(),
        config.sentiment.whale_threshold,
    );
    let server = ChatServer::new(handler, sessions);

    info!("Clients can connect on ws://{}", config.ws_addr);

    let outcome = tokio::select! {
        outcome = server.run(config.ws_addr) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            Ok(())
        }
    };

    scheduler.stop_all();
    outcome
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
