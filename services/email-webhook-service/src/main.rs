use std::sync::Arc;
use std::time::Duration;

use common::{config::ServiceConfig, http_client::HttpClient};
use email_webhook_service::{app, dispatcher::Dispatcher, AppState, SERVICE_NAME};
use tracing::info;

/// How long shutdown waits for queued and in-flight Langflow calls.
const DISPATCH_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from `.env` if present.
    dotenv::dotenv().ok();

    // Langflow URL and endpoint are required; startup stops here without them.
    let config = ServiceConfig::from_env(SERVICE_NAME, 8000)?;

    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    if config.langflow.api_key.is_none() {
        info!("LANGFLOW_API_KEY not set, sending run requests without x-api-key");
    }

    let (dispatcher, worker) = Dispatcher::spawn(HttpClient::new()?);
    let state = AppState {
        config: config.clone(),
        dispatcher: Arc::new(dispatcher),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(
        "Email Webhook Service listening on {}, forwarding to {}",
        config.bind_address(),
        config.langflow.run_url()
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router, and with it the last dispatcher, is gone once serve returns.
    worker.shutdown(DISPATCH_GRACE).await;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
