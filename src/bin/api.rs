use short_term_memory::{api::start_server, llm::OpenAiClient, session::Session, MemoryConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = MemoryConfig::from_env()?;
    if config.model.api_key.is_empty() {
        warn!("OPENAI_API_KEY not set; chat requests will fail until it is configured");
    }

    let api_port: u16 = std::env::var("MEMORY_API_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!(
        chat_model = %config.model.chat_model,
        summary_model = %config.model.summary_model,
        threshold = config.threshold,
        "Short-term memory API server"
    );

    let chat = Arc::new(OpenAiClient::from_config(&config.model, &config.model.chat_model)?);
    let summarizer = Arc::new(OpenAiClient::from_config(
        &config.model,
        &config.model.summary_model,
    )?);

    let (session, mut updates) = Session::new(&config, chat, summarizer);
    let (handle, _task) = session.spawn();

    // Nobody renders updates here; surface failures in the log
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if let short_term_memory::SessionUpdate::Error(message) = update {
                warn!("Session error: {}", message);
            }
        }
    });

    start_server(handle, api_port).await?;

    Ok(())
}
