use chrono::Local;
use short_term_memory::{
    llm::OpenAiClient,
    session::{Session, SessionUpdate},
    MemoryConfig,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_update(update: &SessionUpdate) {
    let now = Local::now().format("%H:%M:%S");

    match update {
        SessionUpdate::Turn {
            speaker,
            content,
            timestamp,
        } => {
            let at = timestamp.with_timezone(&Local).format("%H:%M:%S");
            println!("[{}] {}: {}\n", at, speaker.label(), content);
        }
        SessionUpdate::RequestTokens(tokens) => println!("Request tokens: ~{}\n", tokens),
        SessionUpdate::SummaryTokens(tokens) => println!("Summary tokens: ~{}\n", tokens),
        SessionUpdate::SummaryChanged(summary) => {
            println!("=== Summary ===\n{}", summary.format_for_display());
        }
        SessionUpdate::SummaryRetained => println!("[{}] Summary unchanged\n", now),
        SessionUpdate::Error(message) => println!("[{}] Error: {}\n", now, message),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr, the transcript to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = MemoryConfig::from_env()?;
    let chat = Arc::new(OpenAiClient::from_config(&config.model, &config.model.chat_model)?);
    let summarizer = Arc::new(OpenAiClient::from_config(
        &config.model,
        &config.model.summary_model,
    )?);

    let (session, mut updates) = Session::new(&config, chat, summarizer);
    let (handle, task) = session.spawn();
    info!("Interactive session ready");

    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            print_update(&update);
        }
    });

    println!("[{}] LLM: Type to start chat", Local::now().format("%H:%M:%S"));
    println!("Commands: /summary | /records | /quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/summary" => println!("{}", handle.summary().await?.format_for_display()),
            "/records" => {
                for turn in handle.records().await? {
                    println!(
                        "#{} [{}] {}: {}",
                        turn.sequence_id,
                        turn.timestamp.with_timezone(&Local).format("%H:%M:%S"),
                        turn.speaker.label(),
                        turn.content
                    );
                }
                println!();
            }
            _ => handle.submit_detached(input).await?,
        }
    }

    handle.shutdown().await?;
    task.await?;
    printer.abort();

    Ok(())
}
