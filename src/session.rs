//! Conversation session
//!
//! A [`Session`] is the single owner of the record store and the summary.
//! It runs as one task; model calls are spawned as independent tasks whose
//! results come back over a channel and are applied on the session task.
//! Front ends talk to it through a cloneable [`SessionHandle`] and observe
//! it through a stream of [`SessionUpdate`]s.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::MemoryError;
use crate::llm::{estimate_request_tokens, ChatModel};
use crate::memory::{
    Comparer, ContextAssembler, ConversationTurn, RecordStore, RefreshStatus, Speaker,
    SummaryRefresh, SummaryState, SummaryUpdater,
};
use crate::Result;

const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<T>;

/// Requests accepted by the session task
#[derive(Debug)]
pub enum SessionCommand {
    /// A new user message; the reply carries the assistant answer
    Submit {
        input: String,
        reply: Option<Reply<Result<String>>>,
    },
    Summary {
        reply: Reply<SummaryState>,
    },
    Records {
        reply: Reply<Vec<ConversationTurn>>,
    },
    Shutdown,
}

/// What a front end needs to render
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// A turn was appended to the store
    Turn {
        speaker: Speaker,
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Estimated size of an outgoing chat request
    RequestTokens(usize),
    /// Estimated size of an outgoing summary request
    SummaryTokens(usize),
    /// A new summary was installed
    SummaryChanged(SummaryState),
    /// The summarizer answered with something unusable; the summary is unchanged
    SummaryRetained,
    /// A collaborator failed; nothing was recorded
    Error(String),
}

/// Results of background work, applied on the session task
enum SessionEvent {
    ChatFinished {
        input: String,
        result: Result<String>,
        reply: Option<Reply<Result<String>>>,
    },
    SummaryFinished {
        generation: u64,
        refresh: SummaryRefresh,
    },
}

/// Owns all conversation state for one session
pub struct Session {
    comparer: Comparer,
    summary: SummaryState,
    /// Generation stamped on the most recently dispatched refresh
    dispatched_generation: u64,
    /// Generation of the refresh that produced `summary`
    installed_generation: u64,
    assembler: ContextAssembler,
    updater: Arc<SummaryUpdater>,
    chat: Arc<dyn ChatModel>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    /// Create a session and the receiver for its updates
    pub fn new(
        config: &MemoryConfig,
        chat: Arc<dyn ChatModel>,
        summarizer: Arc<dyn ChatModel>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = Self {
            comparer: Comparer::with_store(
                RecordStore::with_capacity_limit(config.max_records),
                config.threshold,
            ),
            summary: SummaryState::default(),
            dispatched_generation: 0,
            installed_generation: 0,
            assembler: ContextAssembler::new(
                config.conversation_instructions.clone(),
                config.max_relevant,
            ),
            updater: Arc::new(SummaryUpdater::new(
                summarizer,
                config.summary_instructions.clone(),
            )),
            chat,
            updates,
            events_tx,
            events_rx,
        };

        (session, updates_rx)
    }

    /// Run the session on its own task
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(self.run(commands_rx));

        (SessionHandle { commands: commands_tx }, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!("Conversation session started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }

        info!(turns = self.comparer.store().len(), "Conversation session stopped");
    }

    fn emit(&self, update: SessionUpdate) {
        // a front end that stopped listening is not an error
        let _ = self.updates.send(update);
    }

    fn record(&mut self, speaker: Speaker, content: &str) {
        let turn = self.comparer.add_record(speaker, content);
        let update = SessionUpdate::Turn {
            speaker: turn.speaker,
            content: turn.content.clone(),
            timestamp: turn.timestamp,
        };
        self.emit(update);
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit { input, reply } => self.submit(input, reply),
            SessionCommand::Summary { reply } => {
                let _ = reply.send(self.summary.clone());
            }
            SessionCommand::Records { reply } => {
                let _ = reply.send(self.comparer.store().all_records().cloned().collect());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn submit(&mut self, input: String, reply: Option<Reply<Result<String>>>) {
        let input = input.trim().to_string();
        if input.is_empty() {
            if let Some(reply) = reply {
                let _ = reply.send(Err(MemoryError::InvalidInput(
                    "Message is empty".to_string(),
                )));
            }
            return;
        }

        self.record(Speaker::User, &input);

        let context = self.assembler.build(&self.summary, &self.comparer, &input);
        info!(
            relevant = context.relevant_count,
            tokens = context.token_estimate,
            "Dispatching chat request"
        );
        self.emit(SessionUpdate::RequestTokens(context.token_estimate));

        let chat = Arc::clone(&self.chat);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = chat.ask(&context.messages).await;
            let _ = events.send(SessionEvent::ChatFinished {
                input,
                result,
                reply,
            });
        });
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ChatFinished {
                input,
                result,
                reply,
            } => self.finish_chat(input, result, reply),
            SessionEvent::SummaryFinished {
                generation,
                refresh,
            } => self.finish_summary(generation, refresh),
        }
    }

    fn finish_chat(
        &mut self,
        input: String,
        result: Result<String>,
        reply: Option<Reply<Result<String>>>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.emit(SessionUpdate::Error(e.to_string()));
                if let Some(reply) = reply {
                    let _ = reply.send(Err(e));
                }
                return;
            }
        };

        self.record(Speaker::Assistant, &response);
        if let Some(reply) = reply {
            let _ = reply.send(Ok(response.clone()));
        }

        let snapshot = self.summary.clone();
        let updater = Arc::clone(&self.updater);
        let tokens = estimate_request_tokens(&updater.build_messages(&snapshot, &input, &response));
        self.emit(SessionUpdate::SummaryTokens(tokens));

        self.dispatched_generation += 1;
        let generation = self.dispatched_generation;

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let refresh = updater.refresh(&snapshot, &input, &response).await;
            let _ = events.send(SessionEvent::SummaryFinished {
                generation,
                refresh,
            });
        });
    }

    fn finish_summary(&mut self, generation: u64, refresh: SummaryRefresh) {
        match refresh.status {
            RefreshStatus::Updated if generation < self.installed_generation => {
                debug!(
                    generation,
                    installed = self.installed_generation,
                    "Discarding summary from an older exchange"
                );
            }
            RefreshStatus::Updated => {
                self.installed_generation = generation;
                self.summary = refresh.summary;
                self.emit(SessionUpdate::SummaryChanged(self.summary.clone()));
            }
            RefreshStatus::Malformed => {
                debug!("Summarizer reply discarded, summary retained");
                self.emit(SessionUpdate::SummaryRetained);
            }
            RefreshStatus::Failed(e) => {
                self.emit(SessionUpdate::Error(e.to_string()));
            }
        }
    }
}

/// Cloneable front-end handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MemoryError::SessionClosed("session task is not running".to_string()))
    }

    async fn receive<T>(rx: oneshot::Receiver<T>) -> Result<T> {
        rx.await
            .map_err(|_| MemoryError::SessionClosed("session dropped the request".to_string()))
    }

    /// Send a message and wait for the assistant answer
    pub async fn submit(&self, input: impl Into<String>) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Submit {
            input: input.into(),
            reply: Some(tx),
        })
        .await?;

        Self::receive(rx).await?
    }

    /// Send a message without waiting; the answer arrives as an update
    pub async fn submit_detached(&self, input: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::Submit {
            input: input.into(),
            reply: None,
        })
        .await
    }

    pub async fn summary(&self) -> Result<SummaryState> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Summary { reply: tx }).await?;
        Self::receive(rx).await
    }

    pub async fn records(&self) -> Result<Vec<ConversationTurn>> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Records { reply: tx }).await?;
        Self::receive(rx).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }
}
