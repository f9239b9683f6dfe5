//! Unix socket server for daemon IPC
//!
//! Handles JSON-line requests from clients over Unix domain sockets.
//! Mutating requests commit before any background work is spawned, so
//! a worker can never observe a row its trigger hasn't committed yet.

use crate::config::Config;
use crate::coordinator::{
    queue_all_missing_sentences, spawn_sentence_generation, spawn_word_processing, DaemonState,
};
use crate::protocol::{BreakerStatus, DaemonStatus, EntryCount, Request, Response};
use anyhow::{Context, Result};
use rechnik_core::ollama::OllamaClient;
use rechnik_core::prompts;
use rechnik_core::storage::Db;
use rechnik_core::translate::GoogleTranslator;
use rechnik_core::WordPipeline;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Unix socket server for IPC
pub struct Server {
    listener: UnixListener,
    state: Arc<DaemonState>,
}

impl Server {
    /// Create a new server bound to the given socket path
    pub fn new(socket_path: &Path, db_path: &Path, config: &Config) -> Result<Self> {
        // Remove stale socket file if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
        }

        let listener = UnixListener::bind(socket_path).context("Failed to bind to Unix socket")?;

        // Socket permissions: owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(socket_path, perms)
                .context("Failed to set socket permissions")?;
        }

        tracing::info!("Listening on {:?}", socket_path);

        let db = Db::new(db_path).context("Failed to open database")?;

        let url = config.ollama_url();
        let word_client = OllamaClient::new(
            url.clone(),
            config.word_model_options(),
            prompts::WORD_SYSTEM,
        );
        let sentence_client = OllamaClient::new(
            url,
            config.sentence_model_options(),
            prompts::SENTENCE_SYSTEM,
        );
        tracing::info!(
            word_model = %config.word_model_options().model,
            sentence_model = %config.sentence_model_options().model,
            "model clients configured"
        );

        let pipeline = Arc::new(WordPipeline::new(
            Arc::new(word_client),
            Arc::new(sentence_client),
            &config.pipeline_config(),
        ));

        let state = Arc::new(DaemonState::new(
            db,
            pipeline,
            Arc::new(GoogleTranslator::new()),
        ));

        Ok(Self { listener, state })
    }

    pub fn state(&self) -> &Arc<DaemonState> {
        &self.state
    }

    /// Run the server event loop until a shutdown request arrives.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Server ready, accepting connections");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, state).await {
                                tracing::error!("Client handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                },
                _ = self.state.shutdown.notified() => {
                    tracing::info!("Shutdown requested, leaving accept loop");
                    return Ok(());
                }
            }
        }
    }
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Read one line (JSON request)
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(()); // Client disconnected
    }

    let request: Request = match serde_json::from_str(&line) {
        Ok(req) => req,
        Err(e) => {
            let response = Response::Error(format!("Invalid request: {e}"));
            let response_json = serde_json::to_string(&response)?;
            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            return Ok(());
        }
    };

    let response = handle_request(request, &state).await;

    let response_json = serde_json::to_string(&response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    Ok(())
}

/// Handle a parsed request
pub async fn handle_request(request: Request, state: &Arc<DaemonState>) -> Response {
    match request {
        Request::Add {
            text,
            translation,
            notes,
        } => handle_add(&text, translation.as_deref(), notes.as_deref(), state).await,
        Request::Get { id } => handle_get(id, state).await,
        Request::Delete { id } => handle_delete(id, state).await,
        Request::Reprocess { id, hint } => handle_reprocess(id, hint.as_deref(), state).await,
        Request::GenerateSentences { id } => handle_generate_sentences(id, state).await,
        Request::GenerateAllSentences => match queue_all_missing_sentences(state).await {
            Ok(count) => Response::SentencesQueued { count },
            Err(e) => Response::Error(format!("Failed to queue sentences: {e}")),
        },
        Request::Status => handle_status(state).await,
        Request::Shutdown => {
            tracing::info!("Shutdown requested");
            state.shutdown.notify_one();
            Response::Ok
        }
    }
}

/// Insert the entry, commit, then spawn processing. The spawn must
/// come after the lock is released so the queued row is visible.
async fn handle_add(
    text: &str,
    translation: Option<&str>,
    notes: Option<&str>,
    state: &Arc<DaemonState>,
) -> Response {
    let inserted = {
        let db = state.db.lock().await;
        db.add_entry(text, translation, notes)
    };
    match inserted {
        Ok(id) => {
            spawn_word_processing(state, id);
            Response::Added { id }
        }
        Err(e) => Response::Error(format!("Failed to add entry: {e}")),
    }
}

async fn handle_get(id: i64, state: &DaemonState) -> Response {
    let db = state.db.lock().await;
    match db.get_entry(id) {
        Ok(Some(entry)) => Response::Entry(Box::new(entry)),
        Ok(None) => Response::Error(format!("entry {id} not found")),
        Err(e) => Response::Error(format!("Failed to load entry: {e}")),
    }
}

async fn handle_delete(id: i64, state: &DaemonState) -> Response {
    let db = state.db.lock().await;
    match db.delete_entry(id) {
        Ok(true) => Response::Ok,
        Ok(false) => Response::Error(format!("entry {id} not found")),
        Err(e) => Response::Error(format!("Failed to delete entry: {e}")),
    }
}

async fn handle_reprocess(id: i64, hint: Option<&str>, state: &Arc<DaemonState>) -> Response {
    let reset = {
        let mut db = state.db.lock().await;
        db.reset_for_reprocessing(id, hint)
    };
    match reset {
        Ok(true) => {
            spawn_word_processing(state, id);
            Response::Ok
        }
        Ok(false) => Response::Error(format!("entry {id} not found")),
        Err(e) => Response::Error(format!("Failed to reprocess entry: {e}")),
    }
}

async fn handle_generate_sentences(id: i64, state: &Arc<DaemonState>) -> Response {
    let queued = {
        let mut db = state.db.lock().await;
        db.queue_sentences(id)
    };
    match queued {
        Ok(true) => {
            spawn_sentence_generation(state, id);
            Response::Ok
        }
        Ok(false) => Response::Error(format!("entry {id} not found")),
        Err(e) => Response::Error(format!("Failed to queue sentences: {e}")),
    }
}

async fn handle_status(state: &DaemonState) -> Response {
    let uptime = state.start_time.elapsed().as_secs();

    let counts = {
        let db = state.db.lock().await;
        db.processing_status_counts()
    };
    let entry_counts = match counts {
        Ok(counts) => counts
            .into_iter()
            .map(|(status, count)| EntryCount { status, count })
            .collect(),
        Err(e) => return Response::Error(format!("Failed to read status: {e}")),
    };

    let breakers = state
        .pipeline
        .breaker_states()
        .into_iter()
        .map(|(name, breaker_state)| BreakerStatus::new(name, breaker_state))
        .collect();

    Response::Status(DaemonStatus {
        uptime_secs: uptime,
        entry_counts,
        breakers,
        metrics: state.pipeline.metrics().snapshot(),
    })
}

/// Get the default socket path
pub fn default_socket_path() -> PathBuf {
    // macOS: ~/Library/Application Support/rechnik/daemon.sock
    // Linux: ~/.local/share/rechnik/daemon.sock
    directories::ProjectDirs::from("", "", "rechnik")
        .map(|dirs| dirs.data_dir().join("daemon.sock"))
        .unwrap_or_else(|| PathBuf::from("/tmp/rechnik-daemon.sock"))
}

/// Get the default database path
pub fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "rechnik")
        .map(|dirs| dirs.data_dir().join("vocab.db"))
        .unwrap_or_else(|| PathBuf::from("/tmp/rechnik-vocab.db"))
}

/// Get the default PID file path
pub fn default_pid_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "rechnik")
        .map(|dirs| dirs.data_dir().join("daemon.pid"))
        .unwrap_or_else(|| PathBuf::from("/tmp/rechnik-daemon.pid"))
}
