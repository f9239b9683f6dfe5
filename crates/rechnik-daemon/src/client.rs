//! Client library for communicating with rechnik-daemon
//!
//! Synchronous JSON-line client for IPC with the daemon over its Unix
//! socket, plus PID-file helpers for managing the daemon process.

use crate::protocol::{DaemonStatus, Request, Response};
use anyhow::{Context, Result};
use rechnik_core::VocabularyEntry;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for client requests (30 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Time to wait for graceful shutdown before sending SIGKILL (500ms)
const GRACEFUL_SHUTDOWN_WAIT_MS: u64 = 500;

/// Synchronous client for communicating with the daemon
pub struct Client {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Client {
    /// Create a new client with the given socket path
    pub fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: socket_path.to_path_buf(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create a client with the default socket path
    pub fn with_default_socket() -> Self {
        Self::new(&crate::server::default_socket_path())
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon is running (socket exists and responds)
    pub fn is_daemon_running(&self) -> bool {
        if !self.socket_path.exists() {
            return false;
        }
        self.status().is_ok()
    }

    /// Send a request to the daemon and wait for a response
    pub fn send_request(&self, request: &Request) -> Result<Response> {
        let mut stream =
            UnixStream::connect(&self.socket_path).context("Failed to connect to daemon")?;

        stream
            .set_read_timeout(Some(self.timeout))
            .context("Failed to set read timeout")?;
        stream
            .set_write_timeout(Some(self.timeout))
            .context("Failed to set write timeout")?;

        let request_json = serde_json::to_string(request)?;
        stream.write_all(request_json.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: Response =
            serde_json::from_str(&response_line).context("Failed to parse daemon response")?;

        Ok(response)
    }

    /// Add a word and queue it for background enrichment
    pub fn add_word(
        &self,
        text: &str,
        translation: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        let request = Request::Add {
            text: text.to_string(),
            translation: translation.map(str::to_string),
            notes: notes.map(str::to_string),
        };
        match self.send_request(&request)? {
            Response::Added { id } => Ok(id),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Fetch one entry with its inflections and sentences
    pub fn get_entry(&self, id: i64) -> Result<VocabularyEntry> {
        match self.send_request(&Request::Get { id })? {
            Response::Entry(entry) => Ok(*entry),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Delete an entry
    pub fn delete_entry(&self, id: i64) -> Result<()> {
        match self.send_request(&Request::Delete { id })? {
            Response::Ok => Ok(()),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Re-run enrichment for an entry, optionally with a corrective hint
    pub fn reprocess(&self, id: i64, hint: Option<&str>) -> Result<()> {
        let request = Request::Reprocess {
            id,
            hint: hint.map(str::to_string),
        };
        match self.send_request(&request)? {
            Response::Ok => Ok(()),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Queue example-sentence generation for one entry
    pub fn generate_sentences(&self, id: i64) -> Result<()> {
        match self.send_request(&Request::GenerateSentences { id })? {
            Response::Ok => Ok(()),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Queue sentences for every completed entry missing them.
    /// Returns the number of entries queued.
    pub fn generate_all_sentences(&self) -> Result<usize> {
        match self.send_request(&Request::GenerateAllSentences)? {
            Response::SentencesQueued { count } => Ok(count),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Get daemon status
    pub fn status(&self) -> Result<DaemonStatus> {
        match self.send_request(&Request::Status)? {
            Response::Status(status) => Ok(status),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }

    /// Ask the daemon to shut down gracefully
    pub fn shutdown(&self) -> Result<()> {
        match self.send_request(&Request::Shutdown)? {
            Response::Ok => Ok(()),
            Response::Error(e) => anyhow::bail!("Daemon error: {e}"),
            _ => anyhow::bail!("Unexpected response from daemon"),
        }
    }
}

/// Read the daemon's PID from its PID file, if present
pub fn read_daemon_pid(pid_path: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Stop the daemon: graceful shutdown first, SIGKILL as a last resort
pub fn kill_daemon(socket_path: &Path, pid_path: &Path) -> Result<bool> {
    let client = Client::new(socket_path);
    if client.shutdown().is_ok() {
        std::thread::sleep(Duration::from_millis(GRACEFUL_SHUTDOWN_WAIT_MS));
    }

    let Some(pid) = read_daemon_pid(pid_path) else {
        return Ok(false);
    };

    // Still alive after the graceful attempt?
    let alive = unsafe { libc::kill(pid as i32, 0) } == 0;
    if alive {
        tracing::warn!(pid, "daemon did not stop gracefully, sending SIGKILL");
        unsafe { libc::kill(pid as i32, libc::SIGKILL) };
    }
    std::fs::remove_file(pid_path).ok();
    Ok(true)
}
