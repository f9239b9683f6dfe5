//! IPC protocol for daemon communication
//!
//! JSON-line requests and responses over the daemon's Unix socket.

use rechnik_core::breaker::BreakerState;
use rechnik_core::metrics::MetricsSnapshot;
use rechnik_core::VocabularyEntry;
use serde::{Deserialize, Serialize};

/// Request from client to daemon
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    /// Add a new word and queue it for enrichment
    Add {
        text: String,
        translation: Option<String>,
        notes: Option<String>,
    },
    /// Fetch one entry with inflections and sentences
    Get { id: i64 },
    /// Delete an entry
    Delete { id: i64 },
    /// Re-run enrichment, optionally with a corrective hint
    Reprocess { id: i64, hint: Option<String> },
    /// Queue example-sentence generation for one entry
    GenerateSentences { id: i64 },
    /// Queue sentences for every completed entry missing them
    GenerateAllSentences,
    /// Get daemon status
    Status,
    /// Shutdown daemon
    Shutdown,
}

/// Response from daemon to client
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    /// New entry accepted, processing queued
    Added { id: i64 },
    /// One entry
    Entry(Box<VocabularyEntry>),
    /// Number of entries queued for sentence generation
    SentencesQueued { count: usize },
    /// Daemon status
    Status(DaemonStatus),
    /// Success with no data
    Ok,
    /// Error message
    Error(String),
}

/// Daemon status information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub entry_counts: Vec<EntryCount>,
    pub breakers: Vec<BreakerStatus>,
    pub metrics: MetricsSnapshot,
}

/// Entries per processing status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCount {
    pub status: String,
    pub count: u64,
}

/// Current state of one circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: String,
}

impl BreakerStatus {
    pub fn new(name: String, state: BreakerState) -> Self {
        BreakerStatus {
            name,
            state: state.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let req = Request::Add {
            text: "котка".to_string(),
            translation: Some("cat".to_string()),
            notes: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        match back {
            Request::Add { text, translation, notes } => {
                assert_eq!(text, "котка");
                assert_eq!(translation.as_deref(), Some("cat"));
                assert!(notes.is_none());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_error_response_serializes() {
        let resp = Response::Error("entry 7 not found".to_string());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("entry 7 not found"));
    }
}
