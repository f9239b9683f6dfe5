//! rechnik-daemon: Library for the vocabulary enrichment daemon
//!
//! This crate provides:
//! - Unix socket server for IPC
//! - Client library for communicating with the daemon
//! - Protocol types for client-daemon communication
//! - Background coordinators for word enrichment and sentences
//! - Startup recovery of stranded entries

pub mod client;
pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod recovery;
pub mod server;

// Re-exports for convenience
pub use client::{kill_daemon, read_daemon_pid, Client};
pub use coordinator::DaemonState;
pub use protocol::{BreakerStatus, DaemonStatus, EntryCount, Request, Response};
pub use server::{default_db_path, default_pid_path, default_socket_path, Server};
