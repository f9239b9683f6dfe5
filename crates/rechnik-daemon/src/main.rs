//! rechnik-daemon: Background daemon for Bulgarian vocabulary enrichment
//!
//! Provides:
//! - Unix socket server for IPC
//! - Background word enrichment through a local Ollama server
//! - Example-sentence generation with its own model and breaker
//! - Startup recovery of entries stranded by a crash

use anyhow::{Context, Result};
use clap::Parser;
use rechnik_daemon::config::{default_config_path, load_config, Config};
use rechnik_daemon::recovery::recover_stuck_entries;
use rechnik_daemon::{default_db_path, default_pid_path, default_socket_path, Server};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rechnik-daemon")]
#[command(about = "rechnik daemon - background service for vocabulary enrichment")]
#[command(version)]
struct Args {
    /// Run in foreground (don't daemonize)
    #[arg(long)]
    foreground: bool,

    /// Socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// PID file path
    #[arg(long)]
    pid: Option<PathBuf>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "Failed to load config from {}: {}. Using defaults.",
                config_path.display(),
                err
            );
            Config::default()
        }
    };

    let socket_path = args
        .socket
        .or_else(|| config.daemon_socket_path())
        .unwrap_or_else(default_socket_path);
    let db_path = args
        .db
        .or_else(|| config.database_path())
        .unwrap_or_else(default_db_path);
    let pid_path = args.pid.unwrap_or_else(default_pid_path);

    if args.foreground {
        // Run in foreground with logging to stderr
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
        run_daemon(&socket_path, &db_path, &pid_path, &config)
    } else {
        daemonize(&socket_path, &db_path, &pid_path, &config)
    }
}

/// Daemonize the process
fn daemonize(socket_path: &Path, db_path: &Path, pid_path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create PID directory")?;
    }

    // Fork the process
    match unsafe { libc::fork() } {
        -1 => anyhow::bail!("Fork failed"),
        0 => {
            // Child process - continue with daemonization
        }
        _ => {
            // Parent process - exit successfully
            std::process::exit(0);
        }
    }

    // Create new session
    if unsafe { libc::setsid() } == -1 {
        anyhow::bail!("setsid failed");
    }

    // Fork again to prevent terminal reacquisition
    match unsafe { libc::fork() } {
        -1 => anyhow::bail!("Second fork failed"),
        0 => {
            // Grandchild - this is the daemon
        }
        _ => {
            // Child - exit
            std::process::exit(0);
        }
    }

    // Change to root directory to avoid holding mount points
    std::env::set_current_dir("/").ok();

    // Redirect stdio to /dev/null
    let dev_null = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .context("Failed to open /dev/null")?;

    use std::os::unix::io::AsRawFd;
    unsafe {
        libc::dup2(dev_null.as_raw_fd(), libc::STDIN_FILENO);
        libc::dup2(dev_null.as_raw_fd(), libc::STDOUT_FILENO);
        libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO);
    }

    // Log to a file next to the PID file
    let log_dir = pid_path.parent().unwrap_or(Path::new("/tmp"));
    let log_path = log_dir.join("rechnik-daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    run_daemon(socket_path, db_path, pid_path, config)
}

/// Run the daemon (either foreground or after daemonization)
fn run_daemon(socket_path: &Path, db_path: &Path, pid_path: &Path, config: &Config) -> Result<()> {
    let pid = std::process::id();
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::write(pid_path, pid.to_string()).context("Failed to write PID file")?;

    tracing::info!("rechnik-daemon starting (pid: {})", pid);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let result = rt.block_on(async_main(socket_path, db_path, pid_path, config));

    std::fs::remove_file(pid_path).ok();

    result
}

/// Async main function
async fn async_main(
    socket_path: &Path,
    db_path: &Path,
    pid_path: &Path,
    config: &Config,
) -> Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;

    let server = Server::new(socket_path, db_path, config)?;

    // Resubmit anything a previous run left stranded before taking
    // new connections.
    let (words, sentences) = recover_stuck_entries(server.state()).await?;
    if words > 0 || sentences > 0 {
        tracing::info!(words, sentences, "startup recovery resubmitted work");
    }

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, shutting down");
        }
        _ = sighup.recv() => {
            tracing::info!("Received SIGHUP, shutting down");
        }
    }

    // Clean up socket
    std::fs::remove_file(socket_path).ok();
    std::fs::remove_file(pid_path).ok();

    tracing::info!("rechnik-daemon stopped");
    Ok(())
}
