use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;
use tracing::{error, info, warn};

use bridge_common::{log_escape, thread_name};
use bridge_process::{spawn_process, wait_process};

mod config;
mod echo;
mod relay;

use config::LauncherConfig;

/// Bridge launcher: spawn a program with a private duplex channel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Spawn a command and relay stdin/stdout over its channel
    Run {
        /// Configuration file path (YAML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Command template; `{fd}` is replaced by the child's channel descriptor
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Echo everything received on an inherited channel back to the sender
    Echo {
        /// Inherited channel descriptor number
        #[arg(long)]
        fd: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.action {
        Action::Run { config, command } => {
            let config = load_config(config, command)?;
            initialize_logging(&config.log_level, args.debug)?;
            let code = run(config)?;
            std::process::exit(code);
        }
        Action::Echo { fd } => {
            initialize_logging("info", args.debug)?;
            echo::run_echo(&fd)?;
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>, command: Vec<String>) -> Result<LauncherConfig> {
    let mut config = match (path, command.is_empty()) {
        (Some(path), true) => return LauncherConfig::load_from_file(&path),
        (Some(path), false) => LauncherConfig::read_from_file(&path)?,
        (None, _) => LauncherConfig::from_command(Vec::new()),
    };

    // Command line overrides the file
    config.command = command;
    config.validate().context("Invalid launcher configuration")?;
    Ok(config)
}

/// Logs go to stderr; stdout carries the relayed channel data.
fn initialize_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug { "debug".to_string() } else { level.to_lowercase() };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn run(config: LauncherConfig) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let label = config.exe_name.clone();
    let result = runtime.block_on(async move {
        info!(
            "[{}] Launching: {}",
            thread_name(label.as_deref()),
            log_escape(config.command.iter().map(|a| a.as_bytes()))
        );

        let spawned = spawn_process(|fd| config.render_command(fd))?;
        let pid = spawned.pid.as_raw();
        info!("Child started with pid {}", pid);

        let waiter = tokio::task::spawn_blocking(move || wait_process(spawned.pid));

        match relay::relay_stdio(spawned.channel).await {
            Ok(stats) => info!(
                "Channel closed: {} bytes to child, {} bytes from child",
                stats.to_child, stats.from_child
            ),
            Err(e) => warn!("Relay failed: {:#}", e),
        }

        let status = waiter.await.context("Wait task failed")??;
        info!("Child {} exited: {}", pid, status);
        if !status.success() {
            error!("Child {} did not exit cleanly: {}", pid, status);
        }
        Ok::<i32, anyhow::Error>(exit_code(status))
    });

    // The stdin reader may still be blocked in a read; don't wait for it.
    runtime.shutdown_background();
    result
}

/// Shell-style exit code: the child's code, or 128 + signal number.
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
