use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use loom_core::config::{Config, OutputFormat};
use loom_core::parser::ParserFormat;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loom", version, about = "Loom — real-time log tailing with a live dashboard")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/loom/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write debug logs to /tmp/loom-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    debug: bool,

    /// Log pipeline activity to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch log files (or glob patterns) and stream new lines as they land.
    ///
    /// Examples:
    ///   loom watch /var/log/app.log
    ///   loom watch "/var/log/**/*.log" -l warn,error
    ///   loom watch app.log -o json
    ///   loom watch app.log -f regex -p '^(?P<timestamp>\S+) (?P<level>\w+) (?P<message>.+)$'
    #[command(verbatim_doc_comment)]
    Watch(WatchArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Files or glob patterns (quote globs so the shell leaves `**` alone).
    patterns: Vec<String>,

    /// Output format: text or json.
    #[arg(short, long)]
    output: Option<OutputFormat>,

    /// Only show these levels (comma-separated: info,warn,error).
    #[arg(short, long, value_delimiter = ',')]
    level: Vec<String>,

    /// Line format: auto, json, clf or regex.
    #[arg(short, long)]
    format: Option<ParserFormat>,

    /// Named-capture regex for `--format regex`.
    #[arg(short, long)]
    pattern: Option<String>,

    /// Checkpoint file used to resume after a restart.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Serve the live dashboard on this address (e.g. 127.0.0.1:8080).
    #[arg(long, value_name = "ADDR")]
    dashboard: Option<String>,
}

impl WatchArgs {
    /// Flags take precedence over every config layer.
    fn apply(self, config: &mut Config) {
        if !self.patterns.is_empty() {
            config.watch.patterns = self.patterns;
        }
        if let Some(checkpoint) = self.checkpoint {
            config.watch.checkpoint = checkpoint;
        }
        if let Some(format) = self.format {
            config.parser.format = format;
        }
        if let Some(pattern) = self.pattern {
            config.parser.pattern = pattern;
        }
        if let Some(output) = self.output {
            config.output.format = output;
        }
        if !self.level.is_empty() {
            config.output.levels = self.level;
        }
        if let Some(addr) = self.dashboard {
            config.dashboard.enabled = true;
            config.dashboard.addr = addr;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Watch(args) => {
            args.apply(&mut config);
            anyhow::ensure!(
                !config.watch.patterns.is_empty(),
                "nothing to watch: pass file patterns or set [watch] patterns in the config"
            );

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_signal(cancel.clone()));
            loom::pipeline::run(config, cancel).await
        }
    }
}

fn init_tracing(debug: bool, verbose: bool) -> anyhow::Result<()> {
    let default = match (debug, verbose) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/loom-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
        tracing::info!("loom debug log started — tail -f /tmp/loom-debug.log");
    } else {
        // stdout carries records; diagnostics stay on stderr.
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    eprintln!("\nloom shutting down...");
    cancel.cancel();
}
