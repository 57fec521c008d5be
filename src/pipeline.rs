//! Wiring: config → running Watcher, Tailer, Hub and Aggregator tasks.
//!
//! ```text
//!   Watcher ──256──► Tailer ──512──► Hub ──1024──► Aggregator
//!                      │              ├──1024──► renderer (run)
//!                 Checkpoint          └──1024──► dashboard sockets
//! ```
//!
//! [`Pipeline::build`] does every fallible step (parser compilation, glob
//! expansion, dashboard bind) before any task starts, so startup errors
//! surface as a plain `Err` with nothing left running.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use loom_core::aggregator::{Aggregator, AggregatorHandle};
use loom_core::checkpoint::Checkpoint;
use loom_core::config::{Config, OutputFormat};
use loom_core::hub::{Hub, HubHandle, Subscription};
use loom_core::parser;
use loom_feeds::{Tailer, Watcher, WatcherHandle};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::output::{JsonRenderer, LevelFilter, Renderer, TextRenderer};

/// A fully constructed, not yet running pipeline.
pub struct Pipeline {
    watcher: Watcher,
    tailer: Tailer,
    hub: Hub,
    aggregator: Aggregator,
    checkpoint: Arc<Checkpoint>,
    dashboard: Option<TcpListener>,
}

/// Handles to the spawned pipeline tasks.
pub struct Running {
    tasks: JoinSet<()>,
}

impl Pipeline {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let pattern = Some(config.parser.pattern.as_str()).filter(|p| !p.is_empty());
        let parser = parser::build(config.parser.format, pattern)
            .context("failed to build parser")?;

        let (watcher, events) =
            Watcher::new(config.watch.patterns.as_slice()).context("failed to create watcher")?;

        let checkpoint = Arc::new(Checkpoint::open(&config.watch.checkpoint));
        let (tailer, lines) = Tailer::new(watcher.handle(), events, Arc::clone(&checkpoint));
        let hub = Hub::new(lines, parser);

        let hub_handle = hub.handle();
        let files = watcher.handle();
        let aggregator = Aggregator::new(
            hub_handle.subscribe(),
            Box::new(move || hub_handle.dropped()),
            Box::new(move || files.len()),
        );

        let dashboard = if config.dashboard.enabled {
            Some(loom_web::bind(&config.dashboard.addr).await?)
        } else {
            None
        };

        Ok(Self {
            watcher,
            tailer,
            hub,
            aggregator,
            checkpoint,
            dashboard,
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        self.watcher.paths()
    }

    pub fn watcher(&self) -> WatcherHandle {
        self.watcher.handle()
    }

    pub fn hub(&self) -> HubHandle {
        self.hub.handle()
    }

    pub fn stats(&self) -> AggregatorHandle {
        self.aggregator.handle()
    }

    pub fn checkpoint(&self) -> Arc<Checkpoint> {
        Arc::clone(&self.checkpoint)
    }

    /// New hub subscription. Take it before [`spawn`](Self::spawn) to see every
    /// record from the first line on.
    pub fn subscribe(&self) -> Subscription {
        self.hub.handle().subscribe()
    }

    /// Start every stage on the current runtime.
    pub fn spawn(self, cancel: &CancellationToken) -> Running {
        let mut tasks = JoinSet::new();

        if let Some(listener) = self.dashboard {
            let state = loom_web::AppState {
                hub: self.hub.handle(),
                stats: self.aggregator.handle(),
            };
            let cancel = cancel.clone();
            tasks.spawn(async move {
                if let Err(e) = loom_web::serve(listener, state, cancel).await {
                    tracing::error!(error = %format!("{e:#}"), "dashboard failed");
                }
            });
        }

        tasks.spawn(self.watcher.run(cancel.clone()));
        tasks.spawn(self.tailer.run(cancel.clone()));
        tasks.spawn(self.hub.run(cancel.clone()));
        tasks.spawn(self.aggregator.run(cancel.clone()));

        Running { tasks }
    }
}

impl Running {
    /// Wait for every stage to stop.
    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "pipeline task failed");
            }
        }
    }
}

/// Run `loom watch` to completion: build, render until the stream ends, then
/// wait for every stage to shut down.
pub async fn run(config: Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let filter =
        LevelFilter::parse(config.output.levels.as_slice()).context("invalid level filter")?;
    let mut renderer: Box<dyn Renderer> = match config.output.format {
        OutputFormat::Text => Box::new(TextRenderer::stdout()),
        OutputFormat::Json => Box::new(JsonRenderer::stdout()),
    };

    let pipeline = Pipeline::build(&config).await?;

    eprintln!("loom watching {} file(s):", pipeline.paths().len());
    for path in pipeline.paths() {
        eprintln!("  • {}", path.display());
    }
    eprintln!();

    let mut entries = pipeline.subscribe();
    let running = pipeline.spawn(&cancel);

    while let Some(entry) = entries.recv().await {
        if !filter.allows(entry.level) {
            continue;
        }
        if let Err(e) = renderer.render(&entry) {
            tracing::warn!(error = %e, "render failed");
        }
    }

    running.wait().await;
    Ok(())
}
