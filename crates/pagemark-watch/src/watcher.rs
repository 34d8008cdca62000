// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folder watcher — one actor per watched folder pair.
//
// The actor owns the watcher's mutable state and at most one poll loop. Its
// `WatcherHandle` sends commands over an mpsc channel and reads the published
// `WatcherStatus` from a watch channel, so status reads never tear and never
// wait on the actor.
//
// Lifecycle: Idle -> Watching -> Processing -> Watching -> ... -> Idle. The
// poll loop waits on an interval raced against a `CancellationToken`; a stop
// interrupts the wait immediately but never an in-flight segmentation.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{PollState, WatcherConfig, WatcherStatus};
use pagemark_document::{DirectoryReport, SegmentJob, Segmenter, SplitOutcome};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::store::PatternStore;

/// Depth of a watcher's command queue.
const COMMAND_QUEUE: usize = 16;

enum Command {
    /// Reply: whether a new poll loop was spawned.
    Start(oneshot::Sender<Result<bool>>),
    Stop(oneshot::Sender<()>),
    SetAutoMode(bool, oneshot::Sender<()>),
    ProcessNow(oneshot::Sender<Result<DirectoryReport>>),
    Shutdown(oneshot::Sender<()>),
}

/// Everything the poll loop and manual passes share.
struct WatchContext {
    config: WatcherConfig,
    segmenter: Segmenter,
    store: Arc<PatternStore>,
    poll_interval: Duration,
    status: watch::Sender<WatcherStatus>,
    /// Held for the duration of each segmentation so that manual passes and
    /// the poll loop never work on the folder at the same time.
    work: AsyncMutex<()>,
}

impl WatchContext {
    fn set_state(&self, state: PollState) {
        self.status.send_modify(|status| status.state = state);
    }

    /// Resolve the pattern for this watcher and segment `input`.
    ///
    /// The pattern is looked up per file so edits to the store apply to the
    /// next document without restarting the watcher.
    fn job(&self, input: PathBuf) -> Result<SegmentJob> {
        let record = self.store.segmentation_record(&self.config.id)?;
        Ok(SegmentJob {
            input,
            output_dir: self.config.output_dir.clone(),
            delete_source: record.delete_source(),
            pattern: record.motif,
        })
    }

    fn segment(&self, input: PathBuf) -> Result<SplitOutcome> {
        let job = self.job(input)?;
        self.segmenter.split(&job)
    }

    fn record_outcome(&self, input: &Path, outcome: std::result::Result<SplitOutcome, String>) {
        self.status.send_modify(|status| {
            status.last_activity = Some(Utc::now());
            match &outcome {
                Ok(_) => status.files_processed += 1,
                Err(message) => {
                    status.files_failed += 1;
                    status.last_error = Some(format!("{}: {message}", input.display()));
                }
            }
        });
    }

    fn fail(&self, err: &PagemarkError) {
        error!(watcher = %self.config.id, error = %err, "watcher stopped");
        self.status.send_modify(|status| {
            status.state = PollState::Idle;
            status.last_error = Some(err.to_string());
            status.last_activity = Some(Utc::now());
        });
    }

    /// Names of the regular files in the input folder.
    fn snapshot(&self) -> Result<BTreeSet<String>> {
        let dir = &self.config.input_dir;
        let entries = fs::read_dir(dir).map_err(|source| PagemarkError::InputDirUnavailable {
            path: dir.clone(),
            source,
        })?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect())
    }
}

struct PollLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// The actor behind a [`WatcherHandle`].
pub struct WatcherDirectory {
    ctx: Arc<WatchContext>,
    auto_mode: bool,
    poll: Option<PollLoop>,
}

impl WatcherDirectory {
    /// Spawn the actor for `config` and return its handle. Must be called
    /// from within a Tokio runtime.
    pub fn spawn(
        config: WatcherConfig,
        segmenter: Segmenter,
        store: Arc<PatternStore>,
        poll_interval: Duration,
    ) -> WatcherHandle {
        let (status_tx, status_rx) = watch::channel(WatcherStatus::idle(config.auto_mode));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);

        let actor = WatcherDirectory {
            auto_mode: config.auto_mode,
            ctx: Arc::new(WatchContext {
                config: config.clone(),
                segmenter,
                store,
                poll_interval,
                status: status_tx,
                work: AsyncMutex::new(()),
            }),
            poll: None,
        };
        tokio::spawn(actor.run(command_rx));

        WatcherHandle {
            config: Arc::new(config),
            commands: command_tx,
            status: status_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start(reply) => {
                    let _ = reply.send(self.start().await);
                }
                Command::Stop(reply) => {
                    self.stop().await;
                    let _ = reply.send(());
                }
                Command::SetAutoMode(enabled, reply) => {
                    self.auto_mode = enabled;
                    self.ctx.status.send_modify(|status| status.auto_mode = enabled);
                    if !enabled {
                        self.stop().await;
                    }
                    let _ = reply.send(());
                }
                Command::ProcessNow(reply) => {
                    let _ = reply.send(self.process_now().await);
                }
                Command::Shutdown(reply) => {
                    self.stop().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }
        // Every handle dropped, or shutdown requested.
        self.stop().await;
        debug!(watcher = %self.ctx.config.id, "watcher actor exited");
    }

    /// Forget a poll loop that ended on its own. A loop only publishes
    /// `Idle` right before returning after a fatal error.
    async fn reap(&mut self) {
        let ended = self.poll.as_ref().is_some_and(|poll| {
            poll.task.is_finished() || self.ctx.status.borrow().state == PollState::Idle
        });
        if ended {
            if let Some(poll) = self.poll.take() {
                let _ = poll.task.await;
            }
        }
    }

    async fn start(&mut self) -> Result<bool> {
        self.reap().await;
        if self.poll.is_some() {
            debug!(watcher = %self.ctx.config.id, "already watching");
            return Ok(false);
        }
        if !self.auto_mode {
            debug!(watcher = %self.ctx.config.id, "auto mode off; not starting");
            return Ok(false);
        }

        // The baseline is taken here so that files created after `start`
        // returns are guaranteed to be seen as new.
        let seen = match self.ctx.snapshot() {
            Ok(seen) => seen,
            Err(e) => {
                self.ctx.fail(&e);
                return Err(e);
            }
        };

        self.ctx.status.send_modify(|status| {
            status.state = PollState::Watching;
            status.loops_started += 1;
            status.last_error = None;
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(Arc::clone(&self.ctx), cancel.clone(), seen));
        self.poll = Some(PollLoop { cancel, task });
        info!(
            watcher = %self.ctx.config.id,
            input = %self.ctx.config.input_dir.display(),
            "watching"
        );
        Ok(true)
    }

    async fn stop(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.cancel.cancel();
            if let Err(e) = poll.task.await {
                error!(watcher = %self.ctx.config.id, error = %e, "poll loop panicked");
            }
            info!(watcher = %self.ctx.config.id, "stopped");
        }
        self.ctx.set_state(PollState::Idle);
    }

    /// One manual pass over every document in the input folder.
    async fn process_now(&mut self) -> Result<DirectoryReport> {
        let ctx = Arc::clone(&self.ctx);
        let _work = ctx.work.lock().await;
        ctx.set_state(PollState::Processing);

        let worker = Arc::clone(&ctx);
        let report = tokio::task::spawn_blocking(move || {
            let input_dir = worker.config.input_dir.clone();
            worker
                .segmenter
                .process_directory(&input_dir, |input| worker.job(input))
        })
        .await
        .map_err(|e| PagemarkError::WatcherUnavailable(format!("{}: {e}", ctx.config.id)))?;

        self.reap().await;
        let idle_state = if self.poll.is_some() {
            PollState::Watching
        } else {
            PollState::Idle
        };
        ctx.status.send_modify(|status| {
            status.state = idle_state;
            status.last_activity = Some(Utc::now());
            if let Ok(report) = &report {
                status.files_processed += report.processed() as u64;
                status.files_failed += report.failed.len() as u64;
                if let Some((path, message)) = report.failed.last() {
                    status.last_error = Some(format!("{}: {message}", path.display()));
                }
            }
        });
        report
    }
}

async fn poll_loop(ctx: Arc<WatchContext>, cancel: CancellationToken, mut seen: BTreeSet<String>) {
    let mut ticker = tokio::time::interval(ctx.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let current = match ctx.snapshot() {
            Ok(current) => current,
            Err(e) => {
                ctx.fail(&e);
                return;
            }
        };

        let fresh: Vec<&String> = current
            .difference(&seen)
            .filter(|name| ctx.segmenter.config().is_document_name(name))
            .collect();

        for name in fresh {
            if cancel.is_cancelled() {
                break;
            }
            let input = ctx.config.input_dir.join(name);
            if !input.exists() {
                debug!(file = %name, "file vanished before processing");
                continue;
            }
            info!(watcher = %ctx.config.id, file = %name, "new document");
            process_file(&ctx, input).await;
        }

        seen = current;
    }
    debug!(watcher = %ctx.config.id, "poll loop exited");
}

async fn process_file(ctx: &Arc<WatchContext>, input: PathBuf) {
    let _work = ctx.work.lock().await;
    ctx.set_state(PollState::Processing);

    let worker = Arc::clone(ctx);
    let job_input = input.clone();
    let outcome = match tokio::task::spawn_blocking(move || worker.segment(job_input)).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => {
            warn!(file = %input.display(), error = %e, "segmentation failed");
            Err(e.to_string())
        }
        Err(e) => {
            error!(file = %input.display(), error = %e, "segmentation task panicked");
            Err(e.to_string())
        }
    };

    ctx.record_outcome(&input, outcome);
    ctx.set_state(PollState::Watching);
}

/// Cloneable control surface of one watcher.
#[derive(Clone)]
pub struct WatcherHandle {
    config: Arc<WatcherConfig>,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<WatcherStatus>,
}

impl WatcherHandle {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Latest published status.
    pub fn status(&self) -> WatcherStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PollState {
        self.status.borrow().state
    }

    /// A receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<WatcherStatus> {
        self.status.clone()
    }

    /// Start polling. A no-op (`Ok(false)`) when already watching or when
    /// auto mode is off; fails when the input folder cannot be read.
    pub async fn start(&self) -> Result<bool> {
        self.request(Command::Start).await?
    }

    /// Stop polling and wait for the loop to exit. An in-flight
    /// segmentation completes first.
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Toggle auto mode; disabling also stops the watcher.
    pub async fn set_auto_mode(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetAutoMode(enabled, reply)).await
    }

    /// Segment every document currently in the input folder.
    pub async fn process_now(&self) -> Result<DirectoryReport> {
        self.request(Command::ProcessNow).await?
    }

    /// Stop the watcher and end its actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let unavailable = || PagemarkError::WatcherUnavailable(self.config.id.clone());
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| unavailable())?;
        reply_rx.await.map_err(|_| unavailable())
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("id", &self.config.id)
            .field("state", &self.state())
            .finish()
    }
}
