//! Generic bounded-concurrency dispatch queue.
//!
//! A single scheduler task owns the FIFO backlog (single writer): it accepts
//! submissions over a command channel, caps the backlog by dropping the
//! oldest entry, paces dispatch starts, and runs jobs on spawned tasks up to
//! the concurrency limit. Results come back as events tagged with a dispatch
//! sequence number; a completion that empties the queue emits `Drained`.
//!
//! `stop()` lowers the session-scoped active flag before signalling the
//! scheduler, so results of in-flight jobs that land afterwards emit
//! nothing — the race between a slow network response and the user hitting
//! stop always resolves in favor of stop.

use crate::error::{KaigiError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Queue tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Maximum concurrently in-flight jobs.
    pub concurrency: usize,
    /// Backlog depth; the oldest queued job is dropped beyond this.
    pub backlog_cap: usize,
    /// Minimum spacing between successive dispatch starts.
    pub min_spacing_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            backlog_cap: 6,
            min_spacing_ms: 0,
        }
    }
}

/// Trait for running one job.
#[async_trait]
pub trait JobHandler<J, R>: Send + Sync + 'static {
    async fn run(&self, job: J) -> Result<R>;
}

/// Events emitted by the queue, in completion-arrival order.
#[derive(Debug)]
pub enum QueueEvent<R> {
    /// A job finished. `seq` is the dispatch order, counted from zero.
    Completed { seq: u64, result: R },
    /// A job failed. Failures are isolated; the queue continues.
    Failed { seq: u64, error: KaigiError },
    /// A completion left no backlog and no other in-flight job.
    Drained,
}

enum Command<J> {
    Submit(J),
    Stop,
}

/// Handle to a running dispatch queue.
pub struct DispatchQueue<J> {
    cmd_tx: mpsc::UnboundedSender<Command<J>>,
    active: Arc<AtomicBool>,
    scheduler: Option<JoinHandle<()>>,
}

impl<J: Send + 'static> DispatchQueue<J> {
    /// Spawns a queue with its own active flag.
    pub fn spawn<R, H>(
        config: DispatchConfig,
        handler: Arc<H>,
        events: mpsc::Sender<QueueEvent<R>>,
    ) -> Self
    where
        R: Send + 'static,
        H: JobHandler<J, R>,
    {
        Self::spawn_with_flag(config, handler, events, Arc::new(AtomicBool::new(true)))
    }

    /// Spawns a queue gated by a shared (session-scoped) active flag.
    pub fn spawn_with_flag<R, H>(
        config: DispatchConfig,
        handler: Arc<H>,
        events: mpsc::Sender<QueueEvent<R>>,
        active: Arc<AtomicBool>,
    ) -> Self
    where
        R: Send + 'static,
        H: JobHandler<J, R>,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let scheduler = tokio::spawn(scheduler(config, handler, events, cmd_rx, active.clone()));
        Self {
            cmd_tx,
            active,
            scheduler: Some(scheduler),
        }
    }

    /// Submits a job. Returns false once the queue has been stopped.
    ///
    /// Never blocks: under overload the scheduler drops its oldest backlog
    /// entry instead of making producers wait.
    pub fn submit(&self, job: J) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        self.cmd_tx.send(Command::Submit(job)).is_ok()
    }

    /// Stops the queue: clears the backlog, lets in-flight jobs finish, and
    /// discards their results.
    pub fn stop(&self) {
        // Flag first: anything completing from here on is stale.
        self.active.store(false, Ordering::SeqCst);
        let _ = self.cmd_tx.send(Command::Stop);
    }

    /// True until `stop()` is called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits for the scheduler to wind down. Call after `stop()`.
    pub async fn join(mut self) {
        if let Some(handle) = self.scheduler.take() {
            let _ = handle.await;
        }
    }
}

async fn scheduler<J, R, H>(
    config: DispatchConfig,
    handler: Arc<H>,
    events: mpsc::Sender<QueueEvent<R>>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command<J>>,
    active: Arc<AtomicBool>,
) where
    J: Send + 'static,
    R: Send + 'static,
    H: JobHandler<J, R>,
{
    let concurrency = config.concurrency.max(1);
    let spacing = Duration::from_millis(config.min_spacing_ms);

    let mut backlog: VecDeque<J> = VecDeque::new();
    let mut next_seq: u64 = 0;
    let mut in_flight: usize = 0;
    let mut draining = false;
    let mut cmd_closed = false;
    let mut last_dispatch: Option<Instant> = None;
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, Result<R>)>();

    loop {
        // Dispatch as much backlog as capacity and pacing allow.
        let mut next_due: Option<Instant> = None;
        while !draining && in_flight < concurrency {
            if backlog.is_empty() {
                break;
            }
            if let Some(last) = last_dispatch {
                let due = last + spacing;
                if Instant::now() < due {
                    next_due = Some(due);
                    break;
                }
            }
            let Some(job) = backlog.pop_front() else {
                break;
            };
            let seq = next_seq;
            next_seq += 1;
            last_dispatch = Some(Instant::now());
            in_flight += 1;

            let handler = handler.clone();
            let done = done_tx.clone();
            tokio::spawn(async move {
                let result = handler.run(job).await;
                let _ = done.send((seq, result));
            });
        }

        tokio::select! {
            cmd = cmd_rx.recv(), if !cmd_closed => match cmd {
                Some(Command::Submit(job)) => {
                    if draining {
                        continue;
                    }
                    backlog.push_back(job);
                    while backlog.len() > config.backlog_cap {
                        backlog.pop_front();
                        tracing::debug!("backlog full, dropping oldest job");
                    }
                }
                Some(Command::Stop) => {
                    draining = true;
                    backlog.clear();
                    if in_flight == 0 {
                        break;
                    }
                }
                None => {
                    cmd_closed = true;
                    draining = true;
                    backlog.clear();
                    if in_flight == 0 {
                        break;
                    }
                }
            },
            Some((seq, result)) = done_rx.recv() => {
                in_flight -= 1;
                if active.load(Ordering::SeqCst) {
                    let event = match result {
                        Ok(result) => QueueEvent::Completed { seq, result },
                        Err(error) => QueueEvent::Failed { seq, error },
                    };
                    let _ = events.send(event).await;
                    if backlog.is_empty() && in_flight == 0 {
                        let _ = events.send(QueueEvent::Drained).await;
                    }
                }
                if draining && in_flight == 0 {
                    break;
                }
            },
            _ = async {
                match next_due {
                    Some(due) => tokio::time::sleep_until(due).await,
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }
    }
}
