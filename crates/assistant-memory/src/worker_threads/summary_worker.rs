//! Summary worker implementation
//!
//! Condenses the most recent window of messages into a stored summary. At
//! most one pass runs at a time; a trigger while a pass is in flight is
//! dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::memory_db::{MemoryDatabase, SummaryRecord};
use crate::metrics;
use crate::summarization::Summarize;

pub const DEFAULT_WINDOW: usize = 100;

#[derive(Debug, Clone)]
pub enum PassOutcome {
    Created(SummaryRecord),
    /// No messages stored yet; nothing was written.
    Empty,
}

/// Completion signal sent after every pass.
#[derive(Debug, Clone)]
pub enum SummaryEvent {
    Created(SummaryRecord),
    Empty,
    Failed(String),
}

/// Holds the Running state; dropping it returns the worker to Idle, even if
/// the pass panicked.
pub struct RunningGuard {
    state: Arc<AtomicBool>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.state.store(false, Ordering::Release);
    }
}

pub struct Summarizer {
    database: Arc<MemoryDatabase>,
    summarizer: Arc<dyn Summarize>,
    window: usize,
    running: Arc<AtomicBool>,
    events: Option<mpsc::UnboundedSender<SummaryEvent>>,
}

impl Summarizer {
    pub fn new(database: Arc<MemoryDatabase>, summarizer: Arc<dyn Summarize>, window: usize) -> Self {
        Self {
            database,
            summarizer,
            window: window.max(1),
            running: Arc::new(AtomicBool::new(false)),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SummaryEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Idle -> Running, or `None` if a pass already holds the state.
    pub fn try_start(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard {
                state: Arc::clone(&self.running),
            })
    }

    /// Starts a pass on the runtime. Returns `None`, without side effects,
    /// while another pass is running.
    pub fn trigger(&self) -> Option<JoinHandle<Result<PassOutcome>>> {
        let guard = match self.try_start() {
            Some(guard) => guard,
            None => {
                debug!("Summarization pass already running, trigger ignored");
                return None;
            }
        };

        let database = Arc::clone(&self.database);
        let summarizer = Arc::clone(&self.summarizer);
        let events = self.events.clone();
        let window = self.window;

        Some(tokio::spawn(async move {
            let _guard = guard;
            let result = run_pass(&database, summarizer.as_ref(), window).await;
            report(&result, events.as_ref());
            result
        }))
    }

    /// Ticks every `period` until `shutdown` turns true. The first tick is
    /// skipped and missed ticks are delayed rather than bunched.
    pub fn spawn_periodic(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            info!("Periodic summarizer started (every {:?})", period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.trigger().is_none() {
                            debug!("Tick skipped, previous pass still running");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Periodic summarizer stopped");
        })
    }
}

async fn run_pass(database: &MemoryDatabase, summarizer: &dyn Summarize, window: usize) -> Result<PassOutcome> {
    let mut recent = database.scoped().await?.recent_messages(window)?;
    if recent.is_empty() {
        info!("No messages to summarize");
        return Ok(PassOutcome::Empty);
    }
    // stored newest first; summarize in chronological order
    recent.reverse();

    let start_time = recent[0].timestamp;
    let end_time = recent[recent.len() - 1].timestamp;
    let text = recent
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    debug!("Summarizing {} messages ({} .. {})", recent.len(), start_time, end_time);

    // no connection is held while the summarizer runs
    let summary = summarizer.summarize(&text).await?;
    let mut store = database.scoped().await?;
    let record = store.add_summary(&summary, start_time, end_time).await?;
    Ok(PassOutcome::Created(record))
}

fn report(result: &Result<PassOutcome>, events: Option<&mpsc::UnboundedSender<SummaryEvent>>) {
    let event = match result {
        Ok(PassOutcome::Created(record)) => {
            metrics::inc_summary_pass("created");
            info!("Summary {} created", record.id);
            SummaryEvent::Created(record.clone())
        }
        Ok(PassOutcome::Empty) => {
            metrics::inc_summary_pass("empty");
            SummaryEvent::Empty
        }
        Err(e) => {
            metrics::inc_summary_pass("failed");
            error!("Summarization pass failed: {}", e);
            SummaryEvent::Failed(e.to_string())
        }
    };
    if let Some(events) = events {
        // receiver gone means nobody is listening; the pass itself succeeded
        let _ = events.send(event);
    }
}
