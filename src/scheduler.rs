//! Bounded-concurrency generation runs.
//!
//! A run claims every `Idle`/`Error` item at once, then a fixed pool of worker
//! tasks pulls from that list through a shared cursor, so dispatch follows
//! queue order and at most `concurrency` backend calls are in flight.
//!
//! Cancellation is epoch based. Each run records the epoch it started under;
//! `stop` bumps the epoch and reverts every `Generating` item to `Idle` while
//! holding the store lock. Workers commit their result under the same lock and
//! only if their epoch is still current, so a result that arrives after `stop`
//! is dropped instead of overwriting the reverted item. In-flight requests are
//! not aborted; they finish in the background and their output is discarded.

use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioClip, PcmFormat};
use crate::processing::combined_instructions;
use crate::queue::{ItemEvent, QueueItem, QueueStore, StatusKind};
use crate::settings::NarratorSettings;
use crate::synthesis::{GenerationError, SpeechBackend, SpeechRequest};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_STOP_SETTLE: Duration = Duration::from_millis(300);

const ABORTED_MESSAGE: &str = "Generation task aborted unexpectedly";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub format: PcmFormat,
    /// How long `stop` keeps the processing flag raised after cancelling.
    pub stop_settle: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            format: PcmFormat::default(),
            stop_settle: DEFAULT_STOP_SETTLE,
        }
    }
}

impl From<&NarratorSettings> for SchedulerConfig {
    fn from(settings: &NarratorSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            format: settings.pcm_format(),
            stop_settle: settings.stop_settle(),
        }
    }
}

/// How a call to `Scheduler::run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run (or a stop that is still settling) holds the processing flag.
    AlreadyRunning,
    /// No `Idle` or `Error` items were queued.
    NothingToDo,
    Finished { completed: usize, failed: usize },
    /// `stop` was called while the run was active. `abandoned` counts results
    /// that were discarded or never requested.
    Cancelled {
        completed: usize,
        failed: usize,
        abandoned: usize,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    completed: usize,
    failed: usize,
    abandoned: usize,
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.abandoned += other.abandoned;
    }
}

enum ItemOutcome {
    Completed,
    Failed,
    Abandoned,
}

/// State shared by the workers of one run.
struct RunContext {
    store: QueueStore,
    backend: Arc<dyn SpeechBackend>,
    format: PcmFormat,
    epoch: Arc<AtomicU64>,
    run_epoch: u64,
    items: Vec<QueueItem>,
    cursor: AtomicUsize,
}

impl RunContext {
    fn is_current(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) == self.run_epoch
    }

    /// Next item in dispatch order, or `None` once the list is exhausted.
    fn next_item(&self) -> Option<&QueueItem> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.items.get(index)
    }

    fn commit(&self, item: &QueueItem, event: ItemEvent) -> bool {
        self.store.apply_if(item.id(), event, || self.is_current())
    }
}

/// Drives generation for a queue.
pub struct Scheduler {
    store: QueueStore,
    backend: Arc<dyn SpeechBackend>,
    config: SchedulerConfig,
    epoch: Arc<AtomicU64>,
    processing: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(store: QueueStore, backend: Arc<dyn SpeechBackend>, config: SchedulerConfig) -> Self {
        Self {
            store,
            backend,
            config,
            epoch: Arc::new(AtomicU64::new(0)),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Current run epoch. Bumped at the start of every run and by every stop.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Generate audio for every `Idle` and `Error` item.
    ///
    /// Resolves once all workers of this run have exited. A cancelled run
    /// resolves as soon as its in-flight requests return.
    pub async fn run(&self) -> RunOutcome {
        // Taking the flag, bumping the epoch and claiming items happen under
        // the store lock so a concurrent `stop` sees either none or all of it.
        let mut run_epoch = 0;
        let claimed = self.store.claim_pending_if(|| {
            if self
                .processing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return false;
            }
            run_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            true
        });

        let Some(items) = claimed else {
            log::warn!("Scheduler: run requested while already processing");
            return RunOutcome::AlreadyRunning;
        };

        if items.is_empty() {
            log::debug!("Scheduler: nothing to generate");
            self.release(run_epoch);
            return RunOutcome::NothingToDo;
        }

        let workers = self.config.concurrency.max(1).min(items.len());
        log::info!(
            "Scheduler: run {} started ({} items, {} workers)",
            run_epoch,
            items.len(),
            workers
        );

        let ctx = Arc::new(RunContext {
            store: self.store.clone(),
            backend: Arc::clone(&self.backend),
            format: self.config.format,
            epoch: Arc::clone(&self.epoch),
            run_epoch,
            items,
            cursor: AtomicUsize::new(0),
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker| tokio::spawn(run_worker(Arc::clone(&ctx), worker)))
            .collect();

        let mut tally = Tally::default();
        let mut worker_died = false;
        for result in join_all(handles).await {
            match result {
                Ok(worker_tally) => tally += worker_tally,
                Err(e) => {
                    log::error!("Scheduler: worker task failed: {}", e);
                    worker_died = true;
                }
            }
        }

        if !ctx.is_current() {
            // Items never reached count as abandoned too; `stop` reverted them.
            let accounted = tally.completed + tally.failed + tally.abandoned;
            tally.abandoned += ctx.items.len().saturating_sub(accounted);
            log::info!(
                "Scheduler: run {} cancelled ({} completed, {} failed, {} abandoned)",
                run_epoch,
                tally.completed,
                tally.failed,
                tally.abandoned
            );
            return RunOutcome::Cancelled {
                completed: tally.completed,
                failed: tally.failed,
                abandoned: tally.abandoned,
            };
        }

        if worker_died {
            tally.failed += fail_orphans(&ctx);
        }

        self.release(run_epoch);
        log::info!(
            "Scheduler: run {} finished ({} completed, {} failed)",
            run_epoch,
            tally.completed,
            tally.failed
        );
        RunOutcome::Finished {
            completed: tally.completed,
            failed: tally.failed,
        }
    }

    /// Cancel the active run.
    ///
    /// Every `Generating` item goes back to `Idle` immediately. The processing
    /// flag stays raised for the settle delay so a new run cannot start on top
    /// of requests that are still returning. Returns how many items were
    /// reverted, or `None` if nothing was running.
    ///
    /// Only the most recent stop lowers the flag; an earlier stop whose settle
    /// delay ends first leaves it to the later one.
    pub async fn stop(&self) -> Option<usize> {
        let mut stop_epoch = 0;
        let reverted = self.store.revert_generating_if(|| {
            if !self.processing.load(Ordering::SeqCst) {
                return false;
            }
            stop_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            true
        })?;

        log::info!("Scheduler: stopped, {} items reverted to idle", reverted);
        tokio::time::sleep(self.config.stop_settle).await;
        if !self.release(stop_epoch) {
            log::debug!("Scheduler: a newer stop owns the processing flag");
        }
        Some(reverted)
    }

    /// Lower the processing flag, but only if the epoch is still `epoch`.
    ///
    /// Runs and stops bump the epoch under the store lock, so checking it under
    /// the same lock means a stale owner can never clear a newer owner's flag.
    fn release(&self, epoch: u64) -> bool {
        self.store.guarded(|| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            self.processing.store(false, Ordering::SeqCst);
            true
        })
    }
}

async fn run_worker(ctx: Arc<RunContext>, worker: usize) -> Tally {
    let mut tally = Tally::default();
    while ctx.is_current() {
        let Some(item) = ctx.next_item() else {
            break;
        };
        match process_item(&ctx, item).await {
            ItemOutcome::Completed => tally.completed += 1,
            ItemOutcome::Failed => tally.failed += 1,
            ItemOutcome::Abandoned => tally.abandoned += 1,
        }
    }
    log::debug!("Scheduler: worker {} exiting", worker);
    tally
}

async fn process_item(ctx: &RunContext, item: &QueueItem) -> ItemOutcome {
    if !ctx.is_current() {
        return ItemOutcome::Abandoned;
    }
    if !ctx.store.contains(item.id()) {
        log::debug!("Scheduler: {} was removed before dispatch", item.id());
        return ItemOutcome::Abandoned;
    }

    let request = SpeechRequest {
        text: item.text().to_string(),
        voice: item.voice().to_string(),
        instructions: combined_instructions(item.instructions(), item.pace()),
    };

    let result = ctx.backend.generate(&request).await.and_then(|pcm| {
        AudioClip::new(pcm, ctx.format).map_err(|e| GenerationError::InvalidAudio(e.to_string()))
    });

    let (event, outcome) = match result {
        Ok(clip) => (
            ItemEvent::Succeed {
                clip: Arc::new(clip),
            },
            ItemOutcome::Completed,
        ),
        Err(e) => {
            log::warn!("Scheduler: generation failed for {}: {}", item.id(), e);
            (
                ItemEvent::Fail {
                    message: e.to_string(),
                },
                ItemOutcome::Failed,
            )
        }
    };

    if ctx.commit(item, event) {
        outcome
    } else {
        log::debug!("Scheduler: discarding stale result for {}", item.id());
        ItemOutcome::Abandoned
    }
}

/// Fail items of this run that a dead worker left in `Generating`.
fn fail_orphans(ctx: &RunContext) -> usize {
    ctx.items
        .iter()
        .filter(|item| {
            ctx.store
                .get(item.id())
                .is_some_and(|current| current.status().kind() == StatusKind::Generating)
        })
        .filter(|item| {
            ctx.commit(
                item,
                ItemEvent::Fail {
                    message: ABORTED_MESSAGE.to_string(),
                },
            )
        })
        .count()
}
