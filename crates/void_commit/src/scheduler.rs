//! Effect scheduling around commits
//!
//! Lifecycle callbacks must never observe a half-applied patch batch. The
//! patcher brackets every batch with [`EffectScheduler::begin_commit`] and
//! [`EffectScheduler::end_commit`]; effects scheduled in between are queued
//! and run only once the outermost commit closes.
//!
//! ## Ordering
//!
//! - Synchronous effects run high → normal → idle, FIFO within a priority
//! - Async effects are spawned on the ambient tokio runtime after the
//!   synchronous ones; without a runtime they stay queued until
//!   [`EffectScheduler::flush_async`]
//! - A failing or panicking effect is logged and never stops the rest

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Outcome of a single effect
pub type EffectResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Synchronous deferred callback
pub type Effect = Box<dyn FnOnce() -> EffectResult + Send>;

/// Deferred callback producing a future
pub type AsyncEffect = Box<dyn FnOnce() -> BoxFuture<'static, EffectResult> + Send>;

/// Effect priority
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectPriority {
    High = 0,
    #[default]
    Normal = 1,
    Idle = 2,
}

impl EffectPriority {
    /// All priorities in drain order
    pub const ALL: [EffectPriority; 3] = [
        EffectPriority::High,
        EffectPriority::Normal,
        EffectPriority::Idle,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

struct QueuedEffect {
    label: String,
    run: Effect,
}

struct QueuedAsyncEffect {
    label: String,
    run: AsyncEffect,
}

#[derive(Default)]
struct SchedulerState {
    sync_queues: [VecDeque<QueuedEffect>; 3],
    async_queues: [VecDeque<QueuedAsyncEffect>; 3],
    commit_depth: usize,
    executed: u64,
    failed: u64,
    commits: u64,
}

impl SchedulerState {
    fn pop_sync(&mut self) -> Option<QueuedEffect> {
        self.sync_queues.iter_mut().find_map(VecDeque::pop_front)
    }

    fn pop_async(&mut self) -> Option<QueuedAsyncEffect> {
        self.async_queues.iter_mut().find_map(VecDeque::pop_front)
    }

    fn record(&mut self, ok: bool) {
        if ok {
            self.executed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Pending synchronous effects per priority (high, normal, idle)
    pub pending_sync: [usize; 3],
    /// Pending async effects per priority (high, normal, idle)
    pub pending_async: [usize; 3],
    /// Effects that completed successfully
    pub executed: u64,
    /// Effects that returned an error or panicked
    pub failed: u64,
    /// Outermost commits closed
    pub commits: u64,
    /// Current commit nesting
    pub commit_depth: usize,
}

impl SchedulerStats {
    /// Total pending effects
    pub fn pending(&self) -> usize {
        self.pending_sync.iter().sum::<usize>() + self.pending_async.iter().sum::<usize>()
    }
}

/// Priority-queued effect scheduler with commit boundaries.
///
/// Owned per execution context and passed explicitly to the patcher.
#[derive(Default)]
pub struct EffectScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl EffectScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Queue a synchronous effect
    pub fn schedule<F>(&self, label: impl Into<String>, priority: EffectPriority, effect: F)
    where
        F: FnOnce() -> EffectResult + Send + 'static,
    {
        let queued = QueuedEffect {
            label: label.into(),
            run: Box::new(effect),
        };
        self.state.lock().sync_queues[priority.index()].push_back(queued);
    }

    /// Queue an async effect
    pub fn schedule_async<F, Fut>(&self, label: impl Into<String>, priority: EffectPriority, effect: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = EffectResult> + Send + 'static,
    {
        let queued = QueuedAsyncEffect {
            label: label.into(),
            run: Box::new(move || effect().boxed()),
        };
        self.state.lock().async_queues[priority.index()].push_back(queued);
    }

    /// Queue a mount callback
    pub fn on_component_mounted<F>(&self, key: &str, effect: F)
    where
        F: FnOnce() -> EffectResult + Send + 'static,
    {
        self.schedule(format!("mounted:{}", key), EffectPriority::Normal, effect);
    }

    /// Queue an update callback
    pub fn on_component_updated<F>(&self, key: &str, effect: F)
    where
        F: FnOnce() -> EffectResult + Send + 'static,
    {
        self.schedule(format!("updated:{}", key), EffectPriority::Normal, effect);
    }

    /// Queue an unmount callback; runs before mounts and updates
    pub fn on_component_unmounted<F>(&self, key: &str, effect: F)
    where
        F: FnOnce() -> EffectResult + Send + 'static,
    {
        self.schedule(format!("unmounted:{}", key), EffectPriority::High, effect);
    }

    // ========================================================================
    // Commit boundaries
    // ========================================================================

    /// Open a (possibly nested) commit
    pub fn begin_commit(&self) {
        let mut state = self.state.lock();
        state.commit_depth += 1;
        log::trace!("Begin commit (depth {})", state.commit_depth);
    }

    /// Close a commit. When the outermost commit closes, synchronous effects
    /// run and async effects are handed to the ambient runtime.
    ///
    /// Returns the number of synchronous effects run.
    pub fn end_commit(&self) -> usize {
        {
            let mut state = self.state.lock();
            if state.commit_depth == 0 {
                log::warn!("end_commit called without a matching begin_commit");
                return 0;
            }
            state.commit_depth -= 1;
            if state.commit_depth > 0 {
                return 0;
            }
            state.commits += 1;
        }

        let ran = self.flush_sync(None);
        self.spawn_async();
        log::debug!("Commit closed, {} effects run", ran);
        ran
    }

    /// Open a commit closed when the guard drops
    pub fn commit(&self) -> CommitGuard<'_> {
        self.begin_commit();
        CommitGuard { scheduler: self }
    }

    /// Current commit nesting
    pub fn commit_depth(&self) -> usize {
        self.state.lock().commit_depth
    }

    /// True while a commit is open
    pub fn is_committing(&self) -> bool {
        self.commit_depth() > 0
    }

    // ========================================================================
    // Flushing
    // ========================================================================

    /// Run queued synchronous effects in priority order, at most `max_count`.
    ///
    /// Does nothing while a commit is open.
    pub fn flush_sync(&self, max_count: Option<usize>) -> usize {
        let mut ran = 0;
        while max_count.map_or(true, |max| ran < max) {
            let next = {
                let mut state = self.state.lock();
                if state.commit_depth > 0 {
                    log::debug!("Deferring effect flush until the open commit closes");
                    break;
                }
                state.pop_sync()
            };
            let Some(effect) = next else {
                break;
            };
            let ok = run_effect(effect);
            self.state.lock().record(ok);
            ran += 1;
        }
        ran
    }

    /// Await every queued async effect in priority order
    pub async fn flush_async(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.state.lock().pop_async();
            let Some(effect) = next else {
                break;
            };
            let ok = run_async_effect(effect).await;
            self.state.lock().record(ok);
            ran += 1;
        }
        ran
    }

    /// Spawn queued async effects on the current tokio runtime, in order, as
    /// one task. Returns `None` when nothing is queued or no runtime is
    /// available; the effects then stay queued.
    pub fn spawn_async(&self) -> Option<tokio::task::JoinHandle<usize>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let pending = self.pending_async();
                if pending > 0 {
                    log::debug!("No async runtime; {} async effects stay queued", pending);
                }
                return None;
            }
        };

        let batch: Vec<QueuedAsyncEffect> = {
            let mut state = self.state.lock();
            std::iter::from_fn(|| state.pop_async()).collect()
        };
        if batch.is_empty() {
            return None;
        }

        let state = Arc::clone(&self.state);
        Some(handle.spawn(async move {
            let mut ran = 0;
            for effect in batch {
                let ok = run_async_effect(effect).await;
                state.lock().record(ok);
                ran += 1;
            }
            ran
        }))
    }

    /// End-of-frame drain: run synchronous effects and spawn async ones
    pub fn on_frame_end(&self) -> usize {
        let ran = self.flush_sync(None);
        self.spawn_async();
        ran
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Pending synchronous effects
    pub fn pending_sync(&self) -> usize {
        self.state.lock().sync_queues.iter().map(VecDeque::len).sum()
    }

    /// Pending async effects
    pub fn pending_async(&self) -> usize {
        self.state.lock().async_queues.iter().map(VecDeque::len).sum()
    }

    /// Get statistics
    pub fn stats(&self) -> SchedulerStats {
        let state = self.state.lock();
        let mut stats = SchedulerStats {
            executed: state.executed,
            failed: state.failed,
            commits: state.commits,
            commit_depth: state.commit_depth,
            ..Default::default()
        };
        for priority in EffectPriority::ALL {
            let i = priority.index();
            stats.pending_sync[i] = state.sync_queues[i].len();
            stats.pending_async[i] = state.async_queues[i].len();
        }
        stats
    }

    /// Drop every queued effect without running it
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let mut dropped = 0;
        for queue in state.sync_queues.iter_mut() {
            dropped += queue.len();
            queue.clear();
        }
        for queue in state.async_queues.iter_mut() {
            dropped += queue.len();
            queue.clear();
        }
        dropped
    }
}

/// Closes a commit on drop
pub struct CommitGuard<'a> {
    scheduler: &'a EffectScheduler,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.end_commit();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_effect(effect: QueuedEffect) -> bool {
    let QueuedEffect { label, run } = effect;
    log::trace!("Running effect '{}'", label);
    match std::panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log::error!("Effect '{}' failed: {}", label, err);
            false
        }
        Err(payload) => {
            log::error!("Effect '{}' panicked: {}", label, panic_message(payload.as_ref()));
            false
        }
    }
}

async fn run_async_effect(effect: QueuedAsyncEffect) -> bool {
    let QueuedAsyncEffect { label, run } = effect;
    log::trace!("Running async effect '{}'", label);
    let future = match std::panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(future) => future,
        Err(payload) => {
            log::error!("Async effect '{}' panicked: {}", label, panic_message(payload.as_ref()));
            return false;
        }
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log::error!("Async effect '{}' failed: {}", label, err);
            false
        }
        Err(payload) => {
            log::error!("Async effect '{}' panicked: {}", label, panic_message(payload.as_ref()));
            false
        }
    }
}
