use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::{Mutex as StdMutex, RwLock};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Duration;

type ExecutorFuture = Pin<Box<dyn Future<Output = bool> + Send>>;
pub type Executor = Arc<dyn Fn() -> ExecutorFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub completed: u64,
    pub failed: u64,
}

/// Debounced save trigger.
///
/// Each `schedule` restarts the quiet-period timer; the executor runs once the
/// timer elapses with no further `schedule` calls. There is no upper bound on
/// how long a busy caller can postpone the save.
#[derive(Clone)]
pub struct SaveScheduler {
    notify: Arc<Notify>,
    pending: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    executor: Arc<RwLock<Option<Executor>>>,
    running: Arc<Mutex<()>>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    task: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl SaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            pending: Arc::new(AtomicBool::new(false)),
            delay_ms: Arc::new(AtomicU64::new(delay.as_millis() as u64)),
            executor: Arc::new(RwLock::new(None)),
            running: Arc::new(Mutex::new(())),
            completed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            task: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn set_executor(&self, executor: Executor) {
        if let Ok(mut writer) = self.executor.write() {
            *writer = Some(executor);
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::SeqCst))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SaveStats {
        SaveStats {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Marks state dirty and (re)starts the quiet-period timer.
    pub fn schedule(&self) {
        self.pending.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            return;
        }
        let scheduler = self.clone();
        *task = Some(tokio::spawn(async move {
            scheduler.run_loop().await;
        }));
    }

    pub fn shutdown(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    /// Runs a pending save immediately instead of waiting for the timer.
    /// Returns `true` if a save ran and succeeded.
    pub async fn flush(&self) -> bool {
        self.fire().await.unwrap_or(false)
    }

    async fn run_loop(self) {
        loop {
            self.notify.notified().await;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay()) => break,
                    _ = self.notify.notified() => continue,
                }
            }
            if let Some(false) = self.fire().await {
                tracing::warn!("debounced save failed; waiting for the next change");
            }
        }
    }

    async fn fire(&self) -> Option<bool> {
        let _guard = self.running.lock().await;
        if !self.pending.swap(false, Ordering::SeqCst) {
            return None;
        }
        let ok = self.execute().await;
        if ok {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        Some(ok)
    }

    async fn execute(&self) -> bool {
        let executor = match self.executor.read() {
            Ok(reader) => reader.clone(),
            Err(_) => None,
        };
        match executor {
            Some(executor) => executor().await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SaveScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::{advance, Duration, Instant};

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_scheduler(delay_ms: u64) -> (SaveScheduler, Arc<Mutex<Vec<Instant>>>) {
        let scheduler = SaveScheduler::new(Duration::from_millis(delay_ms));
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        scheduler.set_executor(Arc::new(move || {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().expect("sink").push(Instant::now());
                true
            })
        }));
        scheduler.start();
        (scheduler, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_coalesce_into_one_save_after_quiet_period() {
        let (scheduler, fired) = counting_scheduler(2_000);
        let start = Instant::now();
        settle().await;

        scheduler.schedule();
        settle().await;
        advance(Duration::from_millis(500)).await;
        scheduler.schedule();
        settle().await;
        advance(Duration::from_millis(500)).await;
        scheduler.schedule();
        settle().await;

        advance(Duration::from_millis(1_900)).await;
        settle().await;
        assert!(fired.lock().expect("fired").is_empty());

        advance(Duration::from_millis(100)).await;
        settle().await;
        {
            let fired = fired.lock().expect("fired");
            assert_eq!(fired.len(), 1);
            assert_eq!(fired[0] - start, Duration::from_millis(3_000));
        }

        advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.lock().expect("fired").len(), 1);
        assert_eq!(scheduler.stats().completed, 1);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_changes_save_separately() {
        let (scheduler, fired) = counting_scheduler(2_000);
        settle().await;

        scheduler.schedule();
        settle().await;
        advance(Duration::from_millis(2_500)).await;
        settle().await;
        scheduler.schedule();
        settle().await;
        advance(Duration::from_millis(2_500)).await;
        settle().await;

        assert_eq!(fired.lock().expect("fired").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_saves_now_and_cancels_the_timer() {
        let (scheduler, fired) = counting_scheduler(2_000);
        settle().await;

        assert!(!scheduler.flush().await);
        scheduler.schedule();
        settle().await;
        assert!(scheduler.flush().await);
        assert_eq!(fired.lock().expect("fired").len(), 1);

        advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(fired.lock().expect("fired").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_counted_and_not_retried() {
        let scheduler = SaveScheduler::new(Duration::from_millis(100));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        scheduler.set_executor(Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            })
        }));
        scheduler.start();
        settle().await;

        scheduler.schedule();
        settle().await;
        advance(Duration::from_secs(5)).await;
        settle().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().failed, 1);
        assert!(!scheduler.is_pending());
    }
}
