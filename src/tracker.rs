use crate::errors::{AppError, AppResult};
use crate::gateway::SnapshotGateway;
use crate::models::{AppSettings, Event, EventKind, Link, SnapshotPayload, TrackerView};
use crate::registration::{CommitOutcome, RegistrationFlow, RegistrationState};
use crate::scheduler::{SaveScheduler, SaveStats};
use crate::stability::StabilityScore;
use crate::store::StateStore;
use crate::vocabulary::Vocabulary;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Duration;

/// Entry point for a presentation layer: owns the store, the pending
/// registration and the debounced save, and talks to an injected gateway.
pub struct TrackerCore {
    gateway: Arc<dyn SnapshotGateway>,
    store: Mutex<StateStore>,
    registration: Mutex<RegistrationFlow>,
    scheduler: SaveScheduler,
    settings: Mutex<AppSettings>,
    bootstrapped: AtomicBool,
}

impl TrackerCore {
    pub fn new(gateway: Arc<dyn SnapshotGateway>, settings: AppSettings) -> Arc<Self> {
        let scheduler = SaveScheduler::new(Duration::from_millis(settings.autosave_delay_ms));

        let this = Arc::new(Self {
            gateway,
            store: Mutex::new(StateStore::new(settings.strict_vocabulary)),
            registration: Mutex::new(RegistrationFlow::new()),
            scheduler: scheduler.clone(),
            settings: Mutex::new(settings),
            bootstrapped: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&this);
        scheduler.set_executor(Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(strong) = weak.upgrade() {
                    strong.save_current().await
                } else {
                    true
                }
            })
        }));

        this
    }

    /// Starts the background save task. Needs a running tokio runtime.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Loads the latest snapshot and opens the loaded gate. A gateway failure
    /// is logged and treated as "no snapshot". Returns whether one was found.
    pub async fn bootstrap(&self) -> bool {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            tracing::debug!("tracker already bootstrapped");
            return false;
        }

        let snapshot = match self.gateway.load_latest_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(error = %error, "failed to load latest snapshot; starting empty");
                None
            }
        };

        let found = snapshot.is_some();
        match self.store.lock() {
            Ok(mut store) => {
                store.initialize(snapshot.as_ref());
                tracing::info!(
                    found,
                    links = store.links().len(),
                    stability = store.stability_score().value(),
                    "tracker state loaded"
                );
            }
            Err(_) => tracing::error!("state store mutex poisoned during bootstrap"),
        }
        found
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_store().map(|store| store.is_loaded()).unwrap_or(false)
    }

    pub fn add_link(&self, name: &str) -> AppResult<usize> {
        let index = self.mutate(|store| store.add_link(name))?;
        tracing::info!(index, "link added");
        Ok(index)
    }

    /// Irreversibly deletes a link with its whole history. Callers confirm first.
    pub fn remove_link(&self, index: usize) -> AppResult<Link> {
        let removed = self.mutate(|store| store.remove_link(index))?;
        if let Ok(mut registration) = self.registration.lock() {
            registration.cancel();
        }
        tracing::info!(index, events = removed.history().len(), "link removed");
        Ok(removed)
    }

    pub fn log_event(&self, index: usize, kind: EventKind, emotion: &str, habit: &str) -> AppResult<Event> {
        let event = self.mutate(|store| store.log_event(index, kind, emotion, habit))?;
        tracing::info!(index, kind = %kind, "event logged");
        Ok(event)
    }

    pub fn open_registration(&self, index: usize, kind: EventKind) -> AppResult<&'static Vocabulary> {
        if self.lock_store()?.link(index).is_none() {
            return Err(AppError::ValidationRejected(format!("no link at index {index}")));
        }
        let mut registration = self.lock_registration()?;
        registration.open(index, kind);
        registration
            .options()
            .ok_or_else(|| AppError::Internal("registration did not open".to_string()))
    }

    pub fn choose_emotion(&self, label: &str) -> AppResult<()> {
        self.lock_registration()?.choose_emotion(label)
    }

    pub fn choose_habit(&self, label: &str) -> AppResult<()> {
        self.lock_registration()?.choose_habit(label)
    }

    pub fn can_commit_registration(&self) -> bool {
        self.lock_registration()
            .map(|registration| registration.can_commit())
            .unwrap_or(false)
    }

    pub fn commit_registration(&self) -> AppResult<CommitOutcome> {
        let (outcome, changed, save_eligible) = {
            let mut registration = self.lock_registration()?;
            let mut store = self.lock_store()?;
            let before = store.revision();
            let outcome = registration.commit(&mut *store)?;
            (outcome, store.revision() != before, store.is_loaded())
        };
        if let CommitOutcome::Committed(event) = &outcome {
            tracing::info!(kind = %event.kind(), "registration committed");
        }
        if changed {
            self.after_mutation(save_eligible);
        }
        Ok(outcome)
    }

    pub fn cancel_registration(&self) -> bool {
        self.lock_registration()
            .map(|mut registration| registration.cancel())
            .unwrap_or(false)
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.lock_registration()
            .map(|registration| registration.state().clone())
            .unwrap_or(RegistrationState::Idle)
    }

    pub fn stability_score(&self) -> StabilityScore {
        self.lock_store()
            .map(|store| store.stability_score())
            .unwrap_or_default()
    }

    pub fn link(&self, index: usize) -> Option<Link> {
        self.lock_store().ok()?.link(index).cloned()
    }

    pub fn links(&self) -> Vec<Link> {
        self.lock_store()
            .map(|store| store.links().to_vec())
            .unwrap_or_default()
    }

    pub fn view(&self) -> TrackerView {
        let save_pending = self.scheduler.is_pending();
        match self.lock_store() {
            Ok(store) => TrackerView {
                loaded: store.is_loaded(),
                stability_score: store.stability_score(),
                links: store
                    .links()
                    .iter()
                    .enumerate()
                    .map(|(index, link)| link.summary(index))
                    .collect(),
                save_pending,
            },
            Err(_) => TrackerView {
                loaded: false,
                stability_score: StabilityScore::default(),
                links: Vec::new(),
                save_pending,
            },
        }
    }

    pub fn settings(&self) -> AppSettings {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    pub fn apply_settings(&self, settings: AppSettings) {
        self.scheduler
            .set_delay(Duration::from_millis(settings.autosave_delay_ms));
        if let Ok(mut store) = self.store.lock() {
            store.set_strict_vocabulary(settings.strict_vocabulary);
        }
        if let Ok(mut current) = self.settings.lock() {
            *current = settings;
        }
    }

    pub fn save_stats(&self) -> SaveStats {
        self.scheduler.stats()
    }

    /// Saves immediately if a debounced save is pending.
    pub async fn flush(&self) -> bool {
        self.scheduler.flush().await
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut StateStore) -> AppResult<T>) -> AppResult<T> {
        let (result, changed, save_eligible) = {
            let mut store = self.lock_store()?;
            let before = store.revision();
            let result = op(&mut *store);
            (result, store.revision() != before, store.is_loaded())
        };
        match &result {
            Ok(_) if changed => self.after_mutation(save_eligible),
            Ok(_) => tracing::debug!("transition left state unchanged; no save scheduled"),
            Err(error) => tracing::debug!(error = %error, "transition rejected"),
        }
        result
    }

    fn after_mutation(&self, save_eligible: bool) {
        if save_eligible {
            self.scheduler.schedule();
        } else {
            tracing::debug!("state changed before load completed; save not scheduled");
        }
    }

    async fn save_current(&self) -> bool {
        let payload: Option<SnapshotPayload> = match self.store.lock() {
            Ok(store) if store.is_loaded() => Some(store.to_payload()),
            Ok(_) => None,
            Err(_) => {
                tracing::error!("state store mutex poisoned; skipping save");
                return false;
            }
        };
        let Some(payload) = payload else {
            return true;
        };

        if self.settings().skip_empty_snapshots && payload.links.is_empty() {
            tracing::debug!("skipping save of empty tracker");
            return true;
        }

        match self.gateway.append_snapshot(&payload).await {
            Ok(receipt) => {
                tracing::info!(
                    snapshot_id = %receipt.id,
                    captured_at = %receipt.captured_at,
                    links = payload.links.len(),
                    stability = payload.stability_score.value(),
                    "snapshot saved"
                );
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "snapshot save failed");
                false
            }
        }
    }

    fn lock_store(&self) -> AppResult<MutexGuard<'_, StateStore>> {
        self.store
            .lock()
            .map_err(|_| AppError::Internal("state store mutex poisoned".to_string()))
    }

    fn lock_registration(&self) -> AppResult<MutexGuard<'_, RegistrationFlow>> {
        self.registration
            .lock()
            .map_err(|_| AppError::Internal("registration mutex poisoned".to_string()))
    }
}
