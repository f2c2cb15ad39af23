use crate::errors::{AppError, AppResult};
use crate::models::{Snapshot, SnapshotPayload, SnapshotReceipt};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Append-only store of full-state snapshots.
///
/// Implementations assign `capturedAt` when a payload is written and never
/// update or delete an existing snapshot.
#[async_trait]
pub trait SnapshotGateway: Send + Sync {
    /// Most recent snapshot by capture time, if any was ever written.
    async fn load_latest_snapshot(&self) -> AppResult<Option<Snapshot>>;

    async fn append_snapshot(&self, payload: &SnapshotPayload) -> AppResult<SnapshotReceipt>;
}

/// Process-local gateway used by tests and throwaway sessions.
#[derive(Debug)]
pub struct MemoryGateway {
    snapshots: Mutex<Vec<Snapshot>>,
    available: AtomicBool,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let gateway = Self::new();
        if let Ok(mut snapshots) = gateway.snapshots.lock() {
            snapshots.push(snapshot);
        }
        gateway
    }

    /// Simulates the backing store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots
            .lock()
            .map(|snapshots| snapshots.clone())
            .unwrap_or_default()
    }

    pub fn append_count(&self) -> usize {
        self.snapshots.lock().map(|snapshots| snapshots.len()).unwrap_or(0)
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::GatewayUnavailable("memory gateway is offline".to_string()))
        }
    }
}

#[async_trait]
impl SnapshotGateway for MemoryGateway {
    async fn load_latest_snapshot(&self) -> AppResult<Option<Snapshot>> {
        self.ensure_available()?;
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| AppError::Internal("memory gateway mutex poisoned".to_string()))?;
        Ok(snapshots.iter().max_by_key(|snapshot| snapshot.captured_at).cloned())
    }

    async fn append_snapshot(&self, payload: &SnapshotPayload) -> AppResult<SnapshotReceipt> {
        self.ensure_available()?;
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| AppError::Internal("memory gateway mutex poisoned".to_string()))?;
        // Keep capture times strictly increasing so "latest" is unambiguous.
        let mut captured_at = Utc::now();
        if let Some(last) = snapshots.last() {
            if captured_at <= last.captured_at {
                captured_at = last.captured_at + chrono::Duration::microseconds(1);
            }
        }
        snapshots.push(payload.clone().into_snapshot(captured_at));
        Ok(SnapshotReceipt {
            id: Uuid::new_v4().to_string(),
            captured_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryGateway, SnapshotGateway};
    use crate::models::SnapshotPayload;
    use crate::stability::StabilityScore;

    fn payload(score: i64) -> SnapshotPayload {
        SnapshotPayload {
            stability_score: StabilityScore::new(score),
            links: Vec::new(),
        }
    }

    #[tokio::test]
    async fn latest_snapshot_is_the_last_appended() {
        let gateway = MemoryGateway::new();
        assert!(gateway.load_latest_snapshot().await.expect("load").is_none());

        let first = gateway.append_snapshot(&payload(90)).await.expect("append");
        let second = gateway.append_snapshot(&payload(80)).await.expect("append");
        assert!(second.captured_at > first.captured_at);

        let latest = gateway.load_latest_snapshot().await.expect("load").expect("snapshot");
        assert_eq!(latest.stability_score.value(), 80);
        assert_eq!(gateway.append_count(), 2);
    }

    #[tokio::test]
    async fn offline_gateway_reports_unavailable() {
        let gateway = MemoryGateway::new();
        gateway.set_available(false);
        let err = gateway.append_snapshot(&payload(90)).await.expect_err("offline");
        assert!(matches!(err, crate::errors::AppError::GatewayUnavailable(_)));
        assert!(gateway.load_latest_snapshot().await.is_err());
        assert_eq!(gateway.append_count(), 0);
    }
}
