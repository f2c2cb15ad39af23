use interactions_lib::{open_sqlite_tracker, AppSettings, EventKind, MemoryGateway, SnapshotGateway, TrackerCore};
use std::sync::Arc;

#[tokio::test]
async fn state_survives_a_restart_on_the_same_database() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let (tracker, _db) = open_sqlite_tracker(dir.path()).expect("open");
        tracker.start();
        assert!(!tracker.bootstrap().await);

        tracker.add_link("Ana").expect("add");
        tracker.add_link("Beto").expect("add");
        tracker
            .log_event(0, EventKind::Negative, "Triste", "Scroll infinito")
            .expect("log");
        tracker.log_event(1, EventKind::Positive, "Paz", "Medité").expect("log");
        assert!(tracker.flush().await);
        tracker.shutdown();
    }

    let (tracker, db) = open_sqlite_tracker(dir.path()).expect("reopen");
    tracker.start();
    assert!(tracker.bootstrap().await);

    let view = tracker.view();
    assert_eq!(view.stability_score.value(), 96);
    assert_eq!(view.links.len(), 2);
    assert_eq!(view.links[0].name, "Ana");
    assert_eq!(view.links[0].negative_count, 1);
    assert_eq!(view.links[1].positive_count, 1);
    assert_eq!(db.snapshot_count().expect("count"), 1);
    tracker.shutdown();
}

#[tokio::test]
async fn every_flush_appends_a_new_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (tracker, db) = open_sqlite_tracker(dir.path()).expect("open");
    tracker.start();
    tracker.bootstrap().await;

    tracker.add_link("Ana").expect("add");
    assert!(tracker.flush().await);
    tracker.remove_link(0).expect("remove");
    assert!(tracker.flush().await);
    assert!(!tracker.flush().await);

    assert_eq!(db.snapshot_count().expect("count"), 2);
    let latest = db.load_latest_snapshot().await.expect("load").expect("snapshot");
    assert!(latest.links.is_empty());
    assert_eq!(latest.stability_score.value(), 100);
    tracker.shutdown();
}

#[tokio::test]
async fn stored_settings_shape_the_tracker() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let (_tracker, db) = open_sqlite_tracker(dir.path()).expect("open");
        db.update_settings(serde_json::json!({ "strictVocabulary": true, "autosaveDelayMs": 50 }))
            .expect("update");
    }

    let (tracker, _db) = open_sqlite_tracker(dir.path()).expect("reopen");
    tracker.start();
    tracker.bootstrap().await;
    assert!(tracker.settings().strict_vocabulary);

    tracker.add_link("Ana").expect("add");
    let err = tracker
        .log_event(0, EventKind::Negative, "Paz", "Aislamiento")
        .expect_err("positive emotion on a negative event");
    assert!(err.is_validation());
    assert!(tracker.link(0).expect("link").history().is_empty());
    tracker.shutdown();
}

#[tokio::test]
async fn snapshot_document_keeps_the_persisted_shape() {
    let gateway = Arc::new(MemoryGateway::new());
    let tracker = TrackerCore::new(gateway.clone(), AppSettings::default());
    tracker.start();
    tracker.bootstrap().await;

    tracker.add_link("Ana").expect("add");
    tracker
        .log_event(0, EventKind::Negative, "Cansada", "Procrastinar")
        .expect("log");
    assert!(tracker.flush().await);

    let latest = gateway.load_latest_snapshot().await.expect("load").expect("snapshot");
    let document = serde_json::to_value(&latest).expect("serialize");
    assert!(document["capturedAt"].is_string());
    assert_eq!(document["stabilityScore"], 92);
    let event = &document["links"][0]["history"][0];
    assert_eq!(event["kind"], "negative");
    assert_eq!(event["emotion"], "Cansada");
    assert_eq!(event["habit"], "Procrastinar");
    assert!(event["occurredAt"].is_string());
    tracker.shutdown();
}
