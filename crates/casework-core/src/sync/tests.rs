use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use super::*;
use crate::connectivity::SignalConnectivity;
use crate::models::{
    ArtifactId, ArtifactPayload, BinaryBlob, PendingArtifact, SurveyAnswerPayload,
    VictimPhotoPayload,
};
use crate::store::LocalStore;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Upload(ArtifactId),
    Attach(ArtifactId, String),
}

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<Call>>,
    failing_uploads: Mutex<HashSet<ArtifactId>>,
    failing_attaches: Mutex<HashSet<ArtifactId>>,
    attach_delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

/// Records every call and fails on demand.
#[derive(Clone, Default)]
struct MockStrategy {
    state: Arc<MockState>,
}

impl MockStrategy {
    fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    fn uploads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Upload(_)))
            .count()
    }

    fn uploaded(&self) -> Vec<ArtifactId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Upload(id) => Some(id),
                Call::Attach(..) => None,
            })
            .collect()
    }

    fn attaches(&self) -> Vec<ArtifactId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Attach(id, _) => Some(id),
                Call::Upload(_) => None,
            })
            .collect()
    }

    fn fail_upload(&self, id: ArtifactId, fail: bool) {
        let mut failing = self.state.failing_uploads.lock().unwrap();
        if fail {
            failing.insert(id);
        } else {
            failing.remove(&id);
        }
    }

    fn fail_attach(&self, id: ArtifactId, fail: bool) {
        let mut failing = self.state.failing_attaches.lock().unwrap();
        if fail {
            failing.insert(id);
        } else {
            failing.remove(&id);
        }
    }

    fn delay_attach(&self, delay: Duration) {
        *self.state.attach_delay.lock().unwrap() = Some(delay);
    }

    /// Make the next attach signal `started` and wait for `release`.
    fn gate_attach(&self) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.state.gate.lock().unwrap() = Some((Arc::clone(&started), Arc::clone(&release)));
        (started, release)
    }
}

#[async_trait]
impl<P: ArtifactPayload> SyncStrategy<P> for MockStrategy {
    async fn upload(&self, artifact: &PendingArtifact<P>, blob: &BinaryBlob) -> crate::Result<String> {
        self.state.calls.lock().unwrap().push(Call::Upload(artifact.id));
        if self.state.failing_uploads.lock().unwrap().contains(&artifact.id) {
            return Err(Error::UploadFailed("storage rejected file".to_string()));
        }
        Ok(format!("https://cdn.test/{}/{}", artifact.id, blob.file_name))
    }

    async fn attach(&self, artifact: &PendingArtifact<P>, reference: &str) -> crate::Result<()> {
        let gate = self.state.gate.lock().unwrap().take();
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }
        let delay = *self.state.attach_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state
            .calls
            .lock()
            .unwrap()
            .push(Call::Attach(artifact.id, reference.to_string()));
        if self.state.failing_attaches.lock().unwrap().contains(&artifact.id) {
            return Err(Error::AttachFailed("HTTP 500".to_string()));
        }
        Ok(())
    }
}

fn photo(name: &str) -> VictimPhotoPayload {
    VictimPhotoPayload {
        photo: BinaryBlob::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF]).unwrap(),
    }
}

struct Harness {
    store: LocalStore,
    strategy: MockStrategy,
    network: Arc<SignalConnectivity>,
    engine: Arc<SyncEngine<VictimPhotoPayload, MockStrategy>>,
}

async fn harness(online: bool) -> Harness {
    let store = LocalStore::open_in_memory().await.unwrap();
    let strategy = MockStrategy::default();
    let network = Arc::new(if online {
        SignalConnectivity::online()
    } else {
        SignalConnectivity::offline()
    });
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        strategy.clone(),
        Arc::clone(&network) as Arc<dyn crate::connectivity::ConnectivityMonitor>,
    ));
    Harness {
        store,
        strategy,
        network,
        engine,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_capture_is_delivered_after_reconnect() {
    let h = harness(false).await;
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    let report = h.engine.drain().await.unwrap();
    assert_eq!(report.skipped, Some(SkipReason::Offline));
    assert!(h.strategy.calls().is_empty());

    h.network.set_online(true);
    let report = h.engine.drain().await.unwrap();
    assert_eq!((report.attempted, report.synced), (1, 1));

    let artifact = h.engine.queue().get(id).await.unwrap().unwrap();
    assert!(artifact.synced);
    assert_eq!(
        artifact.remote_reference.as_deref(),
        Some("https://cdn.test/1/a.jpg")
    );
    assert_eq!(
        h.strategy.calls(),
        vec![
            Call::Upload(id),
            Call::Attach(id, "https://cdn.test/1/a.jpg".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_queued_artifacts_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("casework.db");

    {
        let store = LocalStore::open_path(&db_path).await.unwrap();
        let queue = crate::queue::PendingQueue::<VictimPhotoPayload>::new(store);
        queue.enqueue("v-1", photo("a.jpg")).await.unwrap();
    }

    let store = LocalStore::open_path(&db_path).await.unwrap();
    let strategy = MockStrategy::default();
    let engine = SyncEngine::<VictimPhotoPayload, _>::new(
        store,
        strategy.clone(),
        Arc::new(SignalConnectivity::online()),
    );

    let report = engine.drain().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(strategy.uploads(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_drain_is_a_no_op() {
    let h = harness(true).await;
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    let (started, release) = h.strategy.gate_attach();

    let first = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.drain().await })
    };
    started.notified().await;
    assert!(h.engine.is_draining());

    let second = h.engine.drain().await.unwrap();
    assert_eq!(second.skipped, Some(SkipReason::AlreadyRunning));
    assert_eq!(second.attempted, 0);

    release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.synced, 1);
    assert!(!h.engine.is_draining());
    assert_eq!(h.strategy.attaches(), vec![id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_artifacts_sync_in_insertion_order() {
    let h = harness(true).await;
    let queue = h.engine.queue();
    let a = queue.enqueue("v-1", photo("a.jpg")).await.unwrap();
    let b = queue.enqueue("v-2", photo("b.jpg")).await.unwrap();
    let c = queue.enqueue("v-1", photo("c.jpg")).await.unwrap();

    h.engine.drain().await.unwrap();

    assert_eq!(h.strategy.uploaded(), vec![a, b, c]);
    assert_eq!(h.strategy.attaches(), vec![a, b, c]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failure_is_isolated_to_one_artifact() {
    let h = harness(true).await;
    let queue = h.engine.queue();
    let a = queue.enqueue("v-1", photo("a.jpg")).await.unwrap();
    let b = queue.enqueue("v-1", photo("b.jpg")).await.unwrap();
    let c = queue.enqueue("v-1", photo("c.jpg")).await.unwrap();
    h.strategy.fail_upload(b, true);

    let report = h.engine.drain().await.unwrap();
    assert_eq!((report.attempted, report.synced, report.failed), (3, 2, 1));

    let unsynced: Vec<ArtifactId> = queue
        .list_unsynced()
        .await
        .unwrap()
        .into_iter()
        .map(|artifact| artifact.id)
        .collect();
    assert_eq!(unsynced, vec![b]);
    assert_eq!(h.engine.failure_count(b), 1);
    assert_eq!(h.engine.failure_count(a), 0);
    assert_eq!(h.strategy.attaches(), vec![a, c]);

    h.engine.drain().await.unwrap();
    assert_eq!(h.engine.failure_count(b), 2);

    h.strategy.fail_upload(b, false);
    let report = h.engine.drain().await.unwrap();
    assert_eq!((report.attempted, report.synced), (1, 1));
    assert_eq!(h.engine.failure_count(b), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_attach_failure_is_isolated_to_one_artifact() {
    let h = harness(true).await;
    let queue = h.engine.queue();
    let a = queue.enqueue("v-1", photo("a.jpg")).await.unwrap();
    let b = queue.enqueue("v-2", photo("b.jpg")).await.unwrap();
    let c = queue.enqueue("v-3", photo("c.jpg")).await.unwrap();
    h.strategy.fail_attach(b, true);

    let report = h.engine.drain().await.unwrap();
    assert_eq!((report.attempted, report.synced, report.failed), (3, 2, 1));

    assert!(queue.get(a).await.unwrap().unwrap().synced);
    assert!(!queue.get(b).await.unwrap().unwrap().synced);
    assert!(queue.get(c).await.unwrap().unwrap().synced);
    assert_eq!(h.strategy.uploaded(), vec![a, b, c]);
    assert_eq!(h.strategy.attaches(), vec![a, b, c]);
    assert_eq!(h.engine.failure_count(b), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreadable_row_does_not_block_domain() {
    let h = harness(true).await;
    h.store
        .put(
            crate::store::Partition::PendingVictimPhotos,
            None,
            &serde_json::json!({"legacy": true}),
        )
        .await
        .unwrap();
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    let report = h.engine.drain().await.unwrap();

    assert_eq!((report.attempted, report.synced), (1, 1));
    assert!(h.engine.queue().get(id).await.unwrap().unwrap().synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_next_drain_removes_delivered_artifacts() {
    let h = harness(true).await;
    let queue = h.engine.queue();
    let a = queue.enqueue("v-1", photo("a.jpg")).await.unwrap();
    h.engine.drain().await.unwrap();
    assert!(queue.get(a).await.unwrap().unwrap().synced);

    let b = queue.enqueue("v-1", photo("b.jpg")).await.unwrap();
    h.strategy.fail_attach(b, true);
    h.engine.drain().await.unwrap();

    assert!(queue.get(a).await.unwrap().is_none());
    let remaining: Vec<ArtifactId> = queue
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|artifact| artifact.id)
        .collect();
    assert_eq!(remaining, vec![b]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_drain_keeps_delivered_artifacts() {
    let h = harness(true).await;
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    h.engine.drain().await.unwrap();

    h.network.set_online(false);
    h.engine.drain().await.unwrap();

    assert!(h.engine.queue().get(id).await.unwrap().unwrap().synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_during_attach_is_not_undone() {
    let h = harness(true).await;
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    let (started, release) = h.strategy.gate_attach();

    let drain = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.drain().await })
    };
    started.notified().await;
    assert!(h.engine.queue().delete(id).await.unwrap());
    release.notify_one();

    let report = drain.await.unwrap().unwrap();
    assert_eq!((report.attempted, report.synced, report.failed), (1, 0, 1));
    assert!(h.engine.queue().get(id).await.unwrap().is_none());
    assert_eq!(
        h.store
            .count(crate::store::Partition::PendingVictimPhotos)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_synced_artifacts_are_not_sent_again() {
    let h = harness(true).await;
    h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    h.engine.drain().await.unwrap();
    let report = h.engine.drain().await.unwrap();

    assert_eq!(report.attempted, 0);
    assert_eq!(h.strategy.uploads(), 1);
    assert_eq!(h.strategy.attaches().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retry_after_attach_failure_reuses_upload() {
    let h = harness(true).await;
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    h.strategy.fail_attach(id, true);

    let report = h.engine.drain().await.unwrap();
    assert_eq!(report.failed, 1);
    let pending = h.engine.queue().get(id).await.unwrap().unwrap();
    assert!(!pending.synced);
    assert_eq!(
        pending.upload_reference.as_deref(),
        Some("https://cdn.test/1/a.jpg")
    );

    h.strategy.fail_attach(id, false);
    let report = h.engine.drain().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(h.strategy.uploads(), 1);
    assert_eq!(h.strategy.attaches(), vec![id, id]);

    let synced = h.engine.queue().get(id).await.unwrap().unwrap();
    assert_eq!(
        synced.remote_reference.as_deref(),
        Some("https://cdn.test/1/a.jpg")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_attach_times_out_and_stays_pending() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let strategy = MockStrategy::default();
    strategy.delay_attach(Duration::from_secs(5));
    let engine = SyncEngine::<VictimPhotoPayload, _>::new(
        store,
        strategy.clone(),
        Arc::new(SignalConnectivity::online()),
    )
    .with_request_timeout(Duration::from_millis(50));
    let id = engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    let report = engine.drain().await.unwrap();

    assert_eq!((report.attempted, report.failed), (1, 1));
    assert_eq!(engine.failure_count(id), 1);
    assert!(!engine.queue().get(id).await.unwrap().unwrap().synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_payload_without_binary_skips_upload() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let strategy = MockStrategy::default();
    let engine = SyncEngine::<SurveyAnswerPayload, _>::new(
        store,
        strategy.clone(),
        Arc::new(SignalConnectivity::online()),
    );
    let id = engine
        .queue()
        .enqueue(
            "v-1",
            SurveyAnswerPayload {
                questionnaire_id: "intake".to_string(),
                answers: serde_json::json!({"q1": "oui"}),
            },
        )
        .await
        .unwrap();

    engine.drain().await.unwrap();

    assert_eq!(
        strategy.calls(),
        vec![Call::Attach(id, NO_BINARY_REFERENCE.to_string())]
    );
    let synced = engine.queue().get(id).await.unwrap().unwrap();
    assert_eq!(synced.remote_reference.as_deref(), Some(NO_BINARY_REFERENCE));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drain_records_last_sync() {
    let h = harness(true).await;
    h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    h.engine.drain().await.unwrap();

    let last = SyncMetadata::new(h.store.clone())
        .last_sync(crate::models::Domain::VictimPhotos)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((last.attempted, last.synced, last.failed), (1, 1, 0));
}

async fn wait_until_synced(engine: &SyncEngine<VictimPhotoPayload, MockStrategy>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.queue().pending_count().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn scheduler_for(h: &Harness, interval: Duration) -> SyncScheduler {
    SyncScheduler::new(
        vec![Arc::clone(&h.engine) as Arc<dyn DomainSync>],
        Arc::clone(&h.network) as Arc<dyn crate::connectivity::ConnectivityMonitor>,
    )
    .with_interval(interval)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_drains_on_start_when_online() {
    let h = harness(true).await;
    h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    let mut scheduler = scheduler_for(&h, Duration::from_secs(3600));
    scheduler.start();

    wait_until_synced(&h.engine).await;
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_drains_on_reconnect() {
    let h = harness(false).await;
    h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();

    let mut scheduler = scheduler_for(&h, Duration::from_secs(3600));
    scheduler.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.strategy.calls().is_empty());

    h.network.set_online(true);
    wait_until_synced(&h.engine).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_interval_retries_failures() {
    let h = harness(true).await;
    let id = h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    h.strategy.fail_upload(id, true);

    let mut scheduler = scheduler_for(&h, Duration::from_millis(50));
    scheduler.start();
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.strategy.fail_upload(id, false);

    wait_until_synced(&h.engine).await;
    assert!(h.strategy.uploads() >= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_stop_is_idempotent() {
    let h = harness(false).await;
    let mut scheduler = scheduler_for(&h, Duration::from_secs(3600));

    scheduler.stop();
    assert!(!scheduler.is_running());

    scheduler.start();
    scheduler.start();
    assert!(scheduler.is_running());

    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.is_running());

    h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    h.network.set_online(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.strategy.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_trigger_and_pending_counts() {
    let h = harness(true).await;
    h.engine.queue().enqueue("v-1", photo("a.jpg")).await.unwrap();
    h.engine.queue().enqueue("v-1", photo("b.jpg")).await.unwrap();
    let scheduler = scheduler_for(&h, Duration::from_secs(3600));

    assert_eq!(
        scheduler.pending_counts().await.unwrap(),
        vec![(crate::models::Domain::VictimPhotos, 2)]
    );

    let results = scheduler.trigger().await;
    assert_eq!(results.len(), 1);
    let (domain, report) = &results[0];
    assert_eq!(*domain, crate::models::Domain::VictimPhotos);
    assert_eq!(report.as_ref().unwrap().synced, 2);
    assert_eq!(
        scheduler.pending_counts().await.unwrap(),
        vec![(crate::models::Domain::VictimPhotos, 0)]
    );
}
