//! Safety Check Integration Tests
//!
//! Drives `SafetyCheckService` end to end against an in-memory backend and
//! push connector, in both poll and subscribe mode.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use workorder_safety::models::workorder::{SafetyCheckRequest, WorkOrder, SAFETY_CHECK_QUERY};
use workorder_safety::services::push::PushConnector;
use workorder_safety::services::safety_check::{FAILED_MESSAGE, TIMED_OUT_MESSAGE};
use workorder_safety::services::{ReportSnapshot, SafetyCheckService, WatchMode};
use workorder_safety::AppError;
use workorder_safety_core::{
    Chunk, CoreError, CoreResult, JobOutcome, JobState, JobSubmitter, PushChannel, PushMessage,
    StatusReport, StatusSource, TerminalEvent, WatchConfig,
};

// ============================================================================
// Test doubles
// ============================================================================

struct StubBackend {
    job_id: String,
    statuses: Mutex<VecDeque<CoreResult<StatusReport>>>,
    status_calls: AtomicU32,
    submitted: Mutex<Vec<SafetyCheckRequest>>,
}

impl StubBackend {
    fn new(statuses: Vec<CoreResult<StatusReport>>) -> Self {
        Self {
            job_id: "J1".to_string(),
            statuses: Mutex::new(statuses.into()),
            status_calls: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSubmitter for StubBackend {
    type Request = SafetyCheckRequest;

    async fn submit(&self, request: &SafetyCheckRequest) -> CoreResult<String> {
        self.submitted.lock().unwrap().push(request.clone());
        Ok(self.job_id.clone())
    }
}

#[async_trait]
impl StatusSource for StubBackend {
    async fn check_status(&self, job_id: &str) -> CoreResult<StatusReport> {
        assert_eq!(job_id, self.job_id);
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusReport::pending("PENDING")))
    }
}

struct StubChannel {
    rx: mpsc::UnboundedReceiver<CoreResult<PushMessage>>,
}

#[async_trait]
impl PushChannel for StubChannel {
    async fn next_message(&mut self) -> Option<CoreResult<PushMessage>> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

struct StubConnector {
    channel: Mutex<Option<StubChannel>>,
}

impl StubConnector {
    /// Connector whose channel replays `messages`. The returned sender keeps
    /// the channel open until dropped.
    fn with_messages(
        messages: Vec<PushMessage>,
    ) -> (Self, mpsc::UnboundedSender<CoreResult<PushMessage>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        for message in messages {
            tx.send(Ok(message)).unwrap();
        }
        let connector = Self {
            channel: Mutex::new(Some(StubChannel { rx })),
        };
        (connector, tx)
    }
}

#[async_trait]
impl PushConnector for StubConnector {
    type Channel = StubChannel;

    async fn connect(&self, _job_id: &str) -> CoreResult<StubChannel> {
        self.channel
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| CoreError::transport("already connected"))
    }
}

/// Connector whose handshake never completes.
struct HangingConnector;

#[async_trait]
impl PushConnector for HangingConnector {
    type Channel = StubChannel;

    async fn connect(&self, _job_id: &str) -> CoreResult<StubChannel> {
        std::future::pending().await
    }
}

fn work_order() -> WorkOrder {
    WorkOrder {
        work_order_id: "WO-100".to_string(),
        asset_id: "A-7".to_string(),
        location_name: Some("Depot".to_string()),
        ..Default::default()
    }
}

fn chunk(index: i64, content: &str) -> PushMessage {
    PushMessage::Chunk(Chunk::indexed(index, content))
}

fn completed() -> PushMessage {
    PushMessage::Terminal(TerminalEvent::Completed { payload: None })
}

fn watch(max_attempts: u32) -> WatchConfig {
    WatchConfig {
        max_attempts,
        interval: Duration::from_millis(3000),
        subscription_timeout: Duration::from_millis(60_000),
    }
}

fn drain(rx: &mut mpsc::Receiver<ReportSnapshot>) -> Vec<ReportSnapshot> {
    let mut snapshots = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        snapshots.push(snapshot);
    }
    snapshots
}

// ============================================================================
// Subscribe mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_order_chunks_assemble_in_index_order() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![
        chunk(1, "World"),
        chunk(0, "Hello "),
        chunk(2, "!"),
        completed(),
    ]);
    let (snap_tx, mut snap_rx) = mpsc::channel(32);

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .with_snapshots(snap_tx)
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.job_id, "J1");
    assert_eq!(report.state(), Some(JobState::Completed));
    assert_eq!(report.text, "Hello World!");
    assert!(report.missing_indices.is_empty());
    assert_eq!(report.user_message(), None);
    assert_eq!(backend.calls(), 0);

    let snapshots = drain(&mut snap_rx);
    let texts: Vec<&str> = snapshots.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["World", "Hello World", "Hello World!"]);
    assert_eq!(snapshots[0].missing_indices, vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_redelivered_chunk_replaces_previous_content() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![
        chunk(0, "Hazard: "),
        chunk(1, "draft"),
        chunk(1, "none"),
        completed(),
    ]);

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.text, "Hazard: none");
}

#[tokio::test(start_paused = true)]
async fn test_negative_index_does_not_end_the_job() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![
        chunk(0, "ok"),
        chunk(-1, "bad"),
        chunk(1, "!"),
        completed(),
    ]);

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.state(), Some(JobState::Completed));
    assert_eq!(report.text, "ok!");
}

#[tokio::test(start_paused = true)]
async fn test_gap_is_reported_when_stream_fails() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![
        chunk(0, "A"),
        chunk(2, "C"),
        PushMessage::Terminal(TerminalEvent::Failed {
            reason: "model error".to_string(),
        }),
    ]);

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        JobOutcome::Failed {
            reason: "model error".to_string()
        }
    );
    assert_eq!(report.text, "AC");
    assert_eq!(report.missing_indices, vec![1]);
    assert_eq!(report.user_message(), Some(FAILED_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_silent_stream_times_out() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![chunk(0, "partial")]);
    let mut config = watch(20);
    config.subscription_timeout = Duration::from_millis(1000);

    let started = tokio::time::Instant::now();
    let report = SafetyCheckService::new(&backend, Some(&connector), config)
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::TimedOut);
    assert_eq!(started.elapsed(), Duration::from_millis(1000));
    assert_eq!(report.text, "partial");
    assert_eq!(report.user_message(), Some(TIMED_OUT_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_completion_payload_used_when_nothing_streamed() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![PushMessage::Terminal(
        TerminalEvent::Completed {
            payload: Some("All clear".to_string()),
        },
    )]);

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.text, "All clear");
}

#[tokio::test]
async fn test_subscribe_without_connector_is_config_error() {
    let backend = StubBackend::new(Vec::new());
    let err = SafetyCheckService::<_, StubConnector>::new(&backend, None, watch(20))
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_subscription() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![chunk(0, "partial")]);
    let token = CancellationToken::new();
    let canceller = token.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .with_cancellation_token(token)
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::Cancelled);
    assert_eq!(report.state(), None);
    assert_eq!(report.user_message(), None);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_connect_times_out_at_deadline() {
    let backend = StubBackend::new(Vec::new());
    let mut config = watch(20);
    config.subscription_timeout = Duration::from_millis(1000);

    let started = tokio::time::Instant::now();
    let report = SafetyCheckService::new(&backend, Some(&HangingConnector), config)
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::TimedOut);
    assert_eq!(started.elapsed(), Duration::from_millis(1000));
    assert!(report.text.is_empty());
    assert_eq!(report.user_message(), Some(TIMED_OUT_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stalled_connect() {
    let backend = StubBackend::new(Vec::new());
    let token = CancellationToken::new();
    let canceller = token.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let report = SafetyCheckService::new(&backend, Some(&HangingConnector), watch(20))
        .with_cancellation_token(token)
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::Cancelled);
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_quote_ending_a_chunk_survives_in_snapshots() {
    let backend = StubBackend::new(Vec::new());
    let (connector, _tx) = StubConnector::with_messages(vec![
        chunk(0, "\"Wind 40\""),
        chunk(1, " km/h\""),
        completed(),
    ]);
    let (snap_tx, mut snap_rx) = mpsc::channel(32);

    let report = SafetyCheckService::new(&backend, Some(&connector), watch(20))
        .with_snapshots(snap_tx)
        .run(&work_order(), WatchMode::Subscribe)
        .await
        .unwrap();

    assert_eq!(report.text, "Wind 40\" km/h");
    let snapshots = drain(&mut snap_rx);
    let texts: Vec<&str> = snapshots.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Wind 40\"", "Wind 40\" km/h\"", "Wind 40\" km/h"]
    );
}

// ============================================================================
// Poll mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_poll_mode_uses_completed_payload_as_report() {
    let backend = StubBackend::new(vec![
        Ok(StatusReport::pending("PENDING")),
        Ok(StatusReport::pending("IN_PROGRESS")),
        Ok(StatusReport::completed(Some(
            r#""Safe to proceed\nWind 10 km/h""#.to_string(),
        ))),
    ]);
    let (snap_tx, mut snap_rx) = mpsc::channel(32);

    let report = SafetyCheckService::<_, StubConnector>::new(&backend, None, watch(20))
        .with_snapshots(snap_tx)
        .run(&work_order(), WatchMode::Poll)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 3);
    assert_eq!(report.state(), Some(JobState::Completed));
    assert_eq!(report.text, "Safe to proceedWind 10 km/h");
    assert_eq!(drain(&mut snap_rx).len(), 1);

    let submitted = backend.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].query, SAFETY_CHECK_QUERY);
    assert_eq!(submitted[0].workorderdetails.work_order_id, "WO-100");
    assert_eq!(submitted[0].session_id.len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_poll_mode_times_out_after_max_attempts() {
    let backend = StubBackend::new(Vec::new());

    let report = SafetyCheckService::<_, StubConnector>::new(&backend, None, watch(3))
        .run(&work_order(), WatchMode::Poll)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 3);
    assert_eq!(report.outcome, JobOutcome::TimedOut);
    assert_eq!(report.text, "");
    assert_eq!(report.user_message(), Some(TIMED_OUT_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_poll_mode_transport_error_fails() {
    let backend = StubBackend::new(vec![
        Ok(StatusReport::pending("PENDING")),
        Err(CoreError::transport("503 Service Unavailable")),
    ]);

    let report = SafetyCheckService::<_, StubConnector>::new(&backend, None, watch(20))
        .run(&work_order(), WatchMode::Poll)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 2);
    assert!(matches!(report.outcome, JobOutcome::Failed { .. }));
    assert_eq!(report.user_message(), Some(FAILED_MESSAGE));
}

#[tokio::test]
async fn test_pre_cancelled_poll_does_not_poll() {
    let backend = StubBackend::new(Vec::new());
    let token = CancellationToken::new();
    token.cancel();

    let report = SafetyCheckService::<_, StubConnector>::new(&backend, None, watch(20))
        .with_cancellation_token(token)
        .run(&work_order(), WatchMode::Poll)
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::Cancelled);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_invalid_watch_config_rejected_before_submit() {
    let backend = StubBackend::new(Vec::new());

    let err = SafetyCheckService::<_, StubConnector>::new(&backend, None, watch(0))
        .run(&work_order(), WatchMode::Poll)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Core(CoreError::Validation(_))));
    assert!(backend.submitted.lock().unwrap().is_empty());
}
