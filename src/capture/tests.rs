use super::*;
use crate::config::UvcCamConfig;
use crate::state::{StreamControl, StreamState};
use crate::store::FrameStore;
use crate::testing::{jpeg_frame_bytes, ScriptedSource, SourceEvent, Step};
use crate::usb::{StreamInterface, UsbEventSink};
use crate::validator::FrameVerdict;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const VIDEO: StreamInterface = StreamInterface {
    control: 0,
    streaming: 0,
};

struct Harness {
    source: Arc<ScriptedSource>,
    store: Arc<FrameStore>,
    control: StreamControl,
    capture: CaptureLoop,
}

fn harness(steps: Vec<Step>, threshold: u32) -> Harness {
    let mut config = UvcCamConfig::default();
    config.capture.error_threshold = threshold;
    config.camera.warmup_captures = 0;

    let source = Arc::new(ScriptedSource::with_script(steps));
    let store = Arc::new(FrameStore::new(source.clone()));
    let state = Arc::new(StreamState::new());
    let control = StreamControl::new(state.clone(), true);
    let capture = CaptureLoop::new(
        source.clone(),
        store.clone(),
        state,
        config.camera,
        config.capture,
    );

    Harness {
        source,
        store,
        control,
        capture,
    }
}

#[tokio::test(start_paused = true)]
async fn test_idle_without_host() {
    let mut h = harness(vec![Step::Frame(jpeg_frame_bytes(8))], 10);

    let started = tokio::time::Instant::now();
    assert_eq!(h.capture.step().await, CaptureOutcome::Idle);
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert!(started.elapsed() < Duration::from_millis(1100));

    assert_eq!(h.capture.phase(), CaptureState::Idle);
    assert!(h.source.events().is_empty());
    assert_eq!(h.source.remaining_steps(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_valid_frame_is_deposited() {
    let mut h = harness(vec![Step::Frame(jpeg_frame_bytes(600))], 10);
    h.control.on_commit(VIDEO);

    let outcome = h.capture.step().await;
    let CaptureOutcome::Deposited { frame_id } = outcome else {
        panic!("expected a deposit, got {:?}", outcome);
    };

    assert_eq!(h.capture.phase(), CaptureState::Capturing);
    assert_eq!(h.store.current_id(), Some(frame_id));
    assert_eq!(h.store.peek_current().unwrap().len(), 604);
    assert_eq!(h.capture.stats().snapshot().deposited, 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_released_without_counting_error() {
    let mut h = harness(
        vec![
            Step::Fail,
            Step::Frame(vec![0x00, 0xD8, 0xAB, 0xAB, 0xFF, 0xD9]),
        ],
        10,
    );
    h.control.on_commit(VIDEO);

    assert_eq!(h.capture.step().await, CaptureOutcome::Failed { consecutive: 1 });

    let outcome = h.capture.step().await;
    assert!(matches!(
        outcome,
        CaptureOutcome::Rejected {
            verdict: FrameVerdict::BadMarkers,
            ..
        }
    ));

    // A delivered frame resets the failure streak even when invalid
    assert_eq!(h.capture.consecutive_errors(), 0);
    assert!(!h.store.has_current());
    assert_eq!(h.source.outstanding(), 0);

    let stats = h.capture.stats().snapshot();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.acceptance_rate(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_acceptance_rate_tracks_rejections() {
    let mut h = harness(
        vec![
            Step::Frame(jpeg_frame_bytes(10)),
            Step::Frame(vec![0xFF, 0xD8, 0x00, 0x00]),
            Step::Frame(jpeg_frame_bytes(20)),
            Step::Frame(jpeg_frame_bytes(30)),
        ],
        10,
    );
    assert_eq!(h.capture.stats().snapshot().acceptance_rate(), 1.0);

    h.control.on_commit(VIDEO);
    for _ in 0..4 {
        h.capture.step().await;
    }

    let stats = h.capture.stats().snapshot();
    assert_eq!(stats.captured, 4);
    assert_eq!(stats.deposited, 3);
    assert_eq!(stats.acceptance_rate(), 0.75);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_format_is_rejected() {
    let mut h = harness(
        vec![Step::FrameAs(
            jpeg_frame_bytes(16),
            crate::frame::FrameFormat::Yuv422,
        )],
        10,
    );
    h.control.on_commit(VIDEO);

    assert!(matches!(
        h.capture.step().await,
        CaptureOutcome::Rejected {
            verdict: FrameVerdict::WrongFormat(_),
            ..
        }
    ));
    assert_eq!(h.source.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_threshold_failures_reinitialize_once() {
    let mut steps = vec![Step::Fail; 10];
    steps.push(Step::Frame(jpeg_frame_bytes(32)));
    let mut h = harness(steps, 10);
    h.control.on_commit(VIDEO);

    for n in 1..10 {
        assert_eq!(h.capture.step().await, CaptureOutcome::Failed { consecutive: n });
    }
    assert_eq!(h.capture.step().await, CaptureOutcome::Reinitialized);
    assert_eq!(h.capture.consecutive_errors(), 0);
    assert!(matches!(
        h.capture.step().await,
        CaptureOutcome::Deposited { .. }
    ));

    let events = h.source.events();
    let failed: Vec<_> = events
        .iter()
        .take_while(|e| **e == SourceEvent::Capture(false))
        .collect();
    assert_eq!(failed.len(), 10);
    assert_eq!(
        &events[10..],
        &[
            SourceEvent::Deinit,
            SourceEvent::Init(true),
            SourceEvent::Capture(true),
        ]
    );
    assert_eq!(h.capture.stats().snapshot().reinits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reinit_retries_on_next_failure() {
    let mut steps = vec![Step::Fail; 3];
    steps.push(Step::Frame(jpeg_frame_bytes(32)));
    let mut h = harness(steps, 3);
    h.source.script_inits([false]);
    h.control.on_commit(VIDEO);

    assert_eq!(h.capture.step().await, CaptureOutcome::Failed { consecutive: 1 });
    assert_eq!(h.capture.step().await, CaptureOutcome::Failed { consecutive: 2 });

    let started = tokio::time::Instant::now();
    assert_eq!(h.capture.step().await, CaptureOutcome::ReinitFailed);
    // Settle before init, then the long backoff
    assert!(started.elapsed() >= Duration::from_millis(1000 + 5000));
    assert!(started.elapsed() < Duration::from_millis(1000 + 5000 + 100));
    assert_eq!(h.capture.consecutive_errors(), 3);

    // The uninitialized camera fails once more and the restart is retried
    assert_eq!(h.capture.step().await, CaptureOutcome::Reinitialized);
    assert!(matches!(
        h.capture.step().await,
        CaptureOutcome::Deposited { .. }
    ));

    let stats = h.capture.stats().snapshot();
    assert_eq!(stats.reinits, 1);
    assert_eq!(stats.reinit_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reinit_returns_held_frame() {
    let mut h = harness(
        vec![Step::Frame(jpeg_frame_bytes(8)), Step::Fail],
        1,
    );
    h.control.on_commit(VIDEO);

    assert!(matches!(
        h.capture.step().await,
        CaptureOutcome::Deposited { .. }
    ));
    assert_eq!(h.source.outstanding(), 1);

    assert_eq!(h.capture.step().await, CaptureOutcome::Reinitialized);
    assert!(!h.store.has_current());
    assert_eq!(h.source.outstanding(), 0);
    assert_eq!(h.source.double_releases(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_uncommit_returns_loop_to_idle() {
    let mut h = harness(vec![Step::Frame(jpeg_frame_bytes(8))], 10);
    h.control.on_commit(VIDEO);
    assert!(matches!(
        h.capture.step().await,
        CaptureOutcome::Deposited { .. }
    ));

    h.control.on_uncommit(0);
    assert_eq!(h.capture.step().await, CaptureOutcome::Idle);
    assert_eq!(h.capture.phase(), CaptureState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_cancel() {
    let h = harness(Vec::new(), 10);
    h.control.on_commit(VIDEO);
    let stats = h.capture.stats();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(h.capture.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(550)).await;
    cancel.cancel();
    task.await.unwrap();

    // Empty script: every attempt fails, the loop keeps retrying
    assert!(stats.snapshot().failures >= 5);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_leaves_store_untouched() {
    let mut bad = vec![0x00, 0x00];
    bad.extend(std::iter::repeat(0x55).take(600));
    bad.extend_from_slice(&[0xFF, 0xD9]);

    let mut h = harness(
        vec![Step::Frame(jpeg_frame_bytes(16)), Step::Frame(bad)],
        10,
    );
    h.control.on_commit(VIDEO);

    let CaptureOutcome::Deposited { frame_id } = h.capture.step().await else {
        panic!("expected the first frame to be deposited");
    };
    assert!(h.store.wait_for_frame(Duration::from_millis(100)).await);

    assert!(matches!(
        h.capture.step().await,
        CaptureOutcome::Rejected { .. }
    ));
    assert_eq!(h.store.current_id(), Some(frame_id));
    assert!(!h.store.wait_for_frame(Duration::from_millis(100)).await);
    assert_eq!(h.source.outstanding(), 1);
}
