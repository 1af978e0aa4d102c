mod common;

use std::time::{Duration, Instant};

use common::{book_and_laptop, pred, small_source, ScriptedBackend, LOADED};
use live_detect::{
    BackendState, CycleOutcome, DetectionLoop, DrawCommand, DrawList, FailurePolicy, Schedule,
    StopSignal, StyleTable,
};

fn started_loop(stop: &StopSignal) -> DetectionLoop {
    let mut detection = DetectionLoop::new(FailurePolicy::default(), StyleTable::default(), stop.clone());
    detection.start();
    detection
}

#[test]
fn rendered_cycle_draws_labels_and_counts_classes() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED);
    backend.push_detect(Ok(book_and_laptop()));
    let mut source = small_source(0);
    let mut surface = DrawList::new();

    let outcome = detection.run_cycle(
        &BackendState::Ready,
        &mut source,
        &backend,
        &mut surface,
        Instant::now(),
    );

    assert_eq!(outcome, CycleOutcome::Rendered { predictions: 2 });
    assert_eq!(outcome.schedule(), Schedule::NextFrame);
    assert_eq!(
        surface.commands()[0],
        DrawCommand::Clear {
            width: 64,
            height: 48
        }
    );
    assert_eq!(surface.labels(), vec!["book 90%", "laptop 76%"]);
    assert_eq!(detection.metrics().count("book"), 1);
    assert_eq!(detection.metrics().count("laptop"), 1);
    assert_eq!(detection.session().consecutive_failures, 0);
}

#[test]
fn failures_below_threshold_keep_previous_overlay() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED);
    backend.push_detect(Ok(book_and_laptop()));
    backend.push_failures(5);
    backend.push_detect(Ok(vec![pred("book", 0.5, 0.0, 0.0, 5.0, 5.0)]));
    backend.push_failures(5);
    let mut source = small_source(0);
    let mut surface = DrawList::new();
    let t0 = Instant::now();

    detection.run_cycle(&BackendState::Ready, &mut source, &backend, &mut surface, t0);
    let rendered = surface.commands().to_vec();

    for i in 1..=5u32 {
        let now = t0 + Duration::from_millis(20 * i as u64);
        let outcome =
            detection.run_cycle(&BackendState::Ready, &mut source, &backend, &mut surface, now);
        match outcome {
            CycleOutcome::TransientFailure { consecutive, .. } => assert_eq!(consecutive, i),
            other => panic!("expected transient failure, got {:?}", other),
        }
        assert_eq!(surface.commands(), rendered.as_slice());
        assert!(detection.is_running());
    }

    // A success resets the counter, so five more failures are still tolerated.
    let outcome = detection.run_cycle(
        &BackendState::Ready,
        &mut source,
        &backend,
        &mut surface,
        t0 + Duration::from_millis(200),
    );
    assert_eq!(outcome, CycleOutcome::Rendered { predictions: 1 });
    assert_eq!(detection.session().consecutive_failures, 0);
    assert_eq!(surface.labels(), vec!["book 50%"]);

    for i in 1..=5u64 {
        let outcome = detection.run_cycle(
            &BackendState::Ready,
            &mut source,
            &backend,
            &mut surface,
            t0 + Duration::from_millis(200 + 20 * i),
        );
        assert!(matches!(outcome, CycleOutcome::TransientFailure { .. }));
    }
    assert!(detection.is_running());
}

#[test]
fn sixth_consecutive_failure_stops_the_session() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED);
    backend.push_failures(6);
    let mut source = small_source(0);
    let mut surface = DrawList::new();
    let t0 = Instant::now();

    let mut last = CycleOutcome::Halted;
    for i in 0..6u64 {
        last = detection.run_cycle(
            &BackendState::Ready,
            &mut source,
            &backend,
            &mut surface,
            t0 + Duration::from_millis(20 * i),
        );
    }

    match &last {
        CycleOutcome::Fatal { message } => {
            assert!(message.contains("6 times"), "{}", message);
            assert!(message.contains("timeout #6"), "{}", message);
        }
        other => panic!("expected fatal outcome, got {:?}", other),
    }
    assert_eq!(last.schedule(), Schedule::Idle);
    assert!(!detection.is_running());

    // A stopped session issues no further requests.
    let outcome = detection.run_cycle(
        &BackendState::Ready,
        &mut source,
        &backend,
        &mut surface,
        t0 + Duration::from_secs(1),
    );
    assert_eq!(outcome, CycleOutcome::Halted);
    assert_eq!(backend.detect_calls.get(), 6);
}

#[test]
fn stop_during_request_discards_its_result() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED).raising_on_detect(stop.clone());
    backend.push_detect(Ok(book_and_laptop()));
    let mut source = small_source(0);
    let mut surface = DrawList::new();

    let outcome = detection.run_cycle(
        &BackendState::Ready,
        &mut source,
        &backend,
        &mut surface,
        Instant::now(),
    );

    assert_eq!(outcome, CycleOutcome::Halted);
    assert_eq!(backend.detect_calls.get(), 1);
    assert!(surface.commands().is_empty());
    assert!(detection.metrics().class_counts.is_empty());
    assert!(!detection.is_running());
}

#[test]
fn warming_up_source_sends_nothing() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED);
    backend.push_detect(Ok(Vec::new()));
    let mut source = small_source(2);
    let mut surface = DrawList::new();
    let t0 = Instant::now();

    for i in 0..2u64 {
        let outcome = detection.run_cycle(
            &BackendState::Ready,
            &mut source,
            &backend,
            &mut surface,
            t0 + Duration::from_millis(16 * i),
        );
        assert_eq!(outcome, CycleOutcome::NoFrame);
        assert_eq!(outcome.schedule(), Schedule::NextFrame);
    }
    assert_eq!(backend.detect_calls.get(), 0);

    let outcome = detection.run_cycle(
        &BackendState::Ready,
        &mut source,
        &backend,
        &mut surface,
        t0 + Duration::from_millis(48),
    );
    assert_eq!(outcome, CycleOutcome::Rendered { predictions: 0 });
    // An empty prediction set still clears the overlay.
    assert_eq!(surface.commands().len(), 1);
}

#[test]
fn fps_comes_from_consecutive_frames() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED);
    for _ in 0..3 {
        backend.push_detect(Ok(vec![pred("book", 0.9, 1.0, 1.0, 4.0, 4.0)]));
    }
    let mut source = small_source(0);
    let mut surface = DrawList::new();
    let t0 = Instant::now();

    detection.run_cycle(&BackendState::Ready, &mut source, &backend, &mut surface, t0);
    assert_eq!(detection.metrics().fps, 0);

    let t1 = t0 + Duration::from_millis(50);
    detection.run_cycle(&BackendState::Ready, &mut source, &backend, &mut surface, t1);
    assert_eq!(detection.metrics().fps, 20);

    // Zero elapsed time keeps the previous rate.
    detection.run_cycle(&BackendState::Ready, &mut source, &backend, &mut surface, t1);
    assert_eq!(detection.metrics().fps, 20);
    assert_eq!(detection.metrics().count("book"), 1);
}

#[test]
fn backend_not_ready_halts_without_capture() {
    let stop = StopSignal::new();
    let mut detection = started_loop(&stop);
    let backend = ScriptedBackend::new(LOADED);
    let mut source = small_source(0);
    let mut surface = DrawList::new();

    for state in [
        BackendState::Connecting,
        BackendState::ModelLoading,
        BackendState::Error("down".to_string()),
    ] {
        let outcome =
            detection.run_cycle(&state, &mut source, &backend, &mut surface, Instant::now());
        assert_eq!(outcome, CycleOutcome::Halted);
    }
    assert_eq!(source.frames_captured(), 0);
    assert_eq!(backend.detect_calls.get(), 0);
}
