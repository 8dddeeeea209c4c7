//! Late answers, timeouts and teardown
//!
//! Every adapter result carries the epoch that requested it; these tests
//! make sure an answer that arrives after the machine has moved on never
//! lands in the context.

use std::sync::Arc;
use std::time::Duration;

use libqrflow::adapters::{MockGenerator, MockValidator};
use libqrflow::config::TimingConfig;
use libqrflow::events::NotificationReceiver;
use libqrflow::{Context, EffectKind, InputKind, Notification, OptionsPatch, Orchestrator, State};
use tokio::sync::broadcast::error::TryRecvError;

fn spawn(validator: &MockValidator, generator: &MockGenerator) -> Orchestrator {
    Orchestrator::spawn(
        Context::fallback().with_auto_generate(false),
        TimingConfig::default(),
        Arc::new(validator.clone()),
        Arc::new(generator.clone()),
    )
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn dropped(receiver: &mut NotificationReceiver) -> Vec<EffectKind> {
    let mut effects = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(Notification::StaleResultDropped { effect }) => effects.push(effect),
            Ok(_) => continue,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    effects
}

#[tokio::test(start_paused = true)]
async fn test_superseded_validation_is_dropped() {
    let validator = MockValidator::valid().with_delay(Duration::from_millis(2000));
    let generator = MockGenerator::success();
    let orchestrator = spawn(&validator, &generator);
    let mut receiver = orchestrator.subscribe();

    // t=800: validation of A starts, answers at t=2800
    orchestrator.update_form("url", "https://first.example.com").unwrap();
    advance(801).await;
    assert_eq!(orchestrator.snapshot().state, State::Validating);

    // t=801: typing again; B is validated from t=1601 until t=3601
    orchestrator.update_form("url", "https://second.example.com").unwrap();
    advance(1000).await;
    assert_eq!(orchestrator.snapshot().state, State::Validating);

    // A's answer arrives while B is being validated
    advance(1000).await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Validating);
    assert!(snapshot.context.validation_result.is_none());
    assert_eq!(dropped(&mut receiver), vec![EffectKind::Validation]);

    advance(1000).await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Ready);
    assert_eq!(snapshot.context.last_validated_input, "https://second.example.com");
    assert_eq!(
        validator.candidates(),
        vec![
            "https://first.example.com".to_string(),
            "https://second.example.com".to_string()
        ]
    );

    orchestrator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_validation_in_ready_is_dropped() {
    let validator = MockValidator::invalid("unreachable").with_delay(Duration::from_millis(2000));
    let generator = MockGenerator::success();
    let orchestrator = spawn(&validator, &generator);
    let mut receiver = orchestrator.subscribe();

    orchestrator.update_form("url", "https://slow.example.com").unwrap();
    advance(801).await;
    assert_eq!(orchestrator.snapshot().state, State::Validating);

    // Leave validating through typing, then bypass the debounce
    orchestrator.update_form("url", "https://slow.example.com/a").unwrap();
    orchestrator
        .update_options(OptionsPatch {
            size: Some(500),
            ..Default::default()
        })
        .unwrap();
    advance(1).await;
    assert_eq!(orchestrator.snapshot().state, State::Ready);

    advance(3000).await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Ready);
    assert!(snapshot.context.validation_result.is_none());
    assert!(snapshot.context.last_validated_input.is_empty());
    assert_eq!(dropped(&mut receiver), vec![EffectKind::Validation]);

    orchestrator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_generation_is_dropped() {
    let validator = MockValidator::valid();
    let generator = MockGenerator::success().with_delay(Duration::from_millis(3000));
    let orchestrator = spawn(&validator, &generator);
    let mut receiver = orchestrator.subscribe();

    orchestrator.generate_now().unwrap();
    advance(1).await;
    assert!(orchestrator.is_loading());

    orchestrator.change_type(InputKind::Ean13).unwrap();
    advance(3000).await;

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Idle);
    assert_eq!(snapshot.context.input_kind, InputKind::Ean13);
    assert!(snapshot.context.artifact.is_none());
    assert!(!snapshot.context.has_generated_once);
    assert_eq!(generator.call_count(), 1);
    assert_eq!(dropped(&mut receiver), vec![EffectKind::Generation]);

    orchestrator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_generation_for_older_epoch_is_dropped() {
    let validator = MockValidator::valid();
    let generator = MockGenerator::success().with_delay(Duration::from_millis(1000));
    let orchestrator = spawn(&validator, &generator);

    // First generation is abandoned by a type change, then a second one
    // starts before the first answers
    orchestrator.generate_now().unwrap();
    advance(500).await;
    orchestrator.change_type(InputKind::Qrcode).unwrap();
    orchestrator.generate_now().unwrap();
    advance(600).await;

    // Only the first call has answered so far
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Generating);
    assert!(snapshot.context.artifact.is_none());

    advance(500).await;
    assert_eq!(orchestrator.snapshot().state, State::Complete);
    assert_eq!(generator.call_count(), 2);

    orchestrator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_validation_timeout() {
    let validator = MockValidator::valid().with_delay(Duration::from_secs(30));
    let generator = MockGenerator::success();
    let orchestrator = spawn(&validator, &generator);

    orchestrator.update_form("url", "https://hangs.example.com").unwrap();
    advance(801).await;
    assert_eq!(orchestrator.snapshot().state, State::Validating);

    advance(4998).await;
    assert_eq!(orchestrator.snapshot().state, State::Validating);

    advance(2).await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Ready);
    assert!(!snapshot.context.is_input_valid);
    let detail = snapshot.context.validation_result.unwrap().detail.unwrap();
    assert!(detail.contains("Timed out"));

    orchestrator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_generation_timeout() {
    let validator = MockValidator::valid();
    let generator = MockGenerator::success().with_delay(Duration::from_secs(60));
    let orchestrator = spawn(&validator, &generator);

    orchestrator.generate_now().unwrap();
    advance(9999).await;
    assert_eq!(orchestrator.snapshot().state, State::Generating);

    advance(2).await;
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, State::Error);
    assert!(snapshot.context.last_error.unwrap().contains("Timed out"));

    orchestrator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_timer() {
    let validator = MockValidator::valid();
    let generator = MockGenerator::success();
    let orchestrator = spawn(&validator, &generator);
    let watcher = orchestrator.watch();

    orchestrator.update_form("url", "https://example.com").unwrap();
    advance(100).await;
    orchestrator.shutdown().await;

    advance(5000).await;
    assert_eq!(validator.call_count(), 0);
    assert_eq!(watcher.borrow().state, State::Typing);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_inflight_call() {
    let validator = MockValidator::valid();
    let generator = MockGenerator::success().with_delay(Duration::from_millis(2000));
    let orchestrator = spawn(&validator, &generator);
    let watcher = orchestrator.watch();

    orchestrator.generate_now().unwrap();
    advance(100).await;
    assert_eq!(generator.call_count(), 1);
    orchestrator.shutdown().await;

    advance(5000).await;
    let snapshot = watcher.borrow().clone();
    assert_eq!(snapshot.state, State::Generating);
    assert!(snapshot.context.artifact.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_facade_stops_coordinator() {
    let validator = MockValidator::valid();
    let generator = MockGenerator::success();
    let orchestrator = spawn(&validator, &generator);
    let mut watcher = orchestrator.watch();

    orchestrator.update_form("url", "https://example.com").unwrap();
    advance(1).await;
    watcher.borrow_and_update();
    drop(orchestrator);

    // The sender side goes away with the coordinator task
    assert!(watcher.changed().await.is_err());

    advance(5000).await;
    assert_eq!(validator.call_count(), 0);
}
