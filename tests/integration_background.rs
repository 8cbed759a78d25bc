//! Integration tests for background and concurrent training.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use county_priority::{PlannerError, TrainingError};

#[tokio::test]
async fn background_training_installs_a_model() {
    let svc = Arc::new(common::service(common::fast_config()));
    let metrics = Arc::clone(&svc)
        .train_in_background(common::kenya_batch())
        .await
        .expect("training");
    assert_eq!(metrics.training_samples, 9);
    assert!(svc.is_trained());
    assert!(!svc.is_training());
}

#[tokio::test]
async fn background_training_validates_first() {
    let svc = Arc::new(common::service(common::fast_config()));
    let mut batch = common::kenya_batch();
    batch[2].schools = Some(12.5);
    let err = Arc::clone(&svc)
        .train_in_background(batch)
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Validation(_)));
    assert!(!svc.is_trained());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_training_keeps_previous_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.json");
    common::trained_service().save_model(&path).expect("save");

    let svc = Arc::new(common::service(common::slow_config()));
    svc.load_model(&path).expect("load");
    let before = svc.current_model().expect("model");

    let err = Arc::clone(&svc)
        .train_with_timeout(common::kenya_batch(), Duration::from_millis(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PlannerError::Training(TrainingError::TimedOut { .. })
    ));

    let after = svc.current_model().expect("model");
    assert!(Arc::ptr_eq(&before, &after));
    assert!(svc.prioritize(&common::kenya_batch(), true).is_ok());
}

#[test]
fn concurrent_training_is_rejected() {
    let svc = Arc::new(common::service(common::slow_config()));
    let worker = Arc::clone(&svc);
    let handle = thread::spawn(move || worker.train(&common::kenya_batch()));

    let deadline = Instant::now() + Duration::from_secs(10);
    while !svc.is_training() && !handle.is_finished() && Instant::now() < deadline {
        thread::yield_now();
    }

    if svc.is_training() {
        let err = svc.train(&common::kenya_batch()).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Training(TrainingError::InProgress)
        ));
    }

    let first = handle.join().expect("thread");
    assert!(first.is_ok());
    assert_eq!(svc.model_info().generation, 1);
}

#[test]
fn inference_proceeds_while_training_runs() {
    let svc = Arc::new(common::trained_service());
    let worker = Arc::clone(&svc);
    let handle = thread::spawn(move || worker.train(&common::kenya_batch()));

    for _ in 0..5 {
        let report = svc
            .prioritize(&common::kenya_batch(), false)
            .expect("prioritise during training");
        assert_eq!(report.report.counties.len(), 12);
    }
    handle.join().expect("thread").expect("training");
}
