//! Integration tests for the train → prioritise pipeline.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use county_priority::recommend::Bucket;
use county_priority::{PlannerError, RawCountyRecord};

/// Five near-grid towns plus one remote, populous county.
fn remote_batch() -> Vec<RawCountyRecord> {
    let mut batch: Vec<RawCountyRecord> = (0..5u32)
        .map(|i| {
            common::county(
                &format!("Town{i}"),
                40_000.0 + 5_000.0 * f64::from(i),
                1.0,
                8.0,
                4.0,
                45.0,
                5.0,
                50_000.0,
            )
        })
        .collect();
    batch.push(common::county(
        "Remote", 800_000.0, 5.0, 40.0, 20.0, 20.0, 40.0, 1_000.0,
    ));
    batch
}

#[test]
fn untrained_service_refuses_to_prioritise() {
    let svc = common::service(common::fast_config());
    let err = svc.prioritize(&common::kenya_batch(), true).unwrap_err();
    assert!(matches!(err, PlannerError::UntrainedModel));
}

#[test]
fn invalid_batch_is_rejected_before_model_check() {
    let svc = common::service(common::fast_config());
    let mut batch = common::kenya_batch();
    batch[0].population = Some(-1.0);
    let err = svc.prioritize(&batch, true).unwrap_err();
    assert!(matches!(err, PlannerError::Validation(_)));
}

#[test]
fn duplicate_names_differing_in_case_are_rejected() {
    let svc = common::trained_service();
    let mut batch = common::kenya_batch();
    let mut twin = batch[0].clone();
    twin.county_name = Some("  NAIROBI ".to_string());
    batch.push(twin);
    match svc.prioritize(&batch, true) {
        Err(PlannerError::Validation(e)) => {
            assert!(e.violations.iter().any(|v| v.contains("duplicate")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn every_violation_is_reported() {
    let svc = common::trained_service();
    let mut batch = common::kenya_batch();
    batch[1].grid_distance = Some(-3.0);
    batch[4].economic_activity = Some(140.0);
    batch[7].current_kwh = None;
    match svc.prioritize(&batch, true) {
        Err(PlannerError::Validation(e)) => assert_eq!(e.violations.len(), 3),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn oversized_counts_are_rejected_not_wrapped() {
    let svc = common::service(common::fast_config());
    let batch = vec![
        common::county("A", 1_000.0, 1e19, 1e19, 3.0, 40.0, 5.0, 100.0),
        common::county("B", 1_000.0, 1.0, 1.0, 3.0, 40.0, 5.0, 100.0),
    ];
    match svc.train(&batch) {
        Err(PlannerError::Validation(e)) => assert_eq!(e.violations.len(), 2),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn counts_at_exact_integer_limit_train_and_score() {
    let limit = 9_007_199_254_740_992.0;
    let svc = common::service(common::fast_config());
    let batch = vec![
        common::county("A", 1_000.0, limit, limit, 3.0, 40.0, 5.0, 100.0),
        common::county("B", 1_000.0, 1.0, 1.0, 3.0, 40.0, 25.0, 100.0),
        common::county("C", 5_000.0, 2.0, 9.0, 8.0, 60.0, 40.0, 100.0),
    ];
    svc.train(&batch).expect("train");
    let report = svc.prioritize(&batch, false).expect("prioritise").report;
    for c in &report.counties {
        assert!(c.energy_deficit.is_finite());
        assert!(c.priority_score.is_finite());
    }
}

#[test]
fn report_covers_whole_batch() {
    let svc = common::trained_service();
    let report = svc
        .prioritize(&common::kenya_batch(), true)
        .expect("prioritise")
        .report;

    assert_eq!(report.counties.len(), 12);
    assert_eq!(report.top_counties.len(), 10);
    assert_eq!(report.summary_stats.total_counties, 12);
    assert_eq!(report.recommendations.len(), Bucket::ALL.len());
    assert_eq!(report.model_version, "1.0.0");
    assert!(
        report
            .top_counties
            .windows(2)
            .all(|w| w[0].priority_score >= w[1].priority_score)
    );
    for c in &report.counties {
        assert!(c.energy_deficit >= 0.0);
        assert!(c.cluster_id < 3);
        assert!(c.priority_score.is_finite());
    }
    let clustered: usize = report.summary_stats.cluster_distribution.values().sum();
    assert_eq!(clustered, 12);
}

#[test]
fn counties_come_back_in_canonical_order() {
    let svc = common::trained_service();
    let report = svc
        .prioritize(&common::kenya_batch(), false)
        .expect("prioritise")
        .report;
    let names: Vec<String> = report
        .counties
        .iter()
        .map(|c| c.county_name.to_lowercase())
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn near_grid_counties_are_grid_extension() {
    let svc = common::trained_service();
    let batch = common::kenya_batch();
    let report = svc.prioritize(&batch, true).expect("prioritise").report;
    for raw in &batch {
        let name = raw.county_name.as_deref().expect("name");
        let result = report.county(name).expect("county in report");
        let near = raw.grid_distance.expect("distance") <= 10.0;
        assert_eq!(result.buckets.contains(&Bucket::GridExtension), near, "{name}");
    }
}

#[test]
fn remote_county_above_median_deficit_is_solar_minigrid() {
    let svc = common::trained_service();
    let report = svc
        .prioritize(&remote_batch(), true)
        .expect("prioritise")
        .report;
    let remote = report.county("Remote").expect("remote");
    assert!(remote.buckets.contains(&Bucket::SolarMinigrid));
    assert!(!remote.buckets.contains(&Bucket::GridExtension));
    assert!(report.bucket(Bucket::GridExtension).len() == 5);
    assert_eq!(report.bucket(Bucket::SolarMinigrid), ["Remote"]);
}

#[test]
fn identical_training_is_reproducible() {
    let a = common::service(common::fast_config());
    let b = common::service(common::fast_config());
    let ma = a.train(&common::kenya_batch()).expect("train a");
    let mb = b.train(&common::kenya_batch()).expect("train b");
    assert_eq!(ma.feature_importance, mb.feature_importance);
    assert_eq!(ma.train_r2, mb.train_r2);
    assert_eq!(ma.test_r2, mb.test_r2);
    assert_eq!(ma.cv_mean, mb.cv_mean);

    let ra = a.prioritize(&common::kenya_batch(), false).expect("a").report;
    let rb = b.prioritize(&common::kenya_batch(), false).expect("b").report;
    assert_eq!(ra.counties, rb.counties);
}

#[test]
fn training_metrics_are_sane() {
    let svc = common::service(common::fast_config());
    let metrics = svc.train(&common::kenya_batch()).expect("train");
    assert_eq!(metrics.test_samples, 3);
    assert_eq!(metrics.training_samples, 9);
    assert!(metrics.cv_meaningful);
    assert_eq!(metrics.cv_folds, 5);
    let total: f64 = metrics.feature_importance.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(metrics.rmse >= 0.0);
}

#[test]
fn tiny_batches_flag_cross_validation() {
    let svc = common::service(common::fast_config());
    let batch: Vec<RawCountyRecord> = common::kenya_batch().into_iter().take(3).collect();
    let metrics = svc.train(&batch).expect("train");
    assert!(!metrics.cv_meaningful);
    assert_eq!(metrics.cv_mean, 0.0);
    assert_eq!(metrics.cv_std, 0.0);

    let report = svc.prioritize(&batch, true).expect("prioritise").report;
    assert_eq!(report.summary_stats.cluster_distribution.len(), 3);
}

#[test]
fn cache_returns_identical_payload_within_ttl() {
    let svc = common::trained_service();
    let first = svc.prioritize(&common::kenya_batch(), true).expect("first");
    assert!(!first.cache_hit);

    let mut shuffled = common::kenya_batch();
    shuffled.reverse();
    let second = svc.prioritize(&shuffled, true).expect("second");
    assert!(second.cache_hit);
    assert!(Arc::ptr_eq(&first.report, &second.report));

    let stats = svc.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.predictions, 12);
}

#[test]
fn expired_cache_entry_is_recomputed() {
    let svc = common::trained_service();
    let first = svc.prioritize(&common::kenya_batch(), true).expect("first");
    let removed = svc
        .cache()
        .sweep_expired_at(Utc::now() + Duration::minutes(31));
    assert_eq!(removed, 1);

    let second = svc.prioritize(&common::kenya_batch(), true).expect("second");
    assert!(!second.cache_hit);
    assert!(!Arc::ptr_eq(&first.report, &second.report));
    assert_eq!(first.report.counties, second.report.counties);
}

#[test]
fn opting_out_of_cache_always_recomputes() {
    let svc = common::trained_service();
    let a = svc.prioritize(&common::kenya_batch(), false).expect("a");
    let b = svc.prioritize(&common::kenya_batch(), false).expect("b");
    assert!(!a.cache_hit && !b.cache_hit);
    assert!(svc.cache().is_empty());
}

#[test]
fn clear_cache_forces_recompute() {
    let svc = common::trained_service();
    svc.prioritize(&common::kenya_batch(), true).expect("first");
    svc.clear_cache();
    let again = svc.prioritize(&common::kenya_batch(), true).expect("again");
    assert!(!again.cache_hit);
}

#[test]
fn snapshot_survives_retraining() {
    let svc = common::trained_service();
    let before = svc.current_model().expect("model");
    let records = county_priority::county::validate_batch(&common::kenya_batch()).expect("valid");
    let scores_before = before.score(&records).expect("score");

    svc.train(&remote_batch()).expect("retrain");
    let after = svc.current_model().expect("model");
    assert_eq!(before.generation(), 1);
    assert_eq!(after.generation(), 2);
    assert_eq!(before.score(&records).expect("score"), scores_before);
}

#[test]
fn model_info_and_stats_track_lifecycle() {
    let svc = common::service(common::fast_config());
    let info = svc.model_info();
    assert!(!info.is_trained);
    assert!(info.version.is_none());

    svc.train(&common::kenya_batch()).expect("train");
    svc.prioritize(&common::kenya_batch(), true).expect("prioritise");
    let info = svc.model_info();
    assert!(info.is_trained);
    assert_eq!(info.generation, 1);
    assert_eq!(info.feature_columns.len(), 7);
    assert_eq!(info.cache.entries, 1);
    assert_eq!(info.cache.valid_entries, 1);

    let stats = svc.stats();
    assert_eq!(stats.trainings_completed, 1);
    assert!(stats.last_training.is_some());
}
