//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::path::Path;

use county_priority::io::counties::load_batch;
use county_priority::{PlannerConfig, PlannerService, RawCountyRecord};

/// Raw county with every required field set and no siting attributes.
#[expect(clippy::too_many_arguments)]
pub fn county(
    name: &str,
    population: f64,
    hospitals: f64,
    schools: f64,
    blackout_freq: f64,
    economic_activity: f64,
    grid_distance: f64,
    current_kwh: f64,
) -> RawCountyRecord {
    RawCountyRecord {
        county_name: Some(name.to_string()),
        population: Some(population),
        hospitals: Some(hospitals),
        schools: Some(schools),
        blackout_freq: Some(blackout_freq),
        economic_activity: Some(economic_activity),
        grid_distance: Some(grid_distance),
        current_kwh: Some(current_kwh),
        ..RawCountyRecord::default()
    }
}

/// The twelve-county batch shipped in `scenarios/kenya.toml`.
pub fn kenya_batch() -> Vec<RawCountyRecord> {
    load_batch(Path::new("scenarios/kenya.toml")).expect("scenario batch should load")
}

/// Defaults with a small forest so tests stay fast.
pub fn fast_config() -> PlannerConfig {
    let mut cfg = PlannerConfig::default();
    cfg.model.n_estimators = 20;
    cfg
}

/// Defaults with a forest large enough that training takes a while.
pub fn slow_config() -> PlannerConfig {
    let mut cfg = PlannerConfig::default();
    cfg.model.n_estimators = 4_000;
    cfg
}

pub fn service(config: PlannerConfig) -> PlannerService {
    PlannerService::new(config).expect("config should be valid")
}

/// A service already trained on [`kenya_batch`].
pub fn trained_service() -> PlannerService {
    let svc = service(fast_config());
    svc.train(&kenya_batch()).expect("training should succeed");
    svc
}
