use std::collections::HashMap;

use crate::error::ValidationError;

use super::types::{CountyRecord, RawCountyRecord};

/// Upper bound of the economic activity index.
const ECONOMIC_ACTIVITY_MAX: f64 = 100.0;

/// Largest count that converts to an integer without loss (2^53).
const COUNT_MAX: f64 = 9_007_199_254_740_992.0;

/// Validates a raw batch and returns it in canonical order.
///
/// Checks, for every record: all required fields are present, the name is not
/// blank, numeric fields are finite and non-negative, count fields are whole
/// numbers no larger than 2^53, and `economic_activity <= 100`. Names must be unique across the
/// batch, compared case-insensitively. On success the records are sorted by
/// case-folded name so that batch statistics and cache keys do not depend on
/// input order.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every violation if any check fails;
/// no partial batch is ever returned.
pub fn validate_batch(raw: &[RawCountyRecord]) -> Result<Vec<CountyRecord>, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError {
            violations: vec!["input data is empty".to_string()],
        });
    }

    let mut violations = Vec::new();
    let mut records = Vec::with_capacity(raw.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (idx, r) in raw.iter().enumerate() {
        let label = match r.county_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("record {idx} ({name})"),
            _ => format!("record {idx}"),
        };
        let before = violations.len();

        let name = match r.county_name.as_deref().map(str::trim) {
            None => {
                violations.push(format!("{label}: missing required field county_name"));
                None
            }
            Some("") => {
                violations.push(format!("{label}: county_name must not be blank"));
                None
            }
            Some(name) => Some(name.to_string()),
        };

        if let Some(name) = &name {
            let key = name.to_lowercase();
            if let Some(first) = seen.get(&key) {
                violations.push(format!(
                    "{label}: duplicate county name (first seen at record {first})"
                ));
            } else {
                seen.insert(key, idx);
            }
        }

        let mut check = |field: &str, value: Option<f64>, count: bool, max: Option<f64>| {
            let Some(v) = value else {
                violations.push(format!("{label}: missing required field {field}"));
                return None;
            };
            if !v.is_finite() {
                violations.push(format!("{label}: {field} must be a finite number"));
                return None;
            }
            if v < 0.0 {
                violations.push(format!("{label}: {field} must be >= 0, got {v}"));
                return None;
            }
            if let Some(max) = max.filter(|&m| v > m) {
                violations.push(format!("{label}: {field} must be <= {max}, got {v}"));
                return None;
            }
            if count && v.fract() != 0.0 {
                violations.push(format!("{label}: {field} must be a whole number, got {v}"));
                return None;
            }
            Some(v)
        };

        let population = check("population", r.population, true, Some(COUNT_MAX));
        let hospitals = check("hospitals", r.hospitals, true, Some(COUNT_MAX));
        let schools = check("schools", r.schools, true, Some(COUNT_MAX));
        let blackout_freq = check("blackout_freq", r.blackout_freq, false, None);
        let economic_activity = check(
            "economic_activity",
            r.economic_activity,
            false,
            Some(ECONOMIC_ACTIVITY_MAX),
        );
        let grid_distance = check("grid_distance", r.grid_distance, false, None);
        let current_kwh = check("current_kwh", r.current_kwh, false, None);

        let mut optional = |field: &str, value: Option<f64>| match value {
            Some(v) if !v.is_finite() || v < 0.0 => {
                violations.push(format!(
                    "{label}: {field} must be a finite number >= 0, got {v}"
                ));
                None
            }
            other => other,
        };
        let solar_irradiance = optional("solar_irradiance", r.solar_irradiance);
        let avg_wind_speed = optional("avg_wind_speed", r.avg_wind_speed);
        let land_availability = optional("land_availability", r.land_availability);
        let population_density = optional("population_density", r.population_density);

        if violations.len() > before {
            continue;
        }

        if let (
            Some(county_name),
            Some(population),
            Some(hospitals),
            Some(schools),
            Some(blackout_freq),
            Some(economic_activity),
            Some(grid_distance),
            Some(current_kwh),
        ) = (
            name,
            population,
            hospitals,
            schools,
            blackout_freq,
            economic_activity,
            grid_distance,
            current_kwh,
        ) {
            records.push(CountyRecord {
                county_name,
                population: population as u64,
                hospitals: hospitals as u64,
                schools: schools as u64,
                blackout_freq,
                economic_activity,
                grid_distance,
                current_kwh,
                solar_irradiance,
                avg_wind_speed,
                land_availability,
                population_density,
            });
        }
    }

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    records.sort_by_cached_key(CountyRecord::identity);
    Ok(records)
}
