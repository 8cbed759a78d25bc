use serde::{Deserialize, Serialize};

use super::types::CountyRecord;

/// Feature columns, in the order the scaler and models consume them.
pub const FEATURE_COLUMNS: [&str; 7] = [
    "population",
    "hospitals",
    "schools",
    "blackout_freq",
    "economic_activity",
    "grid_distance",
    "energy_deficit",
];

/// Index of `energy_deficit` within [`FEATURE_COLUMNS`].
pub const ENERGY_DEFICIT_COL: usize = 6;

/// Estimated total energy need of a county (kWh).
///
/// `population * energy_per_capita`, scaled up by one percent per hospital or
/// school and by the economic activity index.
pub fn total_energy_need(record: &CountyRecord, energy_per_capita: f64) -> f64 {
    let base_need = record.population as f64 * energy_per_capita;
    let facilities = record.hospitals as f64 + record.schools as f64;
    let infrastructure_multiplier = 1.0 + facilities / 100.0;
    let economic_multiplier = 1.0 + record.economic_activity / 100.0;
    base_need * infrastructure_multiplier * economic_multiplier
}

/// Shortfall between estimated need and current supply, clipped at zero.
pub fn energy_deficit(record: &CountyRecord, energy_per_capita: f64) -> f64 {
    (total_energy_need(record, energy_per_capita) - record.current_kwh).max(0.0)
}

/// Row-major numeric matrix with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Builds the raw (unscaled) feature matrix for a validated batch.
    pub fn from_records(records: &[CountyRecord], energy_per_capita: f64) -> Self {
        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.population as f64,
                    r.hospitals as f64,
                    r.schools as f64,
                    r.blackout_freq,
                    r.economic_activity,
                    r.grid_distance,
                    energy_deficit(r, energy_per_capita),
                ]
            })
            .collect();
        Self {
            columns: FEATURE_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Copies out one column.
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[idx]).collect()
    }
}
