//! County record types before and after validation.

use serde::{Deserialize, Serialize};

/// A county as supplied by an upstream collaborator, before validation.
///
/// Every field is optional so that missing values surface as validation
/// violations rather than deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCountyRecord {
    pub county_name: Option<String>,
    pub population: Option<f64>,
    pub hospitals: Option<f64>,
    pub schools: Option<f64>,
    /// Blackouts per month.
    pub blackout_freq: Option<f64>,
    /// Economic activity index (0–100).
    pub economic_activity: Option<f64>,
    /// Distance to the nearest grid connection (km).
    pub grid_distance: Option<f64>,
    /// Current energy supply (kWh).
    pub current_kwh: Option<f64>,
    /// Mean daily irradiance (kWh/m²/day).
    pub solar_irradiance: Option<f64>,
    /// Mean wind speed (m/s).
    pub avg_wind_speed: Option<f64>,
    /// Land available for generation (km²).
    pub land_availability: Option<f64>,
    /// Residents per km².
    pub population_density: Option<f64>,
}

/// A validated county. Produced only by [`super::validate_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyRecord {
    /// Display name, trimmed.
    pub county_name: String,
    pub population: u64,
    pub hospitals: u64,
    pub schools: u64,
    pub blackout_freq: f64,
    pub economic_activity: f64,
    pub grid_distance: f64,
    pub current_kwh: f64,
    pub solar_irradiance: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    pub land_availability: Option<f64>,
    pub population_density: Option<f64>,
}

impl CountyRecord {
    /// Case-folded identity used for uniqueness, ordering and cache keys.
    pub fn identity(&self) -> String {
        self.county_name.trim().to_lowercase()
    }
}

impl From<&CountyRecord> for RawCountyRecord {
    fn from(r: &CountyRecord) -> Self {
        Self {
            county_name: Some(r.county_name.clone()),
            population: Some(r.population as f64),
            hospitals: Some(r.hospitals as f64),
            schools: Some(r.schools as f64),
            blackout_freq: Some(r.blackout_freq),
            economic_activity: Some(r.economic_activity),
            grid_distance: Some(r.grid_distance),
            current_kwh: Some(r.current_kwh),
            solar_irradiance: r.solar_irradiance,
            avg_wind_speed: r.avg_wind_speed,
            land_availability: r.land_availability,
            population_density: r.population_density,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_deserializes_with_missing_fields() {
        let raw: RawCountyRecord = toml::from_str(
            r#"
county_name = "Turkana"
population = 926976.0
"#,
        )
        .expect("partial record should parse");
        assert_eq!(raw.county_name.as_deref(), Some("Turkana"));
        assert_eq!(raw.population, Some(926_976.0));
        assert!(raw.current_kwh.is_none());
    }

    #[test]
    fn identity_is_case_folded_and_trimmed() {
        let record = CountyRecord {
            county_name: "  Kisumu ".to_string(),
            population: 1,
            hospitals: 0,
            schools: 0,
            blackout_freq: 0.0,
            economic_activity: 0.0,
            grid_distance: 0.0,
            current_kwh: 0.0,
            solar_irradiance: None,
            avg_wind_speed: None,
            land_availability: None,
            population_density: None,
        };
        assert_eq!(record.identity(), "kisumu");
    }
}
