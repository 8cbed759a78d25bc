//! Inputs, outputs and the rule trait of the fallback engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::county::{CountyRecord, total_energy_need};

/// Siting attributes of a single county. Missing values count as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitingInput {
    pub county_name: Option<String>,
    /// Mean daily irradiance (kWh/m²/day).
    pub solar_irradiance: Option<f64>,
    /// Mean wind speed (m/s).
    pub avg_wind_speed: Option<f64>,
    /// Land available for generation (km²).
    pub land_availability: Option<f64>,
    /// Residents per km².
    pub population_density: Option<f64>,
    /// Energy demand (kWh).
    pub energy_demand: Option<f64>,
}

impl SitingInput {
    /// Siting view of a validated county; demand is its total energy need.
    pub fn from_county(record: &CountyRecord, energy_per_capita: f64) -> Self {
        Self {
            county_name: Some(record.county_name.clone()),
            solar_irradiance: record.solar_irradiance,
            avg_wind_speed: record.avg_wind_speed,
            land_availability: record.land_availability,
            population_density: record.population_density,
            energy_demand: Some(total_energy_need(record, energy_per_capita)),
        }
    }

    pub fn solar(&self) -> f64 {
        self.solar_irradiance.unwrap_or(0.0)
    }

    pub fn wind(&self) -> f64 {
        self.avg_wind_speed.unwrap_or(0.0)
    }

    pub fn land(&self) -> f64 {
        self.land_availability.unwrap_or(0.0)
    }

    pub fn density(&self) -> f64 {
        self.population_density.unwrap_or(0.0)
    }

    pub fn demand(&self) -> f64 {
        self.energy_demand.unwrap_or(0.0)
    }
}

/// Technology proposed by the fallback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solution {
    SolarFarm,
    WindFarm,
    HybridSolarWind,
    GridExtension,
}

impl Solution {
    pub fn as_str(self) -> &'static str {
        match self {
            Solution::SolarFarm => "solar_farm",
            Solution::WindFarm => "wind_farm",
            Solution::HybridSolarWind => "hybrid_solar_wind",
            Solution::GridExtension => "grid_extension",
        }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source tag carried by every rule-engine result.
pub const RULE_ENGINE_SOURCE: &str = "rule_engine";

/// Fixed-constant recommendation produced by one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecommendation {
    pub solution: Solution,
    pub confidence: f64,
    pub reason: String,
    /// Estimated capital cost.
    pub estimated_cost: u64,
    pub roi_years: f64,
    pub source: String,
}

impl fmt::Display for RuleRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (confidence {:.2}, cost {}, ROI {:.1} y): {}",
            self.solution, self.confidence, self.estimated_cost, self.roi_years, self.reason
        )
    }
}

/// One heuristic in the fallback chain.
pub trait SitingRule: Send + Sync {
    /// Returns a recommendation if this rule's condition holds.
    fn evaluate(&self, input: &SitingInput) -> Option<RuleRecommendation>;

    /// Short name used in logs.
    fn rule_name(&self) -> &'static str;
}
