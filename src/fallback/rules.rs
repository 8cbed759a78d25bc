//! The built-in siting rules, in evaluation order.

use super::types::{RULE_ENGINE_SOURCE, RuleRecommendation, SitingInput, SitingRule, Solution};

fn recommendation(
    solution: Solution,
    confidence: f64,
    reason: &str,
    estimated_cost: u64,
    roi_years: f64,
) -> RuleRecommendation {
    RuleRecommendation {
        solution,
        confidence,
        reason: reason.to_string(),
        estimated_cost,
        roi_years,
        source: RULE_ENGINE_SOURCE.to_string(),
    }
}

/// Strong irradiance, free land, sparse population.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolarRule;

impl SitingRule for SolarRule {
    fn evaluate(&self, input: &SitingInput) -> Option<RuleRecommendation> {
        (input.solar() > 4.5 && input.land() > 2.0 && input.density() < 500.0).then(|| {
            recommendation(
                Solution::SolarFarm,
                0.85,
                "High solar potential with available land",
                2_500_000,
                5.2,
            )
        })
    }

    fn rule_name(&self) -> &'static str {
        "solar"
    }
}

/// Steady wind, plenty of land, very sparse population.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindRule;

impl SitingRule for WindRule {
    fn evaluate(&self, input: &SitingInput) -> Option<RuleRecommendation> {
        (input.wind() > 5.5 && input.land() > 5.0 && input.density() < 200.0).then(|| {
            recommendation(
                Solution::WindFarm,
                0.78,
                "Suitable wind conditions and land availability",
                4_500_000,
                6.8,
            )
        })
    }

    fn rule_name(&self) -> &'static str {
        "wind"
    }
}

/// Moderate sun and wind with enough demand to justify both.
#[derive(Debug, Default, Clone, Copy)]
pub struct HybridRule;

impl SitingRule for HybridRule {
    fn evaluate(&self, input: &SitingInput) -> Option<RuleRecommendation> {
        (input.solar() > 3.5 && input.wind() > 4.0 && input.demand() > 10_000.0).then(|| {
            recommendation(
                Solution::HybridSolarWind,
                0.82,
                "Good potential for hybrid renewable solution",
                3_500_000,
                5.8,
            )
        })
    }

    fn rule_name(&self) -> &'static str {
        "hybrid"
    }
}

/// Terminal rule; always matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridExtensionRule;

impl GridExtensionRule {
    pub fn recommend(&self) -> RuleRecommendation {
        recommendation(
            Solution::GridExtension,
            0.65,
            "Standard grid extension recommended",
            1_800_000,
            7.5,
        )
    }
}

impl SitingRule for GridExtensionRule {
    fn evaluate(&self, _input: &SitingInput) -> Option<RuleRecommendation> {
        Some(self.recommend())
    }

    fn rule_name(&self) -> &'static str {
        "grid_extension"
    }
}
