//! Deterministic rule-based siting recommendations.
//!
//! Used when no trained model is available or the caller opts out of
//! statistical scoring. Never fails.

pub mod rules;
pub mod types;

pub use rules::{GridExtensionRule, HybridRule, SolarRule, WindRule};
pub use types::{RULE_ENGINE_SOURCE, RuleRecommendation, SitingInput, SitingRule, Solution};

use tracing::debug;

/// Ordered chain of siting rules ending in grid extension.
pub struct RuleEngine {
    rules: Vec<Box<dyn SitingRule>>,
    default: GridExtensionRule,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            rules: vec![Box::new(SolarRule), Box::new(WindRule), Box::new(HybridRule)],
            default: GridExtensionRule,
        }
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.rules.iter().map(|r| r.rule_name()).collect();
        f.debug_struct("RuleEngine").field("rules", &names).finish()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first matching rule's recommendation.
    ///
    /// Later rules are not evaluated once one matches; grid extension is
    /// returned when none do.
    pub fn recommend(&self, input: &SitingInput) -> RuleRecommendation {
        let county = input.county_name.as_deref().unwrap_or("<unnamed>");
        self.rules
            .iter()
            .find_map(|rule| {
                rule.evaluate(input).inspect(|rec| {
                    debug!(county, rule = rule.rule_name(), solution = %rec.solution, "rule matched");
                })
            })
            .unwrap_or_else(|| {
                debug!(county, rule = self.default.rule_name(), "no rule matched; using default");
                self.default.recommend()
            })
    }
}
