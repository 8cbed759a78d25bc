//! Batch-relative technology buckets.
//!
//! Bucket membership depends on statistics of the surrounding batch (median
//! deficit, median economic activity, priority percentile), so the same county
//! may land in different buckets when scored alongside different neighbours.
//! The grid-distance-only rules (`grid_extension`) are batch independent.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RecommendationConfig;
use crate::model::metrics::{median, quantile};

/// Recommended technology category. A county may fall in several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    SolarMinigrid,
    GridExtension,
    HybridSolution,
    ImmediateIntervention,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::SolarMinigrid,
        Bucket::GridExtension,
        Bucket::HybridSolution,
        Bucket::ImmediateIntervention,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::SolarMinigrid => "solar_minigrid",
            Bucket::GridExtension => "grid_extension",
            Bucket::HybridSolution => "hybrid_solution",
            Bucket::ImmediateIntervention => "immediate_intervention",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-county values bucket assignment looks at.
#[derive(Debug, Clone, Copy)]
pub struct BucketInput {
    pub grid_distance: f64,
    pub energy_deficit: f64,
    pub economic_activity: f64,
    pub priority_score: f64,
}

/// Batch statistics the relative rules compare against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchThresholds {
    pub median_deficit: f64,
    pub median_activity: f64,
    /// Priority score at the configured percentile.
    pub priority_cutoff: f64,
}

impl BatchThresholds {
    pub fn from_batch(batch: &[BucketInput], cfg: &RecommendationConfig) -> Self {
        let deficits: Vec<f64> = batch.iter().map(|c| c.energy_deficit).collect();
        let activity: Vec<f64> = batch.iter().map(|c| c.economic_activity).collect();
        let scores: Vec<f64> = batch.iter().map(|c| c.priority_score).collect();
        Self {
            median_deficit: median(&deficits),
            median_activity: median(&activity),
            priority_cutoff: quantile(&scores, cfg.priority_percentile),
        }
    }

    /// Every bucket `county` qualifies for; buckets are tested independently.
    pub fn buckets_for(&self, county: &BucketInput, cfg: &RecommendationConfig) -> BTreeSet<Bucket> {
        let d = county.grid_distance;
        let mut out = BTreeSet::new();
        if d > cfg.solar_threshold_km && county.energy_deficit > self.median_deficit {
            out.insert(Bucket::SolarMinigrid);
        }
        if d <= cfg.grid_extension_threshold_km {
            out.insert(Bucket::GridExtension);
        }
        if d > cfg.hybrid_min_km
            && d <= cfg.hybrid_max_km
            && county.economic_activity > self.median_activity
        {
            out.insert(Bucket::HybridSolution);
        }
        if county.priority_score >= self.priority_cutoff {
            out.insert(Bucket::ImmediateIntervention);
        }
        out
    }
}

/// Buckets for each county of a batch, in input order.
pub fn assign_buckets(batch: &[BucketInput], cfg: &RecommendationConfig) -> Vec<BTreeSet<Bucket>> {
    let thresholds = BatchThresholds::from_batch(batch, cfg);
    batch.iter().map(|c| thresholds.buckets_for(c, cfg)).collect()
}
