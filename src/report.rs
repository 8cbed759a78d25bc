//! Per-county results and the batch priority report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::metrics::{mean, population_std};
use crate::recommend::Bucket;

/// Model output for one county.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityResult {
    pub county_name: String,
    /// Urgency on the standardised deficit scale; higher is more urgent.
    pub priority_score: f64,
    /// Descriptive segment id. Not used for ranking.
    pub cluster_id: usize,
    /// Unmet energy need (kWh), never negative.
    pub energy_deficit: f64,
    pub buckets: BTreeSet<Bucket>,
}

/// Aggregate statistics over one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_counties: usize,
    pub average_priority_score: f64,
    /// Counties scoring above mean + one population standard deviation.
    pub high_priority_count: usize,
    /// `cluster_<i>` to county count, for every configured cluster.
    pub cluster_distribution: BTreeMap<String, usize>,
}

impl SummaryStats {
    pub fn from_results(results: &[PriorityResult], n_clusters: usize) -> Self {
        let scores: Vec<f64> = results.iter().map(|r| r.priority_score).collect();
        let avg = mean(&scores);
        let cutoff = avg + population_std(&scores);

        let mut cluster_distribution: BTreeMap<String, usize> =
            (0..n_clusters).map(|i| (format!("cluster_{i}"), 0)).collect();
        for r in results {
            *cluster_distribution
                .entry(format!("cluster_{}", r.cluster_id))
                .or_default() += 1;
        }

        Self {
            total_counties: results.len(),
            average_priority_score: avg,
            high_priority_count: scores.iter().filter(|&&s| s > cutoff).count(),
            cluster_distribution,
        }
    }
}

/// Result of prioritising one batch.
///
/// Bucket membership is relative to this batch; see [`crate::recommend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityReport {
    /// County names per bucket, in canonical batch order. Every bucket is present.
    pub recommendations: BTreeMap<Bucket, Vec<String>>,
    /// Highest scores first, at most `top_counties_count` entries.
    pub top_counties: Vec<PriorityResult>,
    /// Every county, in canonical batch order.
    pub counties: Vec<PriorityResult>,
    pub summary_stats: SummaryStats,
    pub generated_at: DateTime<Utc>,
    pub model_version: String,
}

impl PriorityReport {
    /// Assembles a report from per-county results.
    ///
    /// Ties in the ranking keep canonical order.
    pub fn build(
        counties: Vec<PriorityResult>,
        top_n: usize,
        n_clusters: usize,
        model_version: &str,
    ) -> Self {
        let mut recommendations: BTreeMap<Bucket, Vec<String>> =
            Bucket::ALL.iter().map(|&b| (b, Vec::new())).collect();
        for c in &counties {
            for b in &c.buckets {
                recommendations
                    .entry(*b)
                    .or_default()
                    .push(c.county_name.clone());
            }
        }

        let mut top_counties = counties.clone();
        top_counties.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        top_counties.truncate(top_n);

        Self {
            recommendations,
            top_counties,
            summary_stats: SummaryStats::from_results(&counties, n_clusters),
            counties,
            generated_at: Utc::now(),
            model_version: model_version.to_string(),
        }
    }

    /// Counties recommended for `bucket`.
    pub fn bucket(&self, bucket: Bucket) -> &[String] {
        self.recommendations
            .get(&bucket)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn county(&self, name: &str) -> Option<&PriorityResult> {
        let key = name.trim().to_lowercase();
        self.counties
            .iter()
            .find(|c| c.county_name.to_lowercase() == key)
    }
}

impl fmt::Display for PriorityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary_stats;
        writeln!(f, "--- Priority Report (model {}) ---", self.model_version)?;
        writeln!(f, "Counties:           {}", s.total_counties)?;
        writeln!(f, "Average score:      {:.3}", s.average_priority_score)?;
        writeln!(f, "High priority:      {}", s.high_priority_count)?;
        let clusters: Vec<String> = s
            .cluster_distribution
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        writeln!(f, "Clusters:           {}", clusters.join(", "))?;
        writeln!(f, "Top counties:")?;
        for (rank, c) in self.top_counties.iter().enumerate() {
            writeln!(
                f,
                "  {:>2}. {:<16} score {:>7.3}  deficit {:>14.0} kWh  cluster {}",
                rank + 1,
                c.county_name,
                c.priority_score,
                c.energy_deficit,
                c.cluster_id
            )?;
        }
        write!(f, "Recommendations:")?;
        for (bucket, names) in &self.recommendations {
            write!(f, "\n  {:<24} {}", bucket.as_str(), names.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, score: f64, cluster: usize, buckets: &[Bucket]) -> PriorityResult {
        PriorityResult {
            county_name: name.to_string(),
            priority_score: score,
            cluster_id: cluster,
            energy_deficit: 1_000.0,
            buckets: buckets.iter().copied().collect(),
        }
    }

    fn sample() -> Vec<PriorityResult> {
        vec![
            result("Embu", 0.1, 0, &[Bucket::GridExtension]),
            result("Garissa", 2.5, 1, &[Bucket::SolarMinigrid, Bucket::ImmediateIntervention]),
            result("Kitui", -0.4, 0, &[]),
            result("Meru", 0.1, 0, &[Bucket::GridExtension]),
        ]
    }

    #[test]
    fn every_bucket_listed_even_when_empty() {
        let report = PriorityReport::build(sample(), 10, 3, "1.0.0");
        assert_eq!(report.recommendations.len(), 4);
        assert!(report.bucket(Bucket::HybridSolution).is_empty());
        assert_eq!(report.bucket(Bucket::GridExtension), ["Embu", "Meru"]);
    }

    #[test]
    fn top_counties_sorted_and_truncated() {
        let report = PriorityReport::build(sample(), 3, 3, "1.0.0");
        let names: Vec<&str> = report
            .top_counties
            .iter()
            .map(|c| c.county_name.as_str())
            .collect();
        // equal scores keep canonical order
        assert_eq!(names, ["Garissa", "Embu", "Meru"]);
        assert_eq!(report.counties.len(), 4);
    }

    #[test]
    fn summary_counts_outliers_and_all_clusters() {
        let stats = SummaryStats::from_results(&sample(), 3);
        assert_eq!(stats.total_counties, 4);
        assert!((stats.average_priority_score - 0.575).abs() < 1e-12);
        assert_eq!(stats.high_priority_count, 1);
        assert_eq!(stats.cluster_distribution["cluster_0"], 3);
        assert_eq!(stats.cluster_distribution["cluster_1"], 1);
        assert_eq!(stats.cluster_distribution["cluster_2"], 0);
    }

    #[test]
    fn county_lookup_ignores_case() {
        let report = PriorityReport::build(sample(), 10, 3, "1.0.0");
        assert_eq!(report.county(" GARISSA ").map(|c| c.cluster_id), Some(1));
        assert!(report.county("Nyeri").is_none());
    }

    #[test]
    fn display_lists_ranked_counties() {
        let text = PriorityReport::build(sample(), 2, 3, "1.0.0").to_string();
        assert!(text.contains("model 1.0.0"));
        assert!(text.contains(" 1. Garissa"));
        assert!(text.contains("solar_minigrid"));
    }
}
