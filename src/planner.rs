//! The planner service: one current model generation, a result cache and
//! the rule engine behind a single shared object.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, CacheStatus, ResultCache};
use crate::config::{ConfigError, PlannerConfig};
use crate::county::{CountyRecord, RawCountyRecord, validate_batch};
use crate::error::{PlannerError, TrainingError};
use crate::fallback::{RuleEngine, RuleRecommendation, SitingInput};
use crate::io::bundle::{load_bundle, save_bundle};
use crate::model::{ModelState, TrainingMetrics};
use crate::recommend::{BatchThresholds, BucketInput};
use crate::report::{PriorityReport, PriorityResult};

/// Outcome of [`PlannerService::prioritize`].
#[derive(Debug, Clone)]
pub struct Prioritization {
    pub report: Arc<PriorityReport>,
    /// `true` when the report came from the cache.
    pub cache_hit: bool,
}

/// How [`PlannerService::recommend_single`] picks its scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecommendMode {
    /// Model when one is trained, rule engine otherwise.
    #[default]
    Auto,
    /// Always the rule engine.
    RulesOnly,
    /// Always the model; fails when untrained.
    ModelOnly,
}

/// Single-county answer from either scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scorer", rename_all = "snake_case")]
pub enum SingleRecommendation {
    /// Buckets are evaluated against a batch of one county.
    Model(PriorityResult),
    RuleEngine(RuleRecommendation),
}

/// Running counters kept by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    /// Counties scored by the model (cache hits excluded).
    pub predictions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub trainings_completed: u64,
    pub trainings_failed: u64,
    pub last_training: Option<TrainingMetrics>,
}

/// Description of the serving model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub is_trained: bool,
    pub version: Option<String>,
    pub generation: u64,
    pub last_trained: Option<DateTime<Utc>>,
    pub feature_columns: Vec<String>,
    /// Configuration the serving model was trained with.
    pub model_config: Option<PlannerConfig>,
    pub cache: CacheStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Trained,
    Untrained,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub model_version: Option<String>,
    pub last_trained: Option<DateTime<Utc>>,
}

/// Held while a training run is active; a second run fails fast.
struct TrainingSlot<'a>(&'a AtomicBool);

impl<'a> TrainingSlot<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, TrainingError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| TrainingError::InProgress)
    }
}

impl Drop for TrainingSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared planner.
///
/// Inference clones the current `Arc<ModelState>` under a short read lock and
/// never waits for training. Training builds a complete new state and swaps
/// the pointer only on success.
#[derive(Debug)]
pub struct PlannerService {
    config: PlannerConfig,
    current: RwLock<Option<Arc<ModelState>>>,
    generation: AtomicU64,
    training: AtomicBool,
    cache: ResultCache,
    rules: RuleEngine,
    stats: Mutex<ServiceStats>,
}

impl PlannerService {
    /// Creates an untrained service.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::config::ConfigError`] if `config` is invalid.
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        let errors = config.validate();
        for e in &errors {
            error!(field = %e.field, "{}", e.message);
        }
        if let Some(first) = errors.into_iter().next() {
            return Err(first.into());
        }
        let ttl = config
            .cache
            .ttl()
            .ok_or_else(|| ConfigError::new("cache.ttl_minutes", "is out of range"))?;
        let cache = ResultCache::new(ttl, config.cache.max_entries);
        info!(
            version = %config.model.version,
            n_estimators = config.model.n_estimators,
            n_clusters = config.clustering.n_clusters,
            cache_ttl_min = config.cache.ttl_minutes,
            "planner service created"
        );
        Ok(Self {
            config,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            training: AtomicBool::new(false),
            cache,
            rules: RuleEngine::new(),
            stats: Mutex::new(ServiceStats::default()),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Snapshot of the serving model, if any.
    pub fn current_model(&self) -> Option<Arc<ModelState>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_trained(&self) -> bool {
        self.current_model().is_some()
    }

    /// `true` while a training run holds the training slot.
    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    fn stats_mut(&self) -> std::sync::MutexGuard<'_, ServiceStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, state: ModelState) -> Arc<ModelState> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let state = Arc::new(state.with_generation(generation));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&state));
        self.cache.clear();
        info!(
            version = state.version(),
            generation,
            "model generation swapped in"
        );
        state
    }

    /// Trains on `raw` and swaps in the new model on success.
    ///
    /// Blocks the calling thread; see [`Self::train_in_background`] for the
    /// time-bounded variant.
    ///
    /// # Errors
    ///
    /// * [`PlannerError::Validation`] if the batch is rejected
    /// * [`PlannerError::Training`] if another run is active or fitting fails
    pub fn train(&self, raw: &[RawCountyRecord]) -> Result<TrainingMetrics, PlannerError> {
        let records = validate_batch(raw)?;
        let never = AtomicBool::new(false);
        Ok(self.train_validated(&records, &never)?)
    }

    /// Runs training and commits the result unless `claim` was taken first.
    ///
    /// `claim` doubles as the cancel flag polled by the forest: whoever flips
    /// it first decides whether the run commits or is abandoned.
    fn train_validated(
        &self,
        records: &[CountyRecord],
        claim: &AtomicBool,
    ) -> Result<TrainingMetrics, TrainingError> {
        let _slot = TrainingSlot::acquire(&self.training)?;
        info!(counties = records.len(), "model training started");

        let outcome = ModelState::train(records, &self.config, 0, claim).and_then(|trained| {
            claim
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .map(|_| trained)
                .map_err(|_| TrainingError::Cancelled)
        });

        match outcome {
            Ok((state, metrics)) => {
                self.install(state);
                let mut stats = self.stats_mut();
                stats.trainings_completed += 1;
                stats.last_training = Some(metrics.clone());
                Ok(metrics)
            }
            Err(e) => {
                warn!(error = %e, "model training failed; previous model kept");
                self.stats_mut().trainings_failed += 1;
                Err(e)
            }
        }
    }

    /// Trains on tokio's blocking pool, bounded by `[training] timeout_secs`.
    ///
    /// # Errors
    ///
    /// As [`Self::train`], plus [`TrainingError::TimedOut`] when the budget is
    /// exhausted. The previous model stays in service on any error.
    pub async fn train_in_background(
        self: Arc<Self>,
        raw: Vec<RawCountyRecord>,
    ) -> Result<TrainingMetrics, PlannerError> {
        let budget = Duration::from_secs(self.config.training.timeout_secs);
        self.train_with_timeout(raw, budget).await
    }

    /// [`Self::train_in_background`] with an explicit time budget.
    pub async fn train_with_timeout(
        self: Arc<Self>,
        raw: Vec<RawCountyRecord>,
        budget: Duration,
    ) -> Result<TrainingMetrics, PlannerError> {
        let records = validate_batch(&raw)?;
        let claim = Arc::new(AtomicBool::new(false));
        let worker = Arc::clone(&self);
        let worker_claim = Arc::clone(&claim);
        let mut handle =
            tokio::task::spawn_blocking(move || worker.train_validated(&records, &worker_claim));

        let joined = match tokio::time::timeout(budget, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                if claim
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    warn!(
                        secs = budget.as_secs(),
                        "model training timed out; previous model kept"
                    );
                    return Err(TrainingError::TimedOut {
                        secs: budget.as_secs(),
                    }
                    .into());
                }
                // The run committed just as the budget ran out.
                handle.await
            }
        };
        let result = joined.map_err(|e| TrainingError::Join(e.to_string()))?;
        Ok(result?)
    }

    /// Scores a batch and assigns technology buckets.
    ///
    /// Bucket membership is relative to this batch. With `use_cache`, an
    /// unexpired report for the same canonical batch is returned as-is.
    ///
    /// # Errors
    ///
    /// * [`PlannerError::Validation`] if the batch is rejected
    /// * [`PlannerError::UntrainedModel`] if no model is in service
    pub fn prioritize(
        &self,
        raw: &[RawCountyRecord],
        use_cache: bool,
    ) -> Result<Prioritization, PlannerError> {
        let records = validate_batch(raw)?;
        let model = self.current_model().ok_or(PlannerError::UntrainedModel)?;

        let key = CacheKey::for_batch(&records);
        if use_cache {
            if let Some(report) = self.cache.get(&key) {
                self.stats_mut().cache_hits += 1;
                return Ok(Prioritization {
                    report,
                    cache_hit: true,
                });
            }
            self.stats_mut().cache_misses += 1;
        }

        let counties = self.score_batch(&model, &records)?;
        let report = Arc::new(PriorityReport::build(
            counties,
            self.config.recommendations.top_counties_count,
            model.n_clusters(),
            model.version(),
        ));
        self.stats_mut().predictions += records.len() as u64;
        info!(
            counties = records.len(),
            generation = model.generation(),
            "batch prioritised"
        );
        if use_cache {
            self.cache_report(key, &report, model.generation());
        }
        Ok(Prioritization {
            report,
            cache_hit: false,
        })
    }

    /// Caches `report` unless a newer generation was swapped in meanwhile.
    ///
    /// `install` bumps the generation before clearing the cache, so either
    /// that clear removes this entry or the check below sees the new
    /// generation and drops it.
    fn cache_report(&self, key: CacheKey, report: &Arc<PriorityReport>, generation: u64) {
        self.cache.insert(key.clone(), Arc::clone(report));
        if self.generation.load(Ordering::Acquire) != generation {
            self.cache.discard(&key, report);
            debug!(generation, "report from a replaced model not cached");
        }
    }

    fn score_batch(
        &self,
        model: &ModelState,
        records: &[CountyRecord],
    ) -> Result<Vec<PriorityResult>, PlannerError> {
        let scores = model.score(records)?;
        let inputs: Vec<BucketInput> = records
            .iter()
            .zip(&scores)
            .map(|(r, s)| BucketInput {
                grid_distance: r.grid_distance,
                energy_deficit: s.energy_deficit,
                economic_activity: r.economic_activity,
                priority_score: s.priority_score,
            })
            .collect();
        let cfg = &self.config.recommendations;
        let thresholds = BatchThresholds::from_batch(&inputs, cfg);
        Ok(records
            .iter()
            .zip(scores)
            .zip(&inputs)
            .map(|((r, s), input)| PriorityResult {
                county_name: r.county_name.clone(),
                priority_score: s.priority_score,
                cluster_id: s.cluster_id,
                energy_deficit: s.energy_deficit,
                buckets: thresholds.buckets_for(input, cfg),
            })
            .collect())
    }

    /// Recommends for one county with the scorer chosen by `mode`.
    ///
    /// # Errors
    ///
    /// * [`PlannerError::Validation`] if the record is rejected
    /// * [`PlannerError::UntrainedModel`] for [`RecommendMode::ModelOnly`]
    ///   without a model
    pub fn recommend_single(
        &self,
        raw: &RawCountyRecord,
        mode: RecommendMode,
    ) -> Result<SingleRecommendation, PlannerError> {
        let records = validate_batch(std::slice::from_ref(raw))?;
        let model = match mode {
            RecommendMode::RulesOnly => None,
            RecommendMode::Auto => self.current_model(),
            RecommendMode::ModelOnly => {
                Some(self.current_model().ok_or(PlannerError::UntrainedModel)?)
            }
        };
        match model {
            Some(model) => {
                let mut results = self.score_batch(&model, &records)?;
                self.stats_mut().predictions += 1;
                Ok(SingleRecommendation::Model(results.swap_remove(0)))
            }
            None => {
                let input = SitingInput::from_county(&records[0], self.config.data.energy_per_capita);
                Ok(SingleRecommendation::RuleEngine(self.rules.recommend(&input)))
            }
        }
    }

    /// Rule-engine recommendation for a partial siting description.
    pub fn recommend_siting(&self, input: &SitingInput) -> RuleRecommendation {
        self.rules.recommend(input)
    }

    /// Writes the serving model to `path`.
    ///
    /// # Errors
    ///
    /// * [`PlannerError::UntrainedModel`] if nothing is in service
    /// * [`PlannerError::Persistence`] if the write fails
    pub fn save_model(&self, path: &Path) -> Result<(), PlannerError> {
        let model = self.current_model().ok_or(PlannerError::UntrainedModel)?;
        save_bundle(&model, path)?;
        Ok(())
    }

    /// Loads a bundle and swaps it in as the serving model.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Persistence`] for a missing or corrupt bundle;
    /// the current model is kept.
    pub fn load_model(&self, path: &Path) -> Result<Arc<ModelState>, PlannerError> {
        let bundle = load_bundle(path)?;
        Ok(self.install(bundle.into_state(0)))
    }

    pub fn model_info(&self) -> ModelInfo {
        let model = self.current_model();
        ModelInfo {
            is_trained: model.is_some(),
            version: model.as_ref().map(|m| m.version().to_string()),
            generation: model.as_ref().map_or(0, |m| m.generation()),
            last_trained: model.as_ref().map(|m| m.last_trained()),
            feature_columns: model
                .as_ref()
                .map(|m| m.feature_columns().to_vec())
                .unwrap_or_default(),
            model_config: model.as_ref().map(|m| m.config().clone()),
            cache: self.cache.status(),
        }
    }

    pub fn health(&self) -> Health {
        let model = self.current_model();
        Health {
            status: if model.is_some() {
                HealthStatus::Trained
            } else {
                HealthStatus::Untrained
            },
            model_version: model.as_ref().map(|m| m.version().to_string()),
            last_trained: model.as_ref().map(|m| m.last_trained()),
        }
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats_mut().clone()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("result cache cleared");
    }
}
