//! Metric registry, weight normalization, fitness aggregation and the score cache.
//!
//! Scores come from external collaborators: an [`Evaluator`] turns a genotype
//! into a result directory, and each [`Metric`] reads one score from it. Both
//! are expensive, so every genotype is evaluated at most once per run and its
//! scores are memoized here, keyed by gene sequence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::schema::MetricSummary;

use super::SearchError;
use super::genome::Gene;
use super::individual::Individual;

/// Scoring function over an evaluated individual.
pub trait Metric: Send + Sync {
    /// Unique name; also the key in score tables and reports.
    fn name(&self) -> &str;

    /// Raw score for `individual`, whose artifacts live under `result_path`.
    ///
    /// Scores lie in `[0, 1]` unless [`Metric::can_be_bigger_than_one`] holds.
    fn apply(&self, individual: &Individual, result_path: &Path) -> Result<f64, EvaluationError>;

    /// Secondary metrics are reported but never contribute to fitness.
    fn is_secondary(&self) -> bool {
        false
    }

    fn can_be_bigger_than_one(&self) -> bool {
        false
    }
}

/// Applies a genotype to the code base and runs the model on the result.
pub trait Evaluator: Send + Sync {
    /// Produce the result locator for `individual`. Must be deterministic in
    /// the gene sequence.
    fn evaluate(&self, individual: &Individual) -> Result<PathBuf, EvaluationError>;
}

/// A metric together with its (normalized) signed weight.
#[derive(Clone)]
pub struct RegisteredMetric {
    metric: Arc<dyn Metric>,
    weight: f64,
    objective: bool,
}

impl RegisteredMetric {
    pub fn name(&self) -> &str {
        self.metric.name()
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// `true` when the metric is maximized.
    pub fn objective(&self) -> bool {
        self.objective
    }

    pub fn is_secondary(&self) -> bool {
        self.metric.is_secondary()
    }

    pub fn can_be_bigger_than_one(&self) -> bool {
        self.metric.can_be_bigger_than_one()
    }

    pub fn metric(&self) -> &Arc<dyn Metric> {
        &self.metric
    }

    /// Turn a raw score into a "higher is better" value.
    pub fn orient(&self, score: f64) -> f64 {
        if self.weight >= 0.0 { score } else { 1.0 - score }
    }

    /// This metric's share of the combined fitness.
    pub fn contribution(&self, score: f64) -> f64 {
        self.weight.abs() * self.orient(score)
    }

    fn summary(&self) -> MetricSummary {
        MetricSummary {
            name: self.name().to_string(),
            weight: self.weight,
            objective: self.objective,
            secondary: self.is_secondary(),
        }
    }
}

impl fmt::Debug for RegisteredMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMetric")
            .field("name", &self.name())
            .field("weight", &self.weight)
            .field("objective", &self.objective)
            .field("secondary", &self.is_secondary())
            .finish()
    }
}

/// Counters describing how the cache was used.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Genotypes sent to the evaluator.
    pub evaluations: u64,
    /// Score lookups answered from memory.
    pub hits: u64,
    /// Time spent inside the evaluator.
    pub evaluation_time: Duration,
}

#[derive(Debug, Default)]
struct CacheTables {
    result_paths: HashMap<Vec<Gene>, PathBuf>,
    scores: HashMap<Vec<Gene>, BTreeMap<String, f64>>,
}

/// Registry of metrics plus memoized per-genotype results.
///
/// The metric registry is configured through `&mut self` before the run; the
/// result tables sit behind a mutex so distinct individuals can be evaluated
/// from several threads while inserts stay serialized.
pub struct MetricCache {
    metrics: Vec<RegisteredMetric>,
    /// Indices into `metrics` of metrics with non-zero weight.
    active: Vec<usize>,
    evaluator: Option<Arc<dyn Evaluator>>,
    tables: Mutex<CacheTables>,
    evaluations: AtomicU64,
    hits: AtomicU64,
    evaluation_nanos: AtomicU64,
}

impl Default for MetricCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricCache {
    /// Create an empty cache without an evaluator. Scores must then be stored
    /// up front with [`MetricCache::store_scores`].
    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
            active: Vec::new(),
            evaluator: None,
            tables: Mutex::new(CacheTables::default()),
            evaluations: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            evaluation_nanos: AtomicU64::new(0),
        }
    }

    /// Set the collaborator that produces result directories.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Register a metric. It becomes active iff `weight` is non-zero.
    pub fn add_metric(&mut self, metric: Arc<dyn Metric>, weight: f64) -> Result<(), SearchError> {
        if self.metric(metric.name()).is_some() {
            return Err(SearchError::DuplicateMetric(metric.name().to_string()));
        }
        if weight != 0.0 {
            self.active.push(self.metrics.len());
        }
        self.metrics.push(RegisteredMetric {
            metric,
            weight,
            objective: weight > 0.0,
        });
        Ok(())
    }

    /// Drop zero-weight metrics from the active set and normalize the rest so
    /// that the absolute weights sum to one. Fixes each metric's orientation.
    pub fn init_weights(&mut self) -> Result<(), SearchError> {
        let metrics = &self.metrics;
        self.active.retain(|&i| metrics[i].weight != 0.0);

        let sum: f64 = self.active.iter().map(|&i| self.metrics[i].weight.abs()).sum();
        if sum.is_nan() || sum <= 0.0 {
            log::error!(
                "Combined (absolute) weight is {}; at least one metric must be enabled",
                sum
            );
            return Err(SearchError::NoActiveMetric);
        }

        for &i in &self.active {
            let metric = &mut self.metrics[i];
            metric.weight /= sum;
            if metric.is_secondary() {
                log::warn!(
                    "Secondary metric {} carries weight {:.3} but is excluded from fitness",
                    metric.name(),
                    metric.weight
                );
            }
        }
        for metric in &mut self.metrics {
            metric.objective = metric.weight > 0.0;
        }

        log::debug!("Normalized metric weights: {:?}", self.metrics);
        Ok(())
    }

    /// All registered metrics, including zero-weight and secondary ones.
    pub fn metrics(&self) -> &[RegisteredMetric] {
        &self.metrics
    }

    /// Metrics with non-zero weight.
    pub fn active_metrics(&self) -> impl Iterator<Item = &RegisteredMetric> {
        self.active.iter().map(|&i| &self.metrics[i])
    }

    pub fn metric(&self, name: &str) -> Option<&RegisteredMetric> {
        self.metrics.iter().find(|m| m.name() == name)
    }

    /// `true` if at least one active metric is minimized.
    ///
    /// Fitness is oriented "higher is better" regardless; this flag only
    /// serves drivers that report raw metric values.
    pub fn do_maximize(&self) -> bool {
        self.active_metrics().any(|m| m.weight < 0.0)
    }

    pub fn metric_summaries(&self) -> Vec<MetricSummary> {
        self.metrics.iter().map(RegisteredMetric::summary).collect()
    }

    fn tables(&self) -> MutexGuard<'_, CacheTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store_result_path(&self, individual: &Individual, path: PathBuf) {
        self.tables()
            .result_paths
            .insert(individual.genes().to_vec(), path);
    }

    pub fn result_path(&self, individual: &Individual) -> Option<PathBuf> {
        self.tables().result_paths.get(individual.genes()).cloned()
    }

    pub fn store_scores(&self, individual: &Individual, scores: BTreeMap<String, f64>) {
        self.tables()
            .scores
            .insert(individual.genes().to_vec(), scores);
    }

    /// Store a result directory and its scores in one step.
    pub fn store_files(&self, individual: &Individual, path: PathBuf, scores: BTreeMap<String, f64>) {
        let mut tables = self.tables();
        tables
            .result_paths
            .insert(individual.genes().to_vec(), path);
        tables.scores.insert(individual.genes().to_vec(), scores);
    }

    /// Scores already known for `individual`, without evaluating it.
    pub fn cached_scores(&self, individual: &Individual) -> Option<BTreeMap<String, f64>> {
        self.tables().scores.get(individual.genes()).cloned()
    }

    /// Raw scores of every registered metric, evaluating on first access.
    pub fn scores(&self, individual: &Individual) -> Result<BTreeMap<String, f64>, EvaluationError> {
        if let Some(scores) = self.cached_scores(individual) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(scores);
        }

        let path = self.locate(individual)?;
        let mut scores = BTreeMap::new();
        for registered in &self.metrics {
            let score = registered.metric.apply(individual, &path)?;
            scores.insert(registered.name().to_string(), score);
        }

        let mut tables = self.tables();
        let stored = tables
            .scores
            .entry(individual.genes().to_vec())
            .or_insert(scores);
        Ok(stored.clone())
    }

    /// Raw score of one metric.
    pub fn score(&self, individual: &Individual, metric: &str) -> Result<f64, EvaluationError> {
        self.scores(individual)?
            .get(metric)
            .copied()
            .ok_or_else(|| EvaluationError::MissingScore {
                metric: metric.to_string(),
                individual: individual.short_hash(),
            })
    }

    /// Weighted, orientation-corrected combination of the active scores.
    ///
    /// Lies in `[0, 1]` when every contributing score does.
    pub fn fitness(&self, individual: &Individual) -> Result<f64, EvaluationError> {
        let scores = self.scores(individual)?;
        let mut fitness = 0.0;
        for metric in self.active_metrics().filter(|m| !m.is_secondary()) {
            let score = scores
                .get(metric.name())
                .copied()
                .ok_or_else(|| EvaluationError::MissingScore {
                    metric: metric.name().to_string(),
                    individual: individual.short_hash(),
                })?;
            fitness += metric.contribution(score);
        }
        Ok(fitness)
    }

    /// Evaluate the fitness of every individual, distinct genotypes in parallel.
    pub fn evaluate_all(&self, individuals: &[Arc<Individual>]) -> Result<(), EvaluationError> {
        let mut seen = HashSet::new();
        let mut first = Vec::new();
        let mut repeated = Vec::new();
        for individual in individuals.iter().filter(|i| i.cached_fitness().is_none()) {
            if seen.insert(individual.genes()) {
                first.push(individual);
            } else {
                repeated.push(individual);
            }
        }

        first
            .par_iter()
            .map(|individual| individual.fitness(self).map(|_| ()))
            .collect::<Result<Vec<()>, _>>()?;

        for individual in repeated {
            individual.fitness(self)?;
        }
        Ok(())
    }

    /// Result directory from this cache's table, or a fresh evaluation. The
    /// path attached to the individual is only kept for reports.
    fn locate(&self, individual: &Individual) -> Result<PathBuf, EvaluationError> {
        if let Some(path) = self.result_path(individual) {
            individual.attach_result_path(path.clone());
            return Ok(path);
        }

        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or_else(|| EvaluationError::NoEvaluator(individual.short_hash()))?;

        log::debug!("Evaluating {}", individual);
        let start = Instant::now();
        let path = evaluator.evaluate(individual)?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.evaluation_nanos
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);

        self.store_result_path(individual, path.clone());
        individual.attach_result_path(path.clone());
        Ok(path)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            evaluation_time: Duration::from_nanos(self.evaluation_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Forget all results of the current run. Registered metrics stay.
    pub fn reset(&self) {
        let mut tables = self.tables();
        tables.result_paths.clear();
        tables.scores.clear();
        self.evaluations.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.evaluation_nanos.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for MetricCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricCache")
            .field("metrics", &self.metrics)
            .field("has_evaluator", &self.evaluator.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Failures of the external evaluation collaborators.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("No evaluator configured to produce results for {0}")]
    NoEvaluator(String),
    #[error("Metric {metric} has no score for {individual}")]
    MissingScore { metric: String, individual: String },
    #[error("External command {program} failed after {attempts} attempts: {reason}")]
    CommandFailed {
        program: String,
        attempts: u32,
        reason: String,
    },
    #[error("Malformed score file {}: {reason}", .path.display())]
    MalformedScores { path: PathBuf, reason: String },
    #[error("I/O error during evaluation: {0}")]
    Io(#[from] std::io::Error),
}
