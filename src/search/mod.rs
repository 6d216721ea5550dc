//! Evolutionary search over sequences of code mutation operators.
//!
//! The search never touches source code itself. A genotype ([`Individual`]) is
//! an ordered list of opaque [`Gene`]s; an external [`Evaluator`] applies it and
//! runs the model, and [`Metric`]s read scores from the result. Everything in
//! this module decides *which* genotypes to try next.
//!
//! # Overview
//!
//! - **Genes** (`genome`): seeded random source and gene generation
//! - **Individuals** (`individual`): genotypes with content-derived identity
//! - **Fitness** (`fitness`): metric registry, weight normalization, score cache
//! - **Populations** (`population`): generation-tagged collections
//! - **Pareto archive** (`archive`): non-dominated individuals over all metrics
//! - **Algorithms** (`genetic`, `random`): genetic search and a random baseline
//! - **Driver** (`engine`): run loop, stop conditions, reports
//! - **Collaborators** (`external`): process-backed evaluator and score files
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use metamorphic_search::schema::SearchConfig;
//! use metamorphic_search::search::{
//!     CommandEvaluator, MetricCache, OperatorPool, ScoreFileMetric, SearchEngine,
//! };
//!
//! let config = SearchConfig::load("search.json")?;
//! let command = config.program.command.clone().ok_or("program.command is required")?;
//!
//! let evaluator = CommandEvaluator::new(command, config.program.output_dir.join("individuals"));
//! let mut cache = MetricCache::new().with_evaluator(Arc::new(evaluator));
//! for metric in &config.metrics {
//!     cache.add_metric(Arc::new(ScoreFileMetric::from_config(metric)), metric.weight)?;
//! }
//! cache.init_weights()?;
//!
//! let genes = Arc::new(OperatorPool::new(config.operators.clone())?);
//! let mut engine = SearchEngine::new(config.program, config.genetic, Arc::new(cache), genes)?;
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best fitness = {:.3}", progress.generation, progress.best_fitness);
//! })?;
//! println!("Pareto front holds {} individuals", result.pareto_front.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod engine;
mod external;
mod fitness;
mod genetic;
mod genome;
mod individual;
mod population;
mod random;

pub use archive::{EPSILON, ParetoFront, dominates};
pub use engine::{SearchEngine, SearchStrategy};
pub use external::{CommandEvaluator, GENOTYPE_FILE, ScoreFileMetric};
pub use fitness::{CacheStats, EvaluationError, Evaluator, Metric, MetricCache, RegisteredMetric};
pub use genetic::GeneticAlgorithm;
pub use genome::{Gene, GeneSource, GenomeRng, OperatorPool};
pub use individual::{Individual, Lineage};
pub use population::Population;
pub use random::RandomAlgorithm;

use crate::schema::ConfigError;

/// Errors raised by the search core.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Population size must be at least 1, got {0}")]
    InvalidPopulationSize(usize),
    #[error("Growth factor must be at least 1, got {0}")]
    InvalidGrowthFactor(f64),
    #[error("There should be at least one metric enabled")]
    NoActiveMetric,
    #[error("Metric {0} is already registered")]
    DuplicateMetric(String),
    #[error("Parents of {0} are already set")]
    ParentsAlreadySet(String),
    #[error("Cannot select parents from an empty population")]
    EmptyPopulation,
    #[error("Gene source needs at least one operator")]
    EmptyOperatorPool,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
