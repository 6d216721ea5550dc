//! Metamorphic search - guided search for adversarial code mutations.
//!
//! This crate searches the space of sequences of code mutation operators for
//! the ones that degrade (or improve) a code model's metrics the most. Code
//! transformation and model inference stay outside the crate; they are reached
//! through the [`search::Evaluator`] and [`search::Metric`] capabilities.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration and report types (JSON via serde)
//! - `search`: Genotypes, fitness cache, Pareto archive, algorithms and driver
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use metamorphic_search::{
//!     schema::SearchConfig,
//!     search::{Evaluator, EvaluationError, Individual, MetricCache, OperatorPool,
//!              ScoreFileMetric, SearchEngine},
//! };
//!
//! // An evaluator that already has result directories for every genotype.
//! struct Precomputed;
//!
//! impl Evaluator for Precomputed {
//!     fn evaluate(&self, individual: &Individual) -> Result<std::path::PathBuf, EvaluationError> {
//!         Ok(Path::new("results").join(individual.hex_hash()))
//!     }
//! }
//!
//! let config = SearchConfig::default();
//! let mut cache = MetricCache::new().with_evaluator(Arc::new(Precomputed));
//! for metric in &config.metrics {
//!     cache.add_metric(Arc::new(ScoreFileMetric::from_config(metric)), metric.weight)?;
//! }
//! cache.init_weights()?;
//!
//! let genes = Arc::new(OperatorPool::new(config.operators.clone())?);
//! let mut engine = SearchEngine::new(config.program, config.genetic, Arc::new(cache), genes)?;
//! let result = engine.run()?;
//!
//! println!("Best fitness: {:?}", result.best.fitness);
//! println!("Pareto front size: {}", result.pareto_front.len());
//! # Ok::<(), metamorphic_search::search::SearchError>(())
//! ```

pub mod schema;
pub mod search;

// Re-export commonly used types
pub use schema::{SearchConfig, SearchResult};
pub use search::{Individual, MetricCache, ParetoFront, Population, SearchEngine};
