//! Serializable records describing individuals, generations and whole runs.
//!
//! These are read-only views produced by the search; drivers use them for
//! progress reporting and for persisting results as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Snapshot of one individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    /// Content hash of the gene sequence.
    pub hash: String,
    /// Genes in order.
    pub genes: Vec<String>,
    /// Generation the individual was created in.
    pub generation: usize,
    /// Hashes of both parents, empty for sampled individuals.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Combined fitness, if it has been evaluated.
    pub fitness: Option<f64>,
    /// Raw score per metric.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    /// Where the mutated artifacts and model output live.
    #[serde(default)]
    pub result_path: Option<PathBuf>,
}

impl IndividualRecord {
    /// Write this record as `<hash>.json` below `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> io::Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.hash));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

/// Snapshot of a whole population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub generation: usize,
    pub average_size: f64,
    pub individuals: Vec<IndividualRecord>,
}

/// Order statistics over a set of fitness values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessSummary {
    pub best: f64,
    pub worst: f64,
    pub average: f64,
    pub median: f64,
}

impl FitnessSummary {
    /// Summarize a set of fitness values. Returns `None` for an empty set.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        Some(Self {
            best: sorted[n - 1],
            worst: sorted[0],
            average: sorted.iter().sum::<f64>() / n as f64,
            median,
        })
    }
}

/// Per-generation statistics recorded by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub fitness: FitnessSummary,
    pub average_size: f64,
    pub pareto_size: usize,
    /// Hash of the generation's fittest individual.
    pub fittest: String,
}

/// Registered metric as seen after weight normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub name: String,
    pub weight: f64,
    pub objective: bool,
    pub secondary: bool,
}

/// Progress report passed to the driver callback after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    pub generation: usize,
    /// Best fitness seen so far, baseline included.
    pub best_fitness: f64,
    /// Fittest member of the current generation.
    pub generation_best: f64,
    pub average_size: f64,
    /// Generations since the best fitness last improved.
    pub steady_generations: usize,
    pub pareto_size: usize,
    pub evaluations: u64,
    pub elapsed_seconds: f64,
}

/// Reason the search stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Too many generations without improvement.
    Converged,
    /// Wall-clock budget exhausted.
    TimeBudget,
    /// Reached the configured generation limit.
    MaxGenerations,
    /// Average genome length exceeded the maximum gene length.
    PopulationTooLong,
    /// Cancelled through the engine's handle.
    Cancelled,
}

/// Run-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    pub generations: usize,
    /// Genotypes sent to the external evaluator.
    pub evaluations: u64,
    /// Score lookups answered from the cache.
    pub cache_hits: u64,
    /// Time spent inside the external evaluator.
    pub evaluation_seconds: f64,
    pub elapsed_seconds: f64,
    /// Mean of the per-generation average genome length.
    pub average_size: f64,
    pub stop_reason: StopReason,
}

/// Final outcome of a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Empty-genotype reference individual.
    pub baseline: IndividualRecord,
    /// Fittest individual seen during the run.
    pub best: IndividualRecord,
    /// Non-dominated individuals at the end of the run.
    pub pareto_front: Vec<IndividualRecord>,
    pub metrics: Vec<MetricSummary>,
    pub history: Vec<GenerationSummary>,
    /// Statistics over every fitness value observed.
    pub overall: Option<FitnessSummary>,
    pub stats: SearchStats,
}

impl SearchResult {
    /// Write the result as `search_result.json` below `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> io::Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join("search_result.json");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Load a result written by [`SearchResult::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, fitness: f64) -> IndividualRecord {
        IndividualRecord {
            hash: hash.to_string(),
            genes: vec!["AddNeutralElement(3)".to_string()],
            generation: 1,
            parents: Vec::new(),
            fitness: Some(fitness),
            scores: BTreeMap::from([("F1".to_string(), fitness)]),
            result_path: None,
        }
    }

    #[test]
    fn test_fitness_summary_odd() {
        let summary = FitnessSummary::from_values(&[0.3, 0.9, 0.1]).unwrap();
        assert_eq!(summary.best, 0.9);
        assert_eq!(summary.worst, 0.1);
        assert_eq!(summary.median, 0.3);
        assert!((summary.average - 1.3 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_fitness_summary_even_median() {
        let summary = FitnessSummary::from_values(&[0.4, 0.2, 0.8, 0.6]).unwrap();
        assert!((summary.median - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fitness_summary_empty() {
        assert!(FitnessSummary::from_values(&[]).is_none());
    }

    #[test]
    fn test_record_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = record("abc123", 0.5).save(dir.path()).unwrap();
        assert!(path.ends_with("abc123.json"));

        let content = fs::read_to_string(&path).unwrap();
        let parsed: IndividualRecord = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, record("abc123", 0.5));
    }

    #[test]
    fn test_result_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let result = SearchResult {
            baseline: record("base", 0.1),
            best: record("best", 0.7),
            pareto_front: vec![record("best", 0.7)],
            metrics: vec![MetricSummary {
                name: "F1".to_string(),
                weight: -1.0,
                objective: false,
                secondary: false,
            }],
            history: Vec::new(),
            overall: FitnessSummary::from_values(&[0.1, 0.7]),
            stats: SearchStats {
                generations: 3,
                evaluations: 12,
                cache_hits: 4,
                evaluation_seconds: 0.0,
                elapsed_seconds: 0.1,
                average_size: 1.5,
                stop_reason: StopReason::Converged,
            },
        };

        let path = result.save(dir.path()).unwrap();
        let loaded = SearchResult::load(&path).unwrap();
        assert_eq!(loaded.best.hash, "best");
        assert_eq!(loaded.stats.stop_reason, StopReason::Converged);
    }
}
