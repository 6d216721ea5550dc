//! Configuration types for a guided metamorphic search run.
//!
//! A run is described by a single JSON document ([`SearchConfig`]). Every field
//! carries a serde default so partial configuration files are accepted.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Program-level settings (seed, budget, output, external command).
    #[serde(default)]
    pub program: ProgramConfig,
    /// Genetic operator settings.
    #[serde(default)]
    pub genetic: GeneticConfig,
    /// Metrics and their signed weights.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricConfig>,
    /// Mutation operators genes are drawn from.
    #[serde(default = "default_operators")]
    pub operators: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            program: ProgramConfig::default(),
            genetic: GeneticConfig::default(),
            metrics: default_metrics(),
            operators: default_operators(),
        }
    }
}

fn default_metrics() -> Vec<MetricConfig> {
    vec![
        MetricConfig {
            name: "F1".to_string(),
            weight: -1.0,
            secondary: false,
            can_be_bigger_than_one: false,
            file: default_score_file(),
        },
        MetricConfig {
            name: "PredictionLength".to_string(),
            weight: 0.0,
            secondary: true,
            can_be_bigger_than_one: true,
            file: default_score_file(),
        },
    ]
}

fn default_operators() -> Vec<String> {
    [
        "IfTrueStatement",
        "IfFalseElseStatement",
        "AddNeutralElement",
        "AddUnusedVariable",
        "RenameVariable",
        "LambdaIdentity",
        "RandomParameterName",
        "RandomInlineComment",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Program-level settings owned by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Seed for the algorithm's random source.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Use the genetic algorithm (`true`) or the random baseline (`false`).
    #[serde(default = "default_use_ga")]
    pub use_ga: bool,
    /// Wall-clock budget for the whole run.
    #[serde(default = "default_max_time_minutes")]
    pub max_time_minutes: u64,
    /// Optional hard limit on generations.
    #[serde(default)]
    pub max_generations: Option<usize>,
    /// Directory for result directories and reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// External command that applies a genotype and runs the model.
    #[serde(default)]
    pub command: Option<CommandConfig>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            use_ga: default_use_ga(),
            max_time_minutes: default_max_time_minutes(),
            max_generations: None,
            output_dir: default_output_dir(),
            command: None,
        }
    }
}

fn default_seed() -> u64 {
    2022
}
fn default_use_ga() -> bool {
    true
}
fn default_max_time_minutes() -> u64 {
    480
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

/// External program invoked once per genotype.
///
/// The program receives `args` followed by the result directory, which already
/// contains `genotype.json`. It is expected to leave score files there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Attempts after the first failure.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_retries() -> u32 {
    3
}

/// Genetic operator and population settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Number of individuals per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Probability that a new individual is mutated.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Per-position probability of taking the other parent's gene.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability that a mutation grows rather than shrinks the genome.
    #[serde(default = "default_increase_size_rate")]
    pub increase_size_rate: f64,
    /// Candidates drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Draw tournament candidates with replacement.
    #[serde(default)]
    pub tournament_with_replacement: bool,
    /// Upper bound on genome length.
    #[serde(default = "default_max_gene_length")]
    pub max_gene_length: usize,
    /// Scale of genome growth: exclusive upper bound on initial genome length
    /// and driver of how many genes a growing mutation appends.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
    /// Generations without improvement before the search counts as converged.
    #[serde(default = "default_max_steady_generations")]
    pub max_steady_generations: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            increase_size_rate: default_increase_size_rate(),
            tournament_size: default_tournament_size(),
            tournament_with_replacement: false,
            max_gene_length: default_max_gene_length(),
            growth_factor: default_growth_factor(),
            max_steady_generations: default_max_steady_generations(),
        }
    }
}

fn default_population_size() -> usize {
    10
}
fn default_mutation_rate() -> f64 {
    0.5
}
fn default_crossover_rate() -> f64 {
    0.5
}
fn default_increase_size_rate() -> f64 {
    0.75
}
fn default_tournament_size() -> usize {
    4
}
fn default_max_gene_length() -> usize {
    20
}
fn default_growth_factor() -> f64 {
    2.0
}
fn default_max_steady_generations() -> usize {
    10
}

/// A metric and its signed weight.
///
/// Negative weights minimize the metric, positive weights maximize it, zero
/// disables it for fitness while keeping it in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub secondary: bool,
    /// Scores are unbounded above, e.g. lengths.
    #[serde(default)]
    pub can_be_bigger_than_one: bool,
    /// Score file inside an individual's result directory.
    #[serde(default = "default_score_file")]
    pub file: String,
}

fn default_score_file() -> String {
    "metrics.json".to_string()
}

impl GeneticConfig {
    /// Validate operator settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 1 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.growth_factor.is_nan() || self.growth_factor < 1.0 {
            return Err(ConfigError::InvalidGrowthFactor(self.growth_factor));
        }
        if self.tournament_size < 1 {
            return Err(ConfigError::TournamentTooSmall);
        }
        if self.max_gene_length < 1 {
            return Err(ConfigError::InvalidMaxGeneLength);
        }

        let check_rate = |value: f64, name: &str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )))
            }
        };

        check_rate(self.mutation_rate, "mutation_rate")?;
        check_rate(self.crossover_rate, "crossover_rate")?;
        check_rate(self.increase_size_rate, "increase_size_rate")?;

        Ok(())
    }
}

impl SearchConfig {
    /// Read and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.genetic.validate()?;

        if self.operators.is_empty() {
            return Err(ConfigError::NoOperators);
        }

        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if !seen.insert(metric.name.as_str()) {
                return Err(ConfigError::DuplicateMetric(metric.name.clone()));
            }
            if !metric.weight.is_finite() {
                return Err(ConfigError::InvalidWeight(format!(
                    "weight of {} must be finite",
                    metric.name
                )));
            }
        }

        if self.metrics.iter().all(|m| m.weight == 0.0) {
            return Err(ConfigError::NoEnabledMetric);
        }

        if let Some(command) = &self.program.command
            && command.program.as_os_str().is_empty()
        {
            return Err(ConfigError::EmptyCommand);
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("Growth factor must be at least 1, got {0}")]
    InvalidGrowthFactor(f64),
    #[error("Tournament size must be at least 1")]
    TournamentTooSmall,
    #[error("Maximum gene length must be at least 1")]
    InvalidMaxGeneLength,
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("At least one mutation operator is required")]
    NoOperators,
    #[error("Metric {0} is configured more than once")]
    DuplicateMetric(String),
    #[error("Invalid metric weight: {0}")]
    InvalidWeight(String),
    #[error("There should be at least one metric enabled")]
    NoEnabledMetric,
    #[error("External command must name a program")]
    EmptyCommand,
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_population_too_small() {
        let mut config = SearchConfig::default();
        config.genetic.population_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PopulationTooSmall)
        ));
    }

    #[test]
    fn test_growth_factor_below_one() {
        let mut config = SearchConfig::default();
        config.genetic.growth_factor = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidGrowthFactor(_))
        ));

        config.genetic.growth_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_out_of_range() {
        let mut config = SearchConfig::default();
        config.genetic.crossover_rate = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRate(_))));
    }

    #[test]
    fn test_all_metrics_disabled() {
        let mut config = SearchConfig::default();
        for metric in &mut config.metrics {
            metric.weight = 0.0;
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoEnabledMetric)
        ));
    }

    #[test]
    fn test_duplicate_metric() {
        let mut config = SearchConfig::default();
        let first = config.metrics[0].clone();
        config.metrics.push(first);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateMetric(name)) if name == "F1"
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "genetic": { "population_size": 4 }, "program": { "seed": 7 } }"#;
        let config: SearchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.genetic.population_size, 4);
        assert_eq!(config.genetic.tournament_size, 4);
        assert_eq!(config.program.seed, 7);
        assert!(config.program.use_ga);
        assert!(!config.operators.is_empty());
    }

    #[test]
    fn test_unbounded_metric_flag() {
        let json = r#"{ "metrics": [{ "name": "F1", "weight": 1.0 },
            { "name": "Length", "weight": 0.0, "can_be_bigger_than_one": true }] }"#;
        let config: SearchConfig = serde_json::from_str(json).unwrap();
        assert!(!config.metrics[0].can_be_bigger_than_one);
        assert!(config.metrics[1].can_be_bigger_than_one);

        let defaults = SearchConfig::default();
        let length = defaults
            .metrics
            .iter()
            .find(|m| m.name == "PredictionLength")
            .unwrap();
        assert!(length.can_be_bigger_than_one);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SearchConfig::default();
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = SearchConfig::load(&path).unwrap();
        assert_eq!(loaded.genetic.max_gene_length, config.genetic.max_gene_length);
        assert_eq!(loaded.metrics.len(), config.metrics.len());
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SearchConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
