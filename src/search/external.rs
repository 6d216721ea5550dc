//! Process-backed evaluation collaborators.
//!
//! [`CommandEvaluator`] gives every genotype its own result directory, writes
//! the genotype there and runs the configured program on it. [`ScoreFileMetric`]
//! reads one score from a JSON file the program left behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::schema::{CommandConfig, MetricConfig};

use super::fitness::{EvaluationError, Evaluator, Metric};
use super::individual::Individual;

/// File holding the gene list inside each result directory.
pub const GENOTYPE_FILE: &str = "genotype.json";

/// Runs an external program once per genotype.
///
/// The program receives the configured arguments followed by the result
/// directory. Failed runs are retried up to `retries` more times.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    command: CommandConfig,
    root: PathBuf,
}

impl CommandEvaluator {
    pub fn new(command: CommandConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            command,
            root: root.into(),
        }
    }

    /// Result directory for `individual`, named after its hash.
    pub fn result_dir(&self, individual: &Individual) -> PathBuf {
        self.root.join(individual.hex_hash())
    }

    fn run_once(&self, dir: &Path) -> Result<(), String> {
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(dir)
            .output()
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("{}: {}", output.status, stderr.trim()))
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, individual: &Individual) -> Result<PathBuf, EvaluationError> {
        let dir = self.result_dir(individual);
        fs::create_dir_all(&dir)?;
        let genotype = serde_json::to_string_pretty(individual.genes())
            .map_err(std::io::Error::from)?;
        fs::write(dir.join(GENOTYPE_FILE), genotype)?;

        let attempts = self.command.retries.saturating_add(1);
        let mut reason = String::new();
        for attempt in 1..=attempts {
            match self.run_once(&dir) {
                Ok(()) => return Ok(dir),
                Err(e) => {
                    log::warn!(
                        "Attempt {}/{} of {} failed for {}: {}",
                        attempt,
                        attempts,
                        self.command.program.display(),
                        individual.short_hash(),
                        e
                    );
                    reason = e;
                }
            }
        }

        Err(EvaluationError::CommandFailed {
            program: self.command.program.display().to_string(),
            attempts,
            reason,
        })
    }
}

/// Reads `{ "<metric>": <score>, ... }` from a JSON file in the result directory.
#[derive(Debug, Clone)]
pub struct ScoreFileMetric {
    name: String,
    file: String,
    secondary: bool,
    unbounded: bool,
}

impl ScoreFileMetric {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            secondary: false,
            unbounded: false,
        }
    }

    pub fn from_config(config: &MetricConfig) -> Self {
        Self {
            name: config.name.clone(),
            file: config.file.clone(),
            secondary: config.secondary,
            unbounded: config.can_be_bigger_than_one,
        }
    }

    pub fn secondary(mut self, secondary: bool) -> Self {
        self.secondary = secondary;
        self
    }

    /// Allow scores above one.
    pub fn unbounded(mut self, unbounded: bool) -> Self {
        self.unbounded = unbounded;
        self
    }
}

impl Metric for ScoreFileMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, individual: &Individual, result_path: &Path) -> Result<f64, EvaluationError> {
        let path = result_path.join(&self.file);
        let content = fs::read_to_string(&path)?;
        let malformed = |reason: String| EvaluationError::MalformedScores {
            path: path.clone(),
            reason,
        };

        let scores: HashMap<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        let score = scores
            .get(&self.name)
            .ok_or_else(|| malformed(format!("no entry for {}", self.name)))?
            .as_f64()
            .ok_or_else(|| malformed(format!("score of {} is not a number", self.name)))?;

        if !self.can_be_bigger_than_one() && !(0.0..=1.0).contains(&score) {
            log::warn!(
                "{} of {} is {} which lies outside [0, 1]",
                self.name,
                individual.short_hash(),
                score
            );
        }
        Ok(score)
    }

    fn is_secondary(&self) -> bool {
        self.secondary
    }

    fn can_be_bigger_than_one(&self) -> bool {
        self.unbounded
    }
}
