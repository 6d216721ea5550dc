//! Genotypes: ordered gene sequences with lazily attached evaluation data.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::IndividualRecord;

use super::SearchError;
use super::fitness::{EvaluationError, MetricCache};
use super::genome::{Gene, GeneSource, GenomeRng};

/// Length of the hash prefix used in log lines and `Display`.
const SHORT_HASH_LEN: usize = 12;

/// Reference to a parent, kept for lineage reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub hash: String,
    pub generation: usize,
}

/// One candidate mutation plan.
///
/// Equality and hashing look at the gene sequence only; generation, parents
/// and cached evaluation data do not take part. This is the key under which
/// scores are cached and Pareto membership is decided.
#[derive(Debug, Clone)]
pub struct Individual {
    genes: Vec<Gene>,
    generation: usize,
    parents: Option<[Lineage; 2]>,
    fitness: OnceLock<f64>,
    result_path: OnceLock<PathBuf>,
}

impl Individual {
    /// Empty individual (the identity baseline).
    pub fn new(generation: usize) -> Self {
        Self::from_genes(Vec::new(), generation)
    }

    pub fn from_genes(genes: Vec<Gene>, generation: usize) -> Self {
        Self {
            genes,
            generation,
            parents: None,
            fitness: OnceLock::new(),
            result_path: OnceLock::new(),
        }
    }

    /// Append `count` genes drawn from `source`.
    pub fn populate(&mut self, rng: &mut GenomeRng, source: &dyn GeneSource, count: usize) {
        self.genes.reserve(count);
        for _ in 0..count {
            self.genes.push(source.next_gene(rng));
        }
        self.invalidate();
    }

    pub fn add_gene(&mut self, gene: Gene) {
        self.genes.push(gene);
        self.invalidate();
    }

    pub fn gene(&self, index: usize) -> Option<&Gene> {
        self.genes.get(index)
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Append one gene unless the genome already holds `max_length` genes.
    pub fn increase(
        &mut self,
        max_length: usize,
        rng: &mut GenomeRng,
        source: &dyn GeneSource,
    ) -> bool {
        if self.genes.len() >= max_length {
            return false;
        }
        self.add_gene(source.next_gene(rng));
        true
    }

    /// Remove the gene at a uniformly random position.
    pub fn decrease(&mut self, rng: &mut GenomeRng) -> Option<Gene> {
        if self.genes.is_empty() {
            return None;
        }
        let index = rng.index(self.genes.len());
        let removed = self.genes.remove(index);
        self.invalidate();
        Some(removed)
    }

    /// Record both parents. Lineage can be set only once.
    pub fn set_parents(&mut self, first: &Individual, second: &Individual) -> Result<(), SearchError> {
        if self.parents.is_some() {
            return Err(SearchError::ParentsAlreadySet(self.short_hash()));
        }
        self.parents = Some([first.lineage(), second.lineage()]);
        Ok(())
    }

    pub fn parents(&self) -> Option<&[Lineage; 2]> {
        self.parents.as_ref()
    }

    fn lineage(&self) -> Lineage {
        Lineage {
            hash: self.hex_hash(),
            generation: self.generation,
        }
    }

    /// Combined fitness, computed through `cache` once and memoized.
    pub fn fitness(&self, cache: &MetricCache) -> Result<f64, EvaluationError> {
        if let Some(&fitness) = self.fitness.get() {
            return Ok(fitness);
        }
        let fitness = cache.fitness(self)?;
        let _ = self.fitness.set(fitness);
        Ok(fitness)
    }

    /// Fitness if it has already been computed.
    pub fn cached_fitness(&self) -> Option<f64> {
        self.fitness.get().copied()
    }

    pub fn result_path(&self) -> Option<&Path> {
        self.result_path.get().map(PathBuf::as_path)
    }

    pub(crate) fn attach_result_path(&self, path: PathBuf) {
        let _ = self.result_path.set(path);
    }

    /// Stable SHA-256 of the ordered gene sequence, hex encoded.
    pub fn hex_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for gene in &self.genes {
            hasher.update(gene.operator.as_bytes());
            hasher.update([0u8]);
            hasher.update(gene.seed.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn short_hash(&self) -> String {
        let mut hash = self.hex_hash();
        hash.truncate(SHORT_HASH_LEN);
        hash
    }

    /// Report view. Uses cached scores only and never triggers evaluation.
    pub fn to_record(&self, cache: &MetricCache) -> IndividualRecord {
        IndividualRecord {
            hash: self.hex_hash(),
            genes: self.genes.iter().map(ToString::to_string).collect(),
            generation: self.generation,
            parents: self
                .parents
                .iter()
                .flatten()
                .map(|p| p.hash.clone())
                .collect(),
            fitness: self.cached_fitness(),
            scores: cache.cached_scores(self).unwrap_or_default(),
            result_path: self
                .result_path()
                .map(Path::to_path_buf)
                .or_else(|| cache.result_path(self)),
        }
    }

    /// Gene sequences changed: drop memoized evaluation data.
    fn invalidate(&mut self) {
        self.fitness = OnceLock::new();
        self.result_path = OnceLock::new();
    }
}

impl PartialEq for Individual {
    fn eq(&self, other: &Self) -> bool {
        self.genes == other.genes
    }
}

impl Eq for Individual {}

impl Hash for Individual {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.genes.hash(state);
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Individual{{hash={}, generation={}, genes=[",
            self.short_hash(),
            self.generation
        )?;
        for (i, gene) in self.genes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", gene)?;
        }
        write!(f, "]")?;
        if let Some(fitness) = self.cached_fitness() {
            write!(f, ", fitness={:.4}", fitness)?;
        }
        write!(f, "}}")
    }
}
