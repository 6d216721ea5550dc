//! Genes, the seeded random source, and gene generation.

use std::fmt;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::SearchError;

/// Random number generator wrapper shared by all genome operations.
///
/// Every draw made by an algorithm instance goes through one `GenomeRng`, so a
/// fixed seed and operation order reproduce a run exactly.
#[derive(Debug, Clone)]
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform index in `[0, len)`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform draw from a half-open range of counts.
    pub fn count(&mut self, low: usize, high: usize) -> usize {
        self.rng.gen_range(low..high)
    }

    /// `amount` distinct indices in `[0, len)`, in draw order.
    pub fn distinct_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, len, amount).into_vec()
    }

    /// Generate next u64, e.g. for seeding operators.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

/// One opaque mutation-operator token.
///
/// The search only compares genes for equality and hashes them; the operator
/// name and its seed are meaningful to the external code transformer alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gene {
    pub operator: String,
    pub seed: u64,
}

impl Gene {
    pub fn new(operator: impl Into<String>, seed: u64) -> Self {
        Self {
            operator: operator.into(),
            seed,
        }
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operator, self.seed)
    }
}

/// Supplies genes on demand.
///
/// Implementations must be deterministic given the state of `rng`.
pub trait GeneSource: Send + Sync {
    fn next_gene(&self, rng: &mut GenomeRng) -> Gene;
}

/// Draws an operator uniformly from a fixed pool and gives it a fresh seed.
#[derive(Debug, Clone)]
pub struct OperatorPool {
    operators: Vec<String>,
}

impl OperatorPool {
    pub fn new(operators: Vec<String>) -> Result<Self, SearchError> {
        if operators.is_empty() {
            return Err(SearchError::EmptyOperatorPool);
        }
        Ok(Self { operators })
    }

    pub fn operators(&self) -> &[String] {
        &self.operators
    }
}

impl GeneSource for OperatorPool {
    fn next_gene(&self, rng: &mut GenomeRng) -> Gene {
        let index = rng.index(self.operators.len());
        Gene::new(self.operators[index].clone(), rng.next_seed())
    }
}
