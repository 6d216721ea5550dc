//! Pareto archive of non-dominated individuals.
//!
//! Dominance is decided on the raw score of every registered metric, each
//! metric being an independent axis. Individuals with identical score vectors
//! never dominate each other, so the archive may hold several of them.

use std::fmt;
use std::sync::Arc;

use crate::schema::IndividualRecord;

use super::fitness::{EvaluationError, MetricCache};
use super::individual::Individual;

/// Scores closer than this count as equal.
pub const EPSILON: f64 = 1e-5;

/// Whether score vector `a` dominates `b`.
///
/// `a` must be at least as good on every axis and not equal (within
/// [`EPSILON`]) on all of them. Empty or mismatched vectors never dominate.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    if a.is_empty() || a.len() != b.len() {
        return false;
    }

    let mut all_equal = true;
    for (&a_val, &b_val) in a.iter().zip(b) {
        if a_val < b_val {
            return false;
        }
        all_equal = all_equal && (a_val - b_val).abs() < EPSILON;
    }
    !all_equal
}

/// The set of mutually non-dominated individuals seen during a run.
#[derive(Debug)]
pub struct ParetoFront {
    members: Vec<Arc<Individual>>,
    cache: Arc<MetricCache>,
}

impl ParetoFront {
    pub fn new(cache: Arc<MetricCache>) -> Self {
        Self {
            members: Vec::new(),
            cache,
        }
    }

    /// Offer `candidate` to the archive.
    ///
    /// Returns `true` if it was inserted. Members it dominates are removed.
    pub fn add(&mut self, candidate: Arc<Individual>) -> Result<bool, EvaluationError> {
        if self.contains(&candidate) {
            return Ok(false);
        }

        let candidate_scores = self.score_vector(&candidate)?;
        let mut member_scores = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let scores = self.score_vector(member)?;
            if dominates(&scores, &candidate_scores) {
                log::trace!(
                    "{} is dominated by {}",
                    candidate.short_hash(),
                    member.short_hash()
                );
                return Ok(false);
            }
            member_scores.push(scores);
        }

        let before = self.members.len();
        let mut scores = member_scores.iter();
        self.members.retain(|_| {
            scores
                .next()
                .is_none_or(|s| !dominates(&candidate_scores, s))
        });
        log::trace!(
            "Inserted {} into Pareto front, pruned {}",
            candidate.short_hash(),
            before - self.members.len()
        );

        self.members.push(candidate);
        Ok(true)
    }

    /// Whether `a` dominates `b` on the raw scores of all registered metrics.
    pub fn dominates(&self, a: &Individual, b: &Individual) -> Result<bool, EvaluationError> {
        if a == b || self.cache.metrics().is_empty() {
            return Ok(false);
        }
        Ok(dominates(&self.score_vector(a)?, &self.score_vector(b)?))
    }

    fn score_vector(&self, individual: &Individual) -> Result<Vec<f64>, EvaluationError> {
        let scores = match self.cache.cached_scores(individual) {
            Some(scores) => scores,
            None => self.cache.scores(individual)?,
        };
        self.cache
            .metrics()
            .iter()
            .map(|m| {
                scores
                    .get(m.name())
                    .copied()
                    .ok_or_else(|| EvaluationError::MissingScore {
                        metric: m.name().to_string(),
                        individual: individual.short_hash(),
                    })
            })
            .collect()
    }

    pub fn contains(&self, individual: &Individual) -> bool {
        self.members.iter().any(|m| **m == *individual)
    }

    pub fn members(&self) -> &[Arc<Individual>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Empty the archive for a new run.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn records(&self) -> Vec<IndividualRecord> {
        self.members
            .iter()
            .map(|m| m.to_record(&self.cache))
            .collect()
    }
}

impl fmt::Display for ParetoFront {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", member)?;
        }
        write!(f, "}}")
    }
}
