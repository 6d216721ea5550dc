//! Random search baseline without selection pressure.

use std::sync::Arc;

use super::SearchError;
use super::archive::ParetoFront;
use super::fitness::MetricCache;
use super::genome::{GeneSource, GenomeRng};
use super::population::Population;

/// Replaces every population with freshly sampled individuals.
///
/// Generation `n` is sampled with growth factor `n`, so genomes lengthen as the
/// run goes on while nothing is inherited from earlier generations.
pub struct RandomAlgorithm {
    population_size: usize,
    max_gene_length: usize,
    rng: GenomeRng,
    genes: Arc<dyn GeneSource>,
    cache: Arc<MetricCache>,
    front: ParetoFront,
    generation: usize,
}

impl RandomAlgorithm {
    /// `max_gene_length` bounds the average genome length, not single genomes.
    pub fn new(
        population_size: usize,
        max_gene_length: usize,
        genes: Arc<dyn GeneSource>,
        cache: Arc<MetricCache>,
        rng: GenomeRng,
    ) -> Result<Self, SearchError> {
        if population_size < 1 {
            return Err(SearchError::InvalidPopulationSize(population_size));
        }
        let front = ParetoFront::new(Arc::clone(&cache));
        Ok(Self {
            population_size,
            max_gene_length,
            rng,
            genes,
            cache,
            front,
            generation: 0,
        })
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn max_gene_length(&self) -> usize {
        self.max_gene_length
    }

    pub fn pareto_front(&self) -> &ParetoFront {
        &self.front
    }

    pub fn cache(&self) -> &Arc<MetricCache> {
        &self.cache
    }

    /// Single-gene individuals for generation zero.
    pub fn initial_population(&mut self) -> Result<Population, SearchError> {
        Population::initialize(
            self.population_size,
            1.0,
            self.generation,
            &mut self.rng,
            self.genes.as_ref(),
        )
    }

    /// A brand-new population of the same size as `population`.
    pub fn next_generation(&mut self, population: &Population) -> Result<Population, SearchError> {
        self.generation += 1;
        log::debug!(
            "Sampling random population of {} for generation {}",
            population.len(),
            self.generation
        );
        Population::initialize(
            population.len(),
            self.generation as f64,
            self.generation,
            &mut self.rng,
            self.genes.as_ref(),
        )
    }

    /// Offer every member of `population` to the Pareto archive, one at a time.
    pub fn check_pareto(&mut self, population: &Population) -> Result<(), SearchError> {
        for individual in population.iter() {
            self.front.add(Arc::clone(individual))?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.front.clear();
        self.cache.reset();
        self.generation = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fitness::testing::length_cache;
    use crate::search::genome::OperatorPool;

    fn algorithm(size: usize, seed: u64) -> RandomAlgorithm {
        let pool = OperatorPool::new(vec!["A".to_string(), "B".to_string()]).unwrap();
        RandomAlgorithm::new(
            size,
            20,
            Arc::new(pool),
            Arc::new(length_cache(10.0)),
            GenomeRng::new(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_population_rejected() {
        let pool = OperatorPool::new(vec!["A".to_string()]).unwrap();
        let result = RandomAlgorithm::new(
            0,
            20,
            Arc::new(pool),
            Arc::new(length_cache(10.0)),
            GenomeRng::new(1),
        );
        assert!(matches!(result, Err(SearchError::InvalidPopulationSize(0))));
    }

    #[test]
    fn test_initial_population_single_genes() {
        let mut random = algorithm(7, 2);
        let population = random.initial_population().unwrap();
        assert_eq!(population.len(), 7);
        assert_eq!(population.average_size(), 1.0);
        assert_eq!(population.generation(), 0);
    }

    #[test]
    fn test_next_generation_keeps_size() {
        let mut random = algorithm(5, 3);
        let mut population = random.initial_population().unwrap();
        for expected in 1..=4 {
            population = random.next_generation(&population).unwrap();
            assert_eq!(population.len(), 5);
            assert_eq!(population.generation(), expected);
            assert!(population.iter().all(|i| i.len() >= 1 && i.len() <= expected.max(1)));
        }
        assert_eq!(random.generation(), 4);
    }

    #[test]
    fn test_genomes_lengthen_over_generations() {
        let mut random = algorithm(50, 4);
        let mut population = random.initial_population().unwrap();
        for _ in 0..12 {
            population = random.next_generation(&population).unwrap();
        }
        assert!(population.average_size() > 3.0);
    }

    #[test]
    fn test_check_pareto_and_reset() {
        let mut random = algorithm(4, 5);
        let population = random.initial_population().unwrap();
        random.check_pareto(&population).unwrap();
        assert!(!random.pareto_front().is_empty());

        random.reset();
        assert!(random.pareto_front().is_empty());
        assert_eq!(random.generation(), 0);
    }
}
