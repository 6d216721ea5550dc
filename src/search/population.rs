//! Generation-tagged collections of individuals.

use std::fmt;
use std::sync::Arc;

use crate::schema::PopulationSnapshot;

use super::SearchError;
use super::fitness::{EvaluationError, MetricCache};
use super::genome::{GeneSource, GenomeRng};
use super::individual::Individual;

/// Ordered individuals plus the generation this population was produced in.
///
/// Identical genotypes may coexist.
#[derive(Debug, Clone, Default)]
pub struct Population {
    individuals: Vec<Arc<Individual>>,
    generation: usize,
}

impl Population {
    pub fn new(generation: usize) -> Self {
        Self {
            individuals: Vec::new(),
            generation,
        }
    }

    /// Sample `size` fresh individuals with a gene count drawn uniformly from
    /// `[1, growth_factor)`. A growth factor of one yields single-gene genomes.
    pub fn initialize(
        size: usize,
        growth_factor: f64,
        generation: usize,
        rng: &mut GenomeRng,
        source: &dyn GeneSource,
    ) -> Result<Self, SearchError> {
        if size < 1 {
            return Err(SearchError::InvalidPopulationSize(size));
        }
        if growth_factor.is_nan() || growth_factor < 1.0 {
            return Err(SearchError::InvalidGrowthFactor(growth_factor));
        }

        let upper = growth_factor.ceil() as usize;
        let mut population = Self::new(generation);
        population.individuals.reserve(size);
        for _ in 0..size {
            let count = if upper > 1 { rng.count(1, upper) } else { 1 };
            let mut individual = Individual::new(generation);
            individual.populate(rng, source, count);
            population.push(individual);
        }

        log::debug!(
            "Initialized population of {} for generation {} (average size {:.2})",
            size,
            generation,
            population.average_size()
        );
        Ok(population)
    }

    pub fn push(&mut self, individual: Individual) {
        self.individuals.push(Arc::new(individual));
    }

    pub fn push_shared(&mut self, individual: Arc<Individual>) {
        self.individuals.push(individual);
    }

    pub fn individual(&self, index: usize) -> Option<&Arc<Individual>> {
        self.individuals.get(index)
    }

    pub fn individuals(&self) -> &[Arc<Individual>] {
        &self.individuals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Individual>> {
        self.individuals.iter()
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Mean genome length; zero for an empty population.
    pub fn average_size(&self) -> f64 {
        if self.individuals.is_empty() {
            return 0.0;
        }
        let total: usize = self.individuals.iter().map(|i| i.len()).sum();
        total as f64 / self.individuals.len() as f64
    }

    /// Fittest member. Exact fitness ties go to the shorter genome, further
    /// ties to the earlier member.
    pub fn fittest(&self, cache: &MetricCache) -> Result<Option<Arc<Individual>>, EvaluationError> {
        let mut iter = self.individuals.iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };

        let mut best = first;
        let mut best_fitness = first.fitness(cache)?;
        for candidate in iter {
            let fitness = candidate.fitness(cache)?;
            if fitness > best_fitness || (fitness == best_fitness && candidate.len() < best.len()) {
                best = candidate;
                best_fitness = fitness;
            }
        }
        Ok(Some(Arc::clone(best)))
    }

    /// Fitness of every member, in order.
    pub fn fitness_values(&self, cache: &MetricCache) -> Result<Vec<f64>, EvaluationError> {
        self.individuals.iter().map(|i| i.fitness(cache)).collect()
    }

    /// Report view. Uses cached data only.
    pub fn snapshot(&self, cache: &MetricCache) -> PopulationSnapshot {
        PopulationSnapshot {
            generation: self.generation,
            average_size: self.average_size(),
            individuals: self.individuals.iter().map(|i| i.to_record(cache)).collect(),
        }
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Population{{")?;
        for (i, individual) in self.individuals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", individual)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fitness::testing::{FixedMetric, length_cache, store};
    use crate::search::genome::{Gene, OperatorPool};

    fn pool() -> OperatorPool {
        OperatorPool::new(vec!["A".to_string(), "B".to_string()]).unwrap()
    }

    fn individual(ops: &[&str]) -> Individual {
        Individual::from_genes(ops.iter().map(|op| Gene::new(*op, 0)).collect(), 0)
    }

    fn fixed_cache() -> MetricCache {
        let mut cache = MetricCache::new();
        cache
            .add_metric(std::sync::Arc::new(FixedMetric::new("m")), 1.0)
            .unwrap();
        cache.init_weights().unwrap();
        cache
    }

    #[test]
    fn test_initialize() {
        let mut rng = GenomeRng::new(1);
        let population = Population::initialize(10, 4.0, 0, &mut rng, &pool()).unwrap();
        assert_eq!(population.len(), 10);
        assert!(population.iter().all(|i| (1..4).contains(&i.len())));
        assert!(population.iter().all(|i| i.generation() == 0));
    }

    #[test]
    fn test_initialize_growth_factor_one() {
        let mut rng = GenomeRng::new(2);
        let population = Population::initialize(10, 1.0, 0, &mut rng, &pool()).unwrap();
        assert_eq!(population.len(), 10);
        assert_eq!(population.average_size(), 1.0);
    }

    #[test]
    fn test_initialize_rejects_invalid_arguments() {
        let mut rng = GenomeRng::new(3);
        assert!(matches!(
            Population::initialize(0, 2.0, 0, &mut rng, &pool()),
            Err(SearchError::InvalidPopulationSize(0))
        ));
        assert!(matches!(
            Population::initialize(5, 0.5, 0, &mut rng, &pool()),
            Err(SearchError::InvalidGrowthFactor(_))
        ));
    }

    #[test]
    fn test_initialize_is_deterministic() {
        let a = Population::initialize(8, 5.0, 0, &mut GenomeRng::new(9), &pool()).unwrap();
        let b = Population::initialize(8, 5.0, 0, &mut GenomeRng::new(9), &pool()).unwrap();
        let genes_a: Vec<_> = a.iter().map(|i| i.genes().to_vec()).collect();
        let genes_b: Vec<_> = b.iter().map(|i| i.genes().to_vec()).collect();
        assert_eq!(genes_a, genes_b);
    }

    #[test]
    fn test_average_size_empty() {
        assert_eq!(Population::new(0).average_size(), 0.0);
    }

    #[test]
    fn test_average_size() {
        let mut population = Population::new(0);
        population.push(individual(&["A"]));
        population.push(individual(&["A", "B", "A"]));
        assert_eq!(population.average_size(), 2.0);
    }

    #[test]
    fn test_individual_out_of_range() {
        let mut population = Population::new(0);
        population.push(individual(&["A"]));
        assert!(population.individual(0).is_some());
        assert!(population.individual(1).is_none());
    }

    #[test]
    fn test_fittest_empty() {
        let cache = length_cache(10.0);
        assert!(Population::new(0).fittest(&cache).unwrap().is_none());
    }

    #[test]
    fn test_fittest_highest_fitness() {
        let cache = fixed_cache();
        let a = individual(&["A"]);
        let b = individual(&["B"]);
        let c = individual(&["A", "B"]);
        store(&cache, &a, "m", 0.25);
        store(&cache, &b, "m", 0.75);
        store(&cache, &c, "m", 0.5);

        let mut population = Population::new(0);
        population.push(a);
        population.push(b.clone());
        population.push(c);

        let fittest = population.fittest(&cache).unwrap().unwrap();
        assert_eq!(*fittest, b);
        assert!((fittest.fitness(&cache).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_fittest_tie_prefers_shorter() {
        let cache = fixed_cache();
        let long = individual(&["A", "B", "A"]);
        let short = individual(&["B"]);
        store(&cache, &long, "m", 0.5);
        store(&cache, &short, "m", 0.5);

        let mut population = Population::new(0);
        population.push(long);
        population.push(short.clone());
        assert_eq!(*population.fittest(&cache).unwrap().unwrap(), short);
    }

    #[test]
    fn test_fittest_tie_same_length_keeps_first() {
        let cache = fixed_cache();
        let first = individual(&["A"]);
        let second = individual(&["B"]);
        store(&cache, &first, "m", 0.5);
        store(&cache, &second, "m", 0.5);

        let mut population = Population::new(0);
        population.push(first.clone());
        population.push(second);
        assert_eq!(*population.fittest(&cache).unwrap().unwrap(), first);
    }

    #[test]
    fn test_fittest_minimizing_metric() {
        let mut cache = MetricCache::new();
        cache
            .add_metric(std::sync::Arc::new(FixedMetric::new("m")), -1.0)
            .unwrap();
        cache.init_weights().unwrap();

        let a = individual(&["A"]);
        let b = individual(&["B"]);
        store(&cache, &a, "m", 0.25);
        store(&cache, &b, "m", 0.5);

        let mut population = Population::new(0);
        population.push(a.clone());
        population.push(b);

        let fittest = population.fittest(&cache).unwrap().unwrap();
        assert_eq!(*fittest, a);
        assert!((fittest.fitness(&cache).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        let mut population = Population::new(0);
        assert_eq!(population.to_string(), "Population{}");
        population.push(individual(&["A"]));
        assert!(population.to_string().starts_with("Population{Individual{"));
    }

    #[test]
    fn test_snapshot() {
        let cache = length_cache(10.0);
        let mut population = Population::new(3);
        population.push(individual(&["A", "B"]));
        population.fitness_values(&cache).unwrap();

        let snapshot = population.snapshot(&cache);
        assert_eq!(snapshot.generation, 3);
        assert_eq!(snapshot.individuals.len(), 1);
        assert_eq!(snapshot.individuals[0].fitness, Some(0.2));
        assert_eq!(snapshot.individuals[0].scores.get("Length"), Some(&0.2));
    }
}
