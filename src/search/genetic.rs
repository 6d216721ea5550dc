//! Genetic algorithm for variable-length genotypes.
//!
//! One generation step draws parent pairs by tournament, recombines them with a
//! positional crossover that keeps each parent's genome length, and then
//! grows or shrinks a random share of the offspring.

use std::sync::Arc;

use crate::schema::GeneticConfig;

use super::SearchError;
use super::archive::ParetoFront;
use super::fitness::MetricCache;
use super::genome::{GeneSource, GenomeRng};
use super::individual::Individual;
use super::population::Population;

pub struct GeneticAlgorithm {
    config: GeneticConfig,
    rng: GenomeRng,
    genes: Arc<dyn GeneSource>,
    cache: Arc<MetricCache>,
    front: ParetoFront,
    generation: usize,
}

impl GeneticAlgorithm {
    /// Create a genetic algorithm. Fails on invalid operator settings.
    pub fn new(
        config: GeneticConfig,
        genes: Arc<dyn GeneSource>,
        cache: Arc<MetricCache>,
        rng: GenomeRng,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        let front = ParetoFront::new(Arc::clone(&cache));
        Ok(Self {
            config,
            rng,
            genes,
            cache,
            front,
            generation: 0,
        })
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn pareto_front(&self) -> &ParetoFront {
        &self.front
    }

    pub fn cache(&self) -> &Arc<MetricCache> {
        &self.cache
    }

    /// Sample the first population.
    pub fn initial_population(&mut self) -> Result<Population, SearchError> {
        Population::initialize(
            self.config.population_size,
            self.config.growth_factor,
            self.generation,
            &mut self.rng,
            self.genes.as_ref(),
        )
    }

    /// Build the next generation from `population`.
    pub fn evolve_population(&mut self, population: &Population) -> Result<Population, SearchError> {
        self.generation += 1;
        log::debug!("Evolving generation {}", self.generation);

        let target = self.config.population_size;
        let mut offspring: Vec<Individual> = Vec::with_capacity(target);

        while offspring.len() < target {
            let first = self
                .tournament_selection(population)?
                .ok_or(SearchError::EmptyPopulation)?;
            let second = self
                .tournament_selection(population)?
                .ok_or(SearchError::EmptyPopulation)?;

            let (mut child1, mut child2) = self.crossover(&first, &second);
            child1.set_parents(&first, &second)?;
            child2.set_parents(&first, &second)?;

            offspring.push(child1);
            if offspring.len() < target {
                offspring.push(child2);
            }
        }

        for child in &mut offspring {
            if self.rng.uniform() < self.config.mutation_rate {
                self.mutate(child);
            }
        }

        let mut next = Population::new(self.generation);
        for child in offspring {
            next.push(child);
        }
        Ok(next)
    }

    /// Positional crossover.
    ///
    /// At every position of `first`, the first child takes `second`'s gene if
    /// `second` is long enough and a draw falls below the crossover rate; the
    /// second child mirrors this. Children inherit their parent's length.
    pub fn crossover(&mut self, first: &Individual, second: &Individual) -> (Individual, Individual) {
        log::trace!(
            "Performing crossover between {} and {}",
            first.short_hash(),
            second.short_hash()
        );
        let child1 = self.recombine(first, second);
        let child2 = self.recombine(second, first);
        (child1, child2)
    }

    fn recombine(&mut self, base: &Individual, donor: &Individual) -> Individual {
        let mut child = Individual::new(self.generation);
        for (i, gene) in base.genes().iter().enumerate() {
            let take_donor = self.rng.uniform() < self.config.crossover_rate;
            match donor.gene(i) {
                Some(other) if take_donor => child.add_gene(other.clone()),
                _ => child.add_gene(gene.clone()),
            }
        }
        child
    }

    /// Grow or shrink `individual`.
    ///
    /// At the length cap, or when a draw exceeds the increase-size rate, one
    /// gene is removed. Otherwise genes are appended while a draw stays below
    /// `base^k` for the k-th append, with `base = (g - 1) / g` for growth
    /// factor `g`, so larger growth factors append more genes on average.
    pub fn mutate(&mut self, individual: &mut Individual) {
        let max_length = self.config.max_gene_length;
        if individual.len() >= max_length || self.rng.uniform() > self.config.increase_size_rate {
            individual.decrease(&mut self.rng);
            return;
        }

        let growth_factor = self.config.growth_factor;
        if growth_factor <= 1.0 {
            // base is 0: only the first draw (against 0^0 = 1) can succeed.
            individual.increase(max_length, &mut self.rng, self.genes.as_ref());
            return;
        }

        let base = (growth_factor - 1.0) / growth_factor;
        let mut acceptance = 1.0;
        while individual.len() < max_length && self.rng.uniform() < acceptance {
            individual.increase(max_length, &mut self.rng, self.genes.as_ref());
            acceptance *= base;
        }
    }

    /// Fittest member of a randomly drawn tournament, `None` for an empty
    /// population.
    pub fn tournament_selection(
        &mut self,
        population: &Population,
    ) -> Result<Option<Arc<Individual>>, SearchError> {
        if population.is_empty() {
            return Ok(None);
        }

        let size = self.config.tournament_size;
        if !self.config.tournament_with_replacement && size >= population.len() {
            return Ok(population.fittest(&self.cache)?);
        }

        let indices = if self.config.tournament_with_replacement {
            (0..size)
                .map(|_| self.rng.index(population.len()))
                .collect::<Vec<_>>()
        } else {
            self.rng.distinct_indices(population.len(), size)
        };

        let mut tournament = Population::new(self.generation);
        for index in indices {
            if let Some(candidate) = population.individual(index) {
                tournament.push_shared(Arc::clone(candidate));
            }
        }
        Ok(tournament.fittest(&self.cache)?)
    }

    /// Offer every member of `population` to the Pareto archive, one at a time.
    pub fn check_pareto(&mut self, population: &Population) -> Result<(), SearchError> {
        for individual in population.iter() {
            self.front.add(Arc::clone(individual))?;
        }
        Ok(())
    }

    /// Tear down run-scoped state: archive, cached results and generation.
    pub fn reset(&mut self) {
        self.front.clear();
        self.cache.reset();
        self.generation = 0;
    }
}
