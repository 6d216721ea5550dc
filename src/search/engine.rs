//! Search driver: runs a strategy generation by generation and reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::schema::{
    FitnessSummary, GenerationSummary, GeneticConfig, ProgramConfig, SearchProgress,
    SearchResult, SearchStats, StopReason,
};

use super::SearchError;
use super::archive::ParetoFront;
use super::fitness::MetricCache;
use super::genetic::GeneticAlgorithm;
use super::genome::{GeneSource, GenomeRng};
use super::individual::Individual;
use super::population::Population;
use super::random::RandomAlgorithm;

/// A population-based search algorithm the engine can drive.
pub trait SearchStrategy {
    fn name(&self) -> &'static str;

    fn initial_population(&mut self) -> Result<Population, SearchError>;

    /// Produce the population that follows the (evaluated) `population`.
    fn next_population(&mut self, population: &Population) -> Result<Population, SearchError>;

    fn check_pareto(&mut self, population: &Population) -> Result<(), SearchError>;

    fn pareto_front(&self) -> &ParetoFront;

    fn generation(&self) -> usize;

    /// Strategy-specific stop condition, checked before `population` is
    /// evaluated.
    fn stop_reason(&self, population: &Population, steady_generations: usize) -> Option<StopReason>;

    fn reset(&mut self);
}

impl SearchStrategy for GeneticAlgorithm {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn initial_population(&mut self) -> Result<Population, SearchError> {
        GeneticAlgorithm::initial_population(self)
    }

    fn next_population(&mut self, population: &Population) -> Result<Population, SearchError> {
        self.evolve_population(population)
    }

    fn check_pareto(&mut self, population: &Population) -> Result<(), SearchError> {
        GeneticAlgorithm::check_pareto(self, population)
    }

    fn pareto_front(&self) -> &ParetoFront {
        GeneticAlgorithm::pareto_front(self)
    }

    fn generation(&self) -> usize {
        GeneticAlgorithm::generation(self)
    }

    fn stop_reason(&self, _: &Population, steady_generations: usize) -> Option<StopReason> {
        (steady_generations > self.config().max_steady_generations).then_some(StopReason::Converged)
    }

    fn reset(&mut self) {
        GeneticAlgorithm::reset(self)
    }
}

impl SearchStrategy for RandomAlgorithm {
    fn name(&self) -> &'static str {
        "random"
    }

    fn initial_population(&mut self) -> Result<Population, SearchError> {
        RandomAlgorithm::initial_population(self)
    }

    fn next_population(&mut self, population: &Population) -> Result<Population, SearchError> {
        self.next_generation(population)
    }

    fn check_pareto(&mut self, population: &Population) -> Result<(), SearchError> {
        RandomAlgorithm::check_pareto(self, population)
    }

    fn pareto_front(&self) -> &ParetoFront {
        RandomAlgorithm::pareto_front(self)
    }

    fn generation(&self) -> usize {
        RandomAlgorithm::generation(self)
    }

    fn stop_reason(&self, population: &Population, _: usize) -> Option<StopReason> {
        (population.average_size() > self.max_gene_length() as f64)
            .then_some(StopReason::PopulationTooLong)
    }

    fn reset(&mut self) {
        RandomAlgorithm::reset(self)
    }
}

/// Search engine that runs one strategy to completion.
pub struct SearchEngine {
    program: ProgramConfig,
    strategy: Box<dyn SearchStrategy>,
    cache: Arc<MetricCache>,
    individuals_dir: Option<PathBuf>,
    cancelled: Arc<AtomicBool>,
}

impl SearchEngine {
    /// Create an engine running the genetic algorithm or the random baseline,
    /// as selected by `program.use_ga`. `cache` must have normalized weights.
    pub fn new(
        program: ProgramConfig,
        genetic: GeneticConfig,
        cache: Arc<MetricCache>,
        genes: Arc<dyn GeneSource>,
    ) -> Result<Self, SearchError> {
        let rng = GenomeRng::new(program.seed);
        let strategy: Box<dyn SearchStrategy> = if program.use_ga {
            Box::new(GeneticAlgorithm::new(genetic, genes, Arc::clone(&cache), rng)?)
        } else {
            Box::new(RandomAlgorithm::new(
                genetic.population_size,
                genetic.max_gene_length,
                genes,
                Arc::clone(&cache),
                rng,
            )?)
        };
        Ok(Self::with_strategy(program, cache, strategy))
    }

    pub fn with_strategy(
        program: ProgramConfig,
        cache: Arc<MetricCache>,
        strategy: Box<dyn SearchStrategy>,
    ) -> Self {
        Self {
            program,
            strategy,
            cache,
            individuals_dir: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Write a JSON record of every evaluated individual into `dir`.
    pub fn with_individuals_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.individuals_dir = Some(dir.into());
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn strategy(&self) -> &dyn SearchStrategy {
        self.strategy.as_ref()
    }

    pub fn cache(&self) -> &Arc<MetricCache> {
        &self.cache
    }

    /// Clear run-scoped state so the engine can run again.
    pub fn reset(&mut self) {
        self.strategy.reset();
        self.cancelled.store(false, Ordering::Relaxed);
    }

    fn should_stop(
        &self,
        population: &Population,
        steady_generations: usize,
        generations: usize,
        start: Instant,
    ) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if let Some(reason) = self.strategy.stop_reason(population, steady_generations) {
            return Some(reason);
        }

        if let Some(limit) = self.program.max_generations
            && generations >= limit
        {
            return Some(StopReason::MaxGenerations);
        }

        let budget = Duration::from_secs(self.program.max_time_minutes.saturating_mul(60));
        if start.elapsed() >= budget {
            return Some(StopReason::TimeBudget);
        }

        None
    }

    /// Run the search (blocking).
    pub fn run(&mut self) -> Result<SearchResult, SearchError> {
        self.run_with_callback(|_| {})
    }

    /// Run the search, reporting progress after every generation.
    ///
    /// The empty genotype is evaluated first as the baseline; it seeds the
    /// best-so-far fitness and is offered to the Pareto archive.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        let start = Instant::now();
        if self.cache.active_metrics().next().is_none() {
            return Err(SearchError::NoActiveMetric);
        }
        log::info!("Starting {} search", self.strategy.name());

        let baseline = Arc::new(Individual::new(0));
        let baseline_fitness = baseline.fitness(&self.cache)?;
        log::info!(
            "Initial fitness without transformations: {:.4}",
            baseline_fitness
        );
        let mut seed = Population::new(0);
        seed.push_shared(Arc::clone(&baseline));
        self.strategy.check_pareto(&seed)?;

        let mut best = Arc::clone(&baseline);
        let mut best_fitness = baseline_fitness;
        let mut steady_generations = 0;
        let mut history: Vec<GenerationSummary> = Vec::new();
        let mut all_fitness = Vec::new();
        let mut size_sum = 0.0;

        let mut population = self.strategy.initial_population()?;
        let stop_reason = loop {
            if let Some(reason) =
                self.should_stop(&population, steady_generations, history.len(), start)
            {
                break reason;
            }

            self.cache.evaluate_all(population.individuals())?;
            self.strategy.check_pareto(&population)?;

            let fitness = population.fitness_values(&self.cache)?;
            let fittest = population
                .fittest(&self.cache)?
                .ok_or(SearchError::EmptyPopulation)?;
            let generation_best = fittest.fitness(&self.cache)?;

            if generation_best > best_fitness {
                best = Arc::clone(&fittest);
                best_fitness = generation_best;
                steady_generations = 0;
            } else {
                steady_generations += 1;
            }

            let average_size = population.average_size();
            let summary = FitnessSummary::from_values(&fitness).ok_or(SearchError::EmptyPopulation)?;
            log::info!(
                "Generation {}: fittest {:.4}, best {:.4}, average size {:.2}",
                population.generation(),
                generation_best,
                best_fitness,
                average_size
            );
            log::debug!("Fittest individual: {}", fittest);
            log::debug!("Pareto front: {}", self.strategy.pareto_front());

            if let Some(dir) = &self.individuals_dir {
                for record in population.snapshot(&self.cache).individuals {
                    record.save(dir)?;
                }
            }

            history.push(GenerationSummary {
                generation: population.generation(),
                fitness: summary,
                average_size,
                pareto_size: self.strategy.pareto_front().len(),
                fittest: fittest.hex_hash(),
            });
            all_fitness.extend(fitness);
            size_sum += average_size;

            callback(&SearchProgress {
                generation: population.generation(),
                best_fitness,
                generation_best,
                average_size,
                steady_generations,
                pareto_size: self.strategy.pareto_front().len(),
                evaluations: self.cache.stats().evaluations,
                elapsed_seconds: start.elapsed().as_secs_f64(),
            });

            population = self.strategy.next_population(&population)?;
        };

        log::info!(
            "Search finished after {} generations: {:?}",
            history.len(),
            stop_reason
        );

        let cache_stats = self.cache.stats();
        let generations = history.len();
        let average_size = if generations > 0 {
            size_sum / generations as f64
        } else {
            0.0
        };

        Ok(SearchResult {
            baseline: baseline.to_record(&self.cache),
            best: best.to_record(&self.cache),
            pareto_front: self.strategy.pareto_front().records(),
            metrics: self.cache.metric_summaries(),
            overall: FitnessSummary::from_values(&all_fitness),
            history,
            stats: SearchStats {
                generations,
                evaluations: cache_stats.evaluations,
                cache_hits: cache_stats.hits,
                evaluation_seconds: cache_stats.evaluation_time.as_secs_f64(),
                elapsed_seconds: start.elapsed().as_secs_f64(),
                average_size,
                stop_reason,
            },
        })
    }
}
