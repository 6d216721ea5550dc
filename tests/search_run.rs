//! End-to-end search runs through the public API.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metamorphic_search::schema::{
    CommandConfig, GeneticConfig, ProgramConfig, SearchResult, StopReason,
};
use metamorphic_search::search::{
    CommandEvaluator, EvaluationError, Evaluator, Individual, Metric, MetricCache, OperatorPool,
    ScoreFileMetric, SearchEngine, dominates,
};

/// Result locator is the genotype hash; nothing is written to disk.
#[derive(Default)]
struct InMemoryEvaluator {
    calls: AtomicUsize,
}

impl Evaluator for InMemoryEvaluator {
    fn evaluate(&self, individual: &Individual) -> Result<PathBuf, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from(individual.hex_hash()))
    }
}

/// Share of genes that apply the given operator.
struct OperatorShare(&'static str);

impl Metric for OperatorShare {
    fn name(&self) -> &str {
        "OperatorShare"
    }

    fn apply(&self, individual: &Individual, _: &Path) -> Result<f64, EvaluationError> {
        if individual.is_empty() {
            return Ok(0.0);
        }
        let hits = individual
            .genes()
            .iter()
            .filter(|g| g.operator == self.0)
            .count();
        Ok(hits as f64 / individual.len() as f64)
    }
}

/// Genome length relative to ten genes.
struct Size;

impl Metric for Size {
    fn name(&self) -> &str {
        "Size"
    }

    fn apply(&self, individual: &Individual, _: &Path) -> Result<f64, EvaluationError> {
        Ok((individual.len() as f64 / 10.0).min(1.0))
    }
}

fn operators() -> Arc<OperatorPool> {
    Arc::new(
        OperatorPool::new(vec![
            "RenameVariable".to_string(),
            "AddNeutralElement".to_string(),
            "IfTrueStatement".to_string(),
        ])
        .unwrap(),
    )
}

fn cache(evaluator: Arc<InMemoryEvaluator>) -> Arc<MetricCache> {
    let mut cache = MetricCache::new().with_evaluator(evaluator);
    cache
        .add_metric(Arc::new(OperatorShare("RenameVariable")), 2.0)
        .unwrap();
    cache.add_metric(Arc::new(Size), -1.0).unwrap();
    cache.init_weights().unwrap();
    Arc::new(cache)
}

fn program(use_ga: bool, max_generations: usize) -> ProgramConfig {
    ProgramConfig {
        seed: 2022,
        use_ga,
        max_generations: Some(max_generations),
        ..Default::default()
    }
}

fn genetic() -> GeneticConfig {
    GeneticConfig {
        population_size: 8,
        tournament_size: 3,
        max_gene_length: 10,
        growth_factor: 3.0,
        max_steady_generations: 1000,
        ..Default::default()
    }
}

fn run(use_ga: bool, generations: usize) -> (SearchResult, usize) {
    let evaluator = Arc::new(InMemoryEvaluator::default());
    let mut engine = SearchEngine::new(
        program(use_ga, generations),
        genetic(),
        cache(Arc::clone(&evaluator)),
        operators(),
    )
    .unwrap();
    let result = engine.run().unwrap();
    (result, evaluator.calls.load(Ordering::SeqCst))
}

fn score_vector(record: &metamorphic_search::schema::IndividualRecord) -> Vec<f64> {
    vec![record.scores["OperatorShare"], record.scores["Size"]]
}

#[test]
fn test_genetic_search_improves_on_baseline() {
    let (result, _) = run(true, 10);

    assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
    assert_eq!(result.stats.generations, 10);
    assert_eq!(result.history.len(), 10);

    // Baseline: share 0 (maximized), size 0 (minimized): 2/3 * 0 + 1/3 * 1.
    let baseline = result.baseline.fitness.unwrap();
    assert!((baseline - 1.0 / 3.0).abs() < 1e-9);
    assert!(result.best.fitness.unwrap() > baseline);
    assert!(result.best.scores["OperatorShare"] > 0.0);

    let weights: f64 = result.metrics.iter().map(|m| m.weight.abs()).sum();
    assert!((weights - 1.0).abs() < 1e-9);
}

#[test]
fn test_pareto_front_is_mutually_non_dominated() {
    let (result, _) = run(true, 8);
    assert!(!result.pareto_front.is_empty());

    for a in &result.pareto_front {
        assert_eq!(a.scores.len(), 2);
        for b in &result.pareto_front {
            if a.hash != b.hash {
                assert!(!dominates(&score_vector(a), &score_vector(b)));
            }
        }
    }
}

#[test]
fn test_each_genotype_evaluated_once() {
    let (result, calls) = run(true, 6);
    assert_eq!(calls as u64, result.stats.evaluations);

    let evaluated = 8 * result.stats.generations + 1;
    assert!(calls <= evaluated);
}

#[test]
fn test_random_search_runs() {
    let (result, _) = run(false, 5);
    assert_eq!(result.stats.generations, 5);
    assert!(result.history.iter().all(|h| h.pareto_size >= 1));
    assert_eq!(result.history[0].average_size, 1.0);
}

#[test]
fn test_runs_are_reproducible() {
    let (first, _) = run(true, 5);
    let (second, _) = run(true, 5);

    assert_eq!(first.best.hash, second.best.hash);
    let hashes = |r: &SearchResult| r.history.iter().map(|h| h.fittest.clone()).collect::<Vec<_>>();
    assert_eq!(hashes(&first), hashes(&second));
}

#[test]
fn test_result_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let (result, _) = run(true, 3);

    let path = result.save(dir.path()).unwrap();
    let loaded = SearchResult::load(&path).unwrap();
    assert_eq!(loaded.best, result.best);
    assert_eq!(loaded.pareto_front.len(), result.pareto_front.len());
    assert_eq!(loaded.stats.generations, 3);
}

#[cfg(unix)]
#[test]
fn test_command_backed_search() {
    let dir = tempfile::tempdir().unwrap();
    // F1 drops as genomes grow: 1 / (1 + genes).
    let script = r#"n=$(grep -c operator "$0/genotype.json"); echo "{\"F1\": $(awk -v n="$n" 'BEGIN { print 1 / (1 + n) }')}" > "$0/metrics.json""#;
    let evaluator = CommandEvaluator::new(
        CommandConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            retries: 1,
        },
        dir.path().join("genotypes"),
    );

    let mut cache = MetricCache::new().with_evaluator(Arc::new(evaluator));
    cache
        .add_metric(Arc::new(ScoreFileMetric::new("F1", "metrics.json")), -1.0)
        .unwrap();
    cache.init_weights().unwrap();

    let mut engine = SearchEngine::new(
        program(true, 2),
        GeneticConfig {
            population_size: 3,
            ..genetic()
        },
        Arc::new(cache),
        operators(),
    )
    .unwrap()
    .with_individuals_dir(dir.path().join("individuals"));

    let result = engine.run().unwrap();
    assert_eq!(result.baseline.scores["F1"], 1.0);
    assert_eq!(result.baseline.fitness, Some(0.0));
    assert!(result.best.fitness.unwrap() >= 0.5);
    assert!(result.best.result_path.as_ref().is_some_and(|p| p.exists()));
    assert!(dir.path().join("individuals").read_dir().unwrap().count() >= 1);
}
