//! Metamorphic search CLI - Run a guided search from JSON configuration.

use std::path::PathBuf;
use std::sync::Arc;

use metamorphic_search::{
    schema::{CommandConfig, SearchConfig},
    search::{CommandEvaluator, MetricCache, OperatorPool, ScoreFileMetric, SearchEngine},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Search for mutation sequences that change a model's metrics.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config = SearchConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    let Some(command) = config.program.command.clone() else {
        eprintln!("Error: program.command must name the program that evaluates a genotype");
        std::process::exit(1);
    };

    let output_dir = config.program.output_dir.clone();
    let evaluator = CommandEvaluator::new(command, output_dir.join("genotypes"));

    let mut cache = MetricCache::new().with_evaluator(Arc::new(evaluator));
    for metric in &config.metrics {
        cache
            .add_metric(Arc::new(ScoreFileMetric::from_config(metric)), metric.weight)
            .unwrap_or_else(|e| {
                eprintln!("Error registering metric: {}", e);
                std::process::exit(1);
            });
    }
    cache.init_weights().unwrap_or_else(|e| {
        eprintln!("Error normalizing metric weights: {}", e);
        std::process::exit(1);
    });

    let genes = OperatorPool::new(config.operators.clone()).unwrap_or_else(|e| {
        eprintln!("Error creating operator pool: {}", e);
        std::process::exit(1);
    });

    println!("Metamorphic Search");
    println!("==================");
    println!(
        "Algorithm: {}",
        if config.program.use_ga { "genetic" } else { "random" }
    );
    println!("Seed: {}", config.program.seed);
    println!("Population: {}", config.genetic.population_size);
    println!("Max gene length: {}", config.genetic.max_gene_length);
    println!("Time budget: {} min", config.program.max_time_minutes);
    println!("Operators: {}", config.operators.len());
    for metric in cache.metrics() {
        println!(
            "  Metric {}: weight {:+.3}{}",
            metric.name(),
            metric.weight(),
            if metric.is_secondary() { " (secondary)" } else { "" }
        );
    }
    println!();

    let mut engine = SearchEngine::new(
        config.program,
        config.genetic,
        Arc::new(cache),
        Arc::new(genes),
    )
    .unwrap_or_else(|e| {
        eprintln!("Error creating search engine: {}", e);
        std::process::exit(1);
    })
    .with_individuals_dir(output_dir.join("individuals"));

    println!("Running search...");
    let result = engine
        .run_with_callback(|progress| {
            println!(
                "  Generation {}: fittest={:.4}, best={:.4}, size={:.2}, pareto={}, {} evaluations",
                progress.generation,
                progress.generation_best,
                progress.best_fitness,
                progress.average_size,
                progress.pareto_size,
                progress.evaluations
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    let path = result.save(&output_dir).unwrap_or_else(|e| {
        eprintln!("Error writing results: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!("Generations: {}", result.stats.generations);
    println!(
        "Baseline fitness: {:.4}",
        result.baseline.fitness.unwrap_or_default()
    );
    println!(
        "Best fitness: {:.4} ({} genes)",
        result.best.fitness.unwrap_or_default(),
        result.best.genes.len()
    );
    println!("Pareto front: {} individuals", result.pareto_front.len());
    println!(
        "Evaluations: {} ({} cache hits, {:.1}s in evaluator)",
        result.stats.evaluations, result.stats.cache_hits, result.stats.evaluation_seconds
    );
    println!("Time: {:.2}s", result.stats.elapsed_seconds);
    println!("Results written to {}", path.display());
}

fn print_example_config() {
    let mut config = SearchConfig::default();
    config.program.command = Some(CommandConfig {
        program: PathBuf::from("./evaluate.sh"),
        args: vec!["--model".to_string(), "models/java14_model".to_string()],
        retries: 3,
    });

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example config: {}", e);
            std::process::exit(1);
        }
    }
}
