use clap::{Parser, ValueEnum};
use math_differential_evolution::{
    Agglomerative, Bounds, DEConfig, DEConfigBuilder, Dbscan, DifferentialEvolution, FineTuner,
    KMeans, LatinHypercubeInitializer, ObjectiveFunction, PopulationInitializer,
    PopulationReduction, SearchSpace, SimulationStatistics, Simulations, UniformInitializer,
    function_registry::FunctionRegistry,
    recorder::default_records_dir,
    reduction::DEFAULT_CLUSTERING_ITERATION,
    simulation::successful_traces,
    write_traces_csv,
};
use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "run_de",
    about = "Run a differential evolution variant on a benchmark function"
)]
struct Cli {
    /// Name of the benchmark function to optimize (use --list-functions to see available options)
    #[arg(long, default_value = "sphere")]
    function: String,

    /// Dimensionality of the problem
    #[arg(long, default_value_t = 2)]
    dim: usize,

    /// Engine variant
    #[arg(long, value_enum, default_value_t = Variant::Plain)]
    variant: Variant,

    /// Number of iterations
    #[arg(long, default_value_t = 100)]
    iterations: usize,

    /// Population size
    #[arg(long, default_value_t = 50)]
    population: usize,

    /// Scaling factor F (ignored by the randomized variant)
    #[arg(short = 'F', long, default_value_t = 0.5)]
    scaling_factor: f64,

    /// Crossover rate CR in [0, 1] (ignored by the randomized variant)
    #[arg(long, default_value_t = 0.5)]
    crossover_rate: f64,

    /// Clustering algorithm used by the clustering-* variants
    #[arg(long, value_enum, default_value_t = Algorithm::Kmeans)]
    algorithm: Algorithm,

    /// Number of clusters for k-means and agglomerative clustering
    #[arg(long, default_value_t = 5)]
    clusters: usize,

    /// DBSCAN neighbourhood radius
    #[arg(long, default_value_t = 0.5)]
    eps: f64,

    /// DBSCAN minimum neighbourhood size
    #[arg(long, default_value_t = 5)]
    min_samples: usize,

    /// Iteration at which the clustering-* variants reduce the population
    #[arg(long, default_value_t = DEFAULT_CLUSTERING_ITERATION)]
    cluster_at: usize,

    /// Initialization scheme for the population
    #[arg(long, value_enum, default_value_t = InitChoice::Uniform)]
    init: InitChoice,

    /// Optional random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Run this many independent simulations and record their traces
    #[arg(long)]
    simulations: Option<usize>,

    /// Worker threads for simulations and tuning
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// CSV file receiving the simulation traces (defaults to the cache directory)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Tune the configuration with a TPE study instead of running it
    #[arg(long)]
    tune: bool,

    /// Number of tuning trials
    #[arg(long, default_value_t = 50)]
    trials: usize,

    /// JSON file describing the tuning search space
    #[arg(long)]
    space: Option<PathBuf>,

    /// List all available functions and exit
    #[arg(long)]
    list_functions: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Variant {
    Plain,
    Randomized,
    ClusteringBest,
    ClusteringAverage,
    ClusteringBestAll,
    Agglomerative,
    RandomSample,
    KmeansRegrow,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Algorithm {
    Kmeans,
    Agglomerative,
    Dbscan,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum InitChoice {
    Uniform,
    LatinHypercube,
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(2);
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let registry = FunctionRegistry::new();
    if args.list_functions {
        println!("Available test functions:");
        for name in registry.list_functions() {
            println!("- {name}");
        }
        return;
    }

    let function_name = args.function.trim().to_lowercase();
    let Some(benchmark) = registry.get(&function_name) else {
        exit_with(format!(
            "function '{}' not found. Use --list-functions to inspect available names.",
            args.function
        ));
    };

    let bounds =
        Bounds::cube(benchmark.low, benchmark.high, args.dim).unwrap_or_else(|e| exit_with(e));
    let config = build_config(&args).unwrap_or_else(|e| exit_with(e));
    let reduction = build_reduction(&args);

    let uniform = UniformInitializer::new(bounds.clone());
    let lhs = LatinHypercubeInitializer::new(bounds);
    let init: &(dyn PopulationInitializer + Sync) = match args.init {
        InitChoice::Uniform => &uniform,
        InitChoice::LatinHypercube => &lhs,
    };

    let objective = benchmark.function;
    let mut engine = DifferentialEvolution::new(&objective, init);
    if let Some(reduction) = reduction {
        engine = engine.with_reduction(reduction);
    }

    println!(
        "Running {:?} on '{}' ({}D), N = {}, {} iterations",
        args.variant, function_name, args.dim, config.population_size, config.iterations
    );
    let start = Instant::now();

    if args.tune {
        tune(&args, &engine, &config);
    } else if let Some(runs) = args.simulations {
        simulate(&args, &engine, &config, runs, &function_name);
    } else {
        single_run(&engine, &config);
    }

    println!("Completed in {:.2?}", start.elapsed());
}

fn build_config(args: &Cli) -> math_differential_evolution::Result<DEConfig> {
    let mut builder = DEConfigBuilder::new()
        .iterations(args.iterations)
        .population_size(args.population);
    builder = match args.variant {
        Variant::Randomized => builder.randomized(),
        _ => builder
            .scaling_factor(args.scaling_factor)
            .crossover_rate(args.crossover_rate),
    };
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    builder.build()
}

fn build_reduction(args: &Cli) -> Option<PopulationReduction> {
    macro_rules! with_algorithm {
        ($ctor:ident) => {
            match args.algorithm {
                Algorithm::Kmeans => {
                    PopulationReduction::$ctor(KMeans::new(args.clusters), args.cluster_at)
                }
                Algorithm::Agglomerative => {
                    PopulationReduction::$ctor(Agglomerative::new(args.clusters), args.cluster_at)
                }
                Algorithm::Dbscan => PopulationReduction::$ctor(
                    Dbscan::new(args.eps, args.min_samples),
                    args.cluster_at,
                ),
            }
        };
    }

    match args.variant {
        Variant::Plain | Variant::Randomized => None,
        Variant::ClusteringBest => Some(with_algorithm!(clustering_best)),
        Variant::ClusteringAverage => Some(with_algorithm!(clustering_average)),
        Variant::ClusteringBestAll => Some(with_algorithm!(clustering_best_all)),
        Variant::Agglomerative => Some(PopulationReduction::reduction_agglomerative()),
        Variant::RandomSample => Some(PopulationReduction::reduction_random_sample()),
        Variant::KmeansRegrow => Some(PopulationReduction::reduction_kmeans_regrow()),
    }
}

fn single_run<F, I>(engine: &DifferentialEvolution<'_, F, I>, config: &DEConfig)
where
    F: ObjectiveFunction + ?Sized,
    I: PopulationInitializer + ?Sized,
{
    let report = engine
        .run(config)
        .unwrap_or_else(|e| exit_with(format!("optimization failed: {e}")));

    for event in &report.reductions {
        println!(
            "iter {:>5} | reduced {} -> {}",
            event.iteration, event.size_before, event.size_after
        );
    }
    println!(
        "Iterations: {} | Evaluations: {} | Final population: {}",
        report.nit,
        report.nfev,
        report.population.nrows()
    );
    println!("Best objective: {:.6e}", report.fun);

    let mut best_vector = String::new();
    for (idx, value) in report.x.iter().enumerate() {
        if idx > 0 {
            best_vector.push_str(", ");
        }
        let _ = write!(&mut best_vector, "{value:.6}");
    }
    println!("Best parameters: [{}]", best_vector);
}

fn simulate<F, I>(
    args: &Cli,
    engine: &DifferentialEvolution<'_, F, I>,
    config: &DEConfig,
    runs: usize,
    function_name: &str,
) where
    F: ObjectiveFunction + Sync + ?Sized,
    I: PopulationInitializer + Sync + ?Sized,
{
    let mut simulations = Simulations::new(runs).with_jobs(args.jobs);
    if let Some(seed) = args.seed {
        simulations = simulations.with_seed(seed);
    }
    let results = simulations.run(engine, config);

    match SimulationStatistics::from_results(&results) {
        Some(stats) => println!(
            "{} runs ({} failed) | mean {:.6e} | std {:.6e} | min {:.6e} | max {:.6e}",
            stats.runs, stats.failures, stats.mean, stats.std, stats.min, stats.max
        ),
        None => exit_with("every simulation run failed"),
    }

    let path = match &args.output {
        Some(path) => path.clone(),
        None => {
            let dir = default_records_dir().unwrap_or_else(|e| exit_with(e));
            let name = format!("{}_{}d_{:?}.csv", function_name, args.dim, args.variant);
            dir.join(name.to_lowercase())
        }
    };
    let traces = successful_traces(results);
    if let Err(e) = write_traces_csv(&path, &traces) {
        exit_with(format!("cannot write {}: {e}", path.display()));
    }
    println!("Traces written to {}", path.display());
}

fn tune<F, I>(args: &Cli, engine: &DifferentialEvolution<'_, F, I>, config: &DEConfig)
where
    F: ObjectiveFunction + Sync + ?Sized,
    I: PopulationInitializer + Sync + ?Sized,
{
    let space = match &args.space {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .unwrap_or_else(|e| exit_with(format!("cannot read {}: {e}", path.display())));
            SearchSpace::from_json(&json).unwrap_or_else(|e| exit_with(e))
        }
        None => SearchSpace::default_for(&config.parameters),
    };

    let tuner = FineTuner {
        trials: args.trials,
        jobs: args.jobs,
        seed: args.seed,
    };
    let report = tuner
        .tune(engine, config, &space)
        .unwrap_or_else(|e| exit_with(format!("tuning failed: {e}")));

    let failed = report.trials.iter().filter(|t| t.score.is_err()).count();
    println!(
        "{} trials ({} failed) | best score {:.6e}",
        report.trials.len(),
        failed,
        report.best_score
    );
    println!(
        "Best configuration: N = {}, parameters = {:?}",
        report.best_config.population_size, report.best_config.parameters
    );
}
