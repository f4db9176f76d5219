//! Command handlers.

use crate::artifacts::{Prediction, Predictor};
use crate::cli::logging::{self, LogLevel};
use crate::cli::{
    Cli, Command, ExploreArgs, PredictArgs, SelectArgs, SplitArgs, StandardizeArgs, TrainArgs,
};
use crate::config::TrainingConfig;
use crate::dataset::{load_csv, write_csv, Column};
use crate::error::Result;
use crate::explore;
use crate::model::ModelSpec;
use crate::pipeline;
use crate::selection::SelectionConfig;

/// Execute a parsed command line.
pub fn run_command(cli: Cli) -> Result<()> {
    logging::init(LogLevel::from_flags(cli.verbose, cli.quiet));

    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Compare(args) => run_compare(args),
        Command::Predict(args) => run_predict(args),
        Command::Split(args) => run_split(args),
        Command::Standardize(args) => run_standardize(args),
        Command::Select(args) => run_select(args),
        Command::Explore(args) => run_explore(args),
    }
}

/// Load the config file (or defaults) and apply command-line overrides.
fn resolve_config(args: &TrainArgs) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_yaml_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data = data.clone();
    }
    if let Some(target) = &args.target {
        config.preprocess.target_column = target.clone();
    }
    if let Some(kind) = args.model {
        if config.model.kind() != kind {
            config.model = ModelSpec::default_for(kind);
        }
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(seed) = args.seed {
        config.preprocess.seed = seed;
        config.model = config.model.clone().with_seed(seed);
        if let Some(search) = config.search.as_mut() {
            search.seed = seed;
            for candidate in search.candidates.iter_mut() {
                *candidate = candidate.clone().with_seed(seed);
            }
        }
    }
    config.validate()?;
    Ok(config)
}

fn run_train(args: TrainArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let report = pipeline::train(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render(config.top_features));
    }
    Ok(())
}

fn run_compare(args: TrainArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let report = pipeline::compare(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let predictor = Predictor::load(&args.model_dir)?;
    let loaded = load_csv(&args.input)?;
    let Prediction { labels, proba } = predictor.classify(&loaded.table)?;

    match &args.output {
        Some(path) => {
            let mut table = loaded.table;
            table.push_column(
                "predicted",
                Column::Categorical(labels.into_iter().map(Some).collect()),
            )?;
            for (k, class) in predictor.classes().iter().enumerate() {
                table.push_column(
                    format!("proba_{}", class),
                    Column::Numeric(proba.column(k).to_vec()),
                )?;
            }
            write_csv(path, &table, &loaded.comments)?;
            println!("wrote {} predictions to {}", table.n_rows(), path.display());
        }
        None => {
            println!("row,predicted,{}", predictor.classes().join(","));
            for (i, label) in labels.iter().enumerate() {
                let probs: Vec<String> = proba.row(i).iter().map(|p| format!("{:.4}", p)).collect();
                println!("{},{},{}", i, label, probs.join(","));
            }
        }
    }
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<()> {
    let summary = pipeline::split_file(
        &args.input,
        &args.train_out,
        &args.test_out,
        args.test_size,
        args.seed,
        args.stratify.as_deref(),
    )?;
    println!(
        "{} rows: {} train ({:.1}%), {} test ({:.1}%), seed {}",
        summary.total,
        summary.train,
        summary.train as f64 / summary.total as f64 * 100.0,
        summary.test,
        summary.test as f64 / summary.total as f64 * 100.0,
        args.seed
    );
    Ok(())
}

fn run_standardize(args: StandardizeArgs) -> Result<()> {
    let summary = pipeline::standardize_file(&args.input, args.output.as_deref(), args.mission)?;
    println!("{} ({}):", summary.column, args.mission);
    for (label, count) in &summary.before {
        println!("  before  {:<20} {}", label, count);
    }
    for (label, count) in &summary.after {
        println!("  after   {:<20} {}", label, count);
    }
    Ok(())
}

fn run_select(args: SelectArgs) -> Result<()> {
    let config = SelectionConfig {
        per_class: args.per_class,
        seed: args.seed,
    };
    let selection = pipeline::select_file(&args.input, &args.output, &config)?;
    println!(
        "selected {} candidates (of {}) and {} false positives (of {})",
        selection.candidates,
        selection.available_candidates,
        selection.false_positives,
        selection.available_false_positives
    );
    for (group, stats) in [
        ("candidates", selection.candidate_snr),
        ("false positives", selection.false_positive_snr),
    ] {
        println!(
            "  {:<16} SNR min {:.2}, max {:.2}, mean {:.2}",
            group, stats.min, stats.max, stats.mean
        );
    }
    println!("wrote {}", args.output.display());
    Ok(())
}

fn run_explore(args: ExploreArgs) -> Result<()> {
    let loaded = load_csv(&args.input)?;
    let label = loaded
        .table
        .has_column(&args.label)
        .then_some(args.label.as_str());
    print!("{}", explore::render_report(&loaded.table, label)?);
    Ok(())
}
