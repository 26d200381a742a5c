use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};

use crossrec::builder::EvaluationBuilder;
use crossrec::config::{EvaluationConfig, SeedingMode};
use crossrec::folds;
use crossrec::recommend::PredictionStrategy;
use crossrec::store::ProjectStore;
use crossrec::validator::Validator;

/// Recommend third-party libraries from similar projects and evaluate the
/// recommendations with contiguous k-fold cross-validation.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file; flags below override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding projects.txt, dicth_* and graph_* files
    #[arg(short, long, global = true)]
    source_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every fold and aggregate the results
    Run {
        /// user-based, item-based or hybrid
        #[arg(long)]
        strategy: Option<PredictionStrategy>,

        /// half-split or classifier-seeded
        #[arg(long)]
        seeding: Option<SeedingMode>,

        /// Neighbours kept in the presence matrix
        #[arg(long)]
        neighbours: Option<usize>,

        /// Largest evaluated cutoff
        #[arg(long)]
        cutoff: Option<usize>,

        /// Also score the classifier's own topics
        #[arg(long)]
        classifier_baseline: bool,

        /// Reuse similarity files from an interrupted run
        #[arg(long)]
        resume: bool,
    },
    /// Print fold boundaries for a number of projects
    Folds {
        projects: usize,

        #[arg(short, long, default_value_t = 10)]
        folds: usize,
    },
    /// Average existing Results/<Metric>_Round<k> files across folds
    Aggregate,
}

fn load_config(cli: &Cli) -> Result<EvaluationConfig> {
    let mut config = match &cli.config {
        Some(path) => EvaluationConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EvaluationConfig::default(),
    };
    if let Some(dir) = &cli.source_dir {
        config = config.with_source_dir(dir);
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match &cli.command {
        Commands::Run { strategy, seeding, neighbours, cutoff, classifier_baseline, resume } => {
            let mut config = load_config(&cli)?;
            if *resume {
                config = config.with_resume(true);
            }
            if let Some(s) = strategy {
                config = config.with_strategy(*s);
            }
            if let Some(s) = seeding {
                config = config.with_seeding(*s);
            }
            if let Some(k) = neighbours {
                config = config.with_neighbours(*k);
            }
            if let Some(c) = cutoff {
                config = config.with_cutoff(*c);
            }

            let runner = EvaluationBuilder::new(config).build()?;
            let reports = runner.run()?;
            for r in &reports {
                println!(
                    "{}\tprojects={}\tfailed={}\tP@1={:.4}\tR@{}={:.4}\trecall_rate={:.4}",
                    r.fold,
                    r.metrics.projects,
                    r.similarity.failed + r.recommendation.failed,
                    r.metrics.precision.first().copied().unwrap_or(0.0),
                    runner.config().cutoff,
                    r.metrics.recall.last().copied().unwrap_or(0.0),
                    r.metrics.recall_rate
                );
            }
            if *classifier_baseline {
                if let Some(report) = runner.evaluate_classifier()? {
                    info!("Classifier baseline covers {} projects", report.projects);
                }
            }
        }
        Commands::Folds { projects, folds: k } => {
            for fold in folds::folds(*projects, *k) {
                println!("{}", fold);
            }
        }
        Commands::Aggregate => {
            let config = load_config(&cli)?;
            let store = ProjectStore::open(&config);
            let rounds: Vec<usize> = (1..=config.num_folds).collect();
            let aggregated = Validator::new(&config, &store).aggregate_across_folds(&rounds)?;
            for (name, rows) in aggregated {
                println!("{}_Mean: {} lines", name, rows.len());
            }
        }
    }
    Ok(())
}
