//! Document-structure model training CLI
//!
//! Trains the document type classifier and the structural score predictor
//! from feature CSVs and exports them for inference.

use clap::{Parser, Subcommand};
use docstruct::{Config, Result};

#[derive(Parser)]
#[command(name = "docstruct")]
#[command(about = "Train document-structure models from tabular features", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TrainArgs {
    /// Feature CSV
    #[arg(long)]
    data: String,
    /// Output directory for the model and metadata
    #[arg(long)]
    output: Option<String>,
    /// Override number of epochs
    #[arg(long)]
    epochs: Option<usize>,
    /// Override random seed
    #[arg(long)]
    seed: Option<u64>,
    /// Override learning rate
    #[arg(long)]
    lr: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the document type classifier
    TrainClassifier(TrainArgs),
    /// Train the structural score predictor
    TrainScorer(TrainArgs),
    /// Show an exported model's metadata
    Inspect {
        /// Metadata JSON file
        #[arg(long)]
        metadata: String,
    },
    /// Write a default config file
    Init,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::TrainClassifier(args) => commands::train(
            &config,
            docstruct::pipeline::PipelineSpec::document_classifier(),
            args,
        ),
        Commands::TrainScorer(args) => commands::train(
            &config,
            docstruct::pipeline::PipelineSpec::score_predictor(),
            args,
        ),
        Commands::Inspect { metadata } => commands::inspect(&metadata),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use docstruct::data::RecordTable;
    use docstruct::export::ModelMetadata;
    use docstruct::pipeline::{run_pipeline, PipelineSpec};
    use docstruct::training::{EvaluationReport, LogProgress};

    type TrainingBackend = Autodiff<NdArray<f32>>;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'docstruct train-classifier --data <csv>' to train the classifier");
        println!("  3. Run 'docstruct train-scorer --data <csv>' to train the score predictor");

        Ok(())
    }

    pub fn train(config: &Config, spec: PipelineSpec, args: TrainArgs) -> Result<()> {
        let mut config = config.clone();
        if let Some(output) = args.output {
            config.output.dir = output;
        }
        if let Some(epochs) = args.epochs {
            config.training.epochs = epochs;
        }
        if let Some(seed) = args.seed {
            config.training.seed = seed;
        }
        if let Some(lr) = args.lr {
            config.training.learning_rate = lr;
        }

        let table = RecordTable::from_csv_path(&args.data)?;
        let device = Default::default();
        let mut progress = LogProgress::new(config.training.progress_interval);

        let report = run_pipeline::<TrainingBackend>(&spec, &table, &config, &device, &mut progress)?;

        println!("\n{} training complete", report.name);
        println!("───────────────────────────────");
        println!(
            "  Samples:      train {}, val {}, test {}",
            report.train_samples, report.val_samples, report.test_samples
        );
        match report.best_epoch {
            Some(epoch) => println!("  Best epoch:   {}", epoch + 1),
            None => println!("  Best epoch:   none (final parameters kept)"),
        }
        match &report.evaluation {
            EvaluationReport::Classification(r) => {
                println!("  Test accuracy: {:.4}", r.accuracy)
            }
            EvaluationReport::Regression(r) => {
                println!("  Test MAE:     {:.4}", r.mae);
                println!("  Test RMSE:    {:.4}", r.rmse);
            }
        }
        println!("  Model:        {}", report.model_path.display());
        println!("  Metadata:     {}", report.metadata_path.display());

        Ok(())
    }

    pub fn inspect(path: &str) -> Result<()> {
        let metadata = ModelMetadata::load(path)?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Task:         {}", metadata.task());
        println!("  Model file:   {}", metadata.model_file);
        println!("  Input dim:    {}", metadata.input_dim);
        println!("  Features:     {}", metadata.feature_names.join(", "));
        println!(
            "  Hidden:       {}",
            metadata
                .architecture
                .hidden
                .iter()
                .map(|h| h.width.to_string())
                .collect::<Vec<_>>()
                .join(" → ")
        );
        if let Some(mapping) = &metadata.label_mapping {
            println!("  Classes:");
            for (code, name) in mapping {
                println!("    {}: {}", code, name);
            }
        }
        if let Some(acc) = metadata.test_accuracy {
            println!("  Test accuracy: {:.4}", acc);
        }
        if let Some(mae) = metadata.test_mae {
            println!("  Test MAE:     {:.4}", mae);
        }

        Ok(())
    }
}
