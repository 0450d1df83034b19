use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod data;
mod error;
mod form;
mod models;
mod report;
mod service;
mod store;
mod tier;
mod trainer;
mod validate;

use config::{Settings, DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH};
use form::{handle_submission, FormResponse, Method, PredictionForm};
use service::PredictionService;
use trainer::SplitConfig;

#[derive(Parser)]
#[command(name = "grade-predictor")]
#[command(about = "Predicts a student's final grade and performance tier", long_about = None)]
struct Cli {
    /// Persisted model artifact
    #[arg(long, global = true, env = "GRADE_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,
    /// Historical records used for training
    #[arg(long, global = true, env = "GRADE_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    data_path: PathBuf,
    /// Share of records held out from fitting
    #[arg(long, global = true, default_value_t = 0.2)]
    test_ratio: f64,
    /// Seed for the train/holdout shuffle
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic training CSV
    Seed {
        #[arg(long, default_value = DEFAULT_DATA_PATH)]
        out: PathBuf,
        #[arg(long, default_value_t = 200)]
        rows: usize,
    },
    /// Train on the historical records and persist the model
    Train,
    /// Load the persisted model and show its parameters
    Reload,
    /// Predict the final grade for one student
    Predict {
        #[arg(long)]
        hours: String,
        #[arg(long)]
        attendance: String,
        #[arg(long)]
        completed: String,
        #[arg(long)]
        partial: String,
    },
    /// Show the performance tier of a grade
    Classify {
        #[arg(long, allow_negative_numbers = true)]
        grade: f64,
    },
    /// Generate a markdown training report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings {
        model_path: cli.model_path,
        data_path: cli.data_path,
        split: SplitConfig {
            test_ratio: cli.test_ratio,
            seed: cli.seed,
        },
    };

    match cli.command {
        Commands::Seed { out, rows } => {
            let records = data::synthetic_records(rows, 0.5, settings.split.seed);
            data::write_csv(&records, &out)?;
            println!("Wrote {rows} synthetic records to {}.", out.display());
        }
        Commands::Train => {
            let service = PredictionService::global(settings);
            let outcome = tokio::task::spawn_blocking(move || service.retrain())
                .await?
                .context("training failed")?;
            let model = &outcome.model;
            let metrics = trainer::evaluate(model, &outcome.holdout);

            println!("Model saved to {}.", service.settings().model_path.display());
            println!("Intercept {:.4}", model.intercept);
            for (column, coefficient) in models::FEATURE_COLUMNS.iter().zip(model.coefficients) {
                println!("- {column}: {coefficient:.4}");
            }
            println!(
                "Holdout MAE {:.3}, R² {:.3} over {} rows",
                metrics.mae, metrics.r2, metrics.samples
            );
        }
        Commands::Reload => {
            let service = PredictionService::global(settings);
            let model = tokio::task::spawn_blocking(move || service.reload())
                .await?
                .context("could not load the model artifact")?;

            println!(
                "Model {} trained {} on {} rows.",
                model.model_id, model.trained_at, model.training_rows
            );
            println!("Intercept {:.4}", model.intercept);
            for (column, coefficient) in models::FEATURE_COLUMNS.iter().zip(model.coefficients) {
                println!("- {column}: {coefficient:.4}");
            }
        }
        Commands::Predict {
            hours,
            attendance,
            completed,
            partial,
        } => {
            let service = PredictionService::global(settings);
            let source = tokio::task::spawn_blocking(move || service.ensure_ready()).await?;
            match source {
                Ok(source) => info!(?source, "model ready"),
                Err(err) => warn!(error = %err, "continuing without a model"),
            }

            let form = PredictionForm {
                horas_estudio: hours,
                asistencia: attendance,
                trabajos_completados: completed,
                nota_parcial: partial,
            };
            match handle_submission(service, Method::Post, &form) {
                FormResponse::Rendered(view) => {
                    println!("Predicted final grade: {:.1}", view.grade);
                    println!("Performance: {}", view.label);
                    println!("{}", view.message);
                    println!("Recommendation: {}", view.recommendation);
                }
                FormResponse::Error(message) => anyhow::bail!(message),
                FormResponse::RedirectToForm => {
                    anyhow::bail!("prediction request was not submitted")
                }
            }
        }
        Commands::Classify { grade } => {
            let tier = tier::classify(grade);
            println!("{grade:.1} -> {} ({})", tier.label(), tier.recommendation());
        }
        Commands::Report { out } => {
            let records = data::load_records(&settings.data_path)?;
            let outcome = trainer::train(&records, settings.split)?;
            let metrics = trainer::evaluate(&outcome.model, &outcome.holdout);
            let report = report::build_report(
                &settings.data_path.display().to_string(),
                &records,
                &outcome,
                &metrics,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
