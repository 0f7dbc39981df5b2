//! EMG Fatigue Pipeline - Main Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pipeline::{
    build_master_dataset, init_logging, predict_file, run_training, BatchSettings,
    ConsoleReporter, JsonReporter, PipelineConfig, Reporter, TrainingReport,
};
use storage::{
    load_bundle, read_label_manifest, read_master_dataset, save_bundle, write_master_dataset,
    DirectorySignalSource,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fatigue-pipeline", version, about = "EMG muscle fatigue detection pipeline")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process every labeled recording into the master dataset table
    BuildDataset {
        #[arg(long)]
        signals: Option<PathBuf>,
        #[arg(long)]
        manifest: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cross-validate, report, and save the model bundle
    Train {
        #[arg(long)]
        dataset: Option<PathBuf>,
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// Also write the evaluation as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Score one recording with a saved bundle
    Infer {
        file_id: String,
        #[arg(long)]
        signals: Option<PathBuf>,
        #[arg(long)]
        bundle: Option<PathBuf>,
        #[arg(long)]
        channel: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;
    info!("=== EMG Fatigue Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::BuildDataset {
            signals,
            manifest,
            output,
        } => {
            if let Some(dir) = signals {
                config.data.signals_dir = dir;
            }
            if let Some(path) = manifest {
                config.data.manifest = path;
            }
            if let Some(path) = output {
                config.data.dataset = path;
            }

            let manifest = read_label_manifest(&config.data.manifest)?;
            let source = Arc::new(DirectorySignalSource::new(&config.data.signals_dir));
            let batch =
                build_master_dataset(source, &manifest, &BatchSettings::from_config(&config)).await?;
            if batch.dataset.is_empty() {
                bail!("no usable repetitions in {}", config.data.signals_dir.display());
            }
            write_master_dataset(&config.data.dataset, &batch.dataset)?;
            info!(
                "Saved {} rows from {} files to {} ({} files skipped)",
                batch.dataset.len(),
                batch.processed(),
                config.data.dataset.display(),
                batch.skipped()
            );
        }

        Command::Train {
            dataset,
            bundle,
            report,
        } => {
            if let Some(path) = dataset {
                config.data.dataset = path;
            }
            if let Some(path) = bundle {
                config.data.bundle = path;
            }
            if report.is_some() {
                config.data.report = report;
            }

            let dataset = read_master_dataset(&config.data.dataset)?;
            let outcome = run_training(&dataset, &config)?;
            let training_report = TrainingReport {
                evaluation: &outcome.evaluation,
                onset: &outcome.onset,
            };
            ConsoleReporter::new(std::io::stdout().lock()).report(&training_report)?;
            if let Some(path) = &config.data.report {
                JsonReporter::new(path).report(&training_report)?;
            }

            save_bundle(&config.data.bundle, &outcome.bundle)?;
            info!("Saved model bundle to {}", config.data.bundle.display());
        }

        Command::Infer {
            file_id,
            signals,
            bundle,
            channel,
            json,
        } => {
            if let Some(dir) = signals {
                config.data.signals_dir = dir;
            }
            if let Some(path) = bundle {
                config.data.bundle = path;
            }
            if let Some(channel) = channel {
                config.data.channel = channel;
            }

            let bundle = load_bundle(&config.data.bundle)?;
            let source = DirectorySignalSource::new(&config.data.signals_dir);
            let result = predict_file(&source, &file_id, &config.data.channel, &bundle)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{:>5} {:>9} {:>11} {:>8}", "rep", "time (s)", "probability", "fatigued");
                for p in &result.predictions {
                    println!(
                        "{:>5} {:>9.2} {:>11.3} {:>8}",
                        p.rep,
                        p.peak_time,
                        p.probability,
                        if p.is_fatigued { "yes" } else { "no" }
                    );
                }
                match result.trigger_rep {
                    Some(rep) => println!("Fatigue onset at rep {} (threshold {:.3})", rep, bundle.threshold),
                    None => println!("No fatigue onset detected (threshold {:.3})", bundle.threshold),
                }
                println!(
                    "Heuristic onset: {} ({:?})",
                    result.heuristic.rep.map_or_else(|| "-".to_string(), |r| r.to_string()),
                    result.heuristic.reason
                );
            }
        }
    }

    Ok(())
}
