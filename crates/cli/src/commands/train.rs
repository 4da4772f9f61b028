//! `ontime train`: build an artifact bundle from the historical dataset

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use ontime_lib::pipeline::{train, ScorerSource, TrainingSummary};
use ontime_lib::scorer::OnnxScorer;
use ontime_lib::StructuredLogger;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::load_training_config;
use crate::dataset::{read_records, TextEncoding};
use crate::output::{
    format_probability, print_info, print_json, print_rows, print_success, print_warning,
    FieldRow, OutputFormat,
};

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Historical flights CSV
    #[arg(long)]
    pub data: PathBuf,

    /// Where to write the bundle
    #[arg(long, short, default_value = "models/flight_model.json")]
    pub output: PathBuf,

    /// Training configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Decision threshold stored in the bundle
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Share of rows held out for evaluation
    #[arg(long)]
    pub validation_fraction: Option<f64>,

    /// Package this ONNX model instead of fitting the built-in scorer
    #[arg(long)]
    pub onnx_scorer: Option<PathBuf>,

    /// Dataset character encoding
    #[arg(long, value_enum, default_value_t = TextEncoding::Utf8)]
    pub encoding: TextEncoding,
}

#[derive(Serialize)]
struct TrainReport<'a> {
    output: &'a PathBuf,
    checksum: &'a str,
    #[serde(flatten)]
    summary: &'a TrainingSummary,
}

pub fn run(args: &TrainArgs, format: OutputFormat) -> Result<()> {
    let mut config = load_training_config(args.config.as_deref())?;
    if let Some(threshold) = args.threshold {
        config.decision_threshold = threshold;
    }
    if let Some(fraction) = args.validation_fraction {
        config.validation_fraction = fraction;
    }

    let source = match &args.onnx_scorer {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read ONNX model {:?}", path))?;
            ScorerSource::Onnx(OnnxScorer::from_bytes(bytes)?)
        }
        None => ScorerSource::Fit,
    };

    let records = read_records(&args.data, args.encoding)?;
    if format == OutputFormat::Table {
        print_info(&format!("Loaded {} records from {:?}", records.len(), args.data));
    }

    let outcome = train(&records, &config, source).context("Training failed")?;
    let checksum = outcome.bundle.save(&args.output)?;

    StructuredLogger::new("ontime-cli").log_training_completed(
        &args.output,
        &checksum,
        &outcome.summary,
    );

    let summary = &outcome.summary;
    match format {
        OutputFormat::Json => print_json(&TrainReport {
            output: &args.output,
            checksum: &checksum,
            summary,
        })?,
        OutputFormat::Table => {
            println!("{}", "Training Summary".bold());
            let mut rows = vec![
                FieldRow::new("Records read", summary.records_read),
                FieldRow::new("Skipped (not completed)", summary.skipped.not_completed),
                FieldRow::new("Skipped (missing fields)", summary.skipped.missing_fields),
                FieldRow::new(
                    "Skipped (bad timestamps)",
                    summary.skipped.unparseable_timestamps,
                ),
                FieldRow::new("Training rows", summary.training_rows),
                FieldRow::new("Validation rows", summary.validation_rows),
                FieldRow::new("Late / on time", format!("{} / {}", summary.positives, summary.negatives)),
                FieldRow::new("scale_pos_weight", format!("{:.4}", summary.scale_pos_weight)),
                FieldRow::new("Scorer", &summary.scorer),
                FieldRow::new("Decision threshold", config.decision_threshold),
            ];
            if let Some(eval) = &summary.evaluation {
                rows.push(FieldRow::new("Accuracy", format_probability(eval.accuracy)));
                rows.push(FieldRow::new("Precision", format_probability(eval.precision)));
                rows.push(FieldRow::new("Recall", format_probability(eval.recall)));
                rows.push(FieldRow::new("F1", format!("{:.4}", eval.f1)));
                rows.push(FieldRow::new("Log loss", format!("{:.4}", eval.log_loss)));
            }
            print_rows(rows);

            if summary.skipped.unparseable_timestamps > 0 {
                print_warning(&format!(
                    "{} records had unparseable timestamps",
                    summary.skipped.unparseable_timestamps
                ));
            }
            print_success(&format!("Bundle written to {:?} ({})", args.output, checksum));
        }
    }

    Ok(())
}
