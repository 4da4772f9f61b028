//! `ontime inspect`: describe a bundle file or the one the service serves

use anyhow::{Context, Result};
use colored::Colorize;
use ontime_lib::{ArtifactBundle, BundleSummary};
use std::path::Path;

use crate::client::ApiClient;
use crate::output::{format_probability, print_json, print_rows, FieldRow, OutputFormat};

pub async fn run(bundle: Option<&Path>, api_url: &str, format: OutputFormat) -> Result<()> {
    let summary = match bundle {
        Some(path) => ArtifactBundle::load(path)
            .with_context(|| format!("Failed to load bundle {:?}", path))?
            .summary(),
        None => ApiClient::new(api_url)?.model().await?,
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &BundleSummary) {
    let meta = &summary.metadata;
    println!("{}", "Artifact Bundle".bold());

    let mut rows = vec![
        FieldRow::new("Checksum", summary.checksum.as_deref().unwrap_or("-")),
        FieldRow::new("Scorer", &summary.scorer),
        FieldRow::new("Decision threshold", summary.decision_threshold),
        FieldRow::new("Format version", meta.format_version),
        FieldRow::new("Schema version", meta.schema_version),
        FieldRow::new("Features", meta.feature_names.len()),
        FieldRow::new("Created", meta.created_at.to_rfc3339()),
        FieldRow::new("Training rows", meta.training_rows),
        FieldRow::new("Late rate", format_probability(meta.positive_rate)),
        FieldRow::new("scale_pos_weight", format!("{:.4}", meta.scale_pos_weight)),
        FieldRow::new(
            "Vocabulary (airline/origin/destination)",
            format!(
                "{} / {} / {}",
                summary.vocabulary.airline, summary.vocabulary.origin, summary.vocabulary.destination
            ),
        ),
        FieldRow::new(
            "Stats (airlines/routes/hours)",
            format!(
                "{} / {} / {}",
                summary.coverage.airlines, summary.coverage.routes, summary.coverage.hours
            ),
        ),
    ];
    if let Some(eval) = &meta.evaluation {
        rows.push(FieldRow::new("Validation accuracy", format_probability(eval.accuracy)));
        rows.push(FieldRow::new("Validation F1", format!("{:.4}", eval.f1)));
    }
    print_rows(rows);
}
