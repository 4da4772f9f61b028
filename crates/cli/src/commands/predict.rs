//! `ontime predict`: score one flight locally or through the service

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use ontime_lib::{ArtifactBundle, FlightQuery, InferencePipeline, PredictionResult};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::ApiClient;
use crate::output::{
    color_decision, format_probability, print_info, print_json, print_rows, FieldRow,
    OutputFormat,
};

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Airline code
    #[arg(long)]
    pub airline: String,

    /// Origin airport code
    #[arg(long)]
    pub origin: String,

    /// Destination airport code
    #[arg(long)]
    pub destination: String,

    /// Scheduled departure, e.g. 2024-01-15T08:00:00
    #[arg(long)]
    pub departure: String,

    /// Score against a local bundle instead of the service
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Show the feature vector (local bundles only)
    #[arg(long)]
    pub explain: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalPrediction {
    #[serde(flatten)]
    result: PredictionResult,
    raw_probability: f64,
    unseen: Vec<String>,
    features: Vec<(&'static str, f32)>,
}

pub async fn run(args: &PredictArgs, api_url: &str, format: OutputFormat) -> Result<()> {
    let query = FlightQuery::new(
        &args.airline,
        &args.origin,
        &args.destination,
        &args.departure,
    );

    let Some(path) = &args.bundle else {
        let client = ApiClient::new(api_url)?;
        let result = client.predict(&query).await?;
        return match format {
            OutputFormat::Json => print_json(&result),
            OutputFormat::Table => {
                print_result(&query, &result);
                Ok(())
            }
        };
    };

    let bundle = ArtifactBundle::load(path)
        .with_context(|| format!("Failed to load bundle {:?}", path))?;
    let pipeline = InferencePipeline::new(Arc::new(bundle));
    let prediction = pipeline.predict_detailed(&query)?;
    let unseen: Vec<String> = prediction
        .unseen
        .fields()
        .iter()
        .map(|f| f.to_string())
        .collect();

    match format {
        OutputFormat::Json => print_json(&LocalPrediction {
            result: prediction.result,
            raw_probability: prediction.raw_probability,
            unseen,
            features: prediction.features.named().collect(),
        })?,
        OutputFormat::Table => {
            print_result(&query, &prediction.result);
            if !unseen.is_empty() {
                print_info(&format!(
                    "Not seen during training: {} (encoded as 0)",
                    unseen.join(", ")
                ));
            }
            if args.explain {
                println!();
                println!("{}", "Features".bold());
                print_rows(
                    prediction
                        .features
                        .named()
                        .map(|(name, value)| FieldRow::new(name, value))
                        .collect(),
                );
            }
        }
    }

    Ok(())
}

fn print_result(query: &FlightQuery, result: &PredictionResult) {
    println!(
        "{} {} → {} at {}",
        query.airline.bold(),
        query.origin,
        query.destination,
        query.scheduled_departure
    );
    print_rows(vec![
        FieldRow::new("Verdict", color_decision(result.is_likely_late)),
        FieldRow::new("Probability", format_probability(result.probability)),
    ]);
}
