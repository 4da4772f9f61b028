//! Offline training: historical flights in, artifact bundle out

use super::evaluation::{evaluate, EvaluationReport};
use crate::bundle::{ArtifactBundle, BundleMetadata};
use crate::encoding::{CategoryEncoders, CategoryEncoding};
use crate::error::TrainError;
use crate::features::{self, parse_departure, FeatureVector, TemporalFeatures};
use crate::models::FlightRecord;
use crate::scorer::{BoostingParams, GradientBoostedTrees, OnnxScorer, Scorer, ScorerModel};
use crate::stats::{StatisticsBuilder, StatisticsTables};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Status value of flights that actually departed
    pub completed_status: String,
    /// Delay beyond which a flight counts as late
    pub late_threshold_minutes: f64,
    /// Probability above which a flight is reported late
    pub decision_threshold: f64,
    /// Share of rows held out for evaluation; 0 fits on everything
    pub validation_fraction: f64,
    pub split_seed: u64,
    pub boosting: BoostingParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            completed_status: "Realizado".to_string(),
            late_threshold_minutes: 15.0,
            decision_threshold: 0.53,
            validation_fraction: 0.0,
            split_seed: 42,
            boosting: BoostingParams::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(TrainError::InvalidConfig(format!(
                "decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(TrainError::InvalidConfig(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        if !self.late_threshold_minutes.is_finite() {
            return Err(TrainError::InvalidConfig(
                "late_threshold_minutes must be finite".to_string(),
            ));
        }
        self.boosting.validate()?;
        Ok(())
    }
}

/// A usable training row after filtering
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub temporal: TemporalFeatures,
    pub delay_minutes: f64,
    pub is_late: bool,
}

/// Why records were dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub not_completed: usize,
    pub missing_fields: usize,
    pub unparseable_timestamps: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.not_completed + self.missing_fields + self.unparseable_timestamps
    }
}

enum Skip {
    NotCompleted,
    MissingField,
    UnparseableTimestamp,
}

fn clean_record(record: &FlightRecord, config: &TrainingConfig) -> Result<CleanRow, Skip> {
    if record.status.as_deref() != Some(config.completed_status.as_str()) {
        return Err(Skip::NotCompleted);
    }

    let (Some(airline), Some(origin), Some(destination), Some(scheduled), Some(actual)) = (
        record.airline.as_deref(),
        record.origin.as_deref(),
        record.destination.as_deref(),
        record.scheduled_departure.as_deref(),
        record.actual_departure.as_deref(),
    ) else {
        return Err(Skip::MissingField);
    };

    let scheduled = parse_departure(scheduled).map_err(|_| Skip::UnparseableTimestamp)?;
    let actual = parse_departure(actual).map_err(|_| Skip::UnparseableTimestamp)?;
    let delay_minutes = (actual - scheduled).num_seconds() as f64 / 60.0;

    Ok(CleanRow {
        airline: airline.to_string(),
        origin: origin.to_string(),
        destination: destination.to_string(),
        temporal: TemporalFeatures::from_datetime(&scheduled),
        delay_minutes,
        is_late: delay_minutes > config.late_threshold_minutes,
    })
}

/// Keep completed flights with every required field present and parseable
pub fn clean_records(
    records: &[FlightRecord],
    config: &TrainingConfig,
) -> (Vec<CleanRow>, SkipCounts) {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = SkipCounts::default();

    for record in records {
        match clean_record(record, config) {
            Ok(row) => rows.push(row),
            Err(Skip::NotCompleted) => skipped.not_completed += 1,
            Err(Skip::MissingField) => skipped.missing_fields += 1,
            Err(Skip::UnparseableTimestamp) => skipped.unparseable_timestamps += 1,
        }
    }

    (rows, skipped)
}

/// Learn encoders and statistics tables from a partition
pub fn fit_lookups(rows: &[CleanRow]) -> (CategoryEncoders, StatisticsTables) {
    let encoders = CategoryEncoders {
        airline: CategoryEncoding::fit(rows.iter().map(|r| r.airline.as_str())),
        origin: CategoryEncoding::fit(rows.iter().map(|r| r.origin.as_str())),
        destination: CategoryEncoding::fit(rows.iter().map(|r| r.destination.as_str())),
    };

    let mut builder = StatisticsBuilder::new();
    for row in rows {
        builder.observe(
            &row.airline,
            &row.origin,
            &row.destination,
            row.temporal.hour,
            row.delay_minutes,
            row.is_late,
        );
    }

    (encoders, builder.build())
}

/// Feature vectors for rows, derived exactly as at inference time
pub fn feature_rows(
    rows: &[CleanRow],
    encoders: &CategoryEncoders,
    stats: &StatisticsTables,
) -> Vec<FeatureVector> {
    rows.iter()
        .map(|row| {
            features::derive(
                encoders,
                stats,
                &row.airline,
                &row.origin,
                &row.destination,
                &row.temporal,
            )
            .0
        })
        .collect()
}

/// Where the bundle's scorer comes from
#[derive(Debug)]
pub enum ScorerSource {
    /// Fit the native gradient-boosted model
    Fit,
    /// Package an externally trained ONNX model
    Onnx(OnnxScorer),
}

/// What happened during a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub records_read: usize,
    pub skipped: SkipCounts,
    pub training_rows: usize,
    pub validation_rows: usize,
    pub positives: usize,
    pub negatives: usize,
    pub scale_pos_weight: f64,
    pub scorer: String,
    pub evaluation: Option<EvaluationReport>,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    pub summary: TrainingSummary,
}

/// Seeded hold-out split into (fit, validation)
fn split(
    rows: Vec<CleanRow>,
    fraction: f64,
    seed: u64,
) -> Result<(Vec<CleanRow>, Vec<CleanRow>), TrainError> {
    if fraction <= 0.0 {
        return Ok((rows, Vec::new()));
    }

    let n_validation = (rows.len() as f64 * fraction).round() as usize;
    if n_validation == 0 || n_validation >= rows.len() {
        return Err(TrainError::InvalidConfig(format!(
            "validation_fraction {fraction} leaves no usable split of {} rows",
            rows.len()
        )));
    }

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut held_out = vec![false; rows.len()];
    for &idx in &indices[..n_validation] {
        held_out[idx] = true;
    }

    let (validation, fit): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .zip(held_out)
        .partition(|(_, held)| *held);
    Ok((
        fit.into_iter().map(|(r, _)| r).collect(),
        validation.into_iter().map(|(r, _)| r).collect(),
    ))
}

/// Build a bundle from historical flight records
pub fn train(
    records: &[FlightRecord],
    config: &TrainingConfig,
    source: ScorerSource,
) -> Result<TrainingOutcome, TrainError> {
    config.validate()?;

    let (rows, skipped) = clean_records(records, config);
    if skipped.unparseable_timestamps > 0 {
        warn!(
            count = skipped.unparseable_timestamps,
            "Dropped records with unparseable timestamps"
        );
    }
    info!(
        records = records.len(),
        usable = rows.len(),
        not_completed = skipped.not_completed,
        missing_fields = skipped.missing_fields,
        "Training corpus filtered"
    );
    if rows.is_empty() {
        return Err(TrainError::EmptyCorpus(records.len()));
    }

    let (fit_rows, validation_rows) = split(rows, config.validation_fraction, config.split_seed)?;

    let positives = fit_rows.iter().filter(|r| r.is_late).count();
    let negatives = fit_rows.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(TrainError::SingleClass {
            positives,
            negatives,
        });
    }
    let scale_pos_weight = negatives as f64 / positives as f64;

    let (encoders, stats) = fit_lookups(&fit_rows);
    debug!(
        airlines = encoders.airline.len(),
        origins = encoders.origin.len(),
        destinations = encoders.destination.len(),
        routes = stats.route_avg_delay.len(),
        "Lookups built"
    );

    let scorer = match source {
        ScorerSource::Fit => {
            let x = feature_rows(&fit_rows, &encoders, &stats);
            let y: Vec<bool> = fit_rows.iter().map(|r| r.is_late).collect();
            ScorerModel::Boosted(GradientBoostedTrees::fit(
                &x,
                &y,
                &config.boosting,
                scale_pos_weight,
            )?)
        }
        ScorerSource::Onnx(model) => ScorerModel::Onnx(model),
    };

    let evaluation = if validation_rows.is_empty() {
        None
    } else {
        let x = feature_rows(&validation_rows, &encoders, &stats);
        let mut pairs = Vec::with_capacity(x.len());
        for (vector, row) in x.iter().zip(&validation_rows) {
            pairs.push((scorer.predict_proba(vector)?, row.is_late));
        }
        evaluate(&pairs, config.decision_threshold)
    };

    let mut metadata = BundleMetadata::current(
        fit_rows.len(),
        positives as f64 / fit_rows.len() as f64,
        scale_pos_weight,
    );
    metadata.evaluation = evaluation.clone();

    let summary = TrainingSummary {
        records_read: records.len(),
        skipped,
        training_rows: fit_rows.len(),
        validation_rows: validation_rows.len(),
        positives,
        negatives,
        scale_pos_weight,
        scorer: scorer.kind().to_string(),
        evaluation,
    };

    info!(
        training_rows = summary.training_rows,
        validation_rows = summary.validation_rows,
        scale_pos_weight = scale_pos_weight,
        scorer = %summary.scorer,
        "Training finished"
    );

    Ok(TrainingOutcome {
        bundle: ArtifactBundle::new(
            metadata,
            config.decision_threshold,
            encoders,
            stats,
            scorer,
        ),
        summary,
    })
}
