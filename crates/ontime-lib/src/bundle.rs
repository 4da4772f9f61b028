//! Artifact bundle: the unit of deployment
//!
//! A bundle carries everything inference needs (scorer, encoders, statistics
//! tables, decision threshold) and is produced exactly once by training. It
//! is immutable after construction and shared read-only by all requests.

use crate::encoding::CategoryEncoders;
use crate::error::BundleLoadError;
use crate::features::{self, SCHEMA_VERSION};
use crate::models::CategoryField;
use crate::pipeline::evaluation::EvaluationReport;
use crate::scorer::{compute_checksum, Scorer, ScorerModel, StoredScorer};
use crate::stats::StatisticsTables;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Layout version of the bundle document
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Provenance recorded at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub format_version: u32,
    pub schema_version: u32,
    /// Feature names in scorer input order
    pub feature_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub training_rows: usize,
    /// Fraction of late flights in the fitted partition
    pub positive_rate: f64,
    pub scale_pos_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationReport>,
}

impl BundleMetadata {
    /// Metadata for the compiled feature schema
    pub fn current(training_rows: usize, positive_rate: f64, scale_pos_weight: f64) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            schema_version: SCHEMA_VERSION,
            feature_names: features::feature_names(),
            created_at: Utc::now(),
            training_rows,
            positive_rate,
            scale_pos_weight,
            evaluation: None,
        }
    }
}

#[derive(Serialize)]
struct BundleDocumentRef<'a> {
    metadata: &'a BundleMetadata,
    decision_threshold: f64,
    encoders: &'a CategoryEncoders,
    stats: &'a StatisticsTables,
    scorer: StoredScorer,
}

#[derive(Deserialize)]
struct BundleDocument {
    metadata: BundleMetadata,
    decision_threshold: f64,
    encoders: CategoryEncoders,
    stats: StatisticsTables,
    scorer: StoredScorer,
}

#[derive(Debug)]
pub struct ArtifactBundle {
    metadata: BundleMetadata,
    decision_threshold: f64,
    encoders: CategoryEncoders,
    stats: StatisticsTables,
    scorer: ScorerModel,
    /// SHA256 of the file this bundle was loaded from
    checksum: Option<String>,
}

impl ArtifactBundle {
    pub fn new(
        metadata: BundleMetadata,
        decision_threshold: f64,
        encoders: CategoryEncoders,
        stats: StatisticsTables,
        scorer: ScorerModel,
    ) -> Self {
        Self {
            metadata,
            decision_threshold,
            encoders,
            stats,
            scorer,
            checksum: None,
        }
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn decision_threshold(&self) -> f64 {
        self.decision_threshold
    }

    pub fn encoders(&self) -> &CategoryEncoders {
        &self.encoders
    }

    pub fn stats(&self) -> &StatisticsTables {
        &self.stats
    }

    pub fn scorer(&self) -> &ScorerModel {
        &self.scorer
    }

    /// Present once the bundle has been loaded from disk
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&BundleDocumentRef {
            metadata: &self.metadata,
            decision_threshold: self.decision_threshold,
            encoders: &self.encoders,
            stats: &self.stats,
            scorer: self.scorer.to_stored(),
        })
    }

    /// Persist atomically: write a temp file, fsync, rename over `path`.
    ///
    /// Returns the checksum of the written file.
    pub fn save(&self, path: &Path) -> Result<String> {
        let bytes = self.to_bytes().context("Failed to serialize bundle")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create bundle directory {:?}", parent))?;
        }

        let temp_path = temp_path_for(path);
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp bundle file {:?}", temp_path))?;
        file.write_all(&bytes)
            .context("Failed to write bundle")?;
        file.sync_all()
            .context("Failed to sync bundle file")?;

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

        let checksum = compute_checksum(&bytes);
        info!(path = ?path, size_bytes = bytes.len(), checksum = %checksum, "Bundle saved");
        Ok(checksum)
    }

    pub fn load(path: &Path) -> Result<Self, BundleLoadError> {
        let bytes = fs::read(path).map_err(|source| BundleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse and verify a bundle document
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BundleLoadError> {
        let doc: BundleDocument = serde_json::from_slice(bytes)?;

        if doc.metadata.format_version != BUNDLE_FORMAT_VERSION {
            return Err(BundleLoadError::UnsupportedFormat {
                expected: BUNDLE_FORMAT_VERSION,
                found: doc.metadata.format_version,
            });
        }
        if doc.metadata.schema_version != SCHEMA_VERSION
            || !features::schema_matches(&doc.metadata.feature_names)
        {
            return Err(BundleLoadError::SchemaMismatch {
                expected: features::feature_names(),
                found: doc.metadata.feature_names,
            });
        }
        if !(0.0..=1.0).contains(&doc.decision_threshold) {
            return Err(BundleLoadError::InvalidThreshold(doc.decision_threshold));
        }
        if let Some(field) = CategoryField::ALL
            .into_iter()
            .find(|f| !doc.encoders.get(*f).is_well_formed())
        {
            return Err(BundleLoadError::MalformedEncoding(field));
        }

        let scorer = doc.scorer.restore()?;

        Ok(Self {
            metadata: doc.metadata,
            decision_threshold: doc.decision_threshold,
            encoders: doc.encoders,
            stats: doc.stats,
            scorer,
            checksum: Some(compute_checksum(bytes)),
        })
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            metadata: self.metadata.clone(),
            decision_threshold: self.decision_threshold,
            scorer: self.scorer.kind().to_string(),
            checksum: self.checksum.clone(),
            vocabulary: VocabularySizes {
                airline: self.encoders.airline.len(),
                origin: self.encoders.origin.len(),
                destination: self.encoders.destination.len(),
            },
            coverage: StatisticsCoverage {
                airlines: self.stats.airline_avg_delay.len(),
                routes: self.stats.route_avg_delay.len(),
                hours: self.stats.hour_delay_rate.len(),
            },
        }
    }
}

/// Read-only description of a bundle, served by `/model` and `ontime inspect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSummary {
    pub metadata: BundleMetadata,
    pub decision_threshold: f64,
    pub scorer: String,
    pub checksum: Option<String>,
    pub vocabulary: VocabularySizes,
    pub coverage: StatisticsCoverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularySizes {
    pub airline: usize,
    pub origin: usize,
    pub destination: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsCoverage {
    pub airlines: usize,
    pub routes: usize,
    pub hours: usize,
}

/// Sibling of `path` with `.tmp` appended to the whole file name
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
