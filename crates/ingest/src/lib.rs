//! Image ingestion pipeline for Photocull
//!
//! Drives one saved upload through thumbnail generation and quality
//! analysis, then persists the assembled record. Ingestion is
//! all-or-nothing per image: a failed step means no row is written.
//! Per-file failures are caught at this boundary and reported as
//! structured `{filename, error}` entries; only store-layer failures
//! propagate as fatal, since partial persistence is never acceptable.

use anyhow::Context;
use culling_db::{ImageRecord, ImageStore, NewImage};
use quality_analysis::{AnalysisError, AnalysisRecord, QualityAnalyzer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    /// Thumbnail decode or write failure; fatal to this image only.
    #[error("failed to generate thumbnail")]
    Thumbnail(#[source] anyhow::Error),

    /// Analysis failure (in practice: undecodable source); fatal to this
    /// image only.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Durability layer failure; fatal to the whole batch.
    #[error("image store unavailable")]
    Store(#[source] anyhow::Error),
}

impl IngestError {
    /// Store failures abort the batch; everything else is per-file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Store(_))
    }
}

/// One accepted upload, already saved to disk by the caller.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub filepath: PathBuf,
    /// Storage-unique name assigned by the upload handler.
    pub stored_name: String,
    /// Name the user supplied.
    pub original_name: String,
}

/// Per-file failure entry in a batch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

/// Batch result: succeeded records and failed files, each in input order.
/// A batch never fails wholesale because one file failed.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub images: Vec<ImageRecord>,
    pub errors: Vec<FileError>,
}

/// Thumbnail + analysis output, ready to persist.
struct Prepared {
    thumbnail_name: String,
    analysis: AnalysisRecord,
}

pub struct IngestionPipeline {
    analyzer: QualityAnalyzer,
    store: Arc<ImageStore>,
    thumbnail_dir: PathBuf,
}

impl IngestionPipeline {
    pub fn new(analyzer: QualityAnalyzer, store: Arc<ImageStore>, thumbnail_dir: PathBuf) -> Self {
        Self {
            analyzer,
            store,
            thumbnail_dir,
        }
    }

    /// Ingest a single saved file: thumbnail, analyze, persist, return the
    /// record with its assigned id. No partial record is ever persisted.
    pub fn ingest(
        &self,
        filepath: &Path,
        stored_name: &str,
        original_name: &str,
    ) -> Result<ImageRecord, IngestError> {
        let prepared = self.prepare(filepath, stored_name)?;
        self.persist(filepath, stored_name, original_name, prepared)
    }

    /// Ingest a batch. Thumbnails and analysis run in parallel across
    /// files; inserts are serialized by the store. One bad file becomes an
    /// error entry without disturbing the rest; a store failure aborts the
    /// whole batch.
    pub fn ingest_batch(&self, items: &[UploadItem]) -> Result<BatchOutcome, IngestError> {
        let prepared: Vec<Result<Prepared, IngestError>> = items
            .par_iter()
            .map(|item| self.prepare(&item.filepath, &item.stored_name))
            .collect();

        let mut outcome = BatchOutcome::default();
        for (item, result) in items.iter().zip(prepared) {
            match result {
                Ok(p) => {
                    let record =
                        self.persist(&item.filepath, &item.stored_name, &item.original_name, p)?;
                    outcome.images.push(record);
                }
                Err(err) => {
                    warn!(
                        file = %item.original_name,
                        error = %err,
                        "skipping file, ingestion step failed"
                    );
                    outcome.errors.push(FileError {
                        filename: item.original_name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = outcome.images.len(),
            failed = outcome.errors.len(),
            "batch ingestion complete"
        );
        Ok(outcome)
    }

    fn prepare(&self, filepath: &Path, stored_name: &str) -> Result<Prepared, IngestError> {
        let thumbnail_name = format!("thumb_{stored_name}");
        let thumbnail_path = self.thumbnail_dir.join(&thumbnail_name);
        thumbnail_gen::generate(filepath, &thumbnail_path).map_err(IngestError::Thumbnail)?;

        let analysis = self.analyzer.analyze(filepath)?;
        Ok(Prepared {
            thumbnail_name,
            analysis,
        })
    }

    fn persist(
        &self,
        filepath: &Path,
        stored_name: &str,
        original_name: &str,
        prepared: Prepared,
    ) -> Result<ImageRecord, IngestError> {
        let analysis = &prepared.analysis;
        let analysis_data = serde_json::to_string(analysis)
            .context("Failed to serialize analysis record")
            .map_err(IngestError::Store)?;

        let filepath_str = filepath.to_string_lossy();
        let new_image = NewImage {
            filename: stored_name,
            original_filename: original_name,
            filepath: filepath_str.as_ref(),
            thumbnail_path: &prepared.thumbnail_name,
            rating: None,
            label: None,
            focus_score: analysis.focus_score,
            exposure_score: analysis.exposure.exposure_score,
            quality_score: analysis.quality_score,
            face_count: analysis.faces.face_count as i64,
            eyes_open: analysis.eyes_open(),
            perceptual_hash: &analysis.perceptual_hash,
            analysis_data: &analysis_data,
        };

        let id = self.store.insert(&new_image).map_err(IngestError::Store)?;
        self.store
            .get(id)
            .map_err(IngestError::Store)?
            .ok_or_else(|| {
                IngestError::Store(anyhow::anyhow!("inserted row {id} vanished before readback"))
            })
    }
}

/// Deserialize the analysis blob carried by a persisted record.
pub fn analysis_from_record(record: &ImageRecord) -> anyhow::Result<AnalysisRecord> {
    serde_json::from_str(&record.analysis_data)
        .with_context(|| format!("Malformed analysis blob on record {}", record.id))
}
