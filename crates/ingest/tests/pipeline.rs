//! End-to-end pipeline tests over real files in a temp directory.

use culling_db::ImageStore;
use image::{GrayImage, Luma};
use ingest::{analysis_from_record, IngestError, IngestionPipeline, UploadItem};
use quality_analysis::QualityAnalyzer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_test_photo(dir: &Path, name: &str) -> PathBuf {
    let img = GrayImage::from_fn(400, 300, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Luma([210u8])
        } else {
            Luma([40u8])
        }
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn write_corrupt_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\x89PNG\r\n but then it all goes wrong").unwrap();
    path
}

fn pipeline(dir: &TempDir) -> (IngestionPipeline, Arc<ImageStore>) {
    let store = Arc::new(ImageStore::open(&dir.path().join("session.db")).unwrap());
    let thumb_dir = dir.path().join("thumbnails");
    std::fs::create_dir_all(&thumb_dir).unwrap();
    let pipeline = IngestionPipeline::new(
        QualityAnalyzer::default(),
        Arc::clone(&store),
        thumb_dir,
    );
    (pipeline, store)
}

#[test]
fn test_single_ingest_returns_full_record() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = pipeline(&dir);
    let photo = write_test_photo(dir.path(), "shot.png");

    let record = pipeline
        .ingest(&photo, "20260830_shot.png", "shot.png")
        .unwrap();

    assert_eq!(record.filename, "20260830_shot.png");
    assert_eq!(record.original_filename, "shot.png");
    assert_eq!(record.rating, 0);
    assert_eq!(record.label, "none");
    assert_eq!(record.thumbnail_path, "thumb_20260830_shot.png");
    assert!(record.focus_score > 0.0);
    assert_eq!(record.perceptual_hash.len(), 16);

    // Thumbnail landed on disk within bounds
    let thumb = image::open(dir.path().join("thumbnails").join(&record.thumbnail_path)).unwrap();
    assert!(thumb.width() <= 300 && thumb.height() <= 300);

    // Blob round-trips to a full analysis record
    let analysis = analysis_from_record(&record).unwrap();
    assert_eq!(analysis.focus_score, record.focus_score);
    assert_eq!(analysis.perceptual_hash, record.perceptual_hash);
    assert_eq!(analysis.dimensions.width, 400);

    assert_eq!(store.image_count().unwrap(), 1);
}

#[test]
fn test_corrupt_file_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = pipeline(&dir);
    let corrupt = write_corrupt_file(dir.path(), "broken.png");

    let err = pipeline
        .ingest(&corrupt, "20260830_broken.png", "broken.png")
        .unwrap_err();
    assert!(matches!(err, IngestError::Thumbnail(_)));
    assert!(!err.is_fatal());
    assert_eq!(store.image_count().unwrap(), 0);
}

#[test]
fn test_batch_isolates_the_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = pipeline(&dir);

    let items = vec![
        UploadItem {
            filepath: write_test_photo(dir.path(), "a.png"),
            stored_name: "s_a.png".into(),
            original_name: "a.png".into(),
        },
        UploadItem {
            filepath: write_corrupt_file(dir.path(), "b.png"),
            stored_name: "s_b.png".into(),
            original_name: "b.png".into(),
        },
        UploadItem {
            filepath: write_test_photo(dir.path(), "c.png"),
            stored_name: "s_c.png".into(),
            original_name: "c.png".into(),
        },
    ];

    let outcome = pipeline.ingest_batch(&items).unwrap();

    assert_eq!(outcome.images.len(), 2);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].filename, "b.png");

    // Successes keep input order and carry assigned ids
    let names: Vec<&str> = outcome
        .images
        .iter()
        .map(|r| r.original_filename.as_str())
        .collect();
    assert_eq!(names, vec!["a.png", "c.png"]);
    assert!(outcome.images.iter().all(|r| r.id > 0));

    assert_eq!(store.image_count().unwrap(), 2);
}

#[test]
fn test_batch_of_only_failures_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = pipeline(&dir);

    let items = vec![
        UploadItem {
            filepath: write_corrupt_file(dir.path(), "x.png"),
            stored_name: "s_x.png".into(),
            original_name: "x.png".into(),
        },
        UploadItem {
            filepath: dir.path().join("never-saved.png"),
            stored_name: "s_y.png".into(),
            original_name: "y.png".into(),
        },
    ];

    let outcome = pipeline.ingest_batch(&items).unwrap();
    assert!(outcome.images.is_empty());
    let failed: Vec<&str> = outcome.errors.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(failed, vec!["x.png", "y.png"]);
    assert_eq!(store.image_count().unwrap(), 0);
}

#[test]
fn test_repeated_ingest_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _store) = pipeline(&dir);
    let photo = write_test_photo(dir.path(), "same.png");

    let first = pipeline.ingest(&photo, "s1.png", "same.png").unwrap();
    let second = pipeline.ingest(&photo, "s2.png", "same.png").unwrap();

    assert_eq!(first.focus_score, second.focus_score);
    assert_eq!(first.quality_score, second.quality_score);
    assert_eq!(first.exposure_score, second.exposure_score);
    assert_eq!(first.perceptual_hash, second.perceptual_hash);
    assert!(second.id > first.id);
}
