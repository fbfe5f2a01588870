use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use culling_db::ImageStore;
use ingest::{IngestionPipeline, UploadItem};
use quality_analysis::QualityAnalyzer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// File extensions accepted for ingestion.
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp", "webp"];

#[derive(Parser)]
#[command(name = "photocull")]
#[command(about = "Quality-signal photo analysis and culling assistant")]
struct Cli {
    /// Path to the session database
    #[arg(long, global = true, default_value = "culling_session.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze image files and add them to the session
    Ingest {
        /// Image files to ingest
        files: Vec<PathBuf>,

        /// Directory for generated thumbnails
        #[arg(long, default_value = "thumbnails")]
        thumb_dir: PathBuf,
    },

    /// List every image in the session, newest first
    List,

    /// Set the rating (and optionally the label) for an image
    Rate {
        /// Image id as shown by `list`
        id: i64,

        /// Star rating
        rating: i32,

        /// Culling label, e.g. "pick" or "reject"
        #[arg(long)]
        label: Option<String>,
    },

    /// Export original filenames for the given ids as CSV
    ExportCsv {
        /// Image ids to export
        ids: Vec<i64>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photocull=info,ingest=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let store = Arc::new(ImageStore::open(&cli.db)?);

    match cli.command {
        Commands::Ingest { files, thumb_dir } => run_ingest(store, files, thumb_dir),
        Commands::List => run_list(&store),
        Commands::Rate { id, rating, label } => {
            store.update_rating(id, rating, label.as_deref())?;
            println!(
                "Updated image {id}: rating={rating}{}",
                label.map(|l| format!(", label={l}")).unwrap_or_default()
            );
            Ok(())
        }
        Commands::ExportCsv { ids, output } => run_export(&store, &ids, output.as_deref()),
    }
}

fn run_ingest(store: Arc<ImageStore>, files: Vec<PathBuf>, thumb_dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&thumb_dir)
        .with_context(|| format!("Failed to create thumbnail dir {}", thumb_dir.display()))?;

    let mut items = Vec::new();
    let mut rejected = Vec::new();
    for file in files {
        if allowed_file(&file) {
            let original_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stored_name = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), original_name);
            items.push(UploadItem {
                filepath: file,
                stored_name,
                original_name,
            });
        } else {
            rejected.push(file);
        }
    }

    let pipeline = IngestionPipeline::new(QualityAnalyzer::default(), store, thumb_dir);
    let outcome = pipeline.ingest_batch(&items)?;

    for record in &outcome.images {
        println!(
            "  [{}] {} quality={:.2} focus={:.2} exposure={:.2} faces={} hash={}",
            record.id,
            record.original_filename,
            record.quality_score,
            record.focus_score,
            record.exposure_score,
            record.face_count,
            record.perceptual_hash,
        );
    }
    for error in &outcome.errors {
        eprintln!("  FAILED {}: {}", error.filename, error.error);
    }
    for file in &rejected {
        eprintln!("  SKIPPED {}: file type not allowed", file.display());
    }

    info!(
        processed = outcome.images.len(),
        failed = outcome.errors.len() + rejected.len(),
        "ingest finished"
    );
    Ok(())
}

fn run_list(store: &ImageStore) -> Result<()> {
    let records = store.list_all()?;
    if records.is_empty() {
        println!("No images in session.");
        return Ok(());
    }
    for record in records {
        println!(
            "[{}] {} uploaded={} rating={} label={} quality={:.2} eyes_open={}",
            record.id,
            record.original_filename,
            record.upload_timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.rating,
            record.label,
            record.quality_score,
            record.eyes_open,
        );
    }
    Ok(())
}

fn run_export(store: &ImageStore, ids: &[i64], output: Option<&Path>) -> Result<()> {
    let mut csv = String::from("original_filename\n");
    for name in store.original_filenames(ids)? {
        csv.push_str(&csv_escape(&name));
        csv.push('\n');
    }
    match output {
        Some(path) => std::fs::write(path, csv)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{csv}"),
    }
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn allowed_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file_extensions() {
        assert!(allowed_file(Path::new("photo.JPG")));
        assert!(allowed_file(Path::new("photo.webp")));
        assert!(!allowed_file(Path::new("notes.txt")));
        assert!(!allowed_file(Path::new("no_extension")));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain.jpg"), "plain.jpg");
        assert_eq!(csv_escape("a,b.jpg"), "\"a,b.jpg\"");
        assert_eq!(csv_escape("say \"hi\".jpg"), "\"say \"\"hi\"\".jpg\"");
    }
}
