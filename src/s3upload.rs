use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use walkdir::WalkDir;

use s3_ingest::{
    BatchOutcome, Config, FileUpload, ImageSource, ImageUpload, IngestionPipeline, ResizeSpec,
    S3Store, UploadResult, UploadTarget,
};

#[derive(Parser, Debug)]
#[command(
    name = "s3upload",
    version = env!("CARGO_PKG_VERSION"),
    author = "Tyr Chen <tyr.chen@gmail.com>",
    about = "Upload files or images (with thumbnails) to AWS S3",
    long_about = "Uploads a file or every matching file in a directory to S3 with a bounded \
                  number of concurrent workers. In --images mode each file is decoded, stored \
                  under a time-ordered id with width/height metadata, and wide images also get \
                  a thumbnail. Configure via .env file with AWS credentials.",
    after_help = "Examples:\n  \
                  s3upload ./report.pdf -e pdf                       # Upload single file\n  \
                  s3upload ./logs -e log,txt --folder logs           # Upload a directory\n  \
                  s3upload ./photos --images --thumb-max-width 800   # Images with thumbnails\n\n\
                  Configuration (.env):\n  \
                  AWS_REGION=us-west-2\n  \
                  S3_BUCKET=my-bucket\n  \
                  S3_TARGET_PATH=uploads\n  \
                  S3_ACL=private"
)]
struct Cli {
    /// File or directory to upload
    path: PathBuf,

    /// Allowed file extensions (comma-separated, e.g., "png,jpg")
    #[arg(long, short = 'e', value_delimiter = ',')]
    extensions: Vec<String>,

    /// Treat files as images: decode, record dimensions, generate thumbnails
    #[arg(long)]
    images: bool,

    /// Only images wider than this get a thumbnail
    #[arg(long, default_value = "1024")]
    thumb_max_width: u32,

    /// Thumbnail width in pixels (0 = 128)
    #[arg(long, default_value = "0")]
    thumb_width: u32,

    /// Thumbnail height in pixels (0 = keep aspect ratio)
    #[arg(long, default_value = "0")]
    thumb_height: u32,

    /// Folder for thumbnails (defaults to "<folder>/thumbs")
    #[arg(long)]
    thumb_folder: Option<String>,

    /// Disable thumbnail generation in --images mode
    #[arg(long)]
    no_thumbnails: bool,

    /// Destination folder (overrides S3_TARGET_PATH for this upload)
    #[arg(long)]
    folder: Option<String>,

    /// Maximum number of concurrent uploads (overrides UPLOAD_MAX_CONCURRENT)
    #[arg(long, short = 'c')]
    max_concurrent: Option<usize>,

    /// Print results as JSON instead of styled text
    #[arg(long)]
    json: bool,
}

const DEFAULT_FILE_EXTENSIONS: &[&str] = &["pdf", "txt", "log", "csv", "json", "zip"];
const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    // Initialize tracing/logging with support for LOG_LEVEL from .env
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    info!("S3 Upload Tool v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if let Some(folder) = &cli.folder {
        Config::validate_target_path(folder)?;
        config.target_path = folder.clone();
    }
    if let Some(max_concurrent) = cli.max_concurrent {
        if max_concurrent == 0 {
            anyhow::bail!("--max-concurrent must be at least 1");
        }
        config.pipeline.max_concurrent = max_concurrent;
    }

    info!("Concurrent workers: {}", config.pipeline.max_concurrent);

    let extensions = if cli.extensions.is_empty() {
        let defaults = if cli.images {
            DEFAULT_IMAGE_EXTENSIONS
        } else {
            DEFAULT_FILE_EXTENSIONS
        };
        defaults.iter().map(|ext| ext.to_string()).collect()
    } else {
        cli.extensions.clone()
    };

    // Collect files to process
    let files = collect_files(&cli.path, &extensions)?;

    if files.is_empty() {
        println!(
            "{}",
            style(format!(
                "No files found with extensions: {}",
                extensions.join(", ")
            ))
            .yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "📦 Target: s3://{}/{} ({} file(s))",
            config.credentials.bucket,
            config.target_path,
            files.len()
        ))
        .cyan()
        .bold()
    );

    let start = Instant::now();
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message("uploading");
    pb.enable_steady_tick(Duration::from_millis(120));

    let store = S3Store::new(&config.credentials).await;
    let progress = pb.clone();
    let pipeline = IngestionPipeline::new(
        store,
        config.credentials.clone(),
        config.pipeline.clone(),
    )
    .with_progress(move |_, ok| {
        if !ok {
            progress.set_message("uploading (with failures)");
        }
        progress.inc(1);
    });

    let labels: Vec<String> = files
        .iter()
        .map(|file| relative_path(&cli.path, file))
        .collect();

    let summary = if cli.images {
        let resize = (!cli.no_thumbnails).then(|| ResizeSpec {
            max_width_to_resize: cli.thumb_max_width,
            width: cli.thumb_width,
            height: cli.thumb_height,
            bucket: config.credentials.bucket.clone(),
            folder: cli
                .thumb_folder
                .clone()
                .unwrap_or_else(|| join_folder(&config.target_path, "thumbs")),
        });
        let items = files
            .into_iter()
            .map(|path| ImageUpload {
                source: ImageSource::File(path),
                target: UploadTarget::new(&config.credentials.bucket, &config.target_path),
                resize: resize.clone(),
            })
            .collect();

        let outcome = pipeline.upload_images(items).await;
        pb.finish_and_clear();
        if cli.json {
            print_json(&labels, &outcome)?;
        } else {
            print_image_results(&labels, &outcome);
        }
        Summary::from_outcome(&outcome)
    } else {
        let items = files
            .iter()
            .zip(&labels)
            .map(|(path, label)| FileUpload {
                path: path.clone(),
                folder: config.target_path.clone(),
                key: Some(label.clone()),
            })
            .collect();

        let outcome = pipeline.upload_files(items).await;
        pb.finish_and_clear();
        if cli.json {
            print_json(&labels, &outcome)?;
        } else {
            print_file_results(&labels, &outcome);
        }
        Summary::from_outcome(&outcome)
    };

    if !cli.json {
        summary.print(start.elapsed());
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

struct Summary {
    uploaded: usize,
    failed: usize,
    thumbnails_dropped: usize,
}

impl Summary {
    fn from_outcome<T: ThumbnailStatus>(outcome: &BatchOutcome<T>) -> Self {
        Self {
            uploaded: outcome.succeeded(),
            failed: outcome.failed(),
            thumbnails_dropped: outcome
                .results
                .iter()
                .flatten()
                .filter(|result| result.thumbnail_failed())
                .count(),
        }
    }

    fn print(&self, elapsed: Duration) {
        println!("\n{}", style("═".repeat(70)).dim());
        println!(
            "{}",
            style(format!(
                "Summary: {} uploaded, {} failed",
                self.uploaded, self.failed
            ))
            .bold()
        );
        if self.thumbnails_dropped > 0 {
            println!(
                "{}",
                style(format!(
                    "{} thumbnail(s) could not be stored",
                    self.thumbnails_dropped
                ))
                .yellow()
            );
        }
        println!(
            "{}",
            style(format!("Time: {:.2}s", elapsed.as_secs_f64())).dim()
        );
    }
}

trait ThumbnailStatus {
    fn thumbnail_failed(&self) -> bool {
        false
    }
}

impl ThumbnailStatus for String {}

impl ThumbnailStatus for UploadResult {
    fn thumbnail_failed(&self) -> bool {
        UploadResult::thumbnail_failed(self)
    }
}

fn print_file_results(labels: &[String], outcome: &BatchOutcome<String>) {
    println!();
    for (i, label) in labels.iter().enumerate() {
        match outcome.get(i) {
            Some(Ok(location)) => {
                println!("{} {}", style("✓").green(), style(label).green());
                println!("  {} {}", style("🔗").blue(), style(location).dim());
            }
            Some(Err(e)) => print_failure(label, &e.user_message()),
            None => print_failure(label, "no outcome reported"),
        }
    }
}

fn print_image_results(labels: &[String], outcome: &BatchOutcome<UploadResult>) {
    println!();
    for (i, label) in labels.iter().enumerate() {
        match outcome.get(i) {
            Some(Ok(result)) => {
                println!(
                    "{} {} ({}x{})",
                    style("✓").green(),
                    style(label).green(),
                    result.width,
                    result.height
                );
                println!("  {} {}", style("🔗").blue(), style(&result.location).dim());
                if let Some(thumbnail) = &result.thumbnail {
                    println!(
                        "  {} {} ({}x{})",
                        style("▣").cyan(),
                        style(&thumbnail.location).dim(),
                        thumbnail.width,
                        thumbnail.height
                    );
                }
                if let Some(error) = &result.thumbnail_error {
                    println!("  {} thumbnail skipped: {}", style("!").yellow(), error);
                }
            }
            Some(Err(e)) => print_failure(label, &e.user_message()),
            None => print_failure(label, "no outcome reported"),
        }
    }
}

fn print_failure(label: &str, message: &str) {
    println!(
        "{} {} - {}",
        style("✗").red(),
        style(label).red(),
        style(message).red()
    );
}

fn print_json<T: serde::Serialize>(labels: &[String], outcome: &BatchOutcome<T>) -> Result<()> {
    let entries: Vec<serde_json::Value> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| match outcome.get(i) {
            Some(Ok(value)) => serde_json::json!({ "path": label, "result": value }),
            Some(Err(e)) => serde_json::json!({ "path": label, "error": e.to_string() }),
            None => serde_json::json!({ "path": label, "error": "no outcome reported" }),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

/// Collect files to upload based on path and allowed extensions
fn collect_files(path: &Path, allowed_extensions: &[String]) -> Result<Vec<PathBuf>> {
    // Normalize extensions to lowercase for case-insensitive matching
    let extensions: Vec<String> = allowed_extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();
    let matches = |file: &Path| {
        file.extension()
            .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    };

    let mut files = Vec::new();
    if path.is_file() {
        if matches(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if matches(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
    } else {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    Ok(files)
}

/// Path of `file` relative to `base`, with forward slashes
fn relative_path(base: &Path, file: &Path) -> String {
    let relative = if base.is_file() {
        file.file_name().map(PathBuf::from).unwrap_or_default()
    } else {
        file.strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| file.to_path_buf())
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn join_folder(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", base, child)
    }
}
