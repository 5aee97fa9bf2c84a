use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::info;

use s3_ingest::{Config, sign_policy_now};

#[derive(Parser, Debug)]
#[command(
    name = "s3sign",
    version = env!("CARGO_PKG_VERSION"),
    author = "Tyr Chen <tyr.chen@gmail.com>",
    about = "Sign a short-lived S3 POST policy for direct browser uploads",
    long_about = "Prints the form fields a browser needs to POST a file straight to S3 \
                  (policy, credential, signature, date, acl). The policy limits the object \
                  size and key prefix and expires after a few minutes; sign a fresh one per upload.",
    after_help = "Examples:\n  \
                  s3sign                                  # Sign with defaults from .env\n  \
                  s3sign --prefix avatars/                # Restrict keys to avatars/\n  \
                  s3sign --expiry-minutes 5 --max-file-size 1048576\n\n\
                  Configuration (.env):\n  \
                  AWS_REGION=us-west-2\n  \
                  S3_BUCKET=my-bucket\n  \
                  AWS_ACCESS_KEY_ID=...\n  \
                  AWS_SECRET_ACCESS_KEY=..."
)]
struct Cli {
    /// Key prefix the upload must start with (overrides S3_TARGET_PATH)
    #[arg(long)]
    prefix: Option<String>,

    /// Minutes until the policy expires (overrides POLICY_EXPIRY_MINUTES)
    #[arg(long)]
    expiry_minutes: Option<u32>,

    /// Maximum object size in bytes (overrides POLICY_MAX_FILE_SIZE)
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Print compact JSON on a single line
    #[arg(long)]
    compact: bool,
}

const DEFAULT_LOG_LEVEL: &str = "info";

/// `LOG_LEVEL`, then `RUST_LOG`, then `info`
fn log_level(log_level: Option<String>, rust_log: Option<String>) -> String {
    log_level
        .or(rust_log)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    let level = log_level(
        std::env::var("LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    if let Some(prefix) = cli.prefix {
        Config::validate_target_path(&prefix)?;
        config.policy.key_prefix = prefix;
    }
    if let Some(minutes) = cli.expiry_minutes {
        config.policy.expiry_minutes = minutes;
    }
    if let Some(size) = cli.max_file_size {
        config.policy.max_file_size = size;
    }

    info!(
        "Signing policy for s3://{}/{} ({} min, {} bytes)",
        config.credentials.bucket,
        config.policy.key_prefix,
        config.policy.expiry_minutes,
        config.policy.max_file_size
    );

    let signed = match sign_policy_now(&config.credentials, &config.policy) {
        Ok(signed) => signed,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), style(e.user_message()).red());
            return Err(e).context("Failed to sign upload policy");
        }
    };

    let json = if cli.compact {
        serde_json::to_string(&signed)?
    } else {
        serde_json::to_string_pretty(&signed)?
    };
    println!("{}", json);

    Ok(())
}
