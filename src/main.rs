mod commands;
mod downloader;
mod mime;
mod resume;
mod retry;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the file containing URLs (one per line)
    #[arg(short = 'i', long = "input", default_value = "urls.txt")]
    input: PathBuf,

    /// Directory to save downloaded files
    #[arg(short = 'o', long = "output", default_value = "downloads")]
    output: PathBuf,

    /// Number of URLs fetched concurrently per batch
    #[arg(short = 'c', long = "chunk-size", default_value_t = 3)]
    chunk_size: usize,

    /// Delay between batches in milliseconds
    #[arg(short = 'd', long = "batch-delay", default_value_t = 5000)]
    batch_delay: u64,

    /// Maximum retries for a timed-out or reset connection
    #[arg(short = 'r', long = "max-retries", default_value_t = 5)]
    max_retries: u32,

    /// Per-request timeout in milliseconds
    #[arg(short = 't', long = "timeout", default_value_t = 30000)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    commands::run_downloads(
        args.input,
        args.output,
        args.chunk_size,
        Duration::from_millis(args.batch_delay),
        args.max_retries,
        Duration::from_millis(args.timeout),
    )
    .await
}
