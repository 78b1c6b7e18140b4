use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::downloader::Downloader;
use crate::resume;

/// Run the whole batch: load the URL list, resume from the artifacts
/// already on disk, then process fixed-size chunks of URLs concurrently
/// with a pause between chunks.
pub async fn run_downloads(
    input: PathBuf,
    output: PathBuf,
    chunk_size: usize,
    batch_delay: Duration,
    max_retries: u32,
    timeout: Duration,
) -> Result<()> {
    // Raw line split, no trimming: a trailing newline yields a final empty
    // item that is attempted like any other URL.
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to open input file: {:?}", input))?;
    let urls: Vec<String> = raw.split('\n').map(str::to_string).collect();

    let start_index = resume::next_index(&output)?;
    println!("Starting from {}", start_index);

    let chunk_size = chunk_size.max(1);
    let downloader = Arc::new(Downloader::new(output.clone(), timeout, max_retries));

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut cursor = start_index;
    while cursor < urls.len() {
        let end = (cursor + chunk_size).min(urls.len());
        let mut handles = Vec::with_capacity(end - cursor);

        for (offset, url) in urls[cursor..end].iter().enumerate() {
            let id = cursor + offset;
            let url = url.clone();
            let downloader = downloader.clone();
            let pb = pb.clone();

            handles.push(tokio::spawn(async move {
                if let Err(e) = downloader.download(&url, id).await {
                    eprintln!("Error downloading {}: {:#}", id, e);
                }
                pb.inc(1);
            }));
        }

        // Join the whole chunk; one item failing (or panicking) must not
        // abort its siblings or the loop.
        for handle in handles {
            if let Err(e) = handle.await {
                eprintln!("Download task failed: {}", e);
            }
        }

        cursor += chunk_size;
        tokio::time::sleep(batch_delay).await;
    }

    pb.finish();
    Ok(())
}
