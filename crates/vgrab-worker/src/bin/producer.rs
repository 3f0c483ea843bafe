//! Batch producer: submit one download_and_compress job per URL.
//!
//! URLs come from the command line, or from a file with `@path` (one URL
//! per line, `#` comments allowed). Dispatch is fire-and-forget; results
//! land in the queue's result backend and the worker logs.

use std::path::Path;

use vgrab_queue::{DownloadAndCompressJob, JobQueue, QueueJob};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: vgrab-producer <url>... | @<url-file>");
        std::process::exit(2);
    }

    let mut urls = Vec::new();
    for arg in &args {
        if let Some(path) = arg.strip_prefix('@') {
            urls.extend(read_url_file(path).await?);
        } else {
            urls.push(arg.clone());
        }
    }

    let queue = JobQueue::from_env()?;
    queue.init().await?;

    let mut submitted = 0usize;
    for url in &urls {
        let job = DownloadAndCompressJob::new(url);
        let job_id = job.job_id.clone();
        queue.enqueue(QueueJob::DownloadAndCompress(job)).await?;
        println!("{}\t{}", job_id, url);
        submitted += 1;
    }

    let queued = queue.len().await?;
    println!("submitted {} job(s), {} queued", submitted, queued);
    Ok(())
}

async fn read_url_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}
