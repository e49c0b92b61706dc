mod backend;
mod download;
mod printer;
mod worker;

use backend::BackendClient;
use clap::Parser;
use printer::LpPrinter;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use worker::Worker;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("download error: {0}")]
    Download(String),
    #[error("print error: {0}")]
    Print(String),
}

/// Print worker: pops queued jobs and drives the physical printer.
#[derive(Debug, Parser)]
#[command(name = "printdesk-worker", version, about)]
struct Args {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    redis_url: String,

    /// Redis list holding queued job ids
    #[arg(long, env = "QUEUE_NAME", default_value = "print_queue")]
    queue_name: String,

    /// Base URL of the backend API
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8080")]
    backend_url: String,

    /// Shared API key for the backend's worker endpoints
    #[arg(long, env = "WORKER_API_KEY")]
    api_key: String,

    /// Printer to submit to; omit for the system default
    #[arg(long, env = "PRINTER_NAME")]
    printer: Option<String>,

    /// Seconds each blocking queue poll waits before looping
    #[arg(long, default_value_t = 5)]
    poll_timeout_secs: u64,

    /// Consecutive queue failures tolerated before the worker exits
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait after a queue failure before retrying
    #[arg(long, default_value_t = 2)]
    retry_delay_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "printdesk_worker=info".into()),
        )
        .init();

    let redis = redis::Client::open(args.redis_url.as_str())?;
    let backend = BackendClient::new(args.backend_url, args.api_key);
    let printer = Box::new(LpPrinter::new(args.printer));

    let worker = Worker::new(
        redis,
        args.queue_name,
        Duration::from_secs(args.poll_timeout_secs),
        args.max_retries,
        Duration::from_secs(args.retry_delay_secs),
        backend,
        printer,
    )?;

    tokio::select! {
        result = worker.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping worker");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_settings_are_configurable() {
        let args = Args::try_parse_from([
            "printdesk-worker",
            "--api-key",
            "secret",
            "--max-retries",
            "7",
            "--retry-delay-secs",
            "11",
        ])
        .unwrap();
        assert_eq!(args.max_retries, 7);
        assert_eq!(args.retry_delay_secs, 11);
    }

    #[test]
    fn retry_settings_have_defaults() {
        let args = Args::try_parse_from(["printdesk-worker", "--api-key", "secret"]).unwrap();
        assert_eq!(args.max_retries, 3);
        assert_eq!(args.retry_delay_secs, 2);
        assert_eq!(args.poll_timeout_secs, 5);
    }
}
