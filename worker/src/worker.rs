use crate::backend::BackendClient;
use crate::download::FileDownloader;
use crate::printer::{physical_copies, Printer};
use crate::WorkerError;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

const STATUS_PRINTING: &str = "PRINTING";
const STATUS_COMPLETED: &str = "COMPLETED";
const STATUS_FAILED: &str = "FAILED";

/// Consumes job ids from the queue and executes them one at a time.
///
/// The loop never exits on a job failure: every error is reported to the
/// backend and the worker moves on to the next job.
pub struct Worker {
    redis: redis::Client,
    queue_name: String,
    poll_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    backend: BackendClient,
    downloader: FileDownloader,
    printer: Box<dyn Printer>,
}

impl Worker {
    pub fn new(
        redis: redis::Client,
        queue_name: String,
        poll_timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
        backend: BackendClient,
        printer: Box<dyn Printer>,
    ) -> Result<Self, WorkerError> {
        Ok(Self {
            redis,
            queue_name,
            poll_timeout,
            max_retries,
            retry_delay,
            backend,
            downloader: FileDownloader::new()?,
            printer,
        })
    }

    /// Blocks on the queue until the process is asked to stop.
    ///
    /// Transient queue failures are retried after `retry_delay`; once
    /// `max_retries` consecutive polls fail the worker exits so a
    /// supervisor can restart it against a healthy Redis.
    pub async fn run(&self) -> Result<(), WorkerError> {
        info!(queue = %self.queue_name, "Worker started");
        let mut consecutive_failures: u32 = 0;
        loop {
            match self.next_job().await {
                Ok(Some(job_id)) => {
                    consecutive_failures = 0;
                    if let Err(e) = self.handle_job(&job_id).await {
                        error!(job_id = %job_id, "Job failed: {}", e);
                        self.report_failure(&job_id, &e).await;
                    }
                }
                Ok(None) => {
                    consecutive_failures = 0;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.max_retries {
                        error!("Queue unreachable after {} attempts: {}", consecutive_failures, e);
                        return Err(e);
                    }
                    warn!(
                        attempt = consecutive_failures,
                        "Queue poll failed: {}", e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn next_job(&self) -> Result<Option<String>, WorkerError> {
        let mut conn = self
            .redis
            .get_async_connection()
            .await
            .map_err(|e| WorkerError::Queue(format!("connect: {}", e)))?;

        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.queue_name)
            .arg(self.poll_timeout.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkerError::Queue(format!("blpop: {}", e)))?;

        Ok(popped.map(|(_, job_id)| job_id))
    }

    /// One job, start to finish. The temp directory is removed when the
    /// guard drops, success or failure.
    #[instrument(skip(self))]
    async fn handle_job(&self, job_id: &str) -> Result<(), WorkerError> {
        let job = self.backend.get_job(job_id).await?;
        info!(
            order_id = %job.order_id,
            file = %job.file_name,
            copies = job.copies,
            print_type = %job.print_type,
            "Picked up print job"
        );

        self.backend
            .update_status(job_id, STATUS_PRINTING, None)
            .await?;

        let scratch = tempfile::tempdir()
            .map_err(|e| WorkerError::Download(format!("create temp dir: {}", e)))?;

        let path = self
            .downloader
            .download(&job.file_url, &job.file_name, scratch.path())
            .await?;

        let copies = physical_copies(&job.print_type, job.copies);
        self.printer
            .print(&path, copies, job.printer_name.as_deref())
            .await?;

        self.backend
            .update_status(job_id, STATUS_COMPLETED, None)
            .await?;
        info!(job_id = %job_id, "Print job completed");
        Ok(())
    }

    async fn report_failure(&self, job_id: &str, error: &WorkerError) {
        if let Err(e) = self
            .backend
            .update_status(job_id, STATUS_FAILED, Some(&error.to_string()))
            .await
        {
            error!(job_id = %job_id, "Could not report failure to backend: {}", e);
        }
    }
}
