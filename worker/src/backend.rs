use crate::WorkerError;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Job payload served by the backend's worker API.
#[derive(Debug, Clone, Deserialize)]
pub struct JobDetail {
    pub id: String,
    pub order_id: String,
    pub file_url: String,
    pub file_name: String,
    pub copies: i32,
    pub print_type: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub printer_name: Option<String>,
}

/// Authenticated client for the backend's print job endpoints.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str) -> Result<JobDetail, WorkerError> {
        let url = format!("{}/api/v1/print-jobs/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| WorkerError::Backend(format!("fetch job {}: {}", job_id, e)))?;

        if !response.status().is_success() {
            return Err(WorkerError::Backend(format!(
                "fetch job {} returned {}",
                job_id,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WorkerError::Backend(format!("decode job {}: {}", job_id, e)))
    }

    /// Reports a status transition as query parameters. `error_message`
    /// is only meaningful with FAILED.
    #[instrument(skip(self, error_message))]
    pub async fn update_status(
        &self,
        job_id: &str,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<(), WorkerError> {
        let url = format!("{}/api/v1/print-jobs/{}/status", self.base_url, job_id);
        let mut params = vec![("status", status)];
        if let Some(message) = error_message {
            params.push(("error_message", message));
        }
        let response = self
            .client
            .put(&url)
            .header("X-API-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| WorkerError::Backend(format!("update job {}: {}", job_id, e)))?;

        if !response.status().is_success() {
            return Err(WorkerError::Backend(format!(
                "update job {} to {} returned {}",
                job_id,
                status,
                response.status()
            )));
        }
        debug!(job_id = %job_id, status = %status, "Reported job status");
        Ok(())
    }
}
