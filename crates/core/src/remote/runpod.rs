//! RunPod serverless endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::JobInput;
use crate::config::EndpointConfig;

use super::{JobStatus, RemoteError, RemoteJobClient};

/// RunPod `/run` + `/status` + `/cancel` client.
pub struct RunpodClient {
    client: Client,
    config: EndpointConfig,
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input: &'a JobInput,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    id: Option<String>,
}

impl RunpodClient {
    /// Create a new client for the configured endpoint.
    pub fn new(config: EndpointConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Endpoint base URL without trailing slash.
    fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.endpoint_id
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint_url(), path)
    }

    /// Turn a non-2xx response into an `Api` error.
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl RemoteJobClient for RunpodClient {
    fn name(&self) -> &str {
        "runpod"
    }

    async fn submit(&self, input: &JobInput) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(self.url("/run"))
            .bearer_auth(&self.config.api_key)
            .json(&RunRequest { input })
            .send()
            .await?;

        let run: RunResponse = Self::check(response).await?.json().await?;
        let id = run
            .id
            .filter(|id| !id.is_empty())
            .ok_or(RemoteError::MissingJobId)?;

        debug!("Submitted job {} with {} text(s)", id, input.texts.len());
        Ok(id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/status/{}", job_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let mut status: JobStatus = Self::check(response).await?.json().await?;
        if status.id.is_empty() {
            status.id = job_id.to_string();
        }
        Ok(status)
    }

    async fn cancel(&self, job_id: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url(&format!("/cancel/{}", job_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        Self::check(response).await?;
        debug!("Cancelled job {}", job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::GenerationParams;

    fn config(url: &str) -> EndpointConfig {
        EndpointConfig {
            url: url.to_string(),
            endpoint_id: "abc123".to_string(),
            api_key: "secret".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let client = RunpodClient::new(config("https://api.runpod.ai/v2/")).unwrap();
        assert_eq!(client.endpoint_url(), "https://api.runpod.ai/v2/abc123");
        assert_eq!(
            client.url("/status/job-1"),
            "https://api.runpod.ai/v2/abc123/status/job-1"
        );
    }

    #[test]
    fn test_run_request_wraps_input() {
        let input = JobInput {
            texts: vec!["[S1] hi".to_string()],
            params: GenerationParams::default(),
            audio_prompt: Some("AAAA".to_string()),
            audio_prompt_transcript: None,
        };
        let json = serde_json::to_value(RunRequest { input: &input }).unwrap();
        assert_eq!(json["input"]["texts"][0], "[S1] hi");
        assert_eq!(json["input"]["audio_prompt"], "AAAA");
    }

    #[test]
    fn test_run_response_without_id() {
        let run: RunResponse = serde_json::from_str(r#"{"status": "IN_QUEUE"}"#).unwrap();
        assert!(run.id.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = RunpodClient::new(config("http://127.0.0.1:9")).unwrap();
        let result = client.status("job-1").await;
        assert!(matches!(
            result,
            Err(RemoteError::ConnectionFailed(_))
                | Err(RemoteError::Http(_))
                | Err(RemoteError::Timeout)
        ));
    }
}
