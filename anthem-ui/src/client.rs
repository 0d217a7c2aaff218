//! Generation API client
//!
//! Thin HTTP layer over the two backend endpoints: job submission
//! (`POST /generate-song/`, `POST /remix/{id}/`) and status polling
//! (`GET /status/{id}/`). The CSRF token required by the submission
//! endpoints is read from the `csrftoken` cookie after priming the jar,
//! or supplied directly via configuration.

use anthem_common::model::{JobSnapshot, RemixReceipt, SongPrompt, SubmissionReceipt};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "anthem-ui/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

/// Generation API client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Prompt failed local validation; no request was made
    #[error("Invalid prompt: {0}")]
    Validation(#[from] anthem_common::model::PromptError),

    #[error("Network error: {0}")]
    Network(String),

    /// The backend rejected a submission; detail is the verbatim error body
    #[error("Submission rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// A status request returned a non-success HTTP status
    #[error("Status check failed with status {0}")]
    StatusCheck(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("CSRF token unavailable; call prime_csrf or configure one")]
    MissingCsrfToken,
}

/// Client for the song-generation backend
pub struct GenerationClient {
    http_client: reqwest::Client,
    cookie_jar: Arc<Jar>,
    base_url: Url,
    configured_csrf: Option<String>,
}

impl GenerationClient {
    /// Create a client for the given API base URL (no trailing slash)
    pub fn new(base_url: &str, csrf_token: Option<String>) -> Result<Self, ClientError> {
        let base_url: Url = format!("{}/", base_url.trim_end_matches('/'))
            .parse()
            .map_err(|e| ClientError::Parse(format!("invalid base URL: {e}")))?;

        let cookie_jar = Arc::new(Jar::default());
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_provider(cookie_jar.clone())
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            cookie_jar,
            base_url,
            configured_csrf: csrf_token,
        })
    }

    /// Fetch the backend root so the server sets the `csrftoken` cookie
    ///
    /// Not needed when a token was supplied via configuration.
    pub async fn prime_csrf(&self) -> Result<(), ClientError> {
        if self.configured_csrf.is_some() {
            return Ok(());
        }

        tracing::debug!(url = %self.base_url, "Priming CSRF cookie");
        self.http_client
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if self.csrf_token().is_none() {
            return Err(ClientError::MissingCsrfToken);
        }
        Ok(())
    }

    /// Current CSRF token: configured value, else the jar's cookie
    pub fn csrf_token(&self) -> Option<String> {
        if let Some(token) = &self.configured_csrf {
            return Some(token.clone());
        }
        let header = self.cookie_jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        extract_cookie(header, CSRF_COOKIE)
    }

    /// Submit a new generation job
    ///
    /// Validates the prompt locally first; an invalid prompt never reaches
    /// the network. A non-success response surfaces the backend's error
    /// body verbatim.
    pub async fn submit(&self, prompt: &SongPrompt) -> Result<SubmissionReceipt, ClientError> {
        prompt.validate()?;

        let url = self.endpoint("generate-song/")?;
        let receipt: SubmissionReceipt = self.post_job(url, prompt).await?;

        tracing::info!(
            job_id = %receipt.id,
            genre = %prompt.genre,
            "Song request submitted"
        );
        Ok(receipt)
    }

    /// Submit a remix of a prior job
    pub async fn remix(
        &self,
        original_id: &str,
        prompt: &SongPrompt,
    ) -> Result<RemixReceipt, ClientError> {
        prompt.validate()?;

        let url = self.endpoint(&format!("remix/{original_id}/"))?;
        let receipt: RemixReceipt = self.post_job(url, prompt).await?;

        tracing::info!(
            job_id = %receipt.id,
            remix_of = %original_id,
            "Remix request submitted"
        );
        Ok(receipt)
    }

    /// Fetch the current status snapshot for a job
    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot, ClientError> {
        let url = self.endpoint(&format!("status/{job_id}/"))?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::StatusCheck(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// POST a prompt to a submission endpoint and decode the receipt
    async fn post_job<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        prompt: &SongPrompt,
    ) -> Result<T, ClientError> {
        let csrf = self.csrf_token().ok_or(ClientError::MissingCsrfToken)?;

        let response = self
            .http_client
            .post(url)
            .header(CSRF_HEADER, csrf)
            .json(prompt)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Parse(format!("invalid endpoint path '{path}': {e}")))
    }
}

/// Extract a named cookie value from a `name=value; name2=value2` header
fn extract_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let pair = pair.trim();
        pair.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|value| value.to_string())
    })
}
