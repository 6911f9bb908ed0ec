//! Backend boundary: the only module that talks HTTP.
//!
//! The session engine depends on the `AnalysisBackend` trait, not on reqwest, so
//! the summary → match → cover-letter flow can run against any implementation.
//! `HttpBackend` is the production one.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::models::{FacetCount, Job, ResumeInput};
use crate::session::{SessionId, SESSION_HEADER};
use crate::stream::{decode_fragments, FragmentStream};

const PDF_MIME: &str = "application/pdf";

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The three network phases of an analysis. Every call is tagged with the session.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Opens the résumé summary stream (PDF upload or raw text).
    async fn open_summary_stream(
        &self,
        session: SessionId,
        resume: &ResumeInput,
    ) -> Result<FragmentStream, ClientError>;

    /// Ranks jobs against the summary the backend retained for this session.
    /// Returned in descending relevance; callers must not re-sort.
    async fn match_jobs(&self, session: SessionId) -> Result<Vec<Job>, ClientError>;

    /// Opens the cover-letter stream for one matched job.
    async fn open_cover_letter_stream(
        &self,
        session: SessionId,
        job_id: &str,
    ) -> Result<FragmentStream, ClientError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HttpBackend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RawResumeRequest<'a> {
    resume: &'a str,
}

/// reqwest-backed client. Keeps a cookie store so transport credentials ride
/// along with the session header on every request. No automatic retries.
///
/// `request_timeout` bounds connecting and each JSON request. Streamed bodies are
/// never cut by it; they end only when the server closes them.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Validation(format!("invalid API URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "API URL '{base_url}' cannot carry a path"
            )));
        }

        let client = Client::builder()
            .connect_timeout(request_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET /job_info/all_active
    pub async fn fetch_active_jobs(&self) -> Result<Vec<Job>, ClientError> {
        let url = self.endpoint(&["job_info", "all_active"]);
        let jobs: Vec<Job> = self.get_json(self.client.get(url)).await?;
        info!("Fetched {} active jobs", jobs.len());
        Ok(jobs)
    }

    /// GET /job_info/tag/job_count
    pub async fn fetch_tag_counts(&self) -> Result<Vec<FacetCount>, ClientError> {
        let url = self.endpoint(&["job_info", "tag", "job_count"]);
        self.get_json(self.client.get(url)).await
    }

    /// GET /job_info/company/job_count_including_affiliate_companies
    pub async fn fetch_company_counts(&self) -> Result<Vec<FacetCount>, ClientError> {
        let url = self.endpoint(&[
            "job_info",
            "company",
            "job_count_including_affiliate_companies",
        ]);
        self.get_json(self.client.get(url)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = check_status(request.timeout(self.request_timeout).send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn open_stream(&self, request: RequestBuilder) -> Result<FragmentStream, ClientError> {
        let response = check_status(request.send().await?).await?;
        debug!("Stream opened: {}", response.url());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from));
        Ok(decode_fragments(body))
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn open_summary_stream(
        &self,
        session: SessionId,
        resume: &ResumeInput,
    ) -> Result<FragmentStream, ClientError> {
        let request = match resume {
            ResumeInput::Pdf { file_name, bytes } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(PDF_MIME)?;
                self.client
                    .post(self.endpoint(&["resume", "analyze"]))
                    .multipart(Form::new().part("file", part))
            }
            ResumeInput::Text(text) => self
                .client
                .post(self.endpoint(&["resume", "analyze_raw"]))
                .json(&RawResumeRequest { resume: text }),
        };

        info!("Opening {} summary stream for session {session}", resume.mode());
        self.open_stream(request.header(SESSION_HEADER, session.to_string()))
            .await
    }

    async fn match_jobs(&self, session: SessionId) -> Result<Vec<Job>, ClientError> {
        info!("Requesting job matches for session {session}");
        let request = self
            .client
            .get(self.endpoint(&["resume", "match_job"]))
            .header(SESSION_HEADER, session.to_string());
        self.get_json(request).await
    }

    async fn open_cover_letter_stream(
        &self,
        session: SessionId,
        job_id: &str,
    ) -> Result<FragmentStream, ClientError> {
        info!("Opening cover letter stream for job {job_id}, session {session}");
        let request = self
            .client
            .get(self.endpoint(&["resume", "generate_cover_letter", job_id]))
            .header(SESSION_HEADER, session.to_string());
        self.open_stream(request).await
    }
}

/// Turns a non-success status into `ClientError::Api`, keeping the body as the message.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!("Backend returned {}: {}", status, message);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
