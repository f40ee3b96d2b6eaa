//! Status report sources

use crate::config::HttpConfig;
use crate::errors::HttpError;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Something that can hand over the raw server-status report
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    /// Retrieve the full report body
    async fn fetch_report(&self) -> Result<String, HttpError>;

    /// Human readable origin of the report, for logs
    fn describe(&self) -> String;
}

/// Fetches the live server-status page with a single GET
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    url: String,
    client: Client,
}

impl HttpStatusSource {
    /// Create a source for `url` with default HTTP settings
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        Self::with_config(url, HttpConfig::default())
    }

    /// Create a source for `url` with specific configuration
    pub fn with_config(url: impl Into<String>, config: HttpConfig) -> Result<Self, HttpError> {
        let url = url.into();
        reqwest::Url::parse(&url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!(
            "Creating status client with {}s timeout, verify_ssl={}",
            config.timeout.as_secs(),
            config.verify_ssl
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(reqwest::redirect::Policy::limited(
                config.max_redirects as usize,
            ))
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_report(&self) -> Result<String, HttpError> {
        info!("Fetching server status from: {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        debug!("HTTP response received: {}", status);

        if status != StatusCode::OK {
            return Err(HttpError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Status report received: {} bytes", body.len());
        Ok(body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads a previously captured server-status page
#[derive(Debug, Clone)]
pub struct FileStatusSource {
    path: PathBuf,
}

impl FileStatusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StatusSource for FileStatusSource {
    async fn fetch_report(&self) -> Result<String, HttpError> {
        info!("Reading captured server status from: {}", self.path.display());
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| HttpError::ReportRead {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}
