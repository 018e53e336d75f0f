use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::summary::{SummaryPayload, UploadFile, UploadRecord};

pub const UPLOAD_FALLBACK_MESSAGE: &str = "Upload failed. Please check CSV format.";
pub const EXPORT_FALLBACK_MESSAGE: &str = "Report export failed.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("no summary available yet")]
    NoContent,
    #[error("{0}")]
    Validation(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

/// PDF bytes returned by the export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub suggested_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait SummaryClient: Send + Sync {
    async fn fetch_summary(&self) -> Result<SummaryPayload, ClientError>;
    async fn upload(&self, file: &UploadFile) -> Result<(), ClientError>;
    async fn fetch_history(&self) -> Result<Vec<UploadRecord>, ClientError>;
    async fn export_report(&self) -> Result<ReportDocument, ClientError>;
}

pub struct HttpSummaryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSummaryClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response, ClientError> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.get(path).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!("{path} answered {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to decode {path}: {e}")))
    }
}

#[async_trait]
impl SummaryClient for HttpSummaryClient {
    async fn fetch_summary(&self) -> Result<SummaryPayload, ClientError> {
        let response = self.get("/summary/").await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Err(ClientError::NoContent);
        }
        if !status.is_success() {
            return Err(ClientError::Transport(format!("summary answered {status}")));
        }

        response
            .json::<SummaryPayload>()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to decode summary: {e}")))
    }

    async fn upload(&self, file: &UploadFile) -> Result<(), ClientError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("text/csv")
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = self.url("/upload/");
        debug!(%url, filename = %file.filename, bytes = file.bytes.len(), "POST");
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "upload rejected");
            return Err(ClientError::Validation(
                service_error_message(&body).unwrap_or_else(|| UPLOAD_FALLBACK_MESSAGE.to_string()),
            ));
        }

        Err(ClientError::Transport(format!("upload answered {status}")))
    }

    async fn fetch_history(&self) -> Result<Vec<UploadRecord>, ClientError> {
        self.get_json("/history/").await
    }

    async fn export_report(&self) -> Result<ReportDocument, ClientError> {
        let response = self.get("/export-pdf/").await?;
        let status = response.status();

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Validation(
                service_error_message(&body).unwrap_or_else(|| EXPORT_FALLBACK_MESSAGE.to_string()),
            ));
        }
        if !status.is_success() {
            return Err(ClientError::Transport(format!("export answered {status}")));
        }

        let suggested_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(ReportDocument {
            suggested_name,
            bytes: bytes.to_vec(),
        })
    }
}

/// Non-empty string `error` field of a JSON error body, if any.
pub(crate) fn service_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|v| v.as_str())
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

pub(crate) fn disposition_file_name(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|param| {
        let value = param.strip_prefix("filename=")?;
        let value = value.trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
