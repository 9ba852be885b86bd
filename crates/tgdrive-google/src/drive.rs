//! Drive v3 upload endpoints over reqwest.
//!
//! The client reports raw status/headers/body; the engine in `tgdrive-core`
//! decides what they mean.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE},
    multipart::{Form, Part},
    redirect::Policy,
};
use tracing::debug;

use tgdrive_core::{
    domain::BearerToken,
    errors::Error,
    ports::{BackendResponse, FileMetadata, StorageBackend},
    transfer::range::PROBE_CONTENT_RANGE,
    Result,
};

const JSON_UTF8: &str = "application/json; charset=UTF-8";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Clone, Debug)]
pub struct DriveClient {
    http: reqwest::Client,
    upload_url: String,
}

impl DriveClient {
    pub fn new(upload_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        // 308 means "Resume Incomplete" here, never a redirect.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            upload_url: upload_url.into(),
        })
    }

    fn transport(what: &str, e: reqwest::Error) -> Error {
        Error::Transport(format!("{what}: {e}"))
    }

    async fn collect(what: &str, resp: reqwest::Response) -> Result<BackendResponse> {
        let status = resp.status().as_u16();
        let location = header_value(resp.headers(), LOCATION);
        let range = header_value(resp.headers(), RANGE);
        let body = resp
            .text()
            .await
            .map_err(|e| Self::transport(what, e))?;

        debug!(what, status, range = ?range, "drive response");
        Ok(BackendResponse {
            status,
            location,
            range,
            body,
        })
    }
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl StorageBackend for DriveClient {
    async fn simple_upload(
        &self,
        token: &BearerToken,
        metadata: &FileMetadata,
        data: Vec<u8>,
    ) -> Result<BackendResponse> {
        let meta_part = Part::text(metadata.to_json().to_string())
            .mime_str(JSON_UTF8)
            .map_err(|e| Error::External(format!("drive multipart error: {e}")))?;
        let file_part = Part::bytes(data)
            .file_name(metadata.name.clone())
            .mime_str(metadata.mime_type.as_deref().unwrap_or(OCTET_STREAM))
            .map_err(|e| Error::External(format!("drive multipart error: {e}")))?;
        let form = Form::new()
            .part("metadata", meta_part)
            .part("file", file_part);

        let resp = self
            .http
            .post(&self.upload_url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&token.value)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::transport("simple upload", e))?;

        Self::collect("simple upload", resp).await
    }

    async fn create_session(
        &self,
        token: &BearerToken,
        metadata: &FileMetadata,
        total_size: Option<u64>,
    ) -> Result<BackendResponse> {
        let mut req = self
            .http
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable")])
            .bearer_auth(&token.value)
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(metadata.to_json().to_string());

        if let Some(total) = total_size {
            req = req.header("X-Upload-Content-Length", total);
        }
        if let Some(mime) = &metadata.mime_type {
            req = req.header("X-Upload-Content-Type", mime.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Self::transport("session creation", e))?;
        Self::collect("session creation", resp).await
    }

    async fn probe_session(&self, session_uri: &str) -> Result<BackendResponse> {
        let resp = self
            .http
            .put(session_uri)
            .header(CONTENT_RANGE, PROBE_CONTENT_RANGE)
            .header(CONTENT_LENGTH, 0)
            .body(Vec::new())
            .send()
            .await
            .map_err(|e| Self::transport("status probe", e))?;
        Self::collect("status probe", resp).await
    }

    async fn put_chunk(
        &self,
        session_uri: &str,
        content_range: &str,
        data: Vec<u8>,
    ) -> Result<BackendResponse> {
        let resp = self
            .http
            .put(session_uri)
            .header(CONTENT_RANGE, content_range)
            .body(data)
            .send()
            .await
            .map_err(|e| Self::transport(content_range, e))?;
        Self::collect(content_range, resp).await
    }
}
