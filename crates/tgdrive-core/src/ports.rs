//! Hexagonal ports between the transfer engine and its adapters.

use async_trait::async_trait;

use crate::{
    domain::{BearerToken, ChatId, Credential, FileRef},
    source::ResolvedSource,
    Result,
};

/// Turns a credential into a bearer token for the storage API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, credential: &Credential) -> Result<BearerToken>;
}

/// Retrieves file bytes and size metadata from the content provider.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn resolve(&self, file: &FileRef) -> Result<ResolvedSource>;
}

/// Metadata sent alongside a new remote object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub parent_folder: String,
    pub mime_type: Option<String>,
}

impl FileMetadata {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "parents": [self.parent_folder],
        })
    }
}

/// Raw storage backend reply. Classification happens in the engine, not the adapter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub location: Option<String>,
    pub range: Option<String>,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Storage API wire operations.
///
/// Implementations return `Error::Transport` for network-level failures and a
/// `BackendResponse` for anything the server actually answered.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// One-shot multipart upload (metadata part + binary part).
    async fn simple_upload(
        &self,
        token: &BearerToken,
        metadata: &FileMetadata,
        data: Vec<u8>,
    ) -> Result<BackendResponse>;

    /// Open a resumable session; the session URI comes back in `location`.
    async fn create_session(
        &self,
        token: &BearerToken,
        metadata: &FileMetadata,
        total_size: Option<u64>,
    ) -> Result<BackendResponse>;

    /// Status probe (`Content-Range: bytes */*`).
    async fn probe_session(&self, session_uri: &str) -> Result<BackendResponse>;

    /// PUT one chunk carrying `Content-Range: bytes {start}-{end}/{total}`.
    async fn put_chunk(
        &self,
        session_uri: &str,
        content_range: &str,
        data: Vec<u8>,
    ) -> Result<BackendResponse>;
}

/// Receives human-readable progress/outcome text.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
