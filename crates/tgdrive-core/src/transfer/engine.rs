use std::{future::Future, sync::Arc};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    domain::{BearerToken, ChunkAttempt, Credential, FileRef, UploadOutcome, UploadSession},
    errors::Error,
    ports::{BackendResponse, FileMetadata, SourceFetcher, StorageBackend, TokenProvider},
    source::{ByteSource, ChunkReader},
    Result,
};

use super::{
    chunking::chunk_at,
    outcome::{classify, ChunkOutcome},
    progress::{Progress, ProgressThrottle},
    range::content_range,
    select_strategy, Strategy, TransferPolicy,
};

/// One upload job as handed over by the dispatcher.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub file: FileRef,
    pub destination_folder: String,
    /// Checked between chunks and during backoff.
    pub cancel: CancellationToken,
}

impl UploadRequest {
    pub fn new(file: FileRef, destination_folder: impl Into<String>) -> Self {
        Self {
            file,
            destination_folder: destination_folder.into(),
            cancel: CancellationToken::new(),
        }
    }

    fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.file.display_name.clone(),
            parent_folder: self.destination_folder.clone(),
            mime_type: self.file.mime_type.clone(),
        }
    }
}

/// What a status probe told us about a session.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ProbeResult {
    Confirmed(u64),
    Complete(String),
    Unknown,
}

/// Drives simple and resumable uploads against a `StorageBackend`.
///
/// Holds no per-upload state; concurrent uploads share one engine.
pub struct TransferEngine {
    tokens: Arc<dyn TokenProvider>,
    source: Arc<dyn SourceFetcher>,
    backend: Arc<dyn StorageBackend>,
    policy: TransferPolicy,
}

impl TransferEngine {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        source: Arc<dyn SourceFetcher>,
        backend: Arc<dyn StorageBackend>,
        policy: TransferPolicy,
    ) -> Self {
        Self {
            tokens,
            source,
            backend,
            policy,
        }
    }

    /// Upload `req.file` into `req.destination_folder`.
    ///
    /// Every failure is folded into the returned outcome; nothing is dropped.
    pub async fn upload(
        &self,
        req: &UploadRequest,
        credential: &Credential,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> UploadOutcome {
        let outcome = self
            .run(req, credential, None, on_progress)
            .await
            .unwrap_or_else(UploadOutcome::from);
        log_outcome(&req.file, &outcome);
        outcome
    }

    /// Continue an existing resumable session from whatever the backend already holds.
    pub async fn resume(
        &self,
        req: &UploadRequest,
        credential: &Credential,
        resume_uri: &str,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> UploadOutcome {
        let outcome = self
            .run(req, credential, Some(resume_uri), on_progress)
            .await
            .unwrap_or_else(UploadOutcome::from);
        log_outcome(&req.file, &outcome);
        outcome
    }

    async fn run(
        &self,
        req: &UploadRequest,
        credential: &Credential,
        resume_uri: Option<&str>,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<UploadOutcome> {
        let resolved = self.source.resolve(&req.file).await?;
        let (source, total) = resolved.settle_size(req.file.declared_size).await?;
        let token = self.tokens.token(credential).await?;
        let metadata = req.metadata();

        if let Some(uri) = resume_uri {
            let mut session = UploadSession::new(uri, total);
            match self.probe(&session.resume_uri).await {
                ProbeResult::Complete(remote_id) => return Ok(UploadOutcome::Success { remote_id }),
                ProbeResult::Confirmed(n) => session.confirm(n),
                ProbeResult::Unknown => {}
            }
            info!(
                file = %req.file.display_name,
                offset = session.bytes_confirmed(),
                total,
                "resuming upload session"
            );
            return self.transfer(session, source, req, on_progress).await;
        }

        match select_strategy(total, self.policy.resumable_threshold) {
            Strategy::Simple => {
                info!(file = %req.file.display_name, total, "using simple upload");
                self.simple_upload(&token, &metadata, source, total, &req.cancel)
                    .await
            }
            Strategy::Resumable => {
                info!(file = %req.file.display_name, total, "using resumable upload");
                let session = self.initiate(&token, &metadata, total).await?;
                self.transfer(session, source, req, on_progress).await
            }
        }
    }

    async fn simple_upload(
        &self,
        token: &BearerToken,
        metadata: &FileMetadata,
        source: ByteSource,
        total: u64,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome> {
        let data = source.read_to_end(Some(total)).await?;
        if data.len() as u64 != total {
            return Err(Error::SourceUnavailable(format!(
                "source produced {} bytes, expected {total}",
                data.len()
            )));
        }

        let backend = &self.backend;
        let outcome = self
            .send_with_retries(cancel, "simple upload", 0, total.saturating_sub(1), || {
                let data = data.clone();
                async move { backend.simple_upload(token, metadata, data).await }
            })
            .await?;

        Ok(match outcome {
            ChunkOutcome::Done { remote_id } => UploadOutcome::Success { remote_id },
            ChunkOutcome::Rejected { detail } | ChunkOutcome::Expired { detail } => {
                UploadOutcome::Rejected { reason: detail }
            }
            ChunkOutcome::Transient { detail } => UploadOutcome::Failed {
                reason: self.exhausted("simple upload", &detail),
            },
            ChunkOutcome::Malformed { detail } => UploadOutcome::Failed { reason: detail },
            ChunkOutcome::Continue { .. } => UploadOutcome::Failed {
                reason: "simple upload answered 308 Resume Incomplete".to_string(),
            },
        })
    }

    async fn initiate(
        &self,
        token: &BearerToken,
        metadata: &FileMetadata,
        total: u64,
    ) -> Result<UploadSession> {
        let resp = self
            .backend
            .create_session(token, metadata, Some(total))
            .await?;

        if !resp.is_success() {
            return Err(Error::SessionInitiation {
                status: resp.status,
                body: resp.body,
            });
        }

        let uri = resp
            .location
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "session creation returned {} without a Location header",
                    resp.status
                ))
            })?;

        debug!(total, "resumable session created");
        Ok(UploadSession::new(uri, total))
    }

    async fn probe(&self, session_uri: &str) -> ProbeResult {
        let resp = match self.backend.probe_session(session_uri).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("session status probe failed: {e}");
                return ProbeResult::Unknown;
            }
        };

        match classify(&resp) {
            ChunkOutcome::Continue {
                confirmed: Some(n),
            } => ProbeResult::Confirmed(n),
            ChunkOutcome::Done { remote_id } => ProbeResult::Complete(remote_id),
            other => {
                debug!(?other, "session status probe gave no usable offset");
                ProbeResult::Unknown
            }
        }
    }

    async fn transfer(
        &self,
        mut session: UploadSession,
        source: ByteSource,
        req: &UploadRequest,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<UploadOutcome> {
        let total = session.total_size;
        let mut reader = ChunkReader::new(source);
        let mut progress = ProgressThrottle::starting_at(
            total,
            self.policy.progress_step_percent,
            session.bytes_confirmed(),
        );
        let mut stalled = 0u32;

        while !session.is_complete() {
            let span = chunk_at(session.bytes_confirmed(), total, self.policy.chunk_size)
                .ok_or_else(|| Error::Config("chunk size must be positive".to_string()))?;
            if req.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let data = reader.read_range(span.start, span.len).await?;
            if span.start + span.len == total {
                // Last chunk: a longer source would be silently truncated by the backend.
                reader.ensure_ends_at(total).await?;
            }
            let range = content_range(span.start, span.end_inclusive(), total);
            let backend = &self.backend;
            let uri = session.resume_uri.as_str();
            let range_ref = range.as_str();

            let outcome = self
                .send_with_retries(&req.cancel, &range, span.start, span.end_inclusive(), || {
                    let data = data.clone();
                    async move { backend.put_chunk(uri, range_ref, data).await }
                })
                .await?;

            match outcome {
                ChunkOutcome::Continue {
                    confirmed: Some(n),
                } => session.confirm(n),
                ChunkOutcome::Continue { confirmed: None } => {
                    // Unusable Range header: ask the backend instead of guessing.
                    let optimistic = span.start + span.len;
                    match self.probe(&session.resume_uri).await {
                        ProbeResult::Confirmed(n) => session.confirm(n),
                        ProbeResult::Complete(remote_id) => {
                            return Ok(UploadOutcome::Success { remote_id })
                        }
                        ProbeResult::Unknown => {
                            warn!(range = %range, "no confirmed range from backend, assuming full chunk");
                            session.confirm(optimistic);
                        }
                    }
                }
                ChunkOutcome::Done { remote_id } => return Ok(UploadOutcome::Success { remote_id }),
                ChunkOutcome::Expired { detail } => {
                    return Ok(UploadOutcome::Expired {
                        reason: format!("upload session expired: {detail}"),
                    })
                }
                ChunkOutcome::Rejected { detail } => {
                    return Ok(UploadOutcome::Rejected { reason: detail })
                }
                ChunkOutcome::Transient { detail } => {
                    return Ok(UploadOutcome::Failed {
                        reason: self.exhausted(&range, &detail),
                    })
                }
                ChunkOutcome::Malformed { detail } => {
                    return Ok(UploadOutcome::Failed { reason: detail })
                }
            }

            if session.bytes_confirmed() > span.start {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= self.policy.max_attempts {
                    return Ok(UploadOutcome::Failed {
                        reason: format!(
                            "backend stopped confirming bytes at offset {}",
                            session.bytes_confirmed()
                        ),
                    });
                }
            }

            debug!(confirmed = session.bytes_confirmed(), total, "chunk accepted");
            if let Some(p) = progress.observe(session.bytes_confirmed()) {
                on_progress(p);
            }
        }

        Ok(UploadOutcome::Failed {
            reason: format!("backend confirmed all {total} bytes but returned no file id"),
        })
    }

    /// Run `send` until it yields a non-transient outcome or attempts run out.
    ///
    /// On exhaustion the last `Transient` outcome is returned.
    async fn send_with_retries<F, Fut>(
        &self,
        cancel: &CancellationToken,
        what: &str,
        offset_start: u64,
        offset_end: u64,
        mut send: F,
    ) -> Result<ChunkOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<BackendResponse>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = ChunkAttempt {
            offset_start,
            offset_end,
            attempt_number: 1,
        };
        loop {
            debug!(what, bytes = attempt.byte_len(), attempt = attempt.attempt_number, "sending");
            let outcome = match send().await {
                Ok(resp) => classify(&resp),
                Err(e) if e.is_transient() => ChunkOutcome::Transient {
                    detail: e.to_string(),
                },
                Err(e) => return Err(e),
            };

            if !outcome.is_transient() || attempt.attempt_number >= max_attempts {
                return Ok(outcome);
            }

            let delay = self.policy.backoff(attempt.attempt_number);
            warn!(
                what,
                ?attempt,
                max_attempts,
                ?delay,
                ?outcome,
                "transient failure, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = sleep(delay) => {}
            }
            attempt.attempt_number += 1;
        }
    }

    fn exhausted(&self, what: &str, detail: &str) -> String {
        format!(
            "{what} failed after {} attempts: {detail}",
            self.policy.max_attempts.max(1)
        )
    }
}

fn log_outcome(file: &FileRef, outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Success { remote_id } => {
            info!(file = %file.display_name, remote_id = %remote_id, "upload finished")
        }
        other => warn!(file = %file.display_name, ?other, "upload did not complete"),
    }
}
