use crate::ports::BackendResponse;

use super::range::parse_confirmed_range;

/// Classification of a single storage round-trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// `308`: more bytes expected. `confirmed` is `None` when the `Range` header was unusable.
    Continue { confirmed: Option<u64> },
    /// Final response carrying the remote object id.
    Done { remote_id: String },
    /// `404`/`410`: the session is gone.
    Expired { detail: String },
    /// Non-retryable client error.
    Rejected { detail: String },
    /// `5xx` or network failure; worth another attempt.
    Transient { detail: String },
    /// Success status without a usable result, or a status the protocol never sends.
    Malformed { detail: String },
}

impl ChunkOutcome {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChunkOutcome::Transient { .. })
    }
}

/// `{status} - {body}` exactly as the backend sent it.
pub fn describe(resp: &BackendResponse) -> String {
    format!("{} - {}", resp.status, resp.body)
}

/// The `id` field of a JSON response body, if present and non-empty.
pub fn extract_remote_id(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("id")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

pub fn classify(resp: &BackendResponse) -> ChunkOutcome {
    match resp.status {
        308 => ChunkOutcome::Continue {
            confirmed: resp.range.as_deref().and_then(parse_confirmed_range),
        },
        200 | 201 => match extract_remote_id(&resp.body) {
            Some(remote_id) => ChunkOutcome::Done { remote_id },
            None => ChunkOutcome::Malformed {
                detail: format!("success status without file id: {}", describe(resp)),
            },
        },
        404 | 410 => ChunkOutcome::Expired {
            detail: describe(resp),
        },
        400..=499 => ChunkOutcome::Rejected {
            detail: describe(resp),
        },
        500..=599 => ChunkOutcome::Transient {
            detail: describe(resp),
        },
        _ => ChunkOutcome::Malformed {
            detail: format!("unexpected status: {}", describe(resp)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(status: u16, range: Option<&str>, body: &str) -> BackendResponse {
        BackendResponse {
            status,
            location: None,
            range: range.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[test]
    fn partial_accept_parses_range() {
        assert_eq!(
            classify(&resp(308, Some("bytes=0-1048575"), "")),
            ChunkOutcome::Continue {
                confirmed: Some(1_048_576)
            }
        );
        assert_eq!(
            classify(&resp(308, Some("garbage"), "")),
            ChunkOutcome::Continue { confirmed: None }
        );
        assert_eq!(
            classify(&resp(308, None, "")),
            ChunkOutcome::Continue { confirmed: None }
        );
    }

    #[test]
    fn final_response_requires_id() {
        assert_eq!(
            classify(&resp(200, None, r#"{"id":"abc","name":"f"}"#)),
            ChunkOutcome::Done {
                remote_id: "abc".to_string()
            }
        );
        assert_eq!(
            classify(&resp(201, None, r#"{"id":"xyz"}"#)),
            ChunkOutcome::Done {
                remote_id: "xyz".to_string()
            }
        );
        assert!(matches!(
            classify(&resp(200, None, r#"{"kind":"drive#file"}"#)),
            ChunkOutcome::Malformed { .. }
        ));
        assert!(matches!(
            classify(&resp(200, None, "not json")),
            ChunkOutcome::Malformed { .. }
        ));
        assert!(matches!(
            classify(&resp(200, None, r#"{"id":""}"#)),
            ChunkOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn error_statuses_map_to_terminal_classes() {
        assert!(matches!(
            classify(&resp(404, None, "")),
            ChunkOutcome::Expired { .. }
        ));
        assert!(matches!(
            classify(&resp(410, None, "")),
            ChunkOutcome::Expired { .. }
        ));
        assert!(classify(&resp(503, None, "")).is_transient());
        assert!(classify(&resp(500, None, "")).is_transient());

        let body = r#"{"error":{"code":403,"message":"insufficientPermissions"}}"#;
        assert_eq!(
            classify(&resp(403, None, body)),
            ChunkOutcome::Rejected {
                detail: format!("403 - {body}")
            }
        );
        assert!(matches!(
            classify(&resp(204, None, "")),
            ChunkOutcome::Malformed { .. }
        ));
    }
}
