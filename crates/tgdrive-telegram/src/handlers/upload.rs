use std::sync::Arc;

use teloxide::{
    requests::ResponseResult,
    types::{Document, PhotoSize},
};
use tokio::sync::mpsc;

use tgdrive_core::{
    domain::{ChatId, FileRef, UploadOutcome},
    transfer::{Progress, UploadRequest},
};

use crate::router::AppState;

pub(super) fn file_ref_for_document(doc: &Document) -> FileRef {
    FileRef {
        source_id: doc.file.id.clone(),
        display_name: doc
            .file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("document_{}", doc.file.unique_id)),
        declared_size: declared(doc.file.size),
        mime_type: doc.mime_type.as_ref().map(|m| m.to_string()),
    }
}

/// Telegram sends several resolutions of one photo; keep the largest.
pub(super) fn file_ref_for_photo(sizes: &[PhotoSize]) -> Option<FileRef> {
    let best = sizes
        .iter()
        .max_by_key(|p| (u64::from(p.width) * u64::from(p.height), p.file.size))?;
    Some(FileRef {
        source_id: best.file.id.clone(),
        display_name: format!("photo_{}.jpg", best.file.unique_id),
        declared_size: declared(best.file.size),
        mime_type: Some("image/jpeg".to_string()),
    })
}

fn declared(size: u32) -> Option<u64> {
    (size > 0).then_some(u64::from(size))
}

fn received_text(name: &str) -> String {
    format!("Received \"{name}\". Preparing to upload...")
}

fn progress_text(name: &str, percent: u8) -> String {
    format!("Uploading \"{name}\"... {percent}%")
}

fn success_text(name: &str) -> String {
    format!("✅ Successfully uploaded \"{name}\" to Google Drive!")
}

fn failure_text(reason: &str) -> String {
    format!("❌ Failed to upload file. Reason: {reason}")
}

fn admin_text(chat: ChatId, name: &str, reason: &str) -> String {
    format!("Upload failed for chat {} (\"{name}\"): {reason}", chat.0)
}

/// The admin is told about failures unless they are the one chatting.
fn admin_target(admin_chat_id: Option<i64>, chat: ChatId) -> Option<ChatId> {
    admin_chat_id.filter(|&id| id != chat.0).map(ChatId)
}

/// Acknowledge the file and run the transfer in the background so the
/// dispatcher keeps serving other chats.
pub(super) async fn handle_upload(
    chat: i64,
    file: FileRef,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = ChatId(chat);
    if let Err(e) = state
        .notifier
        .notify(chat_id, &received_text(&file.display_name))
        .await
    {
        tracing::warn!(chat, "failed to acknowledge upload: {e}");
    }

    let mut req = UploadRequest::new(file, state.cfg.drive_folder_id.clone());
    req.cancel = state.shutdown.child_token();
    tokio::spawn(run_upload(state, chat_id, req));
    Ok(())
}

async fn run_upload(state: Arc<AppState>, chat_id: ChatId, req: UploadRequest) {
    let name = req.file.display_name.clone();

    // The engine reports progress synchronously; a forwarder task does the sending.
    let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();
    let forwarder = {
        let notifier = state.notifier.clone();
        let name = name.clone();
        tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                if let Err(e) = notifier
                    .notify(chat_id, &progress_text(&name, p.percent))
                    .await
                {
                    tracing::warn!("progress notification failed: {e}");
                }
            }
        })
    };

    let mut on_progress = move |p: Progress| {
        let _ = tx.send(p);
    };
    let outcome = state
        .engine
        .upload(&req, &state.cfg.credential, &mut on_progress)
        .await;
    drop(on_progress);
    let _ = forwarder.await;

    report(&state, chat_id, &name, &outcome).await;
}

async fn report(state: &AppState, chat_id: ChatId, name: &str, outcome: &UploadOutcome) {
    let reason = match outcome {
        UploadOutcome::Success { remote_id } => {
            tracing::info!(chat = chat_id.0, file = %name, remote_id = %remote_id, "upload delivered");
            if let Err(e) = state.notifier.notify(chat_id, &success_text(name)).await {
                tracing::warn!("success notification failed: {e}");
            }
            return;
        }
        other => other.reason().unwrap_or("unknown error"),
    };

    if let Err(e) = state.notifier.notify(chat_id, &failure_text(reason)).await {
        tracing::warn!("failure notification failed: {e}");
    }

    if let Some(admin) = admin_target(state.cfg.admin_chat_id, chat_id) {
        if let Err(e) = state
            .notifier
            .notify(admin, &admin_text(chat_id, name, reason))
            .await
        {
            tracing::warn!("admin notification failed: {e}");
        }
    }
}
