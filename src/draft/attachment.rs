//! Pending photo attachments held locally until finalization uploads them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MIME types the resource API accepts for photo uploads.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic"];

pub fn is_supported_mime(mime_type: &str) -> bool {
    let normalized = mime_type.trim().to_ascii_lowercase();
    ALLOWED_MIME_TYPES.contains(&normalized.as_str())
}

/// Upload progress of a single attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    NotStarted,
    InFlight,
    Succeeded,
    Failed,
}

/// Where the attachment's content currently lives.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentOrigin {
    /// Bytes are only held in memory on this side.
    LocalOnly { bytes: Arc<Vec<u8>> },
    /// The remote side has the file; local bytes were released.
    Confirmed { remote_ref: String },
}

/// A file the user picked, not yet confirmed remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAttachment {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub primary: bool,
    pub state: UploadState,
    pub origin: AttachmentOrigin,
}

impl PendingAttachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            primary: false,
            state: UploadState::NotStarted,
            origin: AttachmentOrigin::LocalOnly {
                bytes: Arc::new(bytes),
            },
        }
    }

    /// Local bytes, if they have not been released yet.
    pub fn bytes(&self) -> Option<&Arc<Vec<u8>>> {
        match &self.origin {
            AttachmentOrigin::LocalOnly { bytes } => Some(bytes),
            AttachmentOrigin::Confirmed { .. } => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.origin, AttachmentOrigin::Confirmed { .. })
    }

    /// Mark the upload as confirmed and drop the local bytes.
    pub fn confirm(&mut self, remote_ref: impl Into<String>) {
        self.origin = AttachmentOrigin::Confirmed {
            remote_ref: remote_ref.into(),
        };
        self.state = UploadState::Succeeded;
    }

    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            primary: self.primary,
            state: self.state,
            size_bytes: self.bytes().map(|b| b.len()),
            remote_ref: match &self.origin {
                AttachmentOrigin::Confirmed { remote_ref } => Some(remote_ref.clone()),
                AttachmentOrigin::LocalOnly { .. } => None,
            },
        }
    }
}

/// Serializable view of an attachment for UI clients.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentSummary {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub primary: bool,
    pub state: UploadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ref: Option<String>,
}

/// Add an attachment, making it primary if it is the first one.
pub(crate) fn push(attachments: &mut Vec<PendingAttachment>, mut attachment: PendingAttachment) -> Uuid {
    attachment.primary = attachments.is_empty();
    let id = attachment.id;
    attachments.push(attachment);
    id
}

/// Remove an attachment; if it was primary, the first remaining one is promoted.
pub(crate) fn remove(attachments: &mut Vec<PendingAttachment>, id: Uuid) -> bool {
    let Some(pos) = attachments.iter().position(|a| a.id == id) else {
        return false;
    };
    let removed = attachments.remove(pos);
    if removed.primary {
        if let Some(first) = attachments.first_mut() {
            first.primary = true;
        }
    }
    true
}

/// Flag `id` as primary and clear the flag everywhere else.
pub(crate) fn set_primary(attachments: &mut [PendingAttachment], id: Uuid) -> bool {
    if !attachments.iter().any(|a| a.id == id) {
        return false;
    }
    for attachment in attachments.iter_mut() {
        attachment.primary = attachment.id == id;
    }
    true
}
