//! Finalization stages and their recorded outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a stage failure aborts the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Fatal,
    Soft,
}

/// The six finalization stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    CreatePrimary,
    UpdateAttributes,
    WriteRooms,
    UploadPhotos,
    WriteTags,
    ApplyPublication,
}

impl StageName {
    pub const ALL: [StageName; 6] = [
        StageName::CreatePrimary,
        StageName::UpdateAttributes,
        StageName::WriteRooms,
        StageName::UploadPhotos,
        StageName::WriteTags,
        StageName::ApplyPublication,
    ];

    pub fn kind(self) -> StageKind {
        match self {
            Self::CreatePrimary | Self::UpdateAttributes => StageKind::Fatal,
            Self::WriteRooms | Self::UploadPhotos | Self::WriteTags | Self::ApplyPublication => {
                StageKind::Soft
            }
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreatePrimary => "create_primary",
            Self::UpdateAttributes => "update_attributes",
            Self::WriteRooms => "write_rooms",
            Self::UploadPhotos => "upload_photos",
            Self::WriteTags => "write_tags",
            Self::ApplyPublication => "apply_publication",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Skipped,
    Succeeded,
    FailedSoft,
    FailedFatal,
}

/// Per-item counts for stages that fan out (rooms, photos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemProgress {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// One entry of a finalization attempt's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: StageName,
    pub kind: StageKind,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ItemProgress>,
    pub finished_at: DateTime<Utc>,
}

impl StageOutcome {
    fn new(stage: StageName, status: StageStatus, detail: Option<String>) -> Self {
        Self {
            stage,
            kind: stage.kind(),
            status,
            detail,
            progress: None,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(stage: StageName) -> Self {
        Self::new(stage, StageStatus::Succeeded, None)
    }

    pub fn skipped(stage: StageName, reason: impl Into<String>) -> Self {
        Self::new(stage, StageStatus::Skipped, Some(reason.into()))
    }

    /// A failure, classified by the stage's kind.
    pub fn failed(stage: StageName, detail: impl Into<String>) -> Self {
        let status = match stage.kind() {
            StageKind::Fatal => StageStatus::FailedFatal,
            StageKind::Soft => StageStatus::FailedSoft,
        };
        Self::new(stage, status, Some(detail.into()))
    }

    /// Outcome of a fan-out stage: succeeded when every item did.
    pub fn from_items(stage: StageName, noun: &str, progress: ItemProgress) -> Self {
        let mut outcome = if progress.failed == 0 {
            Self::succeeded(stage)
        } else {
            Self::failed(
                stage,
                format!("{} of {} {noun} failed", progress.failed, progress.total),
            )
        };
        outcome.progress = Some(progress);
        outcome
    }
}

/// A single soft failure, surfaced to the user as "needs follow-up".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub stage: StageName,
    /// Index of the failed item within the stage, for fan-out stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<usize>,
    pub detail: String,
}
