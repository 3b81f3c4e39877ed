//! Terminal report and live progress events of a finalization attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{StageName, StageOutcome, Warning};
use crate::upload::UnitStatus;

/// How a finalization attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// Property created and every optional stage applied.
    Completed,
    /// Property created; at least one optional stage needs follow-up.
    CompletedWithWarnings,
    /// Property not created (or not usable). Retry from the start.
    FailedFatal,
}

impl FinalizeOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::FailedFatal)
    }

    /// Message shown to the user when the attempt ends.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Completed => "Your property was created and fully configured.",
            Self::CompletedWithWarnings => {
                "Your property was created. Some optional details could not be saved and need a manual follow-up."
            }
            Self::FailedFatal => "Your property could not be created. Your draft is kept, please try again.",
        }
    }
}

impl std::fmt::Display for FinalizeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithWarnings => write!(f, "completed_with_warnings"),
            Self::FailedFatal => write!(f, "failed_fatal"),
        }
    }
}

/// Audit trail and result of one finalization attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub attempt_id: Uuid,
    pub outcome: FinalizeOutcome,
    /// Exactly one entry per stage, in stage order.
    pub stages: Vec<StageOutcome>,
    pub warnings: Vec<Warning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_id: Option<String>,
    /// Set when a fatal failure happened after the property was created:
    /// that remote record exists but this attempt abandoned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphaned_primary_id: Option<String>,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FinalizeReport {
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn stage(&self, name: StageName) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Live progress broadcast while finalization runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinalizeEvent {
    Started {
        attempt_id: Uuid,
    },
    StageStarted {
        attempt_id: Uuid,
        stage: StageName,
    },
    /// One item of a fan-out stage settled.
    ItemProgress {
        attempt_id: Uuid,
        stage: StageName,
        index: usize,
        total: usize,
        status: UnitStatus,
    },
    StageFinished {
        attempt_id: Uuid,
        outcome: StageOutcome,
    },
    Finished {
        attempt_id: Uuid,
        outcome: FinalizeOutcome,
        warnings: usize,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_all_three_endings() {
        let messages = [
            FinalizeOutcome::Completed.user_message(),
            FinalizeOutcome::CompletedWithWarnings.user_message(),
            FinalizeOutcome::FailedFatal.user_message(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert!(messages[2].contains("try again"));
        assert!(FinalizeOutcome::CompletedWithWarnings.is_success());
        assert!(!FinalizeOutcome::FailedFatal.is_success());
    }

    #[test]
    fn event_is_tagged() {
        let event = FinalizeEvent::ItemProgress {
            attempt_id: Uuid::nil(),
            stage: StageName::UploadPhotos,
            index: 2,
            total: 4,
            status: UnitStatus::Failed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_progress");
        assert_eq!(json["stage"], "upload_photos");
        assert_eq!(json["status"], "failed");
    }
}
