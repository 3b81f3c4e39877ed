//! Finalizer: drains a completed draft into the remote property service.
//!
//! Stages run strictly in order, each one fully joined before the next:
//! 1. create the property (fatal)
//! 2. apply full attributes (fatal)
//! 3. write rooms in parallel (soft)
//! 4. upload photos through the `UploadBatcher` (soft)
//! 5. write tags (soft)
//! 6. apply publication choices (soft)
//!
//! A fatal failure stops the pipeline and leaves the draft fields untouched
//! for a retry. Soft failures become warnings; the property still counts as
//! created and the draft is reset. Nothing is ever rolled back remotely.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::guard::SingleFlight;
use super::report::{FinalizeEvent, FinalizeOutcome, FinalizeReport};
use super::stage::{ItemProgress, StageName, StageOutcome, StageStatus, Warning};
use crate::api::{PrimaryPatch, ResourceApi, UploadTag, UploadTarget};
use crate::config::FinalizeConfig;
use crate::draft::{
    DraftFields, DraftStore, PendingAttachment, RemoteIds, RoomDraft, UploadState,
    is_supported_mime,
};
use crate::error::{ApiError, FinalizeError};
use crate::upload::{UnitProgress, UnitResult, UnitStatus, UploadBatcher};

/// Runs finalization attempts, one at a time.
pub struct Finalizer {
    api: Arc<dyn ResourceApi>,
    draft: Arc<DraftStore>,
    config: FinalizeConfig,
    guard: SingleFlight,
    events: broadcast::Sender<FinalizeEvent>,
}

impl Finalizer {
    pub fn new(api: Arc<dyn ResourceApi>, draft: Arc<DraftStore>, config: FinalizeConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.event_capacity.max(1));
        Self {
            api,
            draft,
            config,
            guard: SingleFlight::new(),
            events,
        }
    }

    /// Subscribe to progress events of upcoming attempts.
    pub fn subscribe(&self) -> broadcast::Receiver<FinalizeEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Run the full pipeline once.
    ///
    /// Returns `Err(AlreadyRunning)` without touching anything if another
    /// attempt holds the guard. Every other ending, fatal included, is an
    /// `Ok` report.
    pub async fn finalize(&self) -> Result<FinalizeReport, FinalizeError> {
        let Some(_permit) = self.guard.try_acquire() else {
            warn!("Finalization requested while an attempt is already running");
            return Err(FinalizeError::AlreadyRunning);
        };

        let fields = self.draft.snapshot().fields;
        let mut attempt = Attempt::start(&self.events);
        info!(
            attempt_id = %attempt.id(),
            category = ?fields.category,
            rooms = fields.rooms.len(),
            photos = fields.attachments.len(),
            tags = fields.tags.len(),
            "Finalization started"
        );

        let Some(ids) = self.create_primary(&fields, &mut attempt).await else {
            return Ok(attempt.finish(None, None));
        };
        let primary_id = ids.primary_id.clone();
        self.draft.set_remote_ids(ids);

        if !self
            .update_attributes(&primary_id, &fields, &mut attempt)
            .await
        {
            // The remote record exists but is not fully usable. It is not
            // deleted; the next attempt creates a fresh one.
            self.draft.clear_remote_ids();
            warn!(
                attempt_id = %attempt.id(),
                primary_id = %primary_id,
                "Property left orphaned after attribute update failure"
            );
            return Ok(attempt.finish(None, Some(primary_id)));
        }

        self.write_rooms(&primary_id, &fields.rooms, &mut attempt)
            .await;
        self.upload_photos(&primary_id, &fields.attachments, &mut attempt)
            .await;
        self.write_tags(&primary_id, &fields.tags, &mut attempt)
            .await;
        self.apply_publication(&primary_id, &fields, &mut attempt)
            .await;

        let report = attempt.finish(Some(primary_id), None);
        self.draft.reset();
        Ok(report)
    }

    // ── Stage 1 ─────────────────────────────────────────────────────

    async fn create_primary(
        &self,
        fields: &DraftFields,
        attempt: &mut Attempt<'_>,
    ) -> Option<RemoteIds> {
        let stage = StageName::CreatePrimary;
        attempt.begin(stage);

        let (Some(category), Some(address)) = (fields.category, fields.address.as_ref()) else {
            attempt.record(StageOutcome::failed(
                stage,
                "category and address are required",
            ));
            return None;
        };

        match self.api.create_primary(category, address).await {
            Ok(ids) => {
                let raw_id = ids.primary_id.clone().unwrap_or_default();
                match ids.into_remote_ids() {
                    Some(remote) => {
                        info!(primary_id = %remote.primary_id, "Property created");
                        attempt.record(StageOutcome::succeeded(stage));
                        Some(remote)
                    }
                    None => {
                        let e = ApiError::InvalidPrimaryId { id: raw_id };
                        attempt.record(StageOutcome::failed(stage, e.to_string()));
                        None
                    }
                }
            }
            Err(e) => {
                attempt.record(StageOutcome::failed(stage, e.to_string()));
                None
            }
        }
    }

    // ── Stage 2 ─────────────────────────────────────────────────────

    async fn update_attributes(
        &self,
        primary_id: &str,
        fields: &DraftFields,
        attempt: &mut Attempt<'_>,
    ) -> bool {
        let stage = StageName::UpdateAttributes;
        attempt.begin(stage);

        let patch = PrimaryPatch::attributes(fields);
        match self.api.update_primary(primary_id, &patch).await {
            Ok(()) => {
                attempt.record(StageOutcome::succeeded(stage));
                true
            }
            Err(e) => {
                attempt.record(StageOutcome::failed(stage, e.to_string()));
                false
            }
        }
    }

    // ── Stage 3 ─────────────────────────────────────────────────────

    async fn write_rooms(&self, primary_id: &str, rooms: &[RoomDraft], attempt: &mut Attempt<'_>) {
        let stage = StageName::WriteRooms;
        if rooms.is_empty() {
            attempt.record(StageOutcome::skipped(stage, "no rooms to write"));
            return;
        }
        attempt.begin(stage);

        let total = rooms.len();
        let api = &*self.api;
        let emitter = attempt.emitter();
        let results = join_all(rooms.iter().enumerate().map(|(index, room)| async move {
            let result = api.create_sub_item(primary_id, room).await;
            let status = if result.is_ok() {
                UnitStatus::Succeeded
            } else {
                UnitStatus::Failed
            };
            emitter.item(stage, index, total, status);
            result
        }))
        .await;

        let mut progress = ItemProgress {
            total,
            ..Default::default()
        };
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(room_id) => {
                    progress.succeeded += 1;
                    debug!(room_id = %room_id, index, "Room written");
                }
                Err(e) => {
                    progress.failed += 1;
                    attempt.warn(stage, Some(index), format!("room {:?}: {e}", rooms[index].name));
                }
            }
        }
        attempt.record(StageOutcome::from_items(stage, "rooms", progress));
    }

    // ── Stage 4 ─────────────────────────────────────────────────────

    async fn upload_photos(
        &self,
        primary_id: &str,
        attachments: &[PendingAttachment],
        attempt: &mut Attempt<'_>,
    ) {
        let stage = StageName::UploadPhotos;
        if attachments.is_empty() {
            attempt.record(StageOutcome::skipped(stage, "no photos to upload"));
            return;
        }
        attempt.begin(stage);

        // Cover photo first; the sort is stable so the rest keep their order.
        // Indices reported in events and warnings stay draft positions.
        let mut ordered: Vec<(usize, &PendingAttachment)> = attachments.iter().enumerate().collect();
        ordered.sort_by_key(|(_, a)| !a.primary);

        let total = ordered.len();
        let emitter = attempt.emitter();
        let mut progress = ItemProgress {
            total,
            ..Default::default()
        };

        // Phase 1: one upload target per photo. A failure drops only that photo.
        let mut transfers = Vec::with_capacity(total);
        for &(index, attachment) in &ordered {
            let Some(bytes) = attachment.bytes() else {
                progress.succeeded += 1;
                continue;
            };

            let target = if is_supported_mime(&attachment.mime_type) {
                let tag = if attachment.primary {
                    UploadTag::Cover
                } else {
                    UploadTag::Gallery
                };
                self.api
                    .request_upload_target(
                        primary_id,
                        &attachment.file_name,
                        &attachment.mime_type,
                        tag,
                    )
                    .await
            } else {
                Err(ApiError::UnsupportedMediaType {
                    mime_type: attachment.mime_type.clone(),
                })
            };

            match target {
                Ok(target) => transfers.push(Transfer {
                    index,
                    id: attachment.id,
                    target,
                    bytes: Arc::clone(bytes),
                    mime_type: attachment.mime_type.clone(),
                }),
                Err(e) => {
                    progress.failed += 1;
                    self.draft
                        .set_attachment_state(attachment.id, UploadState::Failed);
                    emitter.item(stage, index, total, UnitStatus::Failed);
                    attempt.warn(stage, Some(index), format!("{}: {e}", attachment.file_name));
                }
            }
        }

        // Phase 2: byte transfers, bounded.
        let slots: Vec<(usize, Uuid)> = transfers.iter().map(|t| (t.index, t.id)).collect();
        let batcher = UploadBatcher::new(self.config.upload_concurrency);
        let tally = batcher.tally();
        let api = &*self.api;
        let draft = &*self.draft;

        let results = batcher
            .run(
                transfers,
                |transfer: Transfer| async move {
                    draft.set_attachment_state(transfer.id, UploadState::InFlight);
                    api.transfer_bytes(&transfer.target, &transfer.bytes, &transfer.mime_type)
                        .await?;
                    Ok::<_, ApiError>(transfer.target.reference().to_string())
                },
                |p: UnitProgress| emitter.item(stage, slots[p.index].0, total, p.status),
            )
            .await;

        for (&(index, id), result) in slots.iter().zip(results) {
            match result {
                UnitResult::Succeeded(remote_ref) => {
                    self.draft.confirm_attachment(id, &remote_ref);
                }
                UnitResult::Failed(detail) => {
                    self.draft.set_attachment_state(id, UploadState::Failed);
                    attempt.warn(
                        stage,
                        Some(index),
                        format!("{}: {detail}", attachments[index].file_name),
                    );
                }
            }
        }

        progress.succeeded += tally.succeeded();
        progress.failed += tally.failed();
        attempt.record(StageOutcome::from_items(stage, "photos", progress));
    }

    // ── Stage 5 ─────────────────────────────────────────────────────

    async fn write_tags(&self, primary_id: &str, tags: &[String], attempt: &mut Attempt<'_>) {
        let stage = StageName::WriteTags;
        if tags.is_empty() {
            attempt.record(StageOutcome::skipped(stage, "no tags selected"));
            return;
        }
        attempt.begin(stage);

        match self.api.bulk_write_tags(primary_id, tags).await {
            Ok(()) => attempt.record(StageOutcome::succeeded(stage)),
            Err(e) => {
                attempt.warn(stage, None, e.to_string());
                attempt.record(StageOutcome::failed(stage, e.to_string()));
            }
        }
    }

    // ── Stage 6 ─────────────────────────────────────────────────────

    async fn apply_publication(
        &self,
        primary_id: &str,
        fields: &DraftFields,
        attempt: &mut Attempt<'_>,
    ) {
        let stage = StageName::ApplyPublication;
        let patch = PrimaryPatch::publication(&fields.publication);
        if patch.is_empty() {
            attempt.record(StageOutcome::skipped(stage, "publication options untouched"));
            return;
        }
        attempt.begin(stage);

        match self.api.update_primary(primary_id, &patch).await {
            Ok(()) => attempt.record(StageOutcome::succeeded(stage)),
            Err(e) => {
                attempt.warn(stage, None, e.to_string());
                attempt.record(StageOutcome::failed(stage, e.to_string()));
            }
        }
    }
}

/// One photo ready for its byte transfer.
struct Transfer {
    /// Position in the draft's attachment list.
    index: usize,
    id: Uuid,
    target: UploadTarget,
    bytes: Arc<Vec<u8>>,
    mime_type: String,
}

/// Broadcasts events tagged with the attempt id. Send errors only mean
/// nobody is listening.
#[derive(Clone, Copy)]
struct Emitter<'a> {
    attempt_id: Uuid,
    tx: &'a broadcast::Sender<FinalizeEvent>,
}

impl Emitter<'_> {
    fn send(&self, event: FinalizeEvent) {
        let _ = self.tx.send(event);
    }

    fn item(&self, stage: StageName, index: usize, total: usize, status: UnitStatus) {
        self.send(FinalizeEvent::ItemProgress {
            attempt_id: self.attempt_id,
            stage,
            index,
            total,
            status,
        });
    }
}

/// Accumulates the audit trail of one attempt.
struct Attempt<'a> {
    emitter: Emitter<'a>,
    started_at: DateTime<Utc>,
    stages: Vec<StageOutcome>,
    warnings: Vec<Warning>,
}

impl<'a> Attempt<'a> {
    fn start(tx: &'a broadcast::Sender<FinalizeEvent>) -> Self {
        let emitter = Emitter {
            attempt_id: Uuid::new_v4(),
            tx,
        };
        emitter.send(FinalizeEvent::Started {
            attempt_id: emitter.attempt_id,
        });
        Self {
            emitter,
            started_at: Utc::now(),
            stages: Vec::with_capacity(StageName::ALL.len()),
            warnings: Vec::new(),
        }
    }

    fn id(&self) -> Uuid {
        self.emitter.attempt_id
    }

    fn emitter(&self) -> Emitter<'a> {
        self.emitter
    }

    fn begin(&self, stage: StageName) {
        debug!(attempt_id = %self.id(), stage = %stage, "Stage started");
        self.emitter.send(FinalizeEvent::StageStarted {
            attempt_id: self.id(),
            stage,
        });
    }

    fn warn(&mut self, stage: StageName, item: Option<usize>, detail: String) {
        warn!(attempt_id = %self.id(), stage = %stage, item = ?item, "{detail}");
        self.warnings.push(Warning {
            stage,
            item,
            detail,
        });
    }

    fn record(&mut self, outcome: StageOutcome) {
        match outcome.status {
            StageStatus::FailedFatal => error!(
                attempt_id = %self.id(),
                stage = %outcome.stage,
                detail = ?outcome.detail,
                "Fatal stage failed"
            ),
            StageStatus::FailedSoft => warn!(
                attempt_id = %self.id(),
                stage = %outcome.stage,
                detail = ?outcome.detail,
                "Optional stage failed"
            ),
            StageStatus::Succeeded | StageStatus::Skipped => debug!(
                attempt_id = %self.id(),
                stage = %outcome.stage,
                status = ?outcome.status,
                "Stage finished"
            ),
        }
        self.emitter.send(FinalizeEvent::StageFinished {
            attempt_id: self.id(),
            outcome: outcome.clone(),
        });
        self.stages.push(outcome);
    }

    /// Close the attempt. Stages that never ran are recorded as skipped,
    /// so the trail always has one entry per stage.
    fn finish(mut self, primary_id: Option<String>, orphaned_primary_id: Option<String>) -> FinalizeReport {
        for stage in StageName::ALL {
            if !self.stages.iter().any(|s| s.stage == stage) {
                self.stages
                    .push(StageOutcome::skipped(stage, "not run after a fatal failure"));
            }
        }

        let outcome = if self
            .stages
            .iter()
            .any(|s| s.status == StageStatus::FailedFatal)
        {
            FinalizeOutcome::FailedFatal
        } else if self.warnings.is_empty() {
            FinalizeOutcome::Completed
        } else {
            FinalizeOutcome::CompletedWithWarnings
        };

        let message = outcome.user_message().to_string();
        match outcome {
            FinalizeOutcome::FailedFatal => error!(attempt_id = %self.id(), "Finalization failed"),
            _ => info!(
                attempt_id = %self.id(),
                outcome = %outcome,
                warnings = self.warnings.len(),
                "Finalization finished"
            ),
        }
        self.emitter.send(FinalizeEvent::Finished {
            attempt_id: self.id(),
            outcome,
            warnings: self.warnings.len(),
            message: message.clone(),
        });

        FinalizeReport {
            attempt_id: self.id(),
            outcome,
            stages: self.stages,
            warnings: self.warnings,
            primary_id,
            orphaned_primary_id,
            message,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
