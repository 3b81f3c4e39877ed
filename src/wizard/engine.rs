//! Wizard: step navigation over the shared draft.

use std::sync::Arc;

use tracing::debug;

use super::step::{Mode, WizardStep};
use crate::draft::DraftStore;
use crate::error::WizardError;

/// Drives `current_step` through the active mode's sequence.
///
/// Never suspends; every transition is persisted by the draft store.
#[derive(Clone)]
pub struct Wizard {
    draft: Arc<DraftStore>,
}

impl Wizard {
    pub fn new(draft: Arc<DraftStore>) -> Self {
        Self { draft }
    }

    pub fn draft(&self) -> &Arc<DraftStore> {
        &self.draft
    }

    pub fn mode(&self) -> Mode {
        self.draft.mode()
    }

    pub fn current_step(&self) -> WizardStep {
        self.draft.current_step()
    }

    /// Switch flows. The current step is kept if the new flow has it,
    /// otherwise navigation restarts at the new flow's first step.
    pub fn set_mode(&self, target: Mode) -> WizardStep {
        self.draft.navigate(|mode, step| {
            if !target.contains(*step) {
                debug!(from = %step, mode = %target, "Step not in new mode, restarting flow");
                *step = target.first_step();
            }
            *mode = target;
            *step
        })
    }

    /// Move forward one step. No-op on the last step.
    pub fn next(&self) -> WizardStep {
        self.shift(1)
    }

    /// Move back one step. No-op on the first step.
    pub fn prev(&self) -> WizardStep {
        self.shift(-1)
    }

    fn shift(&self, delta: isize) -> WizardStep {
        self.draft.navigate(|mode, step| {
            let steps = mode.steps();
            let index = mode.position(*step).unwrap_or(0);
            if let Some(target) = index
                .checked_add_signed(delta)
                .and_then(|i| steps.get(i))
            {
                *step = *target;
            }
            *step
        })
    }

    /// Jump directly to a step of the current mode.
    pub fn jump_to(&self, target: WizardStep) -> Result<WizardStep, WizardError> {
        self.draft.navigate(|mode, step| {
            if !mode.contains(target) {
                return Err(WizardError::StepNotInMode {
                    step: target.to_string(),
                    mode: mode.to_string(),
                });
            }
            *step = target;
            Ok(target)
        })
    }

    /// `(index + 1) / len`. For progress bars only.
    pub fn progress_fraction(&self) -> f32 {
        let draft = self.draft.snapshot();
        let steps = draft.mode.steps();
        let index = draft.mode.position(draft.current_step).unwrap_or(0);
        (index + 1) as f32 / steps.len() as f32
    }

    pub fn is_last_step(&self) -> bool {
        let draft = self.draft.snapshot();
        draft.current_step == draft.mode.last_step()
    }
}
