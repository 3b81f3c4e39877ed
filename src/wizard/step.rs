//! Wizard modes and their fixed step sequences.

use serde::{Deserialize, Serialize};

/// Which onboarding flow the user chose.
///
/// `Full` walks every concern; `Fast` covers the minimum needed to get a
/// listing online and leaves the rest for later editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Fast,
    #[default]
    Full,
}

/// A single screen of the onboarding wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Category,
    Address,
    Details,
    Energy,
    Rooms,
    Photos,
    Tags,
    Publication,
    Review,
}

const FULL_STEPS: &[WizardStep] = &[
    WizardStep::Category,
    WizardStep::Address,
    WizardStep::Details,
    WizardStep::Energy,
    WizardStep::Rooms,
    WizardStep::Photos,
    WizardStep::Tags,
    WizardStep::Publication,
    WizardStep::Review,
];

const FAST_STEPS: &[WizardStep] = &[
    WizardStep::Category,
    WizardStep::Address,
    WizardStep::Photos,
    WizardStep::Review,
];

impl Mode {
    /// The ordered step sequence for this mode.
    pub fn steps(self) -> &'static [WizardStep] {
        match self {
            Self::Fast => FAST_STEPS,
            Self::Full => FULL_STEPS,
        }
    }

    pub fn first_step(self) -> WizardStep {
        self.steps()[0]
    }

    pub fn last_step(self) -> WizardStep {
        self.steps()[self.steps().len() - 1]
    }

    /// Position of `step` in this mode's sequence, if it belongs to it.
    pub fn position(self, step: WizardStep) -> Option<usize> {
        self.steps().iter().position(|s| *s == step)
    }

    pub fn contains(self, step: WizardStep) -> bool {
        self.position(step).is_some()
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Category => "category",
            Self::Address => "address",
            Self::Details => "details",
            Self::Energy => "energy",
            Self::Rooms => "rooms",
            Self::Photos => "photos",
            Self::Tags => "tags",
            Self::Publication => "publication",
            Self::Review => "review",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn sequences_have_no_duplicates() {
        for mode in [Mode::Fast, Mode::Full] {
            let unique: HashSet<_> = mode.steps().iter().collect();
            assert_eq!(unique.len(), mode.steps().len(), "{mode} repeats a step");
        }
    }

    #[test]
    fn fast_is_ordered_subsequence_of_full() {
        let mut last = None;
        for step in Mode::Fast.steps() {
            let pos = Mode::Full.position(*step).expect("fast step missing from full");
            if let Some(prev) = last {
                assert!(pos > prev, "{step} is out of order");
            }
            last = Some(pos);
        }
        assert!(Mode::Fast.steps().len() < Mode::Full.steps().len());
    }

    #[test]
    fn both_modes_start_and_end_alike() {
        assert_eq!(Mode::Fast.first_step(), WizardStep::Category);
        assert_eq!(Mode::Full.first_step(), WizardStep::Category);
        assert_eq!(Mode::Fast.last_step(), WizardStep::Review);
        assert_eq!(Mode::Full.last_step(), WizardStep::Review);
    }

    #[test]
    fn display_matches_serde() {
        for step in Mode::Full.steps() {
            let json = serde_json::to_string(step).unwrap();
            assert_eq!(format!("\"{step}\""), json);
        }
        assert_eq!(serde_json::to_string(&Mode::Fast).unwrap(), "\"fast\"");
    }

    #[test]
    fn default_mode_is_full() {
        assert_eq!(Mode::default(), Mode::Full);
        assert!(!Mode::Fast.contains(WizardStep::Rooms));
        assert!(Mode::Full.contains(WizardStep::Rooms));
    }
}
