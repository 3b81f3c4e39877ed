//! Onboarding wizard: fixed step graphs per mode and navigation over the
//! draft.

pub mod engine;
pub mod routes;
pub mod step;

pub use engine::Wizard;
pub use routes::{WizardRouteState, wizard_routes};
pub use step::{Mode, WizardStep};
