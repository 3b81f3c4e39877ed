//! Finalization: converts the completed draft into a remote property in
//! six ordered stages, reporting per-stage outcomes and live progress.

pub mod guard;
pub mod orchestrator;
pub mod report;
pub mod stage;
pub mod ws;

pub use guard::{FlightPermit, SingleFlight};
pub use orchestrator::Finalizer;
pub use report::{FinalizeEvent, FinalizeOutcome, FinalizeReport};
pub use stage::{ItemProgress, StageKind, StageName, StageOutcome, StageStatus, Warning};
pub use ws::{FinalizeRouteState, finalize_routes};
