//! Property onboarding: wizard, local draft, and finalization pipeline.

pub mod api;
pub mod config;
pub mod draft;
pub mod error;
pub mod finalize;
pub mod upload;
pub mod wizard;
