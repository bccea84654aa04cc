//! deckhand: a deployment-orchestration client for session/CSRF-protected
//! PaaS dashboards.
//!
//! The pipeline is authenticate → locate → submit → watch: establish a
//! cookie/CSRF session, discover the per-instance identifiers the target
//! operation needs, push the creation request through an ordered list of
//! transport strategies, and poll the deployment to a terminal state.
//! Everything backend-specific (endpoint paths, acceptance signals, status
//! vocabulary) is configuration, because dashboard internals drift across
//! versions and are nobody's contract.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod locate;
pub mod monitor;
pub mod progress;
pub mod session;
pub mod submit;
pub mod ui;
