//! Motorpool: vehicle activity log ingestion and reconciliation.
//!
//! Turns a game server's plain-text vehicle logs (init, use, theft,
//! deletion lines) into structured actors, vehicles and events, and
//! reconciles each time-bucketed source unit against persisted state so
//! the current world view stays correct across repeated sync runs.
//!
//! Entry point for scheduled jobs is [sync::run_sync]; the pieces
//! (parser, normalizer, reconciler, sweeps, reports) are usable on their
//! own.

pub mod config;
pub mod logparse;
pub mod model;
pub mod report;
pub mod store;
pub mod sync;
