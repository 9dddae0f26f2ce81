//! Shared types for emoguess: persisted models, per-viewer views, HTTP
//! payloads and the live-update notification codec.

pub mod api;
pub mod events;
pub mod ids;
pub mod models;
