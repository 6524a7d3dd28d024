//! Livebridge Server - WebSocket ingestion endpoints
//!
//! Accepts the recording agent's video and audio streams over
//! long-lived WebSocket connections, feeds them into the core
//! pipeline, and owns the process lifecycle around the chunk
//! scheduler.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, router, run_server};
