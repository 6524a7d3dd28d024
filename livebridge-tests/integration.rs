//! Integration tests for Livebridge
//!
//! These tests exercise the ingestion-to-publish pipeline as a whole:
//! frames in over the ingest surface, chunk files out of the publish
//! directory, with a scripted transcoder standing in for ffmpeg.

#[path = "integration/buffer_concurrency.rs"]
mod buffer_concurrency;

#[path = "integration/chunk_pipeline.rs"]
mod chunk_pipeline;

#[path = "integration/publish_atomicity.rs"]
mod publish_atomicity;

#[path = "integration/ws_ingest.rs"]
mod ws_ingest;
