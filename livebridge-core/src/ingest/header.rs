//! Write-once cache of the video codec parameter-set header.

use std::sync::OnceLock;

use bytes::Bytes;

/// The first non-empty video payload, cached once and prepended to
/// every chunk's elementary video input so chunks after the first
/// remain decodable on their own.
#[derive(Default)]
pub struct StreamHeader {
    bytes: OnceLock<Bytes>,
}

impl StreamHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the header if it has not been set yet.
    ///
    /// Empty payloads are ignored. Returns true only on the call that
    /// actually set the header; later calls never overwrite it.
    pub fn record(&self, payload: &Bytes) -> bool {
        if payload.is_empty() {
            return false;
        }
        self.bytes.set(payload.clone()).is_ok()
    }

    pub fn get(&self) -> Option<Bytes> {
        self.bytes.get().cloned()
    }

    pub fn is_set(&self) -> bool {
        self.bytes.get().is_some()
    }
}
