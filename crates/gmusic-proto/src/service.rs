//! Remote music service contract.
//!
//! The download worker only talks to the service through this trait, so the
//! Google Music client can be swapped for an in-memory fake in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::track::{TrackId, TrackInfo};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("not logged in")]
    NotAuthenticated,
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },
    #[error("track {0} not found")]
    NotFound(TrackId),
    #[error("stream signing failed: {0}")]
    Signing(String),
}

#[async_trait]
pub trait MusicService: Send + Sync {
    /// Authenticate; every other call requires a successful login first.
    async fn login(&mut self, email: &str, password: &str) -> Result<(), ServiceError>;

    async fn track_info(&self, id: &TrackId) -> Result<TrackInfo, ServiceError>;

    /// Resolve a short-lived signed URL for the MP3 stream of `nid`.
    async fn mp3_stream_url(&self, nid: &str, device_id: &str) -> Result<String, ServiceError>;
}
