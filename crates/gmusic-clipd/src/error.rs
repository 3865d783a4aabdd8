//! Error taxonomy for the pipeline.
//!
//! `FatalError` ends the program. Everything else is scoped to a single
//! track and only ever ends up in a `TrackOutcome`.

use gmusic_proto::service::ServiceError;
use std::path::PathBuf;
use thiserror::Error;

/// The OS clipboard could not be read at all.
#[derive(Debug, Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardReadError(pub String);

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("error authenticating: {0}")]
    Auth(#[source] ServiceError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardReadError),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("stream URL resolution failed: {0}")]
    Resolution(#[source] ServiceError),
    #[error("couldn't download song: {0}")]
    Request(#[from] reqwest::Error),
    #[error("stream returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("couldn't create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't read or write mp3 {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't move finished download to {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("couldn't run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("lofty: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
    #[error("tagging task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a track was abandoned before a file was delivered.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("couldn't get track info: {0}")]
    Lookup(#[source] ServiceError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}
