//! Per-track state events and the session ledger built from them.
//!
//! The poller and the worker report every state transition on an unbounded
//! channel; the ledger folds them into the latest state per track.

use gmusic_proto::track::TrackId;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle of one track identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackState {
    /// Accepted by the poller, waiting for the worker.
    Queued,
    Resolving,
    Downloading,
    Tagging,
    /// Downloaded and tagged.
    Done(PathBuf),
    /// Given up before a file was delivered.
    Abandoned(String),
    /// Downloaded, but the tags could not be written.
    TaggingFailed(PathBuf, String),
}

impl TrackState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done(_) | Self::Abandoned(_) | Self::TaggingFailed(..)
        )
    }
}

/// A state transition for one track.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub track: TrackId,
    pub state: TrackState,
}

pub type ProgressSender = mpsc::UnboundedSender<DownloadProgress>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<DownloadProgress>;

/// Send a transition if anyone is listening.
pub(crate) fn report(events: Option<&ProgressSender>, track: &TrackId, state: TrackState) {
    if let Some(tx) = events {
        // A closed receiver only means nobody keeps a ledger
        let _ = tx.send(DownloadProgress {
            track: track.clone(),
            state,
        });
    }
}

/// Counts per outcome for the current process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub done: usize,
    pub untagged: usize,
    pub abandoned: usize,
    pub in_flight: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} untagged, {} abandoned, {} pending",
            self.done, self.untagged, self.abandoned, self.in_flight
        )
    }
}

/// Latest known state of every track seen this session.
#[derive(Debug, Default)]
pub struct DownloadLedger {
    statuses: HashMap<TrackId, TrackState>,
}

impl DownloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, progress: DownloadProgress) {
        self.statuses.insert(progress.track, progress.state);
    }

    pub fn get_status(&self, track: &TrackId) -> Option<&TrackState> {
        self.statuses.get(track)
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary::default();
        for state in self.statuses.values() {
            match state {
                TrackState::Done(_) => summary.done += 1,
                TrackState::TaggingFailed(..) => summary.untagged += 1,
                TrackState::Abandoned(_) => summary.abandoned += 1,
                _ => summary.in_flight += 1,
            }
        }
        summary
    }

    /// Fold events into a shared ledger until every sender is dropped.
    pub fn spawn(mut rx: ProgressReceiver) -> (Arc<RwLock<Self>>, JoinHandle<()>) {
        let ledger = Arc::new(RwLock::new(Self::new()));
        let shared = Arc::clone(&ledger);
        let handle = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                if progress.state.is_terminal() {
                    debug!(track = %progress.track, state = ?progress.state, "Track finished");
                }
                shared.write().await.apply(progress);
            }
        });
        (ledger, handle)
    }
}
