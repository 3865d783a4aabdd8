//! Download worker: the single consumer of the download queue.
//!
//! Tracks are handled one at a time in queue order. A failure only ever
//! abandons the track it happened on; the loop always moves on to the next
//! identifier.

use gmusic_proto::service::MusicService;
use gmusic_proto::track::{TrackId, TrackInfo};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::download::download_to_file;
use crate::error::{DownloadError, TaggingError, TrackError};
use crate::ledger::{report, ProgressSender, TrackState};
use crate::tagger::Tagger;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub output_dir: PathBuf,
    /// Device id the stream URLs are requested for.
    pub device_id: String,
}

/// Terminal result of processing one identifier.
#[derive(Debug)]
pub enum TrackOutcome {
    Done(PathBuf),
    Abandoned(TrackError),
    /// The file was delivered but is missing its tags.
    TaggingFailed(PathBuf, TaggingError),
}

impl TrackOutcome {
    pub fn state(&self) -> TrackState {
        match self {
            Self::Done(path) => TrackState::Done(path.clone()),
            Self::Abandoned(e) => TrackState::Abandoned(e.to_string()),
            Self::TaggingFailed(path, e) => TrackState::TaggingFailed(path.clone(), e.to_string()),
        }
    }
}

pub struct Worker<S, T> {
    service: S,
    tagger: T,
    http: reqwest::Client,
    settings: WorkerSettings,
    events: Option<ProgressSender>,
}

impl<S: MusicService, T: Tagger> Worker<S, T> {
    pub fn new(service: S, tagger: T, http: reqwest::Client, settings: WorkerSettings) -> Self {
        Self {
            service,
            tagger,
            http,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Consume the queue until every sender is gone.
    pub async fn run(self, mut queue: mpsc::Receiver<TrackId>) {
        loop {
            debug!("Waiting for next track");
            let Some(track) = queue.recv().await else {
                break;
            };
            self.process(&track).await;
        }
        info!("Download queue closed, worker stopping");
    }

    /// Resolve, download and tag one track.
    pub async fn process(&self, track: &TrackId) -> TrackOutcome {
        let outcome = self.attempt(track).await;

        match &outcome {
            TrackOutcome::Done(path) => {
                info!(track = %track, path = %path.display(), "Track done");
            }
            TrackOutcome::Abandoned(e) => {
                error!(track = %track, error = %e, "Abandoning track");
            }
            TrackOutcome::TaggingFailed(path, e) => {
                warn!(track = %track, path = %path.display(), error = %e, "Downloaded without tags");
            }
        }
        report(self.events.as_ref(), track, outcome.state());
        outcome
    }

    async fn attempt(&self, track: &TrackId) -> TrackOutcome {
        report(self.events.as_ref(), track, TrackState::Resolving);
        info!(track = %track, "Getting track info");
        let info = match self.service.track_info(track).await {
            Ok(info) => info,
            Err(e) => return TrackOutcome::Abandoned(TrackError::Lookup(e)),
        };
        debug!(track = %track, ?info, "Got track info");

        report(self.events.as_ref(), track, TrackState::Downloading);
        let path = match self.download(&info).await {
            Ok(path) => path,
            Err(e) => return TrackOutcome::Abandoned(e.into()),
        };

        report(self.events.as_ref(), track, TrackState::Tagging);
        match self.tagger.tag(&path, &info.tags()).await {
            Ok(()) => TrackOutcome::Done(path),
            Err(e) => TrackOutcome::TaggingFailed(path, e),
        }
    }

    async fn download(&self, info: &TrackInfo) -> Result<PathBuf, DownloadError> {
        let dest = self.settings.output_dir.join(info.file_name());
        info!(path = %dest.display(), "Launching download");

        debug!(nid = %info.nid, "Getting stream link");
        let url = self
            .service
            .mp3_stream_url(&info.nid, &self.settings.device_id)
            .await
            .map_err(DownloadError::Resolution)?;

        download_to_file(&self.http, &url, &dest).await?;
        Ok(dest)
    }
}
