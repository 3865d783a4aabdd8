//! Clipboard poller: the single producer of the download queue.

use gmusic_proto::track::TrackId;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clipboard::ClipboardSource;
use crate::error::ClipboardReadError;
use crate::ledger::{report, ProgressSender, TrackState};

/// Share links look like `https://play.google.com/music/m/<id>[?t=...]`.
pub const TRACK_URL_PREFIX: &str = "https://play.google.com/music/m/";

/// Pull the track identifier out of clipboard text, if it is a share link.
pub fn extract_track_id(clip: &str) -> Option<TrackId> {
    let rest = clip.trim().strip_prefix(TRACK_URL_PREFIX)?;
    let id = rest.split(['?', '#']).next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(TrackId::new(id))
    }
}

/// What one clipboard sample led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not a share link.
    Ignored,
    /// Already pushed earlier in this session.
    Duplicate(TrackId),
    Enqueued(TrackId),
    /// The worker is gone.
    QueueClosed,
}

pub struct Poller<C> {
    clipboard: C,
    queue: mpsc::Sender<TrackId>,
    /// Every id pushed so far; only grows.
    seen: HashSet<TrackId>,
    interval: Duration,
    events: Option<ProgressSender>,
}

impl<C: ClipboardSource> Poller<C> {
    pub fn new(clipboard: C, queue: mpsc::Sender<TrackId>, interval: Duration) -> Self {
        Self {
            clipboard,
            queue,
            seen: HashSet::new(),
            interval,
            events: None,
        }
    }

    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Sample the clipboard once. Blocks while the queue is full.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, ClipboardReadError> {
        let clip = self.clipboard.read_text()?;

        let Some(track) = extract_track_id(&clip) else {
            return Ok(PollOutcome::Ignored);
        };
        if self.seen.contains(&track) {
            return Ok(PollOutcome::Duplicate(track));
        }
        self.seen.insert(track.clone());

        info!(track = %track, "Pushing track for download");
        report(self.events.as_ref(), &track, TrackState::Queued);
        if self.queue.send(track.clone()).await.is_err() {
            return Ok(PollOutcome::QueueClosed);
        }
        Ok(PollOutcome::Enqueued(track))
    }

    /// Poll forever. Returns an error when the clipboard becomes unusable and
    /// `Ok` only if the worker has gone away.
    pub async fn run(mut self) -> Result<(), ClipboardReadError> {
        info!(interval_ms = self.interval.as_millis() as u64, "Listening for clipboard");
        let mut delay = Duration::ZERO;
        loop {
            tokio::time::sleep(delay).await;
            delay = self.interval;

            if self.poll_once().await? == PollOutcome::QueueClosed {
                warn!("Download queue closed, stopping clipboard poller");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of clipboard contents, then fails.
    struct ScriptedClipboard(VecDeque<String>);

    impl ScriptedClipboard {
        fn new(items: &[&str]) -> Self {
            Self(items.iter().map(|s| s.to_string()).collect())
        }
    }

    impl ClipboardSource for ScriptedClipboard {
        fn read_text(&mut self) -> Result<String, ClipboardReadError> {
            self.0
                .pop_front()
                .ok_or_else(|| ClipboardReadError("no display".to_string()))
        }
    }

    fn url(id: &str) -> String {
        format!("{}{}", TRACK_URL_PREFIX, id)
    }

    #[test]
    fn test_extract_track_id() {
        assert_eq!(
            extract_track_id("https://play.google.com/music/m/Tabc123"),
            Some(TrackId::new("Tabc123"))
        );
        assert_eq!(
            extract_track_id("https://play.google.com/music/m/Tkgwyr?t=Song_-_Band"),
            Some(TrackId::new("Tkgwyr"))
        );
        assert_eq!(
            extract_track_id("  https://play.google.com/music/m/Tabc#frag\n"),
            Some(TrackId::new("Tabc"))
        );
    }

    #[test]
    fn test_extract_ignores_other_content() {
        for clip in [
            "",
            "hello world",
            "https://play.google.com/store/apps",
            "https://play.google.com/music/listen#/album/B123",
            "http://play.google.com/music/m/Tabc123",
            "see https://play.google.com/music/m/Tabc123",
            "https://play.google.com/music/m/",
            "https://play.google.com/music/m/?t=x",
        ] {
            assert_eq!(extract_track_id(clip), None, "clip {clip:?}");
        }
    }

    #[tokio::test]
    async fn test_non_matching_content_is_silently_ignored() {
        let (tx, mut rx) = mpsc::channel(4);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let clipboard = ScriptedClipboard::new(&["plain text", "https://example.com/m/T1", ""]);
        let mut poller = Poller::new(clipboard, tx, Duration::ZERO).with_events(events_tx);

        for _ in 0..3 {
            assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Ignored);
        }
        assert!(rx.try_recv().is_err());
        assert!(events_rx.try_recv().is_err());
        assert_eq!(poller.seen_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_is_enqueued_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let first = url("Tabc123");
        let with_query = url("Tabc123?t=Song");
        let clipboard = ScriptedClipboard::new(&[&first, &first, &with_query]);
        let mut poller = Poller::new(clipboard, tx, Duration::ZERO);

        assert_eq!(
            poller.poll_once().await.unwrap(),
            PollOutcome::Enqueued(TrackId::new("Tabc123"))
        );
        assert_eq!(
            poller.poll_once().await.unwrap(),
            PollOutcome::Duplicate(TrackId::new("Tabc123"))
        );
        assert_eq!(
            poller.poll_once().await.unwrap(),
            PollOutcome::Duplicate(TrackId::new("Tabc123"))
        );

        assert_eq!(rx.try_recv().unwrap(), TrackId::new("Tabc123"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queued_event_is_reported() {
        let (tx, _rx) = mpsc::channel(4);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let clipboard = ScriptedClipboard::new(&[&url("T1")]);
        let mut poller = Poller::new(clipboard, tx, Duration::ZERO).with_events(events_tx);

        poller.poll_once().await.unwrap();
        let event = events_rx.try_recv().unwrap();
        assert_eq!(event.track, TrackId::new("T1"));
        assert_eq!(event.state, TrackState::Queued);
    }

    #[tokio::test]
    async fn test_run_stops_on_clipboard_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let clipboard = ScriptedClipboard::new(&[&url("T1"), "noise", &url("T2")]);
        let poller = Poller::new(clipboard, tx, Duration::from_millis(1));

        let err = poller.run().await.unwrap_err();
        assert_eq!(err.0, "no display");
        assert_eq!(rx.recv().await, Some(TrackId::new("T1")));
        assert_eq!(rx.recv().await, Some(TrackId::new("T2")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_run_returns_when_queue_closed() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let clipboard = ScriptedClipboard::new(&[&url("T1")]);
        let poller = Poller::new(clipboard, tx, Duration::from_millis(1));

        assert!(poller.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_blocks_instead_of_dropping() {
        let (tx, mut rx) = mpsc::channel(1);
        let clipboard = ScriptedClipboard::new(&[&url("T1"), &url("T2"), &url("T3")]);
        let poller = Poller::new(clipboard, tx, Duration::from_millis(1));

        // Nobody consumes: the second push must park the poller rather than
        // fail or skip ahead to T3.
        let blocked = tokio::time::timeout(Duration::from_millis(200), poller.run()).await;
        assert!(blocked.is_err(), "poller should still be waiting on the queue");

        assert_eq!(rx.recv().await, Some(TrackId::new("T1")));
        assert_eq!(rx.recv().await, None);
    }
}
