//! Clipboard-driven Google Music downloader.
//!
//! A [`poller::Poller`] samples the clipboard for track share links and feeds
//! a bounded queue; a single [`worker::Worker`] drains it, downloading and
//! tagging one track at a time.

pub mod clipboard;
pub mod download;
pub mod error;
pub mod ledger;
pub mod poller;
pub mod tagger;
pub mod worker;
