//! Shared types for gmusic-clipd: configuration, platform paths, the track
//! model and the remote music service client.

pub mod config;
pub mod google;
pub mod platform;
pub mod service;
pub mod track;
