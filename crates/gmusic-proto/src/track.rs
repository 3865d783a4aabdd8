//! Track identifiers and resolved track metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier taken from a shared track URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Metadata returned by a track lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    /// Service-internal id used to request the signed stream URL.
    pub nid: String,
}

impl TrackInfo {
    /// `"{Title} - {Artist} - {Album}.mp3"`, each part made filesystem safe.
    pub fn file_name(&self) -> String {
        format!(
            "{} - {} - {}.mp3",
            safe_filename(&self.title),
            safe_filename(&self.artist),
            safe_filename(&self.album)
        )
    }

    pub fn tags(&self) -> TrackTags {
        TrackTags {
            album: self.album.clone(),
            artist: self.artist.clone(),
            title: self.title.clone(),
            year: self.year,
            track_number: self.track_number,
        }
    }
}

/// Fields written into the ID3 tag of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub album: String,
    pub artist: String,
    pub title: String,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
}

impl TrackTags {
    /// Release year, if known.
    pub fn year(&self) -> Option<u32> {
        non_zero(self.year)
    }

    /// Track number as written to tags: two digits, zero padded.
    pub fn padded_track_number(&self) -> Option<String> {
        non_zero(self.track_number).map(|n| format!("{:02}", n))
    }
}

/// Make a name component safe for the filesystem
pub fn safe_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The service reports missing numeric fields as zero.
pub fn non_zero(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> TrackInfo {
        TrackInfo {
            title: "Song".to_string(),
            artist: "Band".to_string(),
            album: "Record".to_string(),
            year: Some(2020),
            track_number: Some(3),
            nid: "Tabc123".to_string(),
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(info().file_name(), "Song - Band - Record.mp3");
    }

    #[test]
    fn test_file_name_sanitizes_components() {
        let mut track = info();
        track.title = "AC/DC: Live?".to_string();
        track.album = "..".to_string();
        assert_eq!(track.file_name(), "AC-DC- Live- - Band - Unknown.mp3");
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("Show: Name / Edition"), "Show- Name - Edition");
        assert_eq!(safe_filename("Normal Name"), "Normal Name");
        assert_eq!(safe_filename("   "), "Unknown");
    }

    #[test]
    fn test_padded_track_number() {
        let tags = info().tags();
        assert_eq!(tags.padded_track_number().as_deref(), Some("03"));

        let mut tags = tags;
        tags.track_number = Some(12);
        assert_eq!(tags.padded_track_number().as_deref(), Some("12"));
        tags.track_number = None;
        assert_eq!(tags.padded_track_number(), None);
        tags.track_number = Some(0);
        assert_eq!(tags.padded_track_number(), None);
        tags.year = Some(0);
        assert_eq!(tags.year(), None);
    }

    #[test]
    fn test_non_zero() {
        assert_eq!(non_zero(Some(0)), None);
        assert_eq!(non_zero(None), None);
        assert_eq!(non_zero(Some(2020)), Some(2020));
    }
}
