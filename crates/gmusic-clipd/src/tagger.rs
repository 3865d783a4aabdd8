//! ID3 tagging of finished downloads.
//!
//! Two backends: the external `id3v2` tool (default) and lofty in-process.

use async_trait::async_trait;
use gmusic_proto::track::TrackTags;
use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::TaggingError;

#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, path: &Path, tags: &TrackTags) -> Result<(), TaggingError>;
}

#[async_trait]
impl Tagger for Box<dyn Tagger> {
    async fn tag(&self, path: &Path, tags: &TrackTags) -> Result<(), TaggingError> {
        (**self).tag(path, tags).await
    }
}

/// Command line for `id3v2`:
/// `<file> --album A --artist B --song S [--year Y] [--track NN]`.
pub fn id3v2_args(path: &Path, tags: &TrackTags) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        path.as_os_str().to_os_string(),
        "--album".into(),
        tags.album.clone().into(),
        "--artist".into(),
        tags.artist.clone().into(),
        "--song".into(),
        tags.title.clone().into(),
    ];
    if let Some(year) = tags.year() {
        args.push("--year".into());
        args.push(year.to_string().into());
    }
    if let Some(track) = tags.padded_track_number() {
        args.push("--track".into());
        args.push(track.into());
    }
    args
}

/// Runs the external `id3v2` tool.
pub struct Id3v2Tagger {
    program: PathBuf,
}

impl Id3v2Tagger {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Tagger for Id3v2Tagger {
    async fn tag(&self, path: &Path, tags: &TrackTags) -> Result<(), TaggingError> {
        info!(path = %path.display(), "Writing ID3 tags");
        let output = Command::new(&self.program)
            .args(id3v2_args(path, tags))
            .output()
            .await
            .map_err(|source| TaggingError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TaggingError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Writes an ID3v2 tag through lofty on a blocking task.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagger;

#[async_trait]
impl Tagger for LoftyTagger {
    async fn tag(&self, path: &Path, tags: &TrackTags) -> Result<(), TaggingError> {
        info!(path = %path.display(), "Writing ID3 tags");
        let path = path.to_path_buf();
        let tags = tags.clone();
        tokio::task::spawn_blocking(move || write_tags_blocking(&path, &tags)).await??;
        Ok(())
    }
}

fn write_tags_blocking(path: &Path, tags: &TrackTags) -> Result<(), TaggingError> {
    let tagged_file = Probe::open(path)?.read()?;

    let mut tag = tagged_file
        .primary_tag()
        .cloned()
        .unwrap_or_else(|| Tag::new(TagType::Id3v2));

    tag.insert_text(ItemKey::AlbumTitle, tags.album.clone());
    tag.insert_text(ItemKey::TrackArtist, tags.artist.clone());
    tag.insert_text(ItemKey::TrackTitle, tags.title.clone());
    if let Some(year) = tags.year() {
        tag.insert_text(ItemKey::RecordingDate, year.to_string());
    }
    if let Some(track) = tags.padded_track_number() {
        tag.insert_text(ItemKey::TrackNumber, track);
    }

    tag.save_to_path(path, WriteOptions::default())?;
    debug!(path = %path.display(), "Tag saved");
    Ok(())
}

/// Tags as read back from a file (for verification)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub track_number: Option<String>,
}

pub fn read_tags(path: &Path) -> Result<ReadTags, TaggingError> {
    let tagged_file = Probe::open(path)?.read()?;
    let Some(tag) = tagged_file.primary_tag() else {
        return Ok(ReadTags::default());
    };
    let get_text = |key: &ItemKey| tag.get_string(key).map(|s| s.to_string());

    Ok(ReadTags {
        title: get_text(&ItemKey::TrackTitle),
        artist: get_text(&ItemKey::TrackArtist),
        album: get_text(&ItemKey::AlbumTitle),
        year: get_text(&ItemKey::RecordingDate),
        track_number: get_text(&ItemKey::TrackNumber),
    })
}
