//! Streamed HTTP download into the output directory.

use futures_util::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::error::DownloadError;

const WRITE_BUFFER_BYTES: usize = 64 * 1024;

/// Sibling file the body is streamed into before it is renamed into place.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream `url` into `dest` without holding the body in memory.
///
/// The body goes to `dest.part` first and is renamed once complete; on any
/// failure the partial file is removed, so `dest` only ever appears whole.
/// Returns the number of bytes written.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    info!(path = %dest.display(), "Downloading song");

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status(status));
    }

    let part = partial_path(dest);
    let file = File::create(&part)
        .await
        .map_err(|source| DownloadError::Create {
            path: part.clone(),
            source,
        })?;

    match stream_body(response, file, &part).await {
        Ok(bytes) => {
            if let Err(source) = tokio::fs::rename(&part, dest).await {
                discard_partial(&part).await;
                return Err(DownloadError::Rename {
                    path: dest.to_path_buf(),
                    source,
                });
            }
            info!(path = %dest.display(), bytes, "Download complete");
            Ok(bytes)
        }
        Err(e) => {
            discard_partial(&part).await;
            Err(e)
        }
    }
}

async fn stream_body(
    response: reqwest::Response,
    file: File,
    part: &Path,
) -> Result<u64, DownloadError> {
    let write_err = |source| DownloadError::Write {
        path: part.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut total: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await.map_err(write_err)?;
        total += chunk.len() as u64;
    }
    writer.flush().await.map_err(write_err)?;
    writer.into_inner().sync_all().await.map_err(write_err)?;

    debug!(path = %part.display(), bytes = total, "Stream finished");
    Ok(total)
}

async fn discard_partial(part: &Path) {
    if let Err(e) = tokio::fs::remove_file(part).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %part.display(), error = %e, "Couldn't remove partial download");
        }
    }
}
