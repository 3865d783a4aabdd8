//! Clipboard access.

use tracing::debug;

use crate::error::ClipboardReadError;

/// Source of clipboard text, sampled by the poller.
pub trait ClipboardSource {
    /// Current clipboard text. Empty or non-text content yields an empty
    /// string; only an unusable clipboard is an error.
    fn read_text(&mut self) -> Result<String, ClipboardReadError>;
}

/// The OS clipboard through arboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardReadError> {
        let inner = arboard::Clipboard::new().map_err(|e| ClipboardReadError(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardReadError> {
        self.inner.get_text().or_else(classify)
    }
}

/// Sort a failed read into "nothing usable this cycle" and a broken clipboard.
///
/// Images, text that is not UTF-8 and a selection briefly locked by another
/// application all read as empty content; the next poll tries again.
pub(crate) fn classify(error: arboard::Error) -> Result<String, ClipboardReadError> {
    match error {
        arboard::Error::ContentNotAvailable | arboard::Error::ConversionFailure => Ok(String::new()),
        arboard::Error::ClipboardOccupied => {
            debug!("Clipboard occupied, retrying next poll");
            Ok(String::new())
        }
        e => Err(ClipboardReadError(e.to_string())),
    }
}
