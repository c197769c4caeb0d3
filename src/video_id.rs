//! Video identifier extraction from user-supplied URLs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CaptionError, Result};

static VIDEO_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("valid video id regex"));

/// An 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the video identifier from a watch, short, or embed URL.
///
/// Takes the first run of 11 identifier characters that directly follows a
/// `v=` marker or a `/`. Anything else is a user input error.
pub fn resolve(url: &str) -> Result<VideoId> {
    VIDEO_ID_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
        .ok_or_else(|| {
            CaptionError::input(format!(
                "no video identifier in '{url}'. Please check the URL and try again."
            ))
        })
}
