//! Media location parsing.
//!
//! Turns the location strings handed over by the scripting side into a
//! [`MediaSource`]:
//!
//! - `http://`, `https://` and `rtsp://` URIs (scheme matched
//!   case-insensitively) become [`MediaSource::Stream`]
//! - a leading `file://` is stripped
//! - locations under the asset prefix become [`MediaSource::Asset`] with the
//!   prefix removed
//! - everything else is a local file; relative paths are joined onto the
//!   configured storage root

use crate::error::{PlaybackError, Result};
use bridge_traits::MediaSource;
use core_runtime::config::MediaConfig;
use std::path::{Path, PathBuf};

const STREAM_SCHEMES: &[&str] = &["http://", "https://", "rtsp://"];
const FILE_SCHEME: &str = "file://";

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// Whether `location` addresses a network stream.
pub fn is_stream_location(location: &str) -> bool {
    STREAM_SCHEMES
        .iter()
        .any(|scheme| strip_prefix_ignore_case(location, scheme).is_some())
}

#[derive(Debug, Clone)]
pub struct SourceResolver {
    asset_prefix: String,
    storage_root: Option<PathBuf>,
}

impl SourceResolver {
    pub fn new(asset_prefix: impl Into<String>, storage_root: Option<PathBuf>) -> Self {
        Self {
            asset_prefix: asset_prefix.into(),
            storage_root,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.asset_prefix.clone(), config.storage_root.clone())
    }

    /// Resolve a location string.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidSource`] for an empty location or a
    /// bare asset prefix.
    pub fn resolve(&self, location: &str) -> Result<MediaSource> {
        let location = location.trim();
        if location.is_empty() {
            return Err(PlaybackError::InvalidSource(
                "empty media location".to_string(),
            ));
        }

        if is_stream_location(location) {
            return Ok(MediaSource::Stream {
                url: location.to_string(),
            });
        }

        let path = strip_prefix_ignore_case(location, FILE_SCHEME).unwrap_or(location);

        if let Some(asset) = path.strip_prefix(self.asset_prefix.as_str()) {
            if asset.is_empty() {
                return Err(PlaybackError::InvalidSource(
                    "asset location names no file".to_string(),
                ));
            }
            return Ok(MediaSource::Asset {
                path: asset.to_string(),
            });
        }

        let path = Path::new(path);
        let path = match &self.storage_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };

        Ok(MediaSource::LocalFile { path })
    }
}
