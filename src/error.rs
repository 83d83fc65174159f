//! Errors surfaced to callers of the analysis pipeline.
//!
//! Only an undecodable image is fatal. Everything else that can go wrong on a
//! map (nothing detected, unreadable pressure, unlinked marker) is reported in
//! the output records instead.

use std::fmt;

/// Fatal failure for one map.
#[derive(Debug)]
pub enum SpotterError {
    /// Input bytes are not a supported image
    Decode {
        /// Name of the offending map
        map: String,
        /// Underlying decoder error
        source: image::ImageError,
    },
}

impl SpotterError {
    /// Name of the map this error belongs to.
    pub fn map(&self) -> &str {
        match self {
            Self::Decode { map, .. } => map,
        }
    }
}

impl fmt::Display for SpotterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { map, source } => {
                write!(f, "Failed to decode map '{map}': {source}")
            }
        }
    }
}

impl std::error::Error for SpotterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
        }
    }
}

/// Convenience type alias for pipeline results
pub type Result<T> = std::result::Result<T, SpotterError>;
