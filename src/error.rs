//! Error types for palette extraction and swatch rendering

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced to whoever drives the pipeline (CLI, wasm page, GUI shell).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The image is missing, unreadable, corrupt, or has nothing to sample.
    #[error("failed to decode image {}: {source}", origin(path))]
    Decode {
        /// Source file, `None` when decoding from an in-memory buffer.
        path: Option<PathBuf>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A caller-supplied value is out of range or malformed.
    #[error("invalid {parameter}: {reason}")]
    InvalidArgument {
        parameter: &'static str,
        reason: String,
    },

    /// Encoding or writing the swatch strip failed.
    #[error("failed to encode swatch strip: {source}")]
    Encode {
        #[source]
        source: image::ImageError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "<memory>".to_string(),
    }
}

impl Error {
    pub(crate) fn decode<E>(path: Option<PathBuf>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Decode {
            path,
            source: source.into(),
        }
    }

    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the input file rather than by arguments.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }

    /// True for bad counts or malformed hex strings.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }
}
