//! Crate error type.
//!
//! Only construction-time and persistence paths return errors. Resolution
//! accessors never do: a misconfigured or missing control resolves to a benign
//! default instead.

use crate::capability::descriptor::DescriptorError;

/// Errors surfaced by configuration, persistence, and backend setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("{backend} backend: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("output write failed: {0}")]
    Transport(String),

    #[cfg(feature = "hid")]
    #[error("hidapi: {0}")]
    Hid(#[from] hidapi::HidError),

    #[cfg(feature = "midi")]
    #[error("MIDI: {0}")]
    Midi(String),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
