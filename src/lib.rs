//! thetvdb-client - Client for the legacy TheTVDB XML API
//!
//! The catalog serves loosely-typed XML: conceptually-list fields arrive as
//! pipe-delimited strings, blank fields decode as empty elements, list-vs-
//! singleton cardinality depends on how many siblings a document happened to
//! contain, and some endpoints answer with ZIP archives bundling several XML
//! files. This library wraps the HTTP endpoints and normalizes all of that
//! into predictable, stably-shaped records.
//!
//! ```no_run
//! use thetvdb_client::TvdbClient;
//!
//! let client = TvdbClient::new("YOUR-API-KEY");
//!
//! // One call fetches a series with episodes, actors, and banners attached
//! let series = client.series_all(70327).unwrap();
//! println!("{}", series["SeriesName"]);
//! ```
//!
//! The normalization pipeline itself is exposed ([`normalize_single`],
//! [`normalize_archive`], and their building blocks), so already-downloaded
//! responses can be normalized without going through the client.

mod archive;
mod client;
mod normalize;
mod xml_decode;

pub use client::{Timeframe, TvdbClient};
pub use normalize::{
    EntityKind, Record, collapse_empty, detect_error, normalize_archive, normalize_single,
    split_pipe, split_pipe_fields, unwrap_envelope,
};
pub use xml_decode::decode;

// Re-export error types
pub use archive::ArchiveError;
pub use normalize::NormalizeError;
pub use xml_decode::DecodeError;

use std::io;
use thiserror::Error;

/// Top-level error type for catalog operations
///
/// Every stage a call can fail in, transport included, funnels into this one
/// type, so callers see a uniform failure channel regardless of whether the
/// request, the XML decoding, the archive extraction, or the normalization
/// went wrong.
#[derive(Debug, Error)]
pub enum TvdbError {
    /// The HTTP request failed or returned a non-2xx status
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body was not decodable XML
    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    /// The response was not a readable ZIP archive
    #[error("Failed to unpack archive response: {0}")]
    Archive(#[from] ArchiveError),

    /// The catalog signalled an error, or the response shape was not the
    /// one the endpoint promises
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Writing a downloaded file failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
