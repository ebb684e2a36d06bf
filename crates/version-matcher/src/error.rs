//! Error types for version-matcher.

use thiserror::Error;

/// Errors produced while reading versions, requirements or registry data.
///
/// The public `parse_*` helpers collapse these into `None`; the `try_*`
/// variants and the registry decoder hand them out so callers can log them.
#[derive(Debug, Error)]
pub enum VersionError {
    /// A version string is not a complete `major.minor.patch[-pre][+build]`
    #[error("invalid version '{text}': {source}")]
    InvalidVersion {
        text: String,
        #[source]
        source: semver::Error,
    },

    /// One comma separated segment of a requirement failed to parse
    #[error("invalid requirement '{segment}' in '{text}': {source}")]
    InvalidRequirement {
        text: String,
        segment: String,
        #[source]
        source: semver::Error,
    },

    /// The requirement text has no segments at all
    #[error("empty requirement")]
    EmptyRequirement,

    /// `created_at` of a published version is not RFC 3339
    #[error("invalid timestamp '{text}' for version {num}: {source}")]
    InvalidTimestamp {
        num: String,
        text: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The registry response body is not the expected JSON document
    #[error("failed to decode registry response: {0}")]
    Decode(#[from] serde_json::Error),
}
