use std::cmp::Ordering;

use semver::Version;

use crate::VersionError;

/// Parse a complete version string.
///
/// Partial versions such as `1.0` are rejected here; they are only
/// meaningful inside a requirement.
pub fn parse_version(text: &str) -> Option<Version> {
    try_parse_version(text).ok()
}

/// Same as [`parse_version`] but keeps the parse error.
pub fn try_parse_version(text: &str) -> Result<Version, VersionError> {
    Version::parse(text.trim()).map_err(|source| VersionError::InvalidVersion {
        text: text.to_string(),
        source,
    })
}

/// Render the normalized `major.minor.patch` triple, dropping pre-release
/// and build metadata.
pub fn format_version(version: &Version) -> String {
    format!("{}.{}.{}", version.major, version.minor, version.patch)
}

/// Compare two versions by semver precedence.
///
/// Unlike `Ord for Version`, build metadata does not take part.
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Whether the version carries a pre-release suffix
pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}
