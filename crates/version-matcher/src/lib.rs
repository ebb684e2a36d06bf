//! # version-matcher
//!
//! Semver parsing, requirement matching and best-version selection.
//!
//! ## Overview
//!
//! The `version-matcher` crate complements `manifest-parser`:
//! - **manifest-parser**: finds requirement text in Cargo.toml (with positions)
//! - **version-matcher**: decides which published version satisfies it
//!
//! Matching follows cargo's rules: caret is the default operator,
//! comma separated requirements must all hold, and pre-releases are opt-in.
//!
//! ## Example
//!
//! ```
//! use version_matcher::{parse_requirements, parse_version, matches_requirements};
//!
//! let reqs = parse_requirements("^1.2.3").unwrap();
//! assert!(matches_requirements(&parse_version("1.9.9").unwrap(), &reqs));
//! assert!(!matches_requirements(&parse_version("2.0.0").unwrap(), &reqs));
//! ```
//!
//! ## Selection
//!
//! [`select`] ranks [`PublishedVersion`]s by precedence (build metadata
//! ignored, later publish date wins ties) and reports three tiers:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `best_match` | newest stable, non-yanked version that qualifies |
//! | `best_prerelease_match` | newest qualifying pre-release |
//! | `best_yanked_match` | newest qualifying yanked version, last resort |

mod error;
mod published;
mod requirement;
mod select;
mod version;

pub use error::VersionError;
pub use published::{decode_versions, Feature, PublishedVersion, RawVersion, VersionsResponse};
pub use requirement::{
    has_prerelease_requirement, matches_requirements, parse_requirements,
    try_parse_requirements, Operator, Requirement,
};
pub use select::{latest, select, Selection};
pub use version::{cmp_precedence, format_version, is_prerelease, parse_version, try_parse_version};

// Re-export semver types for convenience
pub use semver::Version;
