//! Published versions as delivered by the crates.io `versions` endpoint.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{is_prerelease, try_parse_version, VersionError};

/// A named feature and the features or dependencies it enables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub name: String,
    /// Sorted alphabetically
    pub members: Vec<String>,
}

/// One published version of a crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedVersion {
    /// Version string exactly as published
    pub num: String,
    #[serde(skip)]
    pub parsed: Version,
    pub yanked: bool,
    pub created: DateTime<Utc>,
    /// Sorted by name, including implicit features
    pub features: Vec<Feature>,
}

impl PublishedVersion {
    pub fn is_prerelease(&self) -> bool {
        is_prerelease(&self.parsed)
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features
            .binary_search_by(|f| f.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.features[i])
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.feature(name).is_some()
    }
}

/// Registry shape of a version entry
#[derive(Debug, Clone, Deserialize)]
pub struct RawVersion {
    pub num: String,
    #[serde(default)]
    pub yanked: bool,
    pub created_at: String,
    #[serde(default)]
    pub features: HashMap<String, Vec<String>>,
}

/// Body of `GET {endpoint}/crates/{name}/versions`
#[derive(Debug, Clone, Deserialize)]
pub struct VersionsResponse {
    pub versions: Vec<RawVersion>,
}

impl TryFrom<RawVersion> for PublishedVersion {
    type Error = VersionError;

    fn try_from(raw: RawVersion) -> Result<Self, Self::Error> {
        let parsed = try_parse_version(&raw.num)?;
        let created = DateTime::parse_from_rfc3339(&raw.created_at)
            .map_err(|source| VersionError::InvalidTimestamp {
                num: raw.num.clone(),
                text: raw.created_at.clone(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            num: raw.num,
            parsed,
            yanked: raw.yanked,
            created,
            features: build_features(raw.features),
        })
    }
}

/// Sort members, add an empty implicit feature for every member that is not
/// itself a declared feature, and order the result by feature name.
fn build_features(declared: HashMap<String, Vec<String>>) -> Vec<Feature> {
    let mut features: BTreeMap<String, Vec<String>> = declared
        .into_iter()
        .map(|(name, mut members)| {
            members.sort();
            (name, members)
        })
        .collect();

    let implicit: BTreeSet<String> = features
        .values()
        .flatten()
        .filter(|member| !features.contains_key(member.as_str()))
        .cloned()
        .collect();
    for name in implicit {
        features.insert(name, Vec::new());
    }

    features
        .into_iter()
        .map(|(name, members)| Feature { name, members })
        .collect()
}

/// Decode a registry response body.
///
/// Entries whose version or timestamp cannot be read are skipped; only a
/// body that is not the expected document is an error.
pub fn decode_versions(body: &str) -> Result<Vec<PublishedVersion>, VersionError> {
    let response: VersionsResponse = serde_json::from_str(body)?;
    let versions = response
        .versions
        .into_iter()
        .filter_map(|raw| match PublishedVersion::try_from(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("skipping registry entry: {}", e);
                None
            }
        })
        .collect();
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "versions": [
            {
                "num": "1.1.0",
                "yanked": false,
                "created_at": "2024-03-01T10:00:00.000000+00:00",
                "features": {
                    "default": ["std", "derive"],
                    "std": [],
                    "derive": ["serde_derive"]
                }
            },
            {
                "num": "1.0.0",
                "yanked": true,
                "created_at": "2023-01-01T00:00:00Z",
                "features": {}
            },
            {
                "num": "not-a-version",
                "yanked": false,
                "created_at": "2023-01-01T00:00:00Z",
                "features": {}
            }
        ],
        "meta": { "total": 3 }
    }"#;

    #[test]
    fn test_decode_skips_bad_entries() {
        let versions = decode_versions(BODY).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].num, "1.1.0");
        assert!(!versions[0].yanked);
        assert!(versions[1].yanked);
        assert!(versions[0].created > versions[1].created);
    }

    #[test]
    fn test_features_are_normalized() {
        let versions = decode_versions(BODY).unwrap();
        let names: Vec<&str> = versions[0]
            .features
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["default", "derive", "serde_derive", "std"]);

        let default = versions[0].feature("default").unwrap();
        assert_eq!(default.members, vec!["derive", "std"]);
        assert!(versions[0].feature("serde_derive").unwrap().members.is_empty());
        assert!(versions[0].has_feature("std"));
        assert!(!versions[0].has_feature("alloc"));
    }

    #[test]
    fn test_invalid_timestamp() {
        let raw = RawVersion {
            num: "1.0.0".to_string(),
            yanked: false,
            created_at: "yesterday".to_string(),
            features: HashMap::new(),
        };
        assert!(matches!(
            PublishedVersion::try_from(raw),
            Err(VersionError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_invalid_body() {
        assert!(matches!(
            decode_versions("{\"errors\": []}"),
            Err(VersionError::Decode(_))
        ));
    }
}
