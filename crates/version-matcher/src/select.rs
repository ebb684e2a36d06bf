use std::cmp::Ordering;

use crate::{cmp_precedence, matches_requirements, PublishedVersion, Requirement};

/// Outcome of [`select`].
///
/// At most one tier is filled unless pre-releases are allowed and a newer
/// pre-release exists next to a stable match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection<'a> {
    /// Highest stable, non-yanked candidate
    pub best_match: Option<&'a PublishedVersion>,
    /// Highest non-yanked pre-release candidate
    pub best_prerelease_match: Option<&'a PublishedVersion>,
    /// Highest yanked candidate, only when nothing else qualifies
    pub best_yanked_match: Option<&'a PublishedVersion>,
}

impl<'a> Selection<'a> {
    pub fn is_empty(&self) -> bool {
        self.best_match.is_none()
            && self.best_prerelease_match.is_none()
            && self.best_yanked_match.is_none()
    }

    /// The version a caller should present: stable, then pre-release, then yanked.
    pub fn preferred(&self) -> Option<&'a PublishedVersion> {
        self.best_match
            .or(self.best_prerelease_match)
            .or(self.best_yanked_match)
    }
}

/// Rank by precedence, then by publish time.
fn rank(a: &PublishedVersion, b: &PublishedVersion) -> Ordering {
    cmp_precedence(&a.parsed, &b.parsed).then(a.created.cmp(&b.created))
}

fn highest<'a>(
    candidates: impl Iterator<Item = &'a PublishedVersion>,
) -> Option<&'a PublishedVersion> {
    candidates.max_by(|a, b| rank(a, b))
}

/// Pick the versions to report for a requirement set.
///
/// Without `requirements` every published version is a candidate.
/// `avoid_prerelease` keeps a newer pre-release from being reported next to
/// a stable match; pre-releases are still reported when no stable version
/// qualifies. With `avoid_prerelease` off, a pre-release that outranks the
/// stable match is reported alongside it rather than instead of it, so the
/// caller can still tell the newest stable release apart.
pub fn select<'a>(
    versions: &'a [PublishedVersion],
    avoid_prerelease: bool,
    requirements: Option<&[Requirement]>,
) -> Selection<'a> {
    let qualifies = |v: &&'a PublishedVersion| match requirements {
        Some(reqs) => matches_requirements(&v.parsed, reqs),
        None => true,
    };

    let best_match = highest(
        versions
            .iter()
            .filter(|v| !v.yanked && !v.is_prerelease())
            .filter(qualifies),
    );

    let best_prerelease = highest(
        versions
            .iter()
            .filter(|v| !v.yanked && v.is_prerelease())
            .filter(qualifies),
    );
    let best_prerelease_match = match (best_match, best_prerelease) {
        (None, pre) => pre,
        (Some(stable), Some(pre)) if !avoid_prerelease && rank(pre, stable).is_gt() => Some(pre),
        _ => None,
    };

    let best_yanked_match = if best_match.is_none() && best_prerelease_match.is_none() {
        highest(versions.iter().filter(|v| v.yanked).filter(qualifies))
    } else {
        None
    };

    Selection {
        best_match,
        best_prerelease_match,
        best_yanked_match,
    }
}

/// Newest version regardless of any requirement.
pub fn latest(versions: &[PublishedVersion], avoid_prerelease: bool) -> Selection<'_> {
    select(versions, avoid_prerelease, None)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::{parse_requirements, parse_version};

    fn published(num: &str, yanked: bool, day: u32) -> PublishedVersion {
        PublishedVersion {
            num: num.to_string(),
            parsed: parse_version(num).unwrap(),
            yanked,
            created: created(day),
            features: Vec::new(),
        }
    }

    fn created(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn nums(selection: &Selection) -> [Option<String>; 3] {
        [
            selection.best_match.map(|v| v.num.clone()),
            selection.best_prerelease_match.map(|v| v.num.clone()),
            selection.best_yanked_match.map(|v| v.num.clone()),
        ]
    }

    fn candidates() -> Vec<PublishedVersion> {
        vec![
            published("1.0.0", false, 1),
            published("1.1.0", false, 2),
            published("2.0.0-beta", false, 3),
            published("2.0.0", true, 4),
        ]
    }

    #[test]
    fn test_requirement_selects_highest_stable() {
        let versions = candidates();
        let reqs = parse_requirements("^1.0").unwrap();
        let selection = select(&versions, true, Some(&reqs));
        assert_eq!(nums(&selection), [Some("1.1.0".to_string()), None, None]);
    }

    #[test]
    fn test_without_requirement_skips_yanked() {
        let versions = candidates();
        let selection = select(&versions, true, None);
        assert_eq!(nums(&selection), [Some("1.1.0".to_string()), None, None]);
    }

    #[test]
    fn test_allowed_prerelease_is_reported_when_newer() {
        let versions = candidates();
        let selection = latest(&versions, false);
        assert_eq!(
            nums(&selection),
            [Some("1.1.0".to_string()), Some("2.0.0-beta".to_string()), None]
        );
        assert_eq!(selection.preferred().unwrap().num, "1.1.0");
    }

    #[test]
    fn test_prerelease_when_no_stable_qualifies() {
        let versions = candidates();
        let reqs = parse_requirements("^2.0.0-alpha").unwrap();
        let selection = select(&versions, true, Some(&reqs));
        assert_eq!(nums(&selection), [None, Some("2.0.0-beta".to_string()), None]);
    }

    #[test]
    fn test_yanked_fallback() {
        let versions = candidates();
        let reqs = parse_requirements("=2.0.0").unwrap();
        let selection = select(&versions, true, Some(&reqs));
        assert_eq!(nums(&selection), [None, None, Some("2.0.0".to_string())]);
        assert_eq!(selection.preferred().unwrap().num, "2.0.0");
    }

    #[test]
    fn test_no_candidates() {
        let selection = select(&[], false, None);
        assert!(selection.is_empty());

        let versions = candidates();
        let reqs = parse_requirements("^3").unwrap();
        assert!(select(&versions, true, Some(&reqs)).is_empty());
    }

    #[test]
    fn test_build_metadata_tie_prefers_later_publish() {
        let versions = vec![
            published("1.0.0+b", false, 5),
            published("1.0.0+a", false, 9),
            published("1.0.0+c", false, 7),
        ];
        let selection = latest(&versions, true);
        assert_eq!(selection.best_match.unwrap().num, "1.0.0+a");
    }

    #[test]
    fn test_independent_of_input_order() {
        let versions = candidates();
        let mut reversed = candidates();
        reversed.reverse();
        let reqs = parse_requirements(">=1").unwrap();

        let a = select(&versions, false, Some(&reqs));
        let b = select(&reversed, false, Some(&reqs));
        assert_eq!(nums(&a), nums(&b));
        assert_eq!(nums(&a), nums(&select(&versions, false, Some(&reqs))));
    }
}
