use std::fmt;

use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use serde::{Serialize, Serializer};

use crate::VersionError;

/// Requirement operator.
///
/// A requirement written without an operator (`"1.2"`) is a [`Operator::Caret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// `=1.2.3`
    Exact,
    /// `>1.2.3`
    Greater,
    /// `>=1.2.3`
    GreaterEq,
    /// `<1.2.3`
    Less,
    /// `<=1.2.3`
    LessEq,
    /// `~1.2.3`
    Tilde,
    /// `^1.2.3` or `1.2.3`
    Caret,
    /// `1.*` or `1.2.*`
    Wildcard,
}

impl From<Op> for Operator {
    fn from(op: Op) -> Self {
        match op {
            Op::Exact => Operator::Exact,
            Op::Greater => Operator::Greater,
            Op::GreaterEq => Operator::GreaterEq,
            Op::Less => Operator::Less,
            Op::LessEq => Operator::LessEq,
            Op::Tilde => Operator::Tilde,
            Op::Caret => Operator::Caret,
            Op::Wildcard => Operator::Wildcard,
            // Op is non_exhaustive, anything newer behaves like cargo's default
            _ => Operator::Caret,
        }
    }
}

/// One operator plus a partial version, e.g. `>=1.2` or `~0.3.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement(Comparator);

impl Requirement {
    /// Parse a single requirement segment (no commas).
    pub fn parse(segment: &str) -> Result<Self, semver::Error> {
        Comparator::parse(segment.trim()).map(Self)
    }

    pub fn op(&self) -> Operator {
        self.0.op.into()
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    /// `None` when the minor component was omitted or written as a wildcard
    pub fn minor(&self) -> Option<u64> {
        self.0.minor
    }

    /// `None` when the patch component was omitted or written as a wildcard
    pub fn patch(&self) -> Option<u64> {
        self.0.patch
    }

    pub fn pre(&self) -> &Prerelease {
        &self.0.pre
    }

    /// Whether the requirement explicitly opts into a pre-release
    pub fn has_pre(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Whether this single requirement accepts `version`, including the
    /// pre-release opt-in rule.
    pub fn matches(&self, version: &Version) -> bool {
        self.0.matches(version)
    }
}

impl From<Comparator> for Requirement {
    fn from(comparator: Comparator) -> Self {
        Self(comparator)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a comma separated requirement list such as `">=1.2, <1.5"`.
///
/// Returns `None` when any segment is malformed; callers treat that as
/// "cannot determine a match".
pub fn parse_requirements(text: &str) -> Option<Vec<Requirement>> {
    try_parse_requirements(text).ok()
}

/// Same as [`parse_requirements`] but keeps the parse error.
///
/// A bare `*` segment matches every release and contributes no requirement,
/// so `"*"` parses to an empty list.
pub fn try_parse_requirements(text: &str) -> Result<Vec<Requirement>, VersionError> {
    if text.trim().is_empty() {
        return Err(VersionError::EmptyRequirement);
    }

    let mut requirements = Vec::new();
    for segment in text.split(',') {
        let segment = segment.trim();
        if matches!(segment, "*" | "x" | "X") {
            continue;
        }
        let requirement =
            Requirement::parse(segment).map_err(|source| VersionError::InvalidRequirement {
                text: text.to_string(),
                segment: segment.to_string(),
                source,
            })?;
        requirements.push(requirement);
    }
    Ok(requirements)
}

/// Whether `version` satisfies every requirement in the list.
///
/// A pre-release version additionally needs at least one requirement that
/// names a pre-release on the same `major.minor.patch`.
pub fn matches_requirements(version: &Version, requirements: &[Requirement]) -> bool {
    let req = VersionReq {
        comparators: requirements.iter().map(|r| r.0.clone()).collect(),
    };
    req.matches(version)
}

/// Whether any requirement carries a pre-release suffix
pub fn has_prerelease_requirement(requirements: &[Requirement]) -> bool {
    requirements.iter().any(Requirement::has_pre)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_version;

    fn matches(version: &str, requirement: &str) -> bool {
        let version = parse_version(version).unwrap();
        let requirements = parse_requirements(requirement).unwrap();
        matches_requirements(&version, &requirements)
    }

    #[test]
    fn test_operator_classification() {
        let cases = [
            ("=1.0.0", Operator::Exact),
            (">1.0", Operator::Greater),
            (">=1", Operator::GreaterEq),
            ("<2", Operator::Less),
            ("<=2.1", Operator::LessEq),
            ("~1.2", Operator::Tilde),
            ("^1.2", Operator::Caret),
            ("1.2", Operator::Caret),
            ("1.*", Operator::Wildcard),
        ];
        for (text, op) in cases {
            let reqs = parse_requirements(text).unwrap();
            assert_eq!(reqs.len(), 1, "{text}");
            assert_eq!(reqs[0].op(), op, "{text}");
        }
    }

    #[test]
    fn test_partial_components() {
        let reqs = parse_requirements(" >= 1.2 , < 1.5.0 ").unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].major(), 1);
        assert_eq!(reqs[0].minor(), Some(2));
        assert_eq!(reqs[0].patch(), None);
        assert_eq!(reqs[1].patch(), Some(0));
    }

    #[test]
    fn test_invalid_requirements() {
        assert!(parse_requirements("").is_none());
        assert!(parse_requirements("   ").is_none());
        assert!(parse_requirements("abc").is_none());
        assert!(parse_requirements("1.0,").is_none());
        assert!(parse_requirements(">=1.0, foo").is_none());
        assert!(matches!(
            try_parse_requirements("1.0, ~x"),
            Err(VersionError::InvalidRequirement { segment, .. }) if segment == "~x"
        ));
    }

    #[test]
    fn test_star_is_unconstrained() {
        let reqs = parse_requirements("*").unwrap();
        assert!(reqs.is_empty());
        assert!(matches("0.0.1", "*"));
        assert!(matches("99.0.0", "*"));
        assert!(!matches("1.0.0-alpha", "*"));
    }

    #[test]
    fn test_caret() {
        assert!(matches("1.9.9", "^1.2.3"));
        assert!(matches("1.2.3", "^1.2.3"));
        assert!(!matches("2.0.0", "^1.2.3"));
        assert!(!matches("1.2.2", "^1.2.3"));

        assert!(matches("0.2.9", "^0.2.3"));
        assert!(!matches("0.3.0", "^0.2.3"));

        assert!(matches("0.0.3", "^0.0.3"));
        assert!(!matches("0.0.4", "^0.0.3"));

        assert!(matches("1.4.0", "1.0"));
    }

    #[test]
    fn test_tilde() {
        assert!(matches("1.2.9", "~1.2.3"));
        assert!(!matches("1.3.0", "~1.2.3"));
        assert!(!matches("1.2.2", "~1.2.3"));
        assert!(matches("1.9.0", "~1"));
        assert!(!matches("2.0.0", "~1"));
    }

    #[test]
    fn test_exact_with_wildcards() {
        assert!(matches("1.2.3", "=1.2.3"));
        assert!(!matches("1.2.4", "=1.2.3"));
        assert!(matches("1.2.7", "=1.2"));
        assert!(!matches("1.3.0", "=1.2"));
        assert!(matches("1.7.0", "1.*"));
    }

    #[test]
    fn test_comparisons_are_conjunctive() {
        assert!(matches("1.4.0", ">=1.2, <1.5"));
        assert!(!matches("1.5.0", ">=1.2, <1.5"));
        assert!(!matches("1.1.0", ">=1.2, <1.5"));
        assert!(matches("2.0.0", ">1.9.9"));
        assert!(matches("1.0.0", "<=1.0.0"));
    }

    #[test]
    fn test_prerelease_is_opt_in() {
        assert!(!matches("2.0.0-alpha", "^1.0.0"));
        assert!(!matches("2.0.0-alpha", "^2.0.0"));
        assert!(!matches("2.0.0-alpha", ">=1.0.0"));
        assert!(matches("2.0.0-alpha", "=2.0.0-alpha"));
        assert!(matches("2.0.0-beta", "^2.0.0-alpha"));
        // a pre-release on another patch never opts in
        assert!(!matches("2.0.1-beta", "^2.0.0-alpha"));
    }

    #[test]
    fn test_has_prerelease_requirement() {
        let reqs = parse_requirements(">=1.0.0-rc.1, <2").unwrap();
        assert!(has_prerelease_requirement(&reqs));
        let reqs = parse_requirements("1.0").unwrap();
        assert!(!has_prerelease_requirement(&reqs));
    }

    #[test]
    fn test_display() {
        let reqs = parse_requirements(">=1.2, ~0.3.1").unwrap();
        let rendered: Vec<String> = reqs.iter().map(|r| r.to_string()).collect();
        assert_eq!(rendered, vec![">=1.2", "~0.3.1"]);
    }
}
