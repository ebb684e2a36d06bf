use std::fmt::Write;

use manifest_parser::Dependency;
use serde::{Deserialize, Serialize};
use version_matcher::{cmp_precedence, latest, select, PublishedVersion};

use crate::appraiser::Appraisal;

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionDecorationKind {
    //requirement present but not parseable
    #[default]
    NotParsed,
    //matched == latest
    Latest,
    //matched < latest
    Outdated,
    //only a pre-release satisfies the requirement
    PrereleaseMatch,
    //only a yanked version satisfies the requirement
    YankedMatch,
    NoMatch,
    //registry has no versions or the fetch failed
    NotFound,
    //no version requirement, e.g. path or git dependencies
    Unversioned,
}

#[derive(Debug, Default, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecorationPayload {
    pub kind: VersionDecorationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_features: Vec<String>,
}

/// Classify a dependency against the versions published for it.
///
/// `versions` is `None` when the registry could not be reached or does not
/// know the crate. A requirement that opts into pre-releases lets the
/// selector report them even when `allow_prerelease` is off.
pub fn version_decoration(
    dep: &Dependency,
    versions: Option<&[PublishedVersion]>,
    allow_prerelease: bool,
) -> DecorationPayload {
    let requirement = dep.requirement_text().map(str::to_string);
    let Some(requirements) = dep.parsed_requirements.as_deref() else {
        let kind = if dep.has_invalid_requirement() {
            VersionDecorationKind::NotParsed
        } else {
            VersionDecorationKind::Unversioned
        };
        return DecorationPayload {
            kind,
            requirement,
            ..Default::default()
        };
    };
    let Some(versions) = versions.filter(|v| !v.is_empty()) else {
        return DecorationPayload {
            kind: VersionDecorationKind::NotFound,
            requirement,
            ..Default::default()
        };
    };

    let avoid_prerelease = !(allow_prerelease || dep.requirement_has_build_suffix);
    let selection = select(versions, avoid_prerelease, Some(requirements));
    let newest = latest(versions, avoid_prerelease).preferred();

    let (kind, matched) = match (
        selection.best_match,
        selection.best_prerelease_match,
        selection.best_yanked_match,
    ) {
        (Some(stable), pre, _) => {
            let matched = pre.unwrap_or(stable);
            let kind = match newest {
                Some(newest) if cmp_precedence(&matched.parsed, &newest.parsed).is_lt() => {
                    VersionDecorationKind::Outdated
                }
                _ => VersionDecorationKind::Latest,
            };
            (kind, Some(matched))
        }
        (None, Some(pre), _) => (VersionDecorationKind::PrereleaseMatch, Some(pre)),
        (None, None, Some(yanked)) => (VersionDecorationKind::YankedMatch, Some(yanked)),
        (None, None, None) => (VersionDecorationKind::NoMatch, None),
    };

    DecorationPayload {
        kind,
        requirement,
        matched: matched.map(|v| v.num.clone()),
        latest: newest.map(|v| v.num.clone()),
        unknown_features: matched
            .map(|v| unknown_features(dep, v))
            .unwrap_or_default(),
    }
}

/// Features requested in the manifest that `version` does not define.
/// `default` is always accepted.
fn unknown_features(dep: &Dependency, version: &PublishedVersion) -> Vec<String> {
    dep.features
        .iter()
        .map(|f| f.name.as_str())
        .filter(|name| *name != "default" && !version.has_feature(name))
        .map(str::to_string)
        .collect()
}

pub fn formatted_string(payload: &DecorationPayload, formatter: &CompiledFormatter) -> String {
    let template = match payload.kind {
        VersionDecorationKind::NotParsed => &formatter.not_parsed,
        VersionDecorationKind::Latest => &formatter.latest,
        VersionDecorationKind::Outdated => &formatter.outdated,
        VersionDecorationKind::PrereleaseMatch => &formatter.prerelease_match,
        VersionDecorationKind::YankedMatch => &formatter.yanked_match,
        VersionDecorationKind::NoMatch => &formatter.no_match,
        VersionDecorationKind::NotFound => &formatter.not_found,
        VersionDecorationKind::Unversioned => &formatter.unversioned,
    };
    let mut result = template.format(payload);
    if !payload.unknown_features.is_empty() {
        let _ = write!(
            result,
            " (unknown features: {})",
            payload.unknown_features.join(", ")
        );
    }
    result
}

/// 1-based line of the requirement, or of the declaration when there is none
fn report_line(dep: &Dependency) -> usize {
    dep.requirement
        .as_ref()
        .map_or(dep.lines.start, |r| r.line)
        + 1
}

/// One line per dependency: `path:line: name requirement status`.
pub fn render_text(appraisals: &[Appraisal], formatter: &CompiledFormatter) -> String {
    let mut out = String::new();
    for appraisal in appraisals {
        let dep = &appraisal.dependency;
        let _ = writeln!(
            out,
            "{}:{}: [{}] {} {} {}",
            appraisal.manifest.display(),
            report_line(dep),
            dep.table,
            dep.name,
            dep.requirement_text().unwrap_or("-"),
            formatted_string(&appraisal.decoration, formatter)
        );
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportItem<'a> {
    manifest: String,
    table: &'a str,
    name: &'a str,
    line: usize,
    #[serde(flatten)]
    decoration: &'a DecorationPayload,
    text: String,
}

pub fn render_json(
    appraisals: &[Appraisal],
    formatter: &CompiledFormatter,
) -> serde_json::Result<String> {
    let items: Vec<ReportItem<'_>> = appraisals
        .iter()
        .map(|appraisal| ReportItem {
            manifest: appraisal.manifest.display().to_string(),
            table: &appraisal.dependency.table,
            name: &appraisal.dependency.name,
            line: report_line(&appraisal.dependency),
            decoration: &appraisal.decoration,
            text: formatted_string(&appraisal.decoration, formatter),
        })
        .collect();
    serde_json::to_string_pretty(&items)
}

/// decoration formatter
/// each field is the template for one decoration kind:
/// latest: the best match is the newest published version
/// outdated: a newer version exists than the best match
/// prerelease_match: only a pre-release satisfies the requirement
/// yanked_match: only a yanked version satisfies the requirement
/// no_match: nothing satisfies the requirement
/// not_found: the registry returned no versions
/// unversioned: the dependency has no version requirement
/// not_parsed: the requirement could not be parsed
///
/// each template may use 3 template strings:
/// - matched: the best matching version
/// - latest: the newest published version, compatible or not
/// - requirement: the requirement text as written
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecorationFormatter {
    #[serde(default = "default_latest")]
    pub latest: String,
    #[serde(default = "default_outdated")]
    pub outdated: String,
    #[serde(default = "default_prerelease_match")]
    pub prerelease_match: String,
    #[serde(default = "default_yanked_match")]
    pub yanked_match: String,
    #[serde(default = "default_no_match")]
    pub no_match: String,
    #[serde(default = "default_not_found")]
    pub not_found: String,
    #[serde(default = "default_unversioned")]
    pub unversioned: String,
    #[serde(default = "default_not_parsed")]
    pub not_parsed: String,
}

impl DecorationFormatter {
    pub fn compile(&self) -> CompiledFormatter {
        CompiledFormatter {
            latest: CompiledTemplate::new(self.latest.clone()),
            outdated: CompiledTemplate::new(self.outdated.clone()),
            prerelease_match: CompiledTemplate::new(self.prerelease_match.clone()),
            yanked_match: CompiledTemplate::new(self.yanked_match.clone()),
            no_match: CompiledTemplate::new(self.no_match.clone()),
            not_found: CompiledTemplate::new(self.not_found.clone()),
            unversioned: CompiledTemplate::new(self.unversioned.clone()),
            not_parsed: CompiledTemplate::new(self.not_parsed.clone()),
        }
    }
}

impl Default for DecorationFormatter {
    fn default() -> Self {
        Self {
            latest: default_latest(),
            outdated: default_outdated(),
            prerelease_match: default_prerelease_match(),
            yanked_match: default_yanked_match(),
            no_match: default_no_match(),
            not_found: default_not_found(),
            unversioned: default_unversioned(),
            not_parsed: default_not_parsed(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFormatter {
    latest: CompiledTemplate,
    outdated: CompiledTemplate,
    prerelease_match: CompiledTemplate,
    yanked_match: CompiledTemplate,
    no_match: CompiledTemplate,
    not_found: CompiledTemplate,
    unversioned: CompiledTemplate,
    not_parsed: CompiledTemplate,
}

impl Default for CompiledFormatter {
    fn default() -> Self {
        DecorationFormatter::default().compile()
    }
}

#[derive(Debug, Clone, Default)]
struct CompiledTemplate {
    template: String,
    needs_matched: bool,
    needs_latest: bool,
    needs_requirement: bool,
}

impl CompiledTemplate {
    fn new(template: String) -> Self {
        Self {
            needs_matched: template.contains("{{matched}}"),
            needs_latest: template.contains("{{latest}}"),
            needs_requirement: template.contains("{{requirement}}"),
            template,
        }
    }

    fn format(&self, payload: &DecorationPayload) -> String {
        let mut result = self.template.clone();

        if let Some(matched) = payload.matched.as_deref().filter(|_| self.needs_matched) {
            result = result.replace("{{matched}}", matched);
        }
        if let Some(latest) = payload.latest.as_deref().filter(|_| self.needs_latest) {
            result = result.replace("{{latest}}", latest);
        }
        if let Some(requirement) = payload
            .requirement
            .as_deref()
            .filter(|_| self.needs_requirement)
        {
            result = result.replace("{{requirement}}", requirement);
        }

        result
    }
}

fn default_latest() -> String {
    "✅ {{matched}}".to_string()
}

fn default_outdated() -> String {
    "🚀 {{matched}} -> {{latest}}".to_string()
}

fn default_prerelease_match() -> String {
    "🧪 {{matched}}, latest {{latest}}".to_string()
}

fn default_yanked_match() -> String {
    "❌ yanked {{matched}}, latest {{latest}}".to_string()
}

fn default_no_match() -> String {
    "⚠️ no version matches {{requirement}}, latest {{latest}}".to_string()
}

fn default_not_found() -> String {
    "Not found".to_string()
}

fn default_unversioned() -> String {
    "Unversioned".to_string()
}

fn default_not_parsed() -> String {
    "Invalid requirement {{requirement}}".to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use version_matcher::parse_version;

    use super::*;

    fn published(num: &str, yanked: bool, features: &[&str]) -> PublishedVersion {
        PublishedVersion {
            num: num.to_string(),
            parsed: parse_version(num).unwrap(),
            yanked,
            created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            features: features
                .iter()
                .map(|name| version_matcher::Feature {
                    name: name.to_string(),
                    members: Vec::new(),
                })
                .collect(),
        }
    }

    fn dependency(line: &str) -> Dependency {
        manifest_parser::parse(&["[dependencies]", line]).remove(0)
    }

    fn versions() -> Vec<PublishedVersion> {
        vec![
            published("1.0.0", false, &["derive", "std"]),
            published("1.1.0", false, &["derive", "std"]),
            published("1.2.0", true, &["derive", "std"]),
            published("2.0.0-beta.1", false, &[]),
            published("2.0.0", false, &[]),
        ]
    }

    #[test]
    fn test_outdated_and_latest() {
        let versions = versions();

        let payload = version_decoration(&dependency(r#"serde = "1.0""#), Some(&versions[..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::Outdated);
        assert_eq!(payload.matched.as_deref(), Some("1.1.0"));
        assert_eq!(payload.latest.as_deref(), Some("2.0.0"));

        let payload = version_decoration(&dependency(r#"serde = "2""#), Some(&versions[..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::Latest);
        assert_eq!(payload.matched.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_prerelease_and_yanked() {
        let versions = versions();

        let payload = version_decoration(
            &dependency(r#"serde = "=2.0.0-beta.1""#),
            Some(&versions[..]),
            false,
        );
        assert_eq!(payload.kind, VersionDecorationKind::PrereleaseMatch);
        assert_eq!(payload.matched.as_deref(), Some("2.0.0-beta.1"));

        let payload = version_decoration(&dependency(r#"serde = "=1.2.0""#), Some(&versions[..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::YankedMatch);
        assert_eq!(payload.matched.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_no_match_not_found_and_unparsed() {
        let versions = versions();

        let payload = version_decoration(&dependency(r#"serde = "3""#), Some(&versions[..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::NoMatch);
        assert_eq!(payload.matched, None);
        assert_eq!(payload.latest.as_deref(), Some("2.0.0"));

        let payload = version_decoration(&dependency(r#"serde = "1""#), None, false);
        assert_eq!(payload.kind, VersionDecorationKind::NotFound);
        let payload = version_decoration(&dependency(r#"serde = "1""#), Some(&[][..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::NotFound);

        let payload = version_decoration(&dependency(r#"serde = "one""#), Some(&versions[..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::NotParsed);
        assert_eq!(payload.requirement.as_deref(), Some("one"));

        let local = manifest_parser::parse(&["[dependencies.local]", r#"path = "../local""#]);
        let payload = version_decoration(&local[0], Some(&versions[..]), false);
        assert_eq!(payload.kind, VersionDecorationKind::Unversioned);
    }

    #[test]
    fn test_unknown_features() {
        let versions = versions();
        let dep = dependency(r#"serde = { version = "1", features = ["derive", "rc", "default"] }"#);
        let payload = version_decoration(&dep, Some(&versions[..]), false);
        assert_eq!(payload.unknown_features, vec!["rc"]);
    }

    #[test]
    fn test_format_templates() {
        let formatter = DecorationFormatter::default().compile();
        let payload = DecorationPayload {
            kind: VersionDecorationKind::Outdated,
            requirement: Some("1.0".to_string()),
            matched: Some("1.1.0".to_string()),
            latest: Some("2.0.0".to_string()),
            unknown_features: vec!["rc".to_string()],
        };
        assert_eq!(
            formatted_string(&payload, &formatter),
            "🚀 1.1.0 -> 2.0.0 (unknown features: rc)"
        );

        let formatter = DecorationFormatter {
            no_match: "{{requirement}} has no match".to_string(),
            ..Default::default()
        }
        .compile();
        let payload = DecorationPayload {
            kind: VersionDecorationKind::NoMatch,
            requirement: Some("^9".to_string()),
            ..Default::default()
        };
        assert_eq!(formatted_string(&payload, &formatter), "^9 has no match");
    }

    #[test]
    fn test_render() {
        let mut deps = manifest_parser::parse(&[
            "[dependencies]",
            r#"serde = "1.0""#,
            "[dependencies.serde_json]",
            "features = []",
            r#"version = "=1.1.0""#,
        ]);
        let table_dep = deps.remove(1);
        let dep = deps.remove(0);
        let appraisals = vec![
            Appraisal {
                manifest: PathBuf::from("Cargo.toml"),
                decoration: version_decoration(&dep, Some(&versions()[..]), false),
                dependency: dep,
            },
            Appraisal {
                manifest: PathBuf::from("Cargo.toml"),
                decoration: version_decoration(&table_dep, Some(&versions()[..]), false),
                dependency: table_dep,
            },
        ];
        let formatter = CompiledFormatter::default();

        assert_eq!(
            render_text(&appraisals, &formatter),
            "Cargo.toml:2: [dependencies] serde 1.0 🚀 1.1.0 -> 2.0.0\n\
             Cargo.toml:5: [dependencies] serde_json =1.1.0 🚀 1.1.0 -> 2.0.0\n"
        );

        let json: serde_json::Value =
            serde_json::from_str(&render_json(&appraisals, &formatter).unwrap()).unwrap();
        assert_eq!(json[0]["name"], "serde");
        assert_eq!(json[0]["kind"], "outdated");
        assert_eq!(json[0]["matched"], "1.1.0");
        // same 1-based line as the text report
        assert_eq!(json[0]["line"], 2);
        assert_eq!(json[1]["line"], 5);
    }
}
