use serde::Serialize;
use version_matcher::{has_prerelease_requirement, parse_requirements, Requirement};

use crate::{features::tokenize_features, Range};

/// How a dependency is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencySyntax {
    /// `serde = "1.0"`
    Plain,
    /// `[dependencies.serde]` followed by `version = "1.0"` lines
    Table,
    /// `serde = { version = "1.0", features = [...] }`
    InlineTable,
}

/// Delimiters found around a value.
///
/// The closing one may be missing while the value is still being typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QuoteChars {
    pub open: Option<char>,
    pub close: Option<char>,
}

impl QuoteChars {
    pub fn new(open: Option<char>, close: Option<char>) -> Self {
        Self { open, close }
    }

    /// Build from the regex captures of an opening and optional closing delimiter
    pub(crate) fn from_captures(open: &str, close: &str) -> Self {
        Self {
            open: open.chars().next(),
            close: close.chars().next(),
        }
    }
}

/// One `key = value` assignment inside a dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    /// Raw value text without delimiters
    pub text: String,
    /// Byte range of `text` in its line
    pub value: Range,
    /// Byte range of the whole assignment in its line
    pub decl: Range,
    /// Line index
    pub line: usize,
    pub quotes: QuoteChars,
}

/// One element of a `features = [...]` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDecl {
    pub name: String,
    /// Relative to the start of the feature list text
    pub value: Range,
    /// Like `value` but including quotes, the leading comma and whitespace
    pub decl: Range,
    pub quotes: QuoteChars,
    pub has_trailing_comma: bool,
}

/// Raw field declarations found on one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Fields {
    pub requirement: Option<FieldDecl>,
    pub feature_list: Option<FieldDecl>,
    pub default_features_decl: Option<FieldDecl>,
}

/// A dependency declared in a manifest, with the spans needed to edit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Crate name as declared
    pub name: String,
    /// Header of the table the declaration lives in, e.g. `dev-dependencies`
    pub table: String,
    pub syntax: DependencySyntax,
    /// Line indices covered by the declaration
    pub lines: Range,
    pub requirement: Option<FieldDecl>,
    pub feature_list: Option<FieldDecl>,
    pub default_features_decl: Option<FieldDecl>,

    // Derived by `finalize`
    pub features: Vec<FeatureDecl>,
    /// `None` when there is no requirement or it cannot be parsed
    pub parsed_requirements: Option<Vec<Requirement>>,
    pub requirement_has_build_suffix: bool,
    pub default_features: Option<bool>,
}

impl Dependency {
    pub fn new(name: String, table: String, syntax: DependencySyntax, lines: Range) -> Self {
        Self {
            name,
            table,
            syntax,
            lines,
            requirement: None,
            feature_list: None,
            default_features_decl: None,
            features: Vec::new(),
            parsed_requirements: None,
            requirement_has_build_suffix: false,
            default_features: None,
        }
    }

    /// Raw requirement text, e.g. `"1.0"`
    pub fn requirement_text(&self) -> Option<&str> {
        self.requirement.as_ref().map(|r| r.text.as_str())
    }

    pub fn feature_list_text(&self) -> Option<&str> {
        self.feature_list.as_ref().map(|f| f.text.as_str())
    }

    pub fn default_features_text(&self) -> Option<&str> {
        self.default_features_decl.as_ref().map(|d| d.text.as_str())
    }

    /// The requirement is present but could not be parsed
    pub fn has_invalid_requirement(&self) -> bool {
        self.requirement.is_some() && self.parsed_requirements.is_none()
    }

    /// Keep the first value seen for every field
    pub(crate) fn merge(&mut self, fields: Fields) {
        if self.requirement.is_none() {
            self.requirement = fields.requirement;
        }
        if self.feature_list.is_none() {
            self.feature_list = fields.feature_list;
        }
        if self.default_features_decl.is_none() {
            self.default_features_decl = fields.default_features_decl;
        }
    }

    /// Compute the derived fields from the raw declarations.
    pub(crate) fn finalize(&mut self) {
        if let Some(requirement) = &self.requirement {
            self.parsed_requirements = parse_requirements(&requirement.text);
            self.requirement_has_build_suffix = self
                .parsed_requirements
                .as_deref()
                .is_some_and(has_prerelease_requirement);
        }
        if let Some(list) = &self.feature_list {
            self.features = tokenize_features(&list.text);
        }
        if let Some(default_features) = &self.default_features_decl {
            self.default_features = Some(default_features.text != "false");
        }
    }
}
