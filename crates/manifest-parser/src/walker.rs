use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::{dependency::Fields, Dependency, DependencySyntax, FieldDecl, QuoteChars, Range};

// Crate names may be bare keys or quoted keys
const NAME: &str = r#"(?:"([^"]+)"|'([^']+)'|([A-Za-z0-9_-]+))"#;

static HEADER_RE: OnceLock<Regex> = OnceLock::new();
static CRATE_TABLE_RE: OnceLock<Regex> = OnceLock::new();
static VERSION_KEY_RE: OnceLock<Regex> = OnceLock::new();
static FEATURES_KEY_RE: OnceLock<Regex> = OnceLock::new();
static DEFAULT_FEATURES_KEY_RE: OnceLock<Regex> = OnceLock::new();
static BARE_RE: OnceLock<Regex> = OnceLock::new();
static INLINE_VERSION_RE: OnceLock<Regex> = OnceLock::new();
static INLINE_FEATURES_RE: OnceLock<Regex> = OnceLock::new();
static INLINE_DEFAULT_FEATURES_RE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: impl FnOnce() -> String) -> &'static Regex {
    cell.get_or_init(|| Regex::new(&pattern()).expect("static pattern"))
}

fn header_re() -> &'static Regex {
    regex(&HEADER_RE, || r"^\s*\[\[?\s*([^\[\]]+?)\s*\]\]?".to_string())
}

fn crate_table_re() -> &'static Regex {
    regex(&CRATE_TABLE_RE, || format!(r"dependencies\s*\.\s*{NAME}$"))
}

fn version_key_re() -> &'static Regex {
    regex(&VERSION_KEY_RE, || {
        r#"^\s*(version\s*=\s*)(["'])([^"']*)(["']?)"#.to_string()
    })
}

fn features_key_re() -> &'static Regex {
    regex(&FEATURES_KEY_RE, || {
        r"^\s*(features\s*=\s*)(\[)([^\]]*)(\]?)".to_string()
    })
}

fn default_features_key_re() -> &'static Regex {
    regex(&DEFAULT_FEATURES_KEY_RE, || {
        r"^\s*(default[-_]features\s*=\s*)()([^\s,}]*)()".to_string()
    })
}

fn bare_re() -> &'static Regex {
    regex(&BARE_RE, || {
        format!(r#"^\s*({NAME}\s*=\s*)(["'])([^"']*)(["']?)"#)
    })
}

// `(?:[^}]*?,)??` skips any keys before the one we look for, preferring the
// earliest occurrence of that key.
fn inline_version_re() -> &'static Regex {
    regex(&INLINE_VERSION_RE, || {
        format!(r#"^\s*{NAME}\s*=\s*\{{(?:[^}}]*?,)??\s*(version\s*=\s*)(["'])([^"'}}]*)(["']?)"#)
    })
}

fn inline_features_re() -> &'static Regex {
    regex(&INLINE_FEATURES_RE, || {
        format!(r#"^\s*{NAME}\s*=\s*\{{(?:[^}}]*?,)??\s*(features\s*=\s*)(\[)([^\]}}]*)(\]?)"#)
    })
}

fn inline_default_features_re() -> &'static Regex {
    regex(&INLINE_DEFAULT_FEATURES_RE, || {
        format!(r#"^\s*{NAME}\s*=\s*\{{(?:[^}}]*?,)??\s*(default[-_]features\s*=\s*)()([^\s,}}]*)()"#)
    })
}

/// Scan state, owned by one `parse` call.
enum Scan {
    /// Not inside a dependency table
    Outside,
    /// Inside `[dependencies]` style block, one dependency per line.
    /// `in_inline_table` is set while an inline table opened on an earlier
    /// line has not been closed yet.
    Block {
        table: String,
        in_inline_table: bool,
    },
    /// Inside `[dependencies.<name>]`, all lines belong to one dependency
    CrateTable {
        header_line: usize,
        pending: Dependency,
    },
}

/// Parse the dependency declarations of a manifest given as lines.
///
/// Never fails: lines that are not understood are skipped.
pub fn parse<S: AsRef<str>>(lines: &[S]) -> Vec<Dependency> {
    let mut walker = Walker::new();
    for (index, line) in lines.iter().enumerate() {
        walker.walk_line(index, line.as_ref());
    }
    walker.finish(lines.len())
}

/// Parse a whole manifest text.
pub fn parse_str(text: &str) -> Vec<Dependency> {
    let lines: Vec<&str> = text.lines().collect();
    parse(&lines)
}

struct Walker {
    state: Scan,
    dependencies: Vec<Dependency>,
}

impl Walker {
    fn new() -> Self {
        Self {
            state: Scan::Outside,
            dependencies: Vec::new(),
        }
    }

    fn finish(mut self, line_count: usize) -> Vec<Dependency> {
        self.close_table(line_count);
        for dep in &mut self.dependencies {
            dep.finalize();
        }
        debug!("parsed {} dependencies", self.dependencies.len());
        self.dependencies
    }

    fn walk_line(&mut self, index: usize, raw: &str) {
        let line = strip_comment(raw);

        if let Some(caps) = header_re().captures(line) {
            self.close_table(index);
            self.state = enter_table(caps.get(1).map_or("", |m| m.as_str()), index);
            return;
        }

        match &mut self.state {
            Scan::Outside => {}
            Scan::Block {
                table,
                in_inline_table,
            } => {
                if *in_inline_table {
                    trace!("skipping inline table continuation {}: {:?}", index, line);
                    *in_inline_table = !line.contains('}');
                    return;
                }
                match block_line(line, index, table) {
                    Some(dep) => self.dependencies.push(dep),
                    None => trace!("skipping line {}: {:?}", index, line),
                }
                *in_inline_table = opens_inline_table(line);
            }
            Scan::CrateTable { pending, .. } => crate_table_line(line, index, pending),
        }
    }

    /// Emit the pending per-crate record, ending it before `end_line`.
    fn close_table(&mut self, end_line: usize) {
        let state = std::mem::replace(&mut self.state, Scan::Outside);
        if let Scan::CrateTable {
            header_line,
            mut pending,
        } = state
        {
            pending.lines = Range::new(header_line, end_line);
            self.dependencies.push(pending);
        }
    }
}

/// Everything from the first `#` on is a comment, even inside quotes.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

fn enter_table(header: &str, index: usize) -> Scan {
    if header.ends_with("dependencies") {
        return Scan::Block {
            table: header.to_string(),
            in_inline_table: false,
        };
    }

    if let Some(caps) = crate_table_re().captures(header) {
        if let (Some(name), Some(m)) = (captured_name(&caps, 1), caps.get(0)) {
            let table = header[..m.start() + "dependencies".len()].to_string();
            return Scan::CrateTable {
                header_line: index,
                pending: Dependency::new(
                    name,
                    table,
                    DependencySyntax::Table,
                    Range::new(index, index + 1),
                ),
            };
        }
    }

    Scan::Outside
}

/// Name from the first of three alternative groups starting at `first`
fn captured_name(caps: &Captures, first: usize) -> Option<String> {
    (first..first + 3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

/// Build a field from captures laid out as `(open)(value)(close)` starting
/// at group `open`; the declaration starts with group `decl`.
fn field(caps: &Captures, decl: usize, open: usize, line: usize) -> Option<FieldDecl> {
    let decl_match = caps.get(decl)?;
    let open_match = caps.get(open)?;
    let value = caps.get(open + 1)?;
    let close = caps.get(open + 2)?;

    Some(FieldDecl {
        text: value.as_str().to_string(),
        value: Range::new(value.start(), value.end()),
        decl: Range::new(decl_match.start(), close.end()),
        line,
        quotes: QuoteChars::from_captures(open_match.as_str(), close.as_str()),
    })
}

fn crate_table_line(line: &str, index: usize, pending: &mut Dependency) {
    let matched = |re: &Regex| re.captures(line).and_then(|caps| field(&caps, 1, 2, index));

    pending.merge(Fields {
        requirement: matched(version_key_re()),
        feature_list: matched(features_key_re()),
        default_features_decl: matched(default_features_key_re()),
    });
}

/// `name = {` without the closing brace on the same line
fn opens_inline_table(line: &str) -> bool {
    line.find('{')
        .is_some_and(|open| !line[open..].contains('}'))
}

/// Name and field of one inline table key
fn inline_field(re: &Regex, line: &str, index: usize) -> Option<(String, FieldDecl)> {
    let caps = re.captures(line)?;
    Some((captured_name(&caps, 1)?, field(&caps, 4, 5, index)?))
}

fn block_line(line: &str, index: usize, table: &str) -> Option<Dependency> {
    let lines = Range::new(index, index + 1);

    if let Some(caps) = bare_re().captures(line) {
        let name = captured_name(&caps, 2)?;
        let mut dep = Dependency::new(name, table.to_string(), DependencySyntax::Plain, lines);
        // the whole `name = "req"` assignment is the declaration
        dep.requirement = field(&caps, 1, 5, index);
        return Some(dep);
    }

    let version = inline_field(inline_version_re(), line, index);
    let features = inline_field(inline_features_re(), line, index);
    let default_features = inline_field(inline_default_features_re(), line, index);

    let name = [&version, &features, &default_features]
        .into_iter()
        .find_map(|m| m.as_ref().map(|(name, _)| name.clone()))?;

    let mut dep = Dependency::new(
        name,
        table.to_string(),
        DependencySyntax::InlineTable,
        lines,
    );
    dep.merge(Fields {
        requirement: version.map(|(_, f)| f),
        feature_list: features.map(|(_, f)| f),
        default_features_decl: default_features.map(|(_, f)| f),
    });
    Some(dep)
}
