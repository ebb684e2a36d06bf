use crate::{FeatureDecl, QuoteChars, Range};

/// Split the text between `[` and `]` of a feature list into declarations.
///
/// Tolerates half typed input: a segment without quotes, or with an opening
/// quote but no closing one, still yields a declaration. Empty segments
/// (`["a", ]`) are skipped.
pub fn tokenize_features(text: &str) -> Vec<FeatureDecl> {
    let mut decls = Vec::new();
    // where the current declaration starts: 0 or the preceding comma
    let mut decl_start = 0;
    let mut segment_start = 0;

    let boundaries = text
        .match_indices(',')
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()));

    for segment_end in boundaries {
        let segment = &text[segment_start..segment_end];
        let content = segment.trim();
        if !content.is_empty() {
            let content_start = segment_start + (segment.len() - segment.trim_start().len());
            let content_end = content_start + content.len();
            let (value, decl_end, quotes) = feature_value(content, content_start, content_end);

            decls.push(FeatureDecl {
                name: text[value.start..value.end].to_string(),
                value,
                decl: Range::new(decl_start, decl_end),
                quotes,
                has_trailing_comma: segment_end < text.len(),
            });
        }
        decl_start = segment_end;
        segment_start = segment_end + 1;
    }

    decls
}

/// Locate the feature name inside a trimmed segment.
fn feature_value(content: &str, start: usize, end: usize) -> (Range, usize, QuoteChars) {
    let Some(open) = content.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return (Range::new(start, end), end, QuoteChars::default());
    };

    let value_start = start + open.len_utf8();
    match content[open.len_utf8()..].find(open) {
        Some(i) => {
            let value_end = value_start + i;
            (
                Range::new(value_start, value_end),
                value_end + open.len_utf8(),
                QuoteChars::new(Some(open), Some(open)),
            )
        }
        None => (
            Range::new(value_start, end),
            end,
            QuoteChars::new(Some(open), None),
        ),
    }
}
