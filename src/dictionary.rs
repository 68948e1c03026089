//! Terminology dictionary.
//!
//! User-maintained term mappings applied to text before translation, e.g.
//! product names or fixed technical phrasing. One mapping per line, with
//! `=>`, `->`, or `:` separating source and replacement.

/// A single term mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub from: String,
    pub to: String,
}

const SEPARATORS: &[&str] = &["=>", "->", ":"];

/// Parses mapping lines. Blank lines and lines without a separator are
/// skipped; the first separator present in a line wins.
pub fn parse_mappings<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Mapping> {
    let mut mappings = Vec::new();
    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some(sep) = SEPARATORS.iter().find(|s| line.contains(*s)) else {
            continue;
        };
        if let Some((from, to)) = line.split_once(sep) {
            let from = from.trim();
            let to = to.trim();
            if !from.is_empty() && !to.is_empty() {
                mappings.push(Mapping {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
    }
    mappings
}

/// Applies mappings in order as exact substring replacements.
pub fn apply_mappings(text: &str, mappings: &[Mapping]) -> String {
    let mut out = text.to_string();
    for m in mappings {
        if m.from.is_empty() {
            continue;
        }
        out = out.replace(&m.from, &m.to);
    }
    out
}
