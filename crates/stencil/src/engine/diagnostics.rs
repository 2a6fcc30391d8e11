//! Diagnostic text for engine failures

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

/// Names the engine resolves on its own, never reported as unresolved.
const BUILTIN_NAMES: &[&str] = &[
    "range", "dict", "debug", "namespace", "loop", "self", "super", "varargs", "kwargs", "caller",
];

/// Tags that open a block closed by a matching `end<tag>`.
const BLOCK_TAGS: &[&str] = &[
    "for",
    "if",
    "macro",
    "call",
    "filter",
    "block",
    "with",
    "autoescape",
];

// ═══════════════════════════════════════════════════════════════════
// Source Positions
// ═══════════════════════════════════════════════════════════════════

/// A 1-based position in template source, with the line it falls on.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Location<'a> {
    pub(super) row: usize,
    pub(super) column: usize,
    pub(super) line: &'a str,
    pub(super) caret: String,
}

/// Locate byte `offset` in `source`, clamped to the source and snapped
/// back to a char boundary.
pub(super) fn locate(source: &str, offset: usize) -> Location<'_> {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }

    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[offset..]
        .find('\n')
        .map_or(source.len(), |i| offset + i);
    let before = &source[line_start..offset];

    // tabs are kept so the caret lines up in a terminal
    let caret = before
        .chars()
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .chain(std::iter::once('^'))
        .collect();

    Location {
        row: source[..offset].matches('\n').count() + 1,
        column: before.chars().count() + 1,
        line: source[line_start..line_end].trim_end_matches('\r'),
        caret,
    }
}

/// Byte offset of the start of 1-based `line`.
fn line_offset(source: &str, line: usize) -> usize {
    if line <= 1 {
        return 0;
    }
    source
        .match_indices('\n')
        .nth(line - 2)
        .map_or(source.len(), |(i, _)| i + 1)
}

fn error_offset(source: &str, err: &minijinja::Error) -> usize {
    if let Some(range) = err.range() {
        range.start
    } else if let Some(line) = err.line() {
        line_offset(source, line)
    } else {
        source.len()
    }
}

fn describe(err: &minijinja::Error) -> String {
    match err.detail() {
        Some(detail) => format!("{}: {}", err.kind(), detail),
        None => err.kind().to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════
// Failure Messages
// ═══════════════════════════════════════════════════════════════════

pub(super) fn parse_failure(source: &str, err: &minijinja::Error) -> String {
    let at = locate(source, error_offset(source, err));
    let mut out = format!(
        "ERROR: Template parsing failed: {} at row {}, column {}:\n{}\n{}",
        describe(err),
        at.row,
        at.column,
        at.line,
        at.caret
    );

    if let Some(block) = unclosed_block(source) {
        let _ = write!(
            out,
            "\nunclosed `{}` block opened at row {}, column {}",
            block.tag, block.row, block.column
        );
    }
    out
}

pub(super) fn render_failure(
    source: &str,
    err: &minijinja::Error,
    unresolved: &[String],
) -> String {
    let mut out = format!("ERROR: Template rendering failed: {}", describe(err));

    match err.range() {
        Some(range) => {
            let at = locate(source, range.start);
            let excerpt = source.get(range).unwrap_or_default().trim();
            let _ = write!(
                out,
                "\nin `{}` at row {}, column {}:\n{}\n{}",
                excerpt, at.row, at.column, at.line, at.caret
            );
        }
        None => {
            if let Some(line) = err.line() {
                let _ = write!(out, "\nat row {}", line);
            }
        }
    }

    if !unresolved.is_empty() {
        let _ = write!(out, "\nunresolved: {}", unresolved.join(", "));
    }
    out
}

/// Top-level names the template reads that neither the context nor the
/// engine provides, sorted.
pub(super) fn unresolved_names(names: HashSet<String>, known: &BTreeSet<String>) -> Vec<String> {
    let mut names: Vec<String> = names
        .into_iter()
        .filter(|name| !known.contains(name) && !BUILTIN_NAMES.contains(&name.as_str()))
        .collect();
    names.sort();
    names
}

// ═══════════════════════════════════════════════════════════════════
// Block Scanner
// ═══════════════════════════════════════════════════════════════════

/// The innermost block tag that is opened but never closed.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct OpenBlock {
    pub(super) tag: String,
    pub(super) row: usize,
    pub(super) column: usize,
}

fn tag_body(tag: &str) -> &str {
    tag.trim_matches(|c: char| c == '-' || c == '+' || c.is_whitespace())
}

fn tag_name(body: &str) -> &str {
    body.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default()
}

/// Length of `rest` up to and including its `{% endraw %}` tag.
fn skip_raw(rest: &str) -> Option<usize> {
    let mut cursor = 0;
    while let Some(found) = rest[cursor..].find("{%") {
        let start = cursor + found;
        let end = start + 2 + rest[start + 2..].find("%}")?;
        cursor = end + 2;
        if tag_body(&rest[start + 2..end]) == "endraw" {
            return Some(cursor);
        }
    }
    None
}

/// Scan `source` for block tags and report the innermost one left open.
pub(super) fn unclosed_block(source: &str) -> Option<OpenBlock> {
    let mut open: Vec<(&str, usize)> = Vec::new();
    let mut cursor = 0;

    while let Some(found) = source[cursor..].find('{') {
        let start = cursor + found;
        let rest = &source[start..];

        if rest.starts_with("{#") {
            match rest[2..].find("#}") {
                Some(end) => {
                    cursor = start + 2 + end + 2;
                    continue;
                }
                None => break,
            }
        }
        if !rest.starts_with("{%") {
            cursor = start + 1;
            continue;
        }

        let Some(end) = rest[2..].find("%}").map(|i| i + 2) else {
            break;
        };
        let body = tag_body(&rest[2..end]);
        cursor = start + end + 2;

        let tag = tag_name(body);
        if tag == "raw" {
            match skip_raw(&source[cursor..]) {
                Some(len) => {
                    cursor += len;
                    continue;
                }
                None => {
                    open.push((tag, start));
                    break;
                }
            }
        }

        if let Some(name) = tag.strip_prefix("end") {
            if let Some(pos) = open.iter().rposition(|(t, _)| *t == name) {
                open.truncate(pos);
            }
        } else if BLOCK_TAGS.contains(&tag) || (tag == "set" && !body.contains('=')) {
            open.push((tag, start));
        }
    }

    open.pop().map(|(tag, offset)| {
        let at = locate(source, offset);
        OpenBlock {
            tag: tag.to_string(),
            row: at.row,
            column: at.column,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_first_line() {
        let at = locate("Hello {{ name", 6);
        assert_eq!(at.row, 1);
        assert_eq!(at.column, 7);
        assert_eq!(at.line, "Hello {{ name");
        assert_eq!(at.caret, "      ^");
    }

    #[test]
    fn test_locate_later_line() {
        let source = "line one\n\tline two\nline three";
        let at = locate(source, source.find("two").unwrap());
        assert_eq!(at.row, 2);
        assert_eq!(at.column, 7);
        assert_eq!(at.line, "\tline two");
        assert_eq!(at.caret, "\t     ^");
    }

    #[test]
    fn test_locate_clamps_past_end() {
        let at = locate("abc", 99);
        assert_eq!(at.row, 1);
        assert_eq!(at.column, 4);
    }

    #[test]
    fn test_locate_snaps_to_char_boundary() {
        // 'é' is two bytes, offset 2 is inside it
        let at = locate("aé", 2);
        assert_eq!(at.column, 2);
    }

    #[test]
    fn test_line_offset() {
        assert_eq!(line_offset("a\nb\nc", 1), 0);
        assert_eq!(line_offset("a\nb\nc", 3), 4);
        assert_eq!(line_offset("a", 7), 1);
    }

    #[test]
    fn test_unclosed_for() {
        let block = unclosed_block("{% for item in items %}{{ item }}").unwrap();
        assert_eq!(
            block,
            OpenBlock {
                tag: "for".to_string(),
                row: 1,
                column: 1
            }
        );
    }

    #[test]
    fn test_closed_blocks_are_not_reported() {
        let source = "{% if a %}{% for x in xs %}{{ x }}{% endfor %}{% endif %}";
        assert_eq!(unclosed_block(source), None);
    }

    #[test]
    fn test_innermost_open_block_wins() {
        let source = "{% if a %}\n  {%- for x in xs %}{{ x }}";
        let block = unclosed_block(source).unwrap();
        assert_eq!(block.tag, "for");
        assert_eq!(block.row, 2);
        assert_eq!(block.column, 3);
    }

    #[test]
    fn test_comments_and_raw_are_skipped() {
        assert_eq!(unclosed_block("{# {% for x in xs %} #}text"), None);
        assert_eq!(unclosed_block("{% raw %}{% if %}{% endraw %}"), None);
    }

    #[test]
    fn test_block_set_needs_endset() {
        assert_eq!(unclosed_block("{% set x = 1 %}"), None);
        assert_eq!(unclosed_block("{% set x %}body").unwrap().tag, "set");
    }

    #[test]
    fn test_unresolved_names_filters_known_and_builtins() {
        let names: HashSet<String> = ["missing", "name", "loop", "range"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let known: BTreeSet<String> = ["name".to_string()].into_iter().collect();
        assert_eq!(unresolved_names(names, &known), vec!["missing".to_string()]);
    }
}
