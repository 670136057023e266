//! Table normalization: repair and canonicalize Markdown pipe tables.
//!
//! Converted tables are frequently ragged: colspans leave short rows, cells
//! carry paragraphs, lists or whole nested tables, and literal pipes in cell
//! text break the column structure. Every table leaves this module with:
//!
//! - one column count for every row, equal to the widest row in the table;
//! - a single `| --- |` separator row, right after the header;
//! - single-line cells with every literal `|` escaped as `\|`;
//! - nested tables flattened into their parent cell.
//!
//! Normalization is a fixed point: running it over its own output changes
//! nothing. Both entry points ([`normalize_tables`] for text and
//! [`normalize_draft`] for typed drafts) share [`clean_cell`] and the
//! [`TableBlock::render`] renderer, so either output feeds the other cleanly.

use crate::config::NestedTableJoin;
use crate::pipeline::draft::{Block, MarkdownDraft, TableBlock};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use tracing::debug;

static RE_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*:?-+:?\s*$").unwrap());

/// A pipe row, optionally indented and/or inside blockquotes.
static RE_ROW_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<prefix>[ \t]*(?:>[ \t]*)*)\|").unwrap());

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:>[ \t]*)*(?P<fence>`{3,}|~{3,})").unwrap());

static RE_TR_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tr\b[^>]*>").unwrap());
static RE_CELL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<t[dh]\b[^>]*>").unwrap());
static RE_ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

/// Block-level tags that cannot live in a single-line cell. `<br>` is absent
/// on purpose: it is the `LineBreak` join.
static RE_BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|table|thead|tbody|tfoot|tr|td|th|caption|ul|ol|li|dl|dt|dd|h[1-6]|blockquote|pre|section|article|header|footer|hr)\b[^>]*>",
    )
    .unwrap()
});

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ── Entry points ─────────────────────────────────────────────────────────────

/// Normalize every pipe table in a Markdown string.
///
/// Tables are detected as contiguous lines starting with `|` (after optional
/// indentation or `>` quote markers) outside fenced code blocks; the first
/// line must hold at least two unescaped pipes. A row that does not end in
/// `|` continues on the following plain lines when one of them ends in `|`
/// before a blank line, a fence or another row; otherwise it is complete as
/// written (GFM rows may omit the outer pipes). A trailing newline in the
/// input is preserved.
pub fn normalize_tables(markdown: &str, join: NestedTableJoin) -> String {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut fence: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(ref open) = fence {
            if closes_fence(line, open) {
                fence = None;
            }
            out.push(line.to_string());
            i += 1;
            continue;
        }
        if let Some(open) = fence_marker(line) {
            fence = Some(open);
            out.push(line.to_string());
            i += 1;
            continue;
        }

        match table_start(line) {
            Some(prefix) => {
                let (rows, next) = collect_rows(&lines, i, &prefix);
                let table = TableBlock { rows }.normalize(join);
                if !table.is_empty() {
                    out.push(table.render(&prefix));
                }
                i = next;
            }
            None => {
                out.push(line.to_string());
                i += 1;
            }
        }
    }

    out.join("\n")
}

/// Normalize the tables of a draft: typed tables cell by cell, text blocks
/// through [`normalize_tables`]. Tables without a single column are dropped.
pub fn normalize_draft(draft: &MarkdownDraft, join: NestedTableJoin) -> MarkdownDraft {
    let blocks: Vec<Block> = draft
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Text(text) => Some(Block::Text(normalize_tables(text, join))),
            Block::Table(table) => {
                let table = table.normalize(join);
                (!table.is_empty()).then_some(Block::Table(table))
            }
        })
        .collect();
    let out = MarkdownDraft { blocks };
    debug!("Normalized {} table(s)", out.table_count());
    out
}

impl TableBlock {
    /// Clean every cell, pad every row to the widest row, and drop empty
    /// rows.
    pub fn normalize(&self, join: NestedTableJoin) -> TableBlock {
        let mut rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.iter().map(|c| clean_cell(c, join)).collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
            guard_separator_lookalike(row);
        }
        TableBlock { rows }
    }
}

// ── Cell cleaning ────────────────────────────────────────────────────────────

/// Turn arbitrary cell content into a single-line, pipe-safe cell.
///
/// In order: raw `<table>` markup and embedded pipe sub-tables are
/// flattened (cells joined with `", "`, rows with `join`), residual
/// block-level tags become spaces, whitespace runs collapse to one space,
/// and unescaped pipes are escaped. Tags inside backtick code spans or
/// behind a backslash (`\<div>`) are text and stay.
pub fn clean_cell(raw: &str, join: NestedTableJoin) -> String {
    let s = flatten_raw_tables(raw, join);
    let s = flatten_pipe_tables(&s, join);
    let s = replace_block_tags(&s);
    let s = RE_WHITESPACE.replace_all(&s, " ");
    escape_pipes(s.trim())
}

/// Escape every `|` not already preceded by an escaping backslash.
pub fn escape_pipes(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut escaped = false;
    for ch in s.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '|' => out.push_str("\\|"),
            _ => out.push(ch),
        }
    }
    out
}

/// Split a pipe row into trimmed cells on unescaped pipes. The outer pipes
/// are optional.
pub fn split_cells(row: &str) -> Vec<String> {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = if ends_with_unescaped_pipe(row) {
        &row[..row.len() - 1]
    } else {
        row
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in row.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                current.push(ch);
            }
            '|' => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn ends_with_unescaped_pipe(s: &str) -> bool {
    match s.strip_suffix('|') {
        Some(head) => head.chars().rev().take_while(|&c| c == '\\').count() % 2 == 0,
        None => false,
    }
}

fn count_unescaped_pipes(s: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for ch in s.chars() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '|' {
            count += 1;
        }
    }
    count
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty() && cells.iter().all(|c| RE_SEPARATOR_CELL.is_match(c))
}

/// A data row made only of dashes would read back as a separator row.
fn guard_separator_lookalike(row: &mut [String]) {
    if is_separator_row(row) {
        row[0].insert(0, '\\');
    }
}

/// Byte ranges of the backtick code spans in `s`.
fn code_spans(s: &str) -> Vec<Range<usize>> {
    let bytes = s.as_bytes();
    let run_end = |from: usize| {
        let mut end = from;
        while end < bytes.len() && bytes[end] == b'`' {
            end += 1;
        }
        end
    };

    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_end = run_end(i);
        let width = open_end - i;
        // The span closes at the next backtick run of the same width.
        let mut j = open_end;
        let mut close = None;
        while j < bytes.len() {
            if bytes[j] != b'`' {
                j += 1;
                continue;
            }
            let end = run_end(j);
            if end - j == width {
                close = Some(end);
                break;
            }
            j = end;
        }
        match close {
            Some(end) => {
                spans.push(i..end);
                i = end;
            }
            None => i = open_end,
        }
    }
    spans
}

/// Whether the `<` at `pos` is text rather than markup.
fn is_literal_tag(s: &str, pos: usize, spans: &[Range<usize>]) -> bool {
    let backslashes = s[..pos].bytes().rev().take_while(|&b| b == b'\\').count();
    backslashes % 2 == 1 || spans.iter().any(|r| r.contains(&pos))
}

fn replace_block_tags(s: &str) -> String {
    let spans = code_spans(s);
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for m in RE_BLOCK_TAG.find_iter(s) {
        if is_literal_tag(s, m.start(), &spans) {
            continue;
        }
        out.push_str(&s[last..m.start()]);
        out.push(' ');
        last = m.end();
    }
    out.push_str(&s[last..]);
    out
}

/// Replace raw `<table>` markup, innermost first, with flattened text.
fn flatten_raw_tables(cell: &str, join: NestedTableJoin) -> String {
    let mut s = cell.to_string();
    loop {
        let lower = s.to_ascii_lowercase();
        let spans = code_spans(&s);
        let Some(open) = last_table_open(&lower, |pos| is_literal_tag(&s, pos, &spans)) else {
            break;
        };
        let (close, end) = match lower[open..].find("</table") {
            Some(rel) => {
                let close = open + rel;
                let end = lower[close..].find('>').map_or(s.len(), |i| close + i + 1);
                (close, end)
            }
            None => (s.len(), s.len()),
        };
        let flat = flatten_raw_rows(&s[open..close], join);
        s.replace_range(open..end, &format!(" {flat} "));
    }
    s
}

fn last_table_open(lower: &str, literal: impl Fn(usize) -> bool) -> Option<usize> {
    let mut end = lower.len();
    while let Some(pos) = lower[..end].rfind("<table") {
        let is_tag = match lower.as_bytes().get(pos + 6) {
            None | Some(b'>') | Some(b'/') => true,
            Some(b) => b.is_ascii_whitespace(),
        };
        if is_tag && !literal(pos) {
            return Some(pos);
        }
        end = pos;
    }
    None
}

fn flatten_raw_rows(markup: &str, join: NestedTableJoin) -> String {
    let rows: Vec<String> = RE_TR_OPEN
        .split(markup)
        .skip(1)
        .map(|row| {
            RE_CELL_OPEN
                .split(row)
                .skip(1)
                .map(strip_tags)
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|r| !r.is_empty())
        .collect();
    if rows.is_empty() {
        strip_tags(markup)
    } else {
        rows.join(join.separator())
    }
}

fn strip_tags(s: &str) -> String {
    let text = RE_ANY_TAG.replace_all(s, " ");
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Replace each run of two or more pipe lines inside a cell with one line.
fn flatten_pipe_tables(cell: &str, join: NestedTableJoin) -> String {
    let lines: Vec<&str> = cell.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let start = i;
        while i < lines.len() && lines[i].trim_start().starts_with('|') {
            i += 1;
        }
        match i - start {
            0 => {
                out.push(lines[i].to_string());
                i += 1;
            }
            1 => out.push(lines[start].to_string()),
            _ => {
                let rows: Vec<String> = lines[start..i]
                    .iter()
                    .map(|l| split_cells(l))
                    .filter(|cells| !is_separator_row(cells))
                    .map(|cells| {
                        cells
                            .into_iter()
                            .filter(|c| !c.is_empty())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .filter(|r| !r.is_empty())
                    .collect();
                out.push(rows.join(join.separator()));
            }
        }
    }
    out.join("\n")
}

// ── Text-path helpers ────────────────────────────────────────────────────────

/// The line prefix when `line` can open a table.
fn table_start(line: &str) -> Option<String> {
    let caps = RE_ROW_START.captures(line)?;
    let prefix = caps.name("prefix")?.as_str();
    (count_unescaped_pipes(&line[prefix.len()..]) >= 2).then(|| prefix.to_string())
}

/// The row text (from its first `|`) when `line` continues a table whose
/// rows start with `prefix`.
fn row_body<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let caps = RE_ROW_START.captures(line)?;
    let found = caps.name("prefix")?.as_str();
    (squash(found) == squash(prefix)).then(|| &line[found.len()..])
}

fn squash(prefix: &str) -> String {
    prefix.chars().filter(|c| !c.is_whitespace()).collect()
}

fn collect_rows(lines: &[&str], start: usize, prefix: &str) -> (Vec<Vec<String>>, usize) {
    let mut rows = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let Some(body) = row_body(lines[i], prefix) else {
            break;
        };
        let mut row = body.to_string();
        i += 1;
        if !ends_with_unescaped_pipe(row.trim_end()) {
            if let Some(end) = continuation_end(lines, i, prefix) {
                for line in &lines[i..end] {
                    row.push('\n');
                    row.push_str(strip_row_prefix(line, prefix));
                }
                i = end;
            }
        }
        let cells = split_cells(&row);
        if !is_separator_row(&cells) {
            rows.push(cells);
        }
    }
    (rows, i)
}

/// End (exclusive) of the plain lines continuing a row that lacks its
/// closing pipe, up to the first one ending in `|`.
fn continuation_end(lines: &[&str], start: usize, prefix: &str) -> Option<usize> {
    for (j, line) in lines.iter().enumerate().skip(start) {
        if strip_row_prefix(line, prefix).trim().is_empty()
            || fence_marker(line).is_some()
            || row_body(line, prefix).is_some()
        {
            return None;
        }
        if ends_with_unescaped_pipe(line.trim_end()) {
            return Some(j + 1);
        }
    }
    None
}

fn strip_row_prefix<'a>(line: &'a str, prefix: &str) -> &'a str {
    line.strip_prefix(prefix)
        .or_else(|| line.strip_prefix(prefix.trim_end()))
        .unwrap_or(line)
}

fn fence_marker(line: &str) -> Option<String> {
    RE_FENCE
        .captures(line)
        .and_then(|c| c.name("fence").map(|m| m.as_str().to_string()))
}

fn closes_fence(line: &str, open: &str) -> bool {
    let Some(caps) = RE_FENCE.captures(line) else {
        return false;
    };
    let Some(fence) = caps.name("fence") else {
        return false;
    };
    let rest = &line[fence.end()..];
    fence.as_str().starts_with(&open[..1])
        && fence.as_str().len() >= open.len()
        && rest.trim().is_empty()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SEMI: NestedTableJoin = NestedTableJoin::Semicolon;

    #[test]
    fn pads_rows_to_widest_row() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 | 3 |\n| x |";
        let out = normalize_tables(input, SEMI);
        assert_eq!(
            out,
            "| A | B |  |\n| --- | --- | --- |\n| 1 | 2 | 3 |\n| x |  |  |"
        );
    }

    #[test]
    fn every_row_has_header_width() {
        let input = "| a |\n| b | c | d | e |\n|---|\n| f | g |";
        let out = normalize_tables(input, SEMI);
        for line in out.lines() {
            assert_eq!(split_cells(line).len(), 4, "line: {line}");
        }
        assert_eq!(out.lines().filter(|l| l.contains("---")).count(), 1);
        assert!(out.lines().nth(1).is_some_and(|l| l.contains("---")));
    }

    #[test]
    fn inserts_missing_separator() {
        let out = normalize_tables("| A | B |\n| 1 | 2 |", SEMI);
        assert_eq!(out, "| A | B |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn normalization_is_a_fixed_point() {
        let inputs = [
            "| A | B |\n| 1 | 2 | 3 |",
            "intro\n\n| h |\n|:---:|\n| a \\| b |\n| - | - |\n\ntext",
            "> | q | r |\n> | s\n> continued |\n",
            "- item\n\n  | x | y |\n  | --- | --- |\n  | 1 |",
            "| a | <table><tr><td>n1</td><td>n2</td></tr><tr><td>n3</td></tr></table> |",
            "| A | B\n| --- | ---\n| 1 | 2",
            "| A | B |\n| 1 | 2\nnext paragraph text\n",
            "| t | `<div>` and \\<p> |",
        ];
        for input in inputs {
            let once = normalize_tables(input, SEMI);
            let twice = normalize_tables(&once, SEMI);
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn dash_only_data_row_survives_renormalization() {
        let table = TableBlock {
            rows: vec![
                vec!["H1".into(), "H2".into()],
                vec!["-".into(), "--".into()],
            ],
        }
        .normalize(SEMI);
        let rendered = table.render("");
        assert_eq!(normalize_tables(&rendered, SEMI), rendered);
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn escapes_literal_pipes_once() {
        assert_eq!(clean_cell("B|C", SEMI), "B\\|C");
        assert_eq!(clean_cell("B\\|C", SEMI), "B\\|C");
        assert_eq!(escape_pipes("a\\\\|b"), "a\\\\\\|b");
    }

    #[test]
    fn multi_line_cell_is_merged() {
        let input = "| A | B |\n| 1 | first line\nsecond line |\n\nafter";
        let out = normalize_tables(input, SEMI);
        assert_eq!(
            out,
            "| A | B |\n| --- | --- |\n| 1 | first line second line |\n\nafter"
        );
    }

    #[test]
    fn rows_without_outer_pipes_stay_separate() {
        let out = normalize_tables("| A | B\n| --- | ---\n| 1 | 2", SEMI);
        assert_eq!(out, "| A | B |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn paragraph_after_open_row_is_not_absorbed() {
        let out = normalize_tables("| A | B |\n| 1 | 2\nnext paragraph text\n", SEMI);
        assert_eq!(
            out,
            "| A | B |\n| --- | --- |\n| 1 | 2 |\nnext paragraph text\n"
        );
    }

    #[test]
    fn code_spans_and_escaped_tags_are_text() {
        assert_eq!(clean_cell("`<div>`", SEMI), "`<div>`");
        assert_eq!(clean_cell("\\<p>x\\</p>", SEMI), "\\<p>x\\</p>");
        assert_eq!(clean_cell("`<table>` <p>x</p>", SEMI), "`<table>` x");
        assert_eq!(clean_cell("``a`<tr>``", SEMI), "``a`<tr>``");
    }

    #[test]
    fn flattens_nested_pipe_table() {
        let cell = "Intro\n\n| a | b |\n| --- | --- |\n| 1 | 2 |";
        assert_eq!(clean_cell(cell, SEMI), "Intro a, b; 1, 2");
        assert_eq!(
            clean_cell(cell, NestedTableJoin::LineBreak),
            "Intro a, b<br>1, 2"
        );
    }

    #[test]
    fn flattens_nested_raw_tables_innermost_first() {
        let cell = "<table><tr><td>x</td><td><table><tr><td>i1</td><td>i2</td></tr></table></td></tr><tr><th>y</th></tr></table>";
        assert_eq!(clean_cell(cell, SEMI), "x, i1, i2; y");
    }

    #[test]
    fn block_tags_become_spaces() {
        assert_eq!(
            clean_cell("<p>one</p><div>two</div><br>three", SEMI),
            "one two <br>three"
        );
    }

    #[test]
    fn fenced_code_is_untouched() {
        let input = "```\n| not | a | table\n|x|\n```\n\n~~~~rust\n| a | b |\n~~~\n~~~~\n";
        assert_eq!(normalize_tables(input, SEMI), input);
    }

    #[test]
    fn blockquote_prefix_is_preserved() {
        let out = normalize_tables("> | a | b |\n> | 1 |", SEMI);
        assert_eq!(out, "> | a | b |\n> | --- | --- |\n> | 1 |  |");
    }

    #[test]
    fn single_pipe_line_is_not_a_table() {
        let input = "a | b\n|just one";
        assert_eq!(normalize_tables(input, SEMI), input);
    }

    #[test]
    fn draft_tables_are_normalized_and_empty_ones_dropped() {
        let draft = MarkdownDraft {
            blocks: vec![
                Block::Table(TableBlock {
                    rows: vec![
                        vec!["A".into(), "B|C".into()],
                        vec!["1".into(), "two\nlines".into(), "x".into()],
                    ],
                }),
                Block::Table(TableBlock { rows: vec![vec![]] }),
                Block::Text("| p | q |\n| r |".into()),
            ],
        };
        let out = normalize_draft(&draft, SEMI);
        assert_eq!(out.blocks.len(), 2);
        assert_eq!(
            out.to_markdown(),
            "| A | B\\|C |  |\n| --- | --- | --- |\n| 1 | two lines | x |\n\n| p | q |\n| --- | --- |\n| r |  |"
        );
        assert_eq!(normalize_draft(&out, SEMI), out);
    }
}
