//! Post-processing: deterministic cleanup of the converted Markdown, plus
//! title and filename derivation.
//!
//! ## Rule Order
//!
//! Line endings are normalised before trimming so `\r` never survives as
//! trailing whitespace, blank lines are collapsed after trimming so
//! whitespace-only lines count as blank, and the final-newline pass runs last.
//!
//! Each rule is a pure `&str -> String` function and independently testable.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest file stem produced by [`sanitize_filename`], in characters.
const MAX_STEM_CHARS: usize = 120;

/// Apply all tidy rules to converted Markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR to LF)
/// 2. Trim trailing whitespace per line
/// 3. Collapse 3+ consecutive newlines to a single blank line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 5. Ensure the text ends with exactly one newline
pub fn tidy_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 4: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_matches('\n');
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Title derivation ─────────────────────────────────────────────────────────

static RE_ATX_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}#{1,6}[ \t]+(?P<text>.*?)(?:[ \t]+#+)?[ \t]*$").unwrap());

static RE_FENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}(?:`{3,}|~{3,})").unwrap());

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static RE_AUTOLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\\])<([a-zA-Z][^>\s]*)>").unwrap());
static RE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\*\*|~~|\*|`+)").unwrap());
static RE_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!|<>&~])").unwrap());

/// Text of the first ATX heading outside fenced code, with inline Markdown
/// syntax stripped.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut fence: Option<char> = None;
    for line in markdown.lines() {
        if let Some(m) = RE_FENCE_LINE.find(line) {
            let ch = m.as_str().trim_start().chars().next();
            fence = match fence {
                None => ch,
                Some(open) if ch == Some(open) => None,
                other => other,
            };
            continue;
        }
        if fence.is_some() {
            continue;
        }
        if let Some(caps) = RE_ATX_HEADING.captures(line) {
            let text = strip_inline_markdown(&caps["text"]);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn strip_inline_markdown(s: &str) -> String {
    let s = RE_LINK.replace_all(s, "$1");
    let s = RE_AUTOLINK.replace_all(&s, "$1$2");
    let s = RE_EMPHASIS.replace_all(&s, "");
    let s = RE_ESCAPE.replace_all(&s, "$1");
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pick the document title.
///
/// Precedence: a non-blank `declared` title, the first heading of the
/// Markdown, the HTML `<title>`, then `default`.
pub fn derive_title(
    declared: Option<&str>,
    markdown: &str,
    document_title: Option<&str>,
    default: &str,
) -> String {
    declared
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| first_heading(markdown))
        .or_else(|| {
            document_title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| default.to_string())
}

// ── Filename derivation ──────────────────────────────────────────────────────

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static RE_SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Turn a title into a file stem: everything but Unicode word characters,
/// spaces and hyphens is removed, and runs of spaces/hyphens become one `-`.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_filename(title: &str) -> Option<String> {
    let kept = RE_UNSAFE_CHARS.replace_all(title.trim(), "");
    let stem = RE_SEPARATOR_RUN.replace_all(kept.trim(), "-");
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// `<stem>.md` for `title`, falling back to `default` when the title has no
/// filename-safe characters.
pub fn filename_for(title: &str, default: &str) -> String {
    let stem = sanitize_filename(title)
        .or_else(|| sanitize_filename(default))
        .unwrap_or_else(|| crate::config::DEFAULT_TITLE.to_string());
    format!("{stem}.md")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("\n\nhello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_tidy_full_pipeline() {
        let input = "# Title\r\n\r\nSome text   \n \n\n\n\n## Section\t\n";
        assert_eq!(tidy_markdown(input), "# Title\n\nSome text\n\n## Section\n");
    }

    #[test]
    fn test_first_heading_skips_code_fences() {
        let md = "intro\n\n```\n# not a heading\n```\n\n## **Real** [title](http://x) \\_v2\\_ ##\n";
        assert_eq!(first_heading(md).as_deref(), Some("Real title _v2_"));
    }

    #[test]
    fn test_first_heading_unescapes_markup() {
        let md = "# Use \\<div> \\& <https://x.test>\n";
        assert_eq!(first_heading(md).as_deref(), Some("Use <div> & https://x.test"));
    }

    #[test]
    fn test_first_heading_requires_space() {
        assert_eq!(first_heading("#hashtag\ntext"), None);
    }

    #[test]
    fn test_title_precedence() {
        let md = "# From Heading\n";
        assert_eq!(derive_title(Some(" Declared "), md, Some("Doc"), "d"), "Declared");
        assert_eq!(derive_title(Some("  "), md, Some("Doc"), "d"), "From Heading");
        assert_eq!(derive_title(None, "text", Some("Doc"), "d"), "Doc");
        assert_eq!(derive_title(None, "text", None, "d"), "d");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("Release Notes: v2.0 (draft)").as_deref(),
            Some("Release-Notes-v20-draft")
        );
        assert_eq!(sanitize_filename("a - - b").as_deref(), Some("a-b"));
        assert_eq!(sanitize_filename("Café déjà").as_deref(), Some("Café-déjà"));
        assert_eq!(sanitize_filename("a/b\\c:d").as_deref(), Some("abcd"));
        assert_eq!(sanitize_filename("???"), None);
        assert_eq!(sanitize_filename(&"x".repeat(500)).map(|s| s.len()), Some(120));
    }

    #[test]
    fn test_filename_for() {
        assert_eq!(filename_for("My Page", "converted"), "My-Page.md");
        assert_eq!(filename_for("!!!", "converted"), "converted.md");
    }
}
