//! HTML to Markdown conversion.
//!
//! The converter walks the sanitized fragment twice over, in effect:
//!
//! - a *flow* walk over block containers (`div`, `section`, ...) that splits
//!   the output into [`Block`]s, lifting every flow-level `<table>` into a
//!   typed [`TableBlock`];
//! - a recursive *render* of everything else into Markdown text, driven by a
//!   small copyable `Ctx` recording whether we are inside a heading or
//!   inline marker, a `<pre>`, a table cell, or a list.
//!
//! Whitespace follows HTML rules: runs of ASCII whitespace collapse to one
//! space, and a space is dropped at the start of a line or after another
//! space. `<pre>` content is copied verbatim into a fenced block.

use crate::config::NestedTableJoin;
use crate::error::Html2MdError;
use crate::pipeline::dom;
use crate::pipeline::draft::{Block, MarkdownDraft, TableBlock};
use crate::pipeline::extract::Fragment;
use crate::pipeline::tables::clean_cell;
use markup5ever_rcdom::{Handle, NodeData};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Containers the flow walk descends into; anything else is rendered.
const FLOW_CONTAINERS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "form", "fieldset", "center", "figure", "details",
];

/// Elements rendered as blank-line separated blocks.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "address",
    "figure", "figcaption", "details", "summary", "dl", "dt", "dd", "form", "fieldset",
    "center", "body", "html",
];

/// Elements dropped together with their content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "meta", "link", "iframe",
    "object", "embed", "svg", "canvas", "button", "select", "input", "textarea",
];

/// Link schemes kept as links; everything else is reduced to its text.
const LINK_SCHEMES: &[&str] = &["http", "https", "file"];

/// Elements nested deeper than this below the fragment root are reduced to
/// their text before rendering.
const MAX_DEPTH: usize = 128;

/// Spans never stretch a table beyond this many columns, or beyond its
/// widest row of real cells when that is wider.
const MAX_SPAN_COLUMNS: usize = 64;

/// A character reference: `&amp;`, `&#39;`, `&#x27;`.
static RE_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap()
});

#[derive(Debug, Clone, Copy, Default)]
struct Ctx {
    /// Inside a heading or an inline marker: blocks flatten to spaces.
    inline: bool,
    pre: bool,
    cell: bool,
    list_depth: usize,
}

/// Converts a sanitized [`Fragment`] into a [`MarkdownDraft`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter {
    join: NestedTableJoin,
}

impl Converter {
    /// `join` is used when a table has to be rendered inline (inside a list,
    /// a blockquote, or another table) and therefore normalized on the spot.
    pub fn new(join: NestedTableJoin) -> Self {
        Self { join }
    }

    /// Convert the fragment. Subtrees nested more than `MAX_DEPTH` levels
    /// deep are flattened to text in place first.
    ///
    /// # Errors
    /// [`Html2MdError::UnsupportedStructure`] when the fragment yields no
    /// text at all.
    pub fn convert(&self, fragment: &Fragment) -> Result<MarkdownDraft, Html2MdError> {
        let flattened = dom::flatten_below(fragment.root(), MAX_DEPTH);
        if flattened > 0 {
            warn!("Flattened {flattened} subtree(s) nested deeper than {MAX_DEPTH} levels");
        }

        let mut flow = Flow::default();
        if matches!(fragment.root().data, NodeData::Element { .. })
            && !FLOW_CONTAINERS.contains(&dom::tag_name(fragment.root()).unwrap_or_default())
        {
            self.node(fragment.root(), Ctx::default(), &mut flow.buf);
        } else {
            self.flow(fragment.root(), &mut flow);
        }
        flow.flush();

        let draft = MarkdownDraft {
            blocks: flow.blocks,
        };
        if draft.is_blank() {
            return Err(Html2MdError::UnsupportedStructure);
        }
        debug!(
            "Converted fragment into {} block(s), {} table(s)",
            draft.blocks.len(),
            draft.table_count()
        );
        Ok(draft)
    }

    // ── Flow walk ────────────────────────────────────────────────────────────

    fn flow(&self, node: &Handle, out: &mut Flow) {
        for child in dom::children(node) {
            match dom::tag_name(&child) {
                Some("table") => {
                    out.flush();
                    if let Some(caption) = self.caption(&child) {
                        out.blocks.push(Block::Text(caption));
                    }
                    out.blocks.push(Block::Table(TableBlock {
                        rows: self.table_rows(&child, Ctx::default()),
                    }));
                }
                Some(tag) if FLOW_CONTAINERS.contains(&tag) => {
                    out.buf.push_str("\n\n");
                    self.flow(&child, out);
                    out.buf.push_str("\n\n");
                }
                _ => self.node(&child, Ctx::default(), &mut out.buf),
            }
        }
    }

    // ── Render ───────────────────────────────────────────────────────────────

    fn node(&self, node: &Handle, ctx: Ctx, out: &mut String) {
        match node.data {
            NodeData::Text { ref contents } => {
                let raw = contents.borrow();
                if ctx.pre {
                    out.push_str(&raw);
                } else {
                    push(out, &escape_text(&collapse_whitespace(&raw)));
                }
            }
            NodeData::Element { ref name, .. } => self.element(node, &name.local, ctx, out),
            NodeData::Document => {
                for child in dom::children(node) {
                    self.node(&child, ctx, out);
                }
            }
            _ => {}
        }
    }

    fn children(&self, node: &Handle, ctx: Ctx) -> String {
        let mut s = String::new();
        for child in dom::children(node) {
            self.node(&child, ctx, &mut s);
        }
        s
    }

    fn element(&self, node: &Handle, tag: &str, ctx: Ctx, out: &mut String) {
        if SKIPPED_ELEMENTS.contains(&tag) {
            return;
        }
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.heading(node, tag, ctx, out),
            "br" => {
                if ctx.pre {
                    out.push('\n');
                } else if ctx.inline || ctx.cell {
                    push(out, " ");
                } else {
                    out.push('\n');
                }
            }
            "hr" => {
                if ctx.inline || ctx.cell {
                    push(out, " ");
                } else {
                    out.push_str("\n\n---\n\n");
                }
            }
            "em" | "i" | "cite" | "dfn" | "var" => self.marked(node, "*", ctx, out),
            "strong" | "b" => self.marked(node, "**", ctx, out),
            "del" | "s" | "strike" => self.marked(node, "~~", ctx, out),
            "code" | "kbd" | "samp" | "tt" => {
                if ctx.pre {
                    out.push_str(&self.children(node, ctx));
                } else {
                    push(out, &inline_code(&collapse_whitespace(&pre_text(node))));
                }
            }
            "pre" => self.pre(node, ctx, out),
            "a" => self.link(node, ctx, out),
            "img" => self.image(node, ctx, out),
            "ul" => self.list(node, false, ctx, out),
            "ol" => self.list(node, true, ctx, out),
            "blockquote" => self.blockquote(node, ctx, out),
            "table" => self.inline_table(node, ctx, out),
            // Table parts outside a table (after sanitizer surgery) keep their text.
            "caption" | "thead" | "tbody" | "tfoot" | "tr" | "td" | "th" => {
                let inner = self.children(node, ctx);
                push(out, &format!(" {} ", inner.trim()));
            }
            "li" => {
                let inner = self.children(node, ctx);
                block(out, inner.trim(), ctx);
            }
            _ if BLOCK_ELEMENTS.contains(&tag) => {
                let inner = self.children(node, ctx);
                block(out, inner.trim(), ctx);
            }
            _ => {
                let inner = self.children(node, ctx);
                push(out, &inner);
            }
        }
    }

    fn heading(&self, node: &Handle, tag: &str, ctx: Ctx, out: &mut String) {
        let inner = self.children(node, Ctx { inline: true, ..ctx });
        let text = inner.trim();
        if text.is_empty() {
            return;
        }
        if ctx.inline || ctx.cell {
            push(out, &format!(" {text} "));
            return;
        }
        let level = tag[1..].parse::<usize>().unwrap_or(1);
        out.push_str(&format!("\n\n{} {}\n\n", "#".repeat(level), text));
    }

    fn marked(&self, node: &Handle, marker: &str, ctx: Ctx, out: &mut String) {
        let inner = self.children(node, Ctx { inline: true, ..ctx });
        if ctx.pre {
            out.push_str(&inner);
            return;
        }
        let (lead, core, trail) = chomp(&inner);
        if core.is_empty() {
            push(out, lead);
            return;
        }
        push(out, &format!("{lead}{marker}{core}{marker}{trail}"));
    }

    fn pre(&self, node: &Handle, ctx: Ctx, out: &mut String) {
        let code = pre_text(node);
        if ctx.inline || ctx.cell {
            push(out, &inline_code(&collapse_whitespace(&code)));
            return;
        }
        let code = code.trim_end_matches(['\n', '\r']);
        let lang = code_language(node).unwrap_or_default();
        let fence = "`".repeat((longest_run(code, '`') + 1).max(3));
        out.push_str(&format!("\n\n{fence}{lang}\n{code}\n{fence}\n\n"));
    }

    fn link(&self, node: &Handle, ctx: Ctx, out: &mut String) {
        let inner = self.children(node, Ctx { inline: true, ..ctx });
        let (lead, text, trail) = chomp(&inner);
        if text.is_empty() {
            return;
        }
        if ctx.pre {
            out.push_str(&inner);
            return;
        }
        let Some(href) = dom::attr(node, "href").filter(|h| !h.trim().is_empty()) else {
            push(out, &format!("{lead}{text}{trail}"));
            return;
        };
        let href = href.trim();
        if scheme(href).is_some_and(|s| !LINK_SCHEMES.iter().any(|k| s.eq_ignore_ascii_case(k))) {
            push(out, &format!("{lead}{text}{trail}"));
            return;
        }
        let href = escape_href(href);
        let title = dom::attr(node, "title").filter(|t| !t.is_empty());

        if title.is_none() && unescape_text(text) == href {
            push(out, &format!("{lead}<{href}>{trail}"));
            return;
        }
        let title_part = title
            .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
            .unwrap_or_default();
        push(out, &format!("{lead}[{text}]({href}{title_part}){trail}"));
    }

    fn image(&self, node: &Handle, ctx: Ctx, out: &mut String) {
        let alt = escape_text(&dom::attr(node, "alt").unwrap_or_default());
        if ctx.inline {
            push(out, &alt);
            return;
        }
        let mut src = dom::attr(node, "src").unwrap_or_default();
        if src.trim_start().starts_with("data:") {
            let head = src.split(',').next().unwrap_or_default().to_string();
            src = format!("{head}...");
        }
        let title_part = dom::attr(node, "title")
            .filter(|t| !t.is_empty())
            .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
            .unwrap_or_default();
        push(out, &format!("![{alt}]({src}{title_part})"));
    }

    fn list(&self, node: &Handle, ordered: bool, ctx: Ctx, out: &mut String) {
        let mut n = if ordered {
            dom::attr(node, "start")
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(1)
        } else {
            1
        };
        let inner_ctx = Ctx {
            list_depth: ctx.list_depth + 1,
            ..ctx
        };

        let mut items: Vec<String> = Vec::new();
        for item in dom::child_elements(node) {
            let body = match dom::tag_name(&item) {
                Some("li") => self.children(&item, inner_ctx),
                Some("ul") | Some("ol") => {
                    // A list nested directly in a list belongs to the previous item.
                    let nested = self.children_as_item(&item, inner_ctx);
                    if let Some(last) = items.last_mut() {
                        last.push_str(&indent(&nested, "  "));
                        continue;
                    }
                    nested
                }
                _ => self.children(&item, inner_ctx),
            };
            let body = tidy_lines(&body);
            let body = body.trim();
            let bullet = if ordered {
                let b = format!("{n}.");
                n += 1;
                b
            } else {
                "-".to_string()
            };
            let pad = " ".repeat(bullet.len() + 1);
            let mut lines = body.lines();
            let mut item_text = format!("{bullet} {}", lines.next().unwrap_or_default());
            for line in lines {
                item_text.push('\n');
                if !line.trim().is_empty() {
                    item_text.push_str(&pad);
                    item_text.push_str(line);
                }
            }
            items.push(item_text.trim_end().to_string());
        }
        if items.is_empty() {
            return;
        }

        let text = items.join("\n");
        if ctx.inline {
            push(out, &format!(" {} ", text.replace('\n', " ")));
        } else if ctx.list_depth > 0 || ctx.cell {
            out.push_str(&format!("\n{text}\n"));
        } else {
            out.push_str(&format!("\n\n{text}\n\n"));
        }
    }

    /// Render a stray nested list that appears as a direct child of a list.
    fn children_as_item(&self, node: &Handle, ctx: Ctx) -> String {
        let mut s = String::new();
        let ordered = dom::is_element(node, "ol");
        self.list(node, ordered, Ctx { list_depth: ctx.list_depth.max(1), ..ctx }, &mut s);
        s
    }

    fn blockquote(&self, node: &Handle, ctx: Ctx, out: &mut String) {
        let inner = tidy_lines(&self.children(node, ctx));
        let inner = inner.trim();
        if inner.is_empty() {
            return;
        }
        if ctx.inline || ctx.cell {
            push(out, &format!(" {inner} "));
            return;
        }
        let quoted = inner
            .lines()
            .map(|l| if l.trim().is_empty() { ">".to_string() } else { format!("> {l}") })
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&format!("\n\n{quoted}\n\n"));
    }

    // ── Tables ───────────────────────────────────────────────────────────────

    /// A table that is not at flow level: normalize it immediately and
    /// render it as pipe lines (flattened further by the parent cell, if any).
    fn inline_table(&self, node: &Handle, ctx: Ctx, out: &mut String) {
        let rows = self.table_rows(node, ctx);
        let table = TableBlock { rows }.normalize(self.join);
        if table.is_empty() {
            return;
        }
        let caption = self.caption(node);
        let rendered = table.render("");
        if ctx.inline {
            let flat = clean_cell(&rendered, self.join);
            push(out, &format!(" {} {flat} ", caption.unwrap_or_default()));
        } else if ctx.cell {
            if let Some(caption) = caption {
                push(out, &format!(" {caption} "));
            }
            out.push_str(&format!("\n{rendered}\n"));
        } else {
            let caption = caption.map(|c| format!("{c}\n\n")).unwrap_or_default();
            out.push_str(&format!("\n\n{caption}{rendered}\n\n"));
        }
    }

    fn caption(&self, table: &Handle) -> Option<String> {
        dom::child_elements(table)
            .into_iter()
            .find(|c| dom::is_element(c, "caption"))
            .map(|c| self.children(&c, Ctx { inline: true, ..Ctx::default() }).trim().to_string())
            .filter(|c| !c.is_empty())
    }

    /// Rows of cell text from the table's own `tr` elements (nested tables
    /// stay inside their cell). Spanning cells keep their text in the first
    /// spanned position; the other positions are empty.
    fn table_rows(&self, table: &Handle, ctx: Ctx) -> Vec<Vec<String>> {
        let trs = table_row_elements(table);
        let cell_ctx = Ctx {
            cell: true,
            inline: false,
            pre: false,
            ..ctx
        };

        let cells: Vec<Vec<Handle>> = trs
            .iter()
            .map(|tr| {
                dom::child_elements(tr)
                    .into_iter()
                    .filter(|c| matches!(dom::tag_name(c), Some("td") | Some("th")))
                    .collect()
            })
            .collect();
        let width_limit = cells
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(MAX_SPAN_COLUMNS);

        let mut rows = Vec::with_capacity(trs.len());
        // Rows still to be covered by a rowspan, per column.
        let mut carry: Vec<usize> = Vec::new();

        for (r, tr_cells) in cells.iter().enumerate() {
            let rows_left = trs.len() - r;
            let mut row: Vec<String> = Vec::new();

            for (i, cell) in tr_cells.iter().enumerate() {
                skip_carried(&mut row, &mut carry);

                let col = row.len();
                // Leave room for the real cells still to come in this row.
                let room = width_limit.saturating_sub(col + tr_cells.len() - i - 1);
                let colspan = span(cell, "colspan", room);
                let rowspan = span(cell, "rowspan", rows_left);
                row.push(self.children(cell, cell_ctx).trim().to_string());
                row.extend(std::iter::repeat_n(String::new(), colspan - 1));

                if carry.len() < col + colspan {
                    carry.resize(col + colspan, 0);
                }
                for c in &mut carry[col..col + colspan] {
                    *c = rowspan - 1;
                }
            }

            if let Some(last) = carry.iter().rposition(|&n| n > 0) {
                while row.len() <= last {
                    let col = row.len();
                    if carry[col] > 0 {
                        carry[col] -= 1;
                    }
                    row.push(String::new());
                }
            }
            rows.push(row);
        }
        rows
    }
}

/// Output of the flow walk: finished blocks plus the text being gathered.
#[derive(Default)]
struct Flow {
    blocks: Vec<Block>,
    buf: String,
}

impl Flow {
    fn flush(&mut self) {
        let text = tidy_lines(&std::mem::take(&mut self.buf));
        let text = text.trim();
        if !text.is_empty() {
            self.blocks.push(Block::Text(text.to_string()));
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Append `s`, dropping its leading spaces when `out` already ends in
/// whitespace. An empty `out` keeps them: the caller decides (blocks trim,
/// inline markers move them outside the marker).
fn push(out: &mut String, s: &str) {
    if out.ends_with(|c: char| c.is_ascii_whitespace()) {
        out.push_str(s.trim_start_matches(' '));
    } else {
        out.push_str(s);
    }
}

fn block(out: &mut String, inner: &str, ctx: Ctx) {
    if inner.is_empty() {
        return;
    }
    if ctx.inline {
        push(out, &format!(" {inner} "));
    } else {
        out.push_str(&format!("\n\n{inner}\n\n"));
    }
}

/// Trim line ends and squeeze runs of blank lines into one.
fn tidy_lines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank = false;
    for line in s.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if blank {
                continue;
            }
            blank = true;
        } else {
            blank = false;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn indent(text: &str, pad: &str) -> String {
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("{pad}{l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse ASCII whitespace runs to one space, keeping edge spaces.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut space = false;
    for ch in s.chars() {
        if ch.is_ascii_whitespace() {
            space = true;
        } else {
            if space {
                out.push(' ');
                space = false;
            }
            out.push(ch);
        }
    }
    if space {
        out.push(' ');
    }
    out
}

/// Backslash-escape text that Markdown would read as markup: emphasis
/// markers, raw HTML, character references and backslashes themselves.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, ch) in s.char_indices() {
        let escape = match ch {
            '\\' | '*' | '_' | '<' => true,
            '&' => RE_ENTITY.is_match(&s[i..]),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek().filter(|&&c| matches!(c, '\\' | '*' | '_' | '<' | '&')) {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Split `s` into (leading space, trimmed core, trailing space).
fn chomp(s: &str) -> (&'static str, &str, &'static str) {
    let lead = if s.starts_with(|c: char| c.is_ascii_whitespace()) { " " } else { "" };
    let trail = if s.ends_with(|c: char| c.is_ascii_whitespace()) { " " } else { "" };
    (lead, s.trim(), trail)
}

/// Text of a `<pre>`/`<code>` subtree with `<br>` kept as newlines.
fn pre_text(node: &Handle) -> String {
    fn walk(node: &Handle, out: &mut String) {
        match node.data {
            NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
            NodeData::Element { ref name, .. } if &*name.local == "br" => out.push('\n'),
            _ => {
                for child in node.children.borrow().iter() {
                    walk(child, out);
                }
            }
        }
    }
    let mut out = String::new();
    walk(node, &mut out);
    out
}

fn longest_run(s: &str, ch: char) -> usize {
    let mut best = 0;
    let mut run = 0;
    for c in s.chars() {
        if c == ch {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

fn inline_code(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let fence = "`".repeat(longest_run(text, '`') + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// Language of a code block: `language-*`/`lang-*` classes on the `pre` or
/// its single `code` child, or a Confluence `brush:` parameter.
fn code_language(pre: &Handle) -> Option<String> {
    let mut candidates = vec![pre.clone()];
    candidates.extend(
        dom::child_elements(pre)
            .into_iter()
            .filter(|c| dom::is_element(c, "code")),
    );
    for node in &candidates {
        for class in dom::classes(node) {
            if let Some(lang) = class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
            {
                if !lang.is_empty() {
                    return Some(lang.to_string());
                }
            }
        }
        if let Some(params) = dom::attr(node, "data-syntaxhighlighter-params") {
            let brush = params
                .split(';')
                .filter_map(|p| p.trim().strip_prefix("brush:"))
                .map(str::trim)
                .find(|b| !b.is_empty());
            if let Some(brush) = brush {
                return Some(brush.to_string());
            }
        }
    }
    None
}

/// URL scheme, if `href` has one (`javascript:`, `https:` ...).
fn scheme(href: &str) -> Option<&str> {
    let colon = href.find(':')?;
    let candidate = &href[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    (first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
    .then_some(candidate)
}

/// Percent-encode `href` so it survives inside `[text](href)`: the path is
/// strictly encoded, the query and fragment only lose spaces, parentheses and
/// non-ASCII. Scheme, authority and existing `%XX` escapes are kept.
fn escape_href(href: &str) -> String {
    let mut path_start = 0;
    if let Some(s) = scheme(href) {
        path_start = s.len() + 1;
        if href[path_start..].starts_with("//") {
            let auth = &href[path_start + 2..];
            path_start += 2 + auth.find(['/', '?', '#']).unwrap_or(auth.len());
        }
    }
    let path_end = href[path_start..]
        .find(['?', '#'])
        .map_or(href.len(), |i| path_start + i);

    let mut out = String::with_capacity(href.len() + 8);
    out.push_str(&href[..path_start]);
    for ch in href[path_start..path_end].chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '/' | '-' | '_' | '.' | '~' | '%') {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }
    // Query and fragment keep their delimiters; only what breaks a link goes.
    for ch in href[path_end..].chars() {
        if ch.is_ascii_graphic() && !matches!(ch, '(' | ')' | '<' | '>' | '"') {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }
    out
}

/// The table's own rows, in document order across `thead`/`tbody`/`tfoot`.
fn table_row_elements(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    for child in dom::child_elements(table) {
        match dom::tag_name(&child) {
            Some("tr") => rows.push(child),
            Some("thead") | Some("tbody") | Some("tfoot") => rows.extend(
                dom::child_elements(&child)
                    .into_iter()
                    .filter(|r| dom::is_element(r, "tr")),
            ),
            _ => {}
        }
    }
    rows
}

/// Advance past columns still covered by a rowspan from an earlier row.
fn skip_carried(row: &mut Vec<String>, carry: &mut [usize]) {
    while let Some(n) = carry.get_mut(row.len()) {
        if *n == 0 {
            break;
        }
        *n -= 1;
        row.push(String::new());
    }
}

/// `colspan`/`rowspan` value clamped to `1..=max`.
fn span(cell: &Handle, name: &str, max: usize) -> usize {
    dom::attr(cell, name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max.max(1))
}

// ── Tests ────────────────────────────────────────────────────────────────────
