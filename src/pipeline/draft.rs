//! The intermediate Markdown draft produced by the converter.
//!
//! Tables found at flow level are kept as typed rows rather than text, so the
//! normalizer never has to re-discover their boundaries. Everything else is
//! already-rendered Markdown.

/// Ordered Markdown blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownDraft {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Rendered Markdown (paragraphs, headings, lists, code...).
    Text(String),
    /// A table whose cells may still hold multi-line text, nested tables,
    /// or unescaped pipes until the normalizer has run.
    Table(TableBlock),
}

/// Rows of cell text. The first row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableBlock {
    pub rows: Vec<Vec<String>>,
}

impl MarkdownDraft {
    /// True when no block carries any visible text.
    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|b| match b {
            Block::Text(t) => t.trim().is_empty(),
            Block::Table(t) => t.rows.iter().flatten().all(|c| c.trim().is_empty()),
        })
    }

    pub fn table_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Table(_)))
            .count()
    }

    /// Join the blocks into one Markdown string, blank-line separated.
    pub fn to_markdown(&self) -> String {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Text(t) => t.trim_matches('\n').to_string(),
                Block::Table(t) => t.render(""),
            })
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl TableBlock {
    /// Widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.column_count() == 0
    }

    /// Render as pipe rows, each line starting with `prefix`, with a `---`
    /// separator after the header.
    ///
    /// Cells are written as-is; call `normalize` first for a well-formed
    /// table.
    pub fn render(&self, prefix: &str) -> String {
        let width = self.column_count();
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        for (i, row) in self.rows.iter().enumerate() {
            lines.push(format!("{prefix}| {} |", row.join(" | ")));
            if i == 0 {
                let sep = vec!["---"; width.max(1)].join(" | ");
                lines.push(format!("{prefix}| {sep} |"));
            }
        }
        lines.join("\n")
    }
}
