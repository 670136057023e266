//! CLI binary for edgequake-html2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_html2md::convert::{read_html, resolve_output_path, write_atomic};
use edgequake_html2md::{
    convert_html, sanitize_html, ConversionConfig, FallbackPolicy, IdPattern, NestedTableJoin,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert an exported Confluence page (stdout)
  html2md page.html

  # Write <title>.md into a directory
  html2md page.html -o notes/

  # Read from stdin, explicit output file and title
  cat page.html | html2md - -o out.md --title "Team Notes"

  # Convert from URL
  html2md https://wiki.example.com/export/page.html -o page.md

  # Generic page without a content container: fail instead of converting <body>
  html2md --fallback fail page.html

  # Other layouts: content in <main id="article-body">, no trailer
  html2md --content-id article-body --exact-ids --no-trailer page.html

  # Nested tables rendered on separate lines (GFM renderers)
  html2md --nested-join line-break page.html

  # Inspect the sanitized HTML the converter sees
  html2md --emit-html page.html

  # JSON output with title, filename and stats
  html2md --json page.html > output.json

ENVIRONMENT VARIABLES:
  Every flag can also be set through HTML2MD_<FLAG>, e.g. HTML2MD_MAX_SIZE.
  RUST_LOG overrides the log filter chosen by -v / -q.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "html2md",
    version,
    about = "Convert exported HTML pages to clean Markdown",
    long_about = "Convert an HTML document (local file, stdin or URL) to clean Markdown. \
Keeps only the page's content container, strips styles, scripts, diagrams and inline images, \
and repairs every table into a rectangular, renderable pipe table.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTML file path, `-` for stdin, or an HTTP/HTTPS URL.
    input: String,

    /// Output file, or a directory to write `<title>.md` into.
    #[arg(short, long, env = "HTML2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Document title; overrides the first heading and the HTML <title>.
    #[arg(long, env = "HTML2MD_TITLE")]
    title: Option<String>,

    /// Maximum input size in bytes (suffixes k, m, KiB, MiB accepted).
    #[arg(long, env = "HTML2MD_MAX_SIZE", default_value = "10MiB", value_parser = parse_size)]
    max_size: u64,

    /// Id of the element holding the main content.
    #[arg(long, env = "HTML2MD_CONTENT_ID", default_value = "content")]
    content_id: String,

    /// Match ids exactly instead of by prefix.
    #[arg(long, env = "HTML2MD_EXACT_IDS")]
    exact_ids: bool,

    /// Id of the element where the main content stops.
    #[arg(long, env = "HTML2MD_TRAILER_ID", default_value = "likes-and-labels-container")]
    trailer_id: String,

    /// Do not truncate the content at a trailer element.
    #[arg(long, env = "HTML2MD_NO_TRAILER")]
    no_trailer: bool,

    /// What to do when no content container exists.
    #[arg(long, env = "HTML2MD_FALLBACK", value_enum, default_value = "body")]
    fallback: FallbackArg,

    /// Separator between the rows of a flattened nested table.
    #[arg(long, env = "HTML2MD_NESTED_JOIN", value_enum, default_value = "semicolon")]
    nested_join: NestedJoinArg,

    /// Print the conversion result as JSON (markdown, title, filename, stats).
    #[arg(long, env = "HTML2MD_JSON")]
    json: bool,

    /// Print the extracted, sanitized HTML instead of converting it.
    #[arg(long, env = "HTML2MD_EMIT_HTML")]
    emit_html: bool,

    #[arg(short, long, env = "HTML2MD_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "HTML2MD_QUIET")]
    quiet: bool,

    /// Timeout for URL inputs, in seconds.
    #[arg(long, env = "HTML2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FallbackArg {
    Body,
    Fail,
}

impl From<FallbackArg> for FallbackPolicy {
    fn from(v: FallbackArg) -> Self {
        match v {
            FallbackArg::Body => FallbackPolicy::WholeBody,
            FallbackArg::Fail => FallbackPolicy::Fail,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum NestedJoinArg {
    Semicolon,
    LineBreak,
}

impl From<NestedJoinArg> for NestedTableJoin {
    fn from(v: NestedJoinArg) -> Self {
        match v {
            NestedJoinArg::Semicolon => NestedTableJoin::Semicolon,
            NestedJoinArg::LineBreak => NestedTableJoin::LineBreak,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let html = read_html(&cli.input, &config)
        .await
        .with_context(|| format!("Failed to read {}", cli.input))?;

    if cli.emit_html {
        let sanitized = sanitize_html(&html, &config).context("Extraction failed")?;
        println!("{sanitized}");
        return Ok(());
    }

    let output = convert_html(&html, cli.title.as_deref(), &config).context("Conversion failed")?;

    if let Some(ref output_arg) = cli.output {
        let path = resolve_output_path(output_arg, &output.filename).await;
        write_atomic(&path, &output.markdown)
            .await
            .context("Failed to write output")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output.stats).context("Failed to serialise stats")?;
            println!("{json}");
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} table(s)  {}ms  →  {}",
                if output.stats.used_fallback {
                    yellow("⚠")
                } else {
                    green("✔")
                },
                output.stats.tables,
                output.stats.duration_ms,
                bold(&path.display().to_string()),
            );
            eprintln!(
                "   {} node(s) removed  /  {} style attribute(s) dropped",
                dim(&output.stats.nodes_removed.to_string()),
                dim(&output.stats.attributes_scrubbed.to_string()),
            );
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !cli.quiet {
            eprintln!(
                "{} {}  {}",
                green("✔"),
                bold(&output.filename),
                dim(&format!("{}ms", output.stats.duration_ms)),
            );
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let pattern = |id: &str| {
        if cli.exact_ids {
            IdPattern::Exact(id.to_string())
        } else {
            IdPattern::Prefix(id.to_string())
        }
    };
    let trailer = (!cli.no_trailer).then(|| pattern(&cli.trailer_id));

    ConversionConfig::builder()
        .max_input_bytes(cli.max_size)
        .content_container(pattern(&cli.content_id))
        .trailer(trailer)
        .fallback(cli.fallback.into())
        .nested_table_join(cli.nested_join.into())
        .download_timeout_secs(cli.download_timeout)
        .build()
        .context("Invalid configuration")
}

/// Parse `--max-size`: a byte count with an optional `k`/`m` (1000-based) or
/// `KiB`/`MiB` (1024-based) suffix.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{s}': expected a number of bytes"))?;
    let factor: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "kib" => 1024,
        "mib" => 1024 * 1024,
        other => return Err(format!("unknown size unit '{other}'")),
    };
    value
        .checked_mul(factor)
        .filter(|&n| n > 0)
        .ok_or_else(|| format!("size '{s}' must be between 1 byte and {} bytes", u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_units() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("2k").unwrap(), 2_000);
        assert_eq!(parse_size("10MiB").unwrap(), 10 * 1024 * 1024);
        assert!(parse_size("0").is_err());
        assert!(parse_size("ten").is_err());
        assert!(parse_size("5GiB").is_err());
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "html2md",
            "page.html",
            "--content-id",
            "main",
            "--exact-ids",
            "--no-trailer",
            "--fallback",
            "fail",
            "--nested-join",
            "line-break",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.content_container, IdPattern::Exact("main".into()));
        assert_eq!(config.trailer, None);
        assert_eq!(config.fallback, FallbackPolicy::Fail);
        assert_eq!(config.nested_table_join, NestedTableJoin::LineBreak);
    }
}
