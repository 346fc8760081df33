use once_cell::sync::Lazy;
use regex::Regex;

use crate::report::{Category, LineRef, Report};

/// Marker prepended and appended to the file so real line numbers and
/// vector indices both start at 1. All-lowercase, no `--`, shorter than any
/// sane line limit, so no per-line rule can fire on it.
pub(crate) const SENTINEL: &str = "// marker so indices and line numbers both start at 1";

/// Escape sequences are removed before strings are collapsed, so an escaped
/// quote cannot terminate a literal early.
static ESCAPES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\\([abfnrtv?"\\']|\d+|x[0-9a-fA-F]+)"#).unwrap());

/// First quote character on the remainder of a line.
static FIRST_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^([^'"]*)(['"])(.*)$"#).unwrap());

/// Three parallel views of every line of a file.
///
/// * `raw` is the file verbatim (with the sentinels, and multi-line block
///   comments already blanked to `/**/`).
/// * `lines` has `--` comments removed and trailing whitespace trimmed.
/// * `elided` additionally has string literals collapsed to `""`.
///
/// All three have the same length. Rules that must ignore string contents
/// consult `elided`; whitespace rules consult `raw`; everything else uses
/// `lines`.
pub(crate) struct CleansedLines {
    pub(crate) raw: Vec<String>,
    pub(crate) lines: Vec<String>,
    pub(crate) elided: Vec<String>,
}

impl CleansedLines {
    pub(crate) fn new(raw: Vec<String>) -> Self {
        let mut lines = Vec::with_capacity(raw.len());
        let mut elided = Vec::with_capacity(raw.len());
        for line in &raw {
            let cleansed = cleanse_comments(line);
            let collapsed = collapse_strings(&cleansed);
            elided.push(cleanse_comments(&collapsed));
            lines.push(cleansed);
        }
        CleansedLines { raw, lines, elided }
    }

    pub(crate) fn num_lines(&self) -> usize {
        self.raw.len()
    }
}

/// Whether the next character appended to `prefix` would be inside a string
/// literal. `--` pairs are masked first so a quote inside a comment marker
/// cannot confuse the count.
fn is_in_string(prefix: &str) -> bool {
    let masked = prefix.replace("--", "XX");
    let quotes = masked.matches('"').count();
    let escaped = masked.matches("\\\"").count();
    let char_quote = masked.matches("'\"'").count();
    (quotes - escaped.min(quotes) - char_quote.min(quotes)) % 2 == 1
}

/// Strips the `--` comment (if its marker is outside a string literal) and
/// any single-line `/* ... */` spans, right-trimming the result.
fn cleanse_comments(line: &str) -> String {
    let mut line = line.to_string();
    let mut search_from = 0;
    while let Some(rel) = line[search_from..].find("--") {
        let pos = search_from + rel;
        if is_in_string(&line[..pos]) {
            search_from = pos + 2;
            continue;
        }
        line = line[..pos].trim_end().to_string();
        break;
    }
    strip_inline_block_comments(&line)
}

/// Removes complete `/* ... */` spans from a single line, normalizing the
/// surrounding whitespace: a comment that ends the line is dropped with its
/// leading spaces; a comment followed by whitespace swallows that
/// whitespace; a comment wedged between tokens is simply removed.
fn strip_inline_block_comments(line: &str) -> String {
    let mut out = line.to_string();
    while let Some(start) = out.find("/*") {
        let Some(rel_end) = out[start + 2..].find("*/") else {
            break;
        };
        let end = start + 2 + rel_end + 2;

        let before = &out[..start];
        let after = &out[end..];
        out = if after.trim().is_empty() {
            before.trim_end().to_string()
        } else if after.starts_with(char::is_whitespace) {
            format!("{}{}", before, after.trim_start())
        } else if before.ends_with(char::is_whitespace)
            && after
                .chars()
                .next()
                .map(|c| !c.is_alphanumeric() && c != '_')
                .unwrap_or(false)
        {
            format!("{}{}", before.trim_end(), after)
        } else {
            format!("{}{}", before, after)
        };
    }
    out
}

/// Collapses double-quoted string literals to `""`.
///
/// Character literals are deliberately left alone: a single quote is
/// ambiguous with attribute ticks (`clk'event`), so collapsing them would
/// blind the downstream regexes.
fn collapse_strings(line: &str) -> String {
    let mut elided = ESCAPES.replace_all(line, "").into_owned();
    let mut collapsed = String::with_capacity(elided.len());
    loop {
        let Some(caps) = FIRST_QUOTE.captures(&elided) else {
            collapsed.push_str(&elided);
            break;
        };
        let head = caps.get(1).unwrap().as_str();
        let quote = caps.get(2).unwrap().as_str();
        let tail = caps.get(3).unwrap().as_str();

        if quote == "\"" {
            match tail.find('"') {
                Some(second) => {
                    collapsed.push_str(head);
                    collapsed.push_str("\"\"");
                    elided = tail[second + 1..].to_string();
                }
                None => {
                    // Unmatched double quote; probably a multiline string,
                    // leave the rest of the line as-is.
                    collapsed.push_str(&elided);
                    break;
                }
            }
        } else {
            collapsed.push_str(&elided);
            break;
        }
    }
    collapsed
}

fn find_next_block_comment_start(lines: &[String], mut ix: usize) -> usize {
    while ix < lines.len() {
        let trimmed = lines[ix].trim();
        if trimmed.starts_with("/*") && !trimmed[2..].contains("*/") {
            return ix;
        }
        ix += 1;
    }
    lines.len()
}

fn find_next_block_comment_end(lines: &[String], mut ix: usize) -> usize {
    while ix < lines.len() {
        if lines[ix].trim_end().ends_with("*/") {
            return ix;
        }
        ix += 1;
    }
    lines.len()
}

/// Blanks multi-line `/* ... */` comments to `/**/` so the spanned lines are
/// non-empty (keeping the blank-line rules honest) but carry no tokens.
/// An opener with no close before EOF is a diagnostic, and scanning stops.
pub(crate) fn remove_multiline_comments(filename: &str, lines: &mut [String], report: &mut Report) {
    let mut ix = 0;
    while ix < lines.len() {
        let begin = find_next_block_comment_start(lines, ix);
        if begin >= lines.len() {
            return;
        }
        let end = find_next_block_comment_end(lines, begin);
        if end >= lines.len() {
            report.emit(
                filename,
                Category::MultilineComment,
                5,
                LineRef::only_line(begin),
                "Could not find end of multi-line comment",
            );
            return;
        }
        for line in lines.iter_mut().take(end + 1).skip(begin) {
            *line = "/**/".to_string();
        }
        ix = end + 1;
    }
}
