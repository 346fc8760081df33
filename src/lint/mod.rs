//! The analysis engine: line cleansing, symbol tracking, region detection
//! and the rule library, driven once per file.

pub(crate) mod cleanse;
pub(crate) mod decl;
pub(crate) mod expr;
pub(crate) mod idents;
pub(crate) mod regions;
pub(crate) mod rules;
pub(crate) mod symbols;

use std::fs;
use std::io;
use std::io::prelude::*;

use ahash::AHashSet;

use crate::config;
use crate::report::{Category, LineRef, Report};
use cleanse::CleansedLines;
use symbols::SymbolTable;

/// Options controlling the per-file analysis.
#[derive(Debug, Clone)]
pub struct Options {
    /// The allowed line length.
    pub line_length: usize,

    /// File extensions that will be checked (dot not included).
    pub extensions: Vec<String>,

    /// The `--root` subdirectory, also settable per directory in
    /// `VHDLLINT.cfg`. Accepted for interface compatibility.
    pub root: Option<std::path::PathBuf>,

    /// The `--repository` path. Accepted for interface compatibility.
    pub repository: Option<std::path::PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            line_length: 80,
            extensions: vec!["vhd".to_string(), "vhdl".to_string()],
            root: None,
            repository: None,
        }
    }
}

/// Checks VHDL source files and reports diagnostics into a [`Report`].
///
/// A `Linter` holds only configuration; all analysis state lives in a fresh
/// per-file context, so one instance can process any number of files (and
/// the library can be used without process-wide state).
#[derive(Debug, Default)]
pub struct Linter {
    /// The active options. Per-directory configuration files override some
    /// of these for the duration of one file.
    pub options: Options,
}

impl Linter {
    /// Creates a linter from `options`.
    pub fn new(options: Options) -> Self {
        Linter { options }
    }

    /// Lints one file (or stdin, when `filename` is `-`), honoring
    /// per-directory `VHDLLINT.cfg` overrides and the configured extension
    /// list. Unreadable files are reported as tool errors and skipped.
    pub fn process_file(&mut self, filename: &str, report: &mut Report) -> io::Result<()> {
        report.backup_filters();
        let saved_line_length = self.options.line_length;
        let saved_extensions = self.options.extensions.clone();
        let old_errors = report.error_count();

        let restore = |linter: &mut Self, report: &mut Report| {
            linter.options.line_length = saved_line_length;
            linter.options.extensions = saved_extensions.clone();
            report.restore_filters();
        };

        if !config::process_overrides(filename, &mut self.options, report) {
            restore(self, report);
            return Ok(());
        }
        log::debug!("processing file {}", filename);

        let bytes = if filename == "-" {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf).map(|_| buf)
        } else {
            fs::read(filename)
        };
        let source = match bytes {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => {
                report.tool_error(&format!(
                    "Skipping input '{}': Can't open for reading\n",
                    filename
                ));
                restore(self, report);
                return Ok(());
            }
        };

        let extension = filename.rsplit('.').next().unwrap_or(filename);
        if filename != "-" && !self.options.extensions.iter().any(|e| e == extension) {
            report.tool_error(&format!(
                "Ignoring {}; not a valid file name ({})\n",
                filename,
                self.options.extensions.join(", ")
            ));
        } else {
            self.process_source(filename, &source, report);
        }

        if !report.quiet() || old_errors != report.error_count() {
            report.info(&format!("Done processing {}\n", filename));
        }
        restore(self, report);
        Ok(())
    }

    /// Runs the full analysis over in-memory source text. This is the whole
    /// per-file pipeline minus config discovery and the extension gate.
    pub fn process_source(&mut self, filename: &str, source: &str, report: &mut Report) {
        let mut lines: Vec<String> = source.split('\n').map(String::from).collect();

        // The file was split on bare newlines; mixed CR-LF shows up as a
        // trailing carriage return.
        let mut crlf_lines = Vec::new();
        let mut lf_lines = Vec::new();
        let real_lines = lines.len().saturating_sub(1);
        for (i, line) in lines.iter_mut().enumerate().take(real_lines) {
            if line.ends_with('\r') {
                let stripped = line.trim_end_matches('\r').len();
                line.truncate(stripped);
                crlf_lines.push(i + 1);
            } else {
                lf_lines.push(i + 1);
            }
        }

        self.run(filename, lines, report);

        if !lf_lines.is_empty() && !crlf_lines.is_empty() {
            for line in crlf_lines {
                report.emit(
                    filename,
                    Category::Newline,
                    1,
                    LineRef::only_line(line),
                    "Unexpected \\r (^M) found; better to use only \\n",
                );
            }
        }
    }

    fn run(&mut self, filename: &str, file_lines: Vec<String>, report: &mut Report) {
        let mut lines = Vec::with_capacity(file_lines.len() + 2);
        lines.push(cleanse::SENTINEL.to_string());
        lines.extend(file_lines);
        lines.push(cleanse::SENTINEL.to_string());

        report.reset_suppressions();
        rules::check_for_header(filename, &lines, report);
        rules::check_for_copyright(filename, &lines, report);
        cleanse::remove_multiline_comments(filename, &mut lines, report);
        let clean = CleansedLines::new(lines);

        for l in 0..clean.num_lines() {
            report.parse_nolint(filename, &clean.raw[l], l);
        }

        {
            let mut checker = Checker {
                filename,
                lines: &clean,
                symbols: SymbolTable::new(),
                process_drivers: AHashSet::new(),
                line_length: self.options.line_length,
                report,
            };
            for l in 0..clean.num_lines() {
                checker.process_line(l);
            }
            checker.check_unused_identifiers();
            debug_assert_eq!(checker.symbols.scope_depth(), 0);
        }

        rules::check_for_bad_characters(filename, &clean.raw, report);
        rules::check_for_newline_at_eof(filename, &clean.raw, report);
    }
}

/// Per-file analysis context, threaded through every rule. Created fresh
/// for each file.
pub(crate) struct Checker<'a> {
    pub(crate) filename: &'a str,
    pub(crate) lines: &'a CleansedLines,
    pub(crate) symbols: SymbolTable,
    /// Signals written by any process so far, case-folded.
    pub(crate) process_drivers: AHashSet<String>,
    pub(crate) line_length: usize,
    pub(crate) report: &'a mut Report,
}

impl Checker<'_> {
    fn process_line(&mut self, line: usize) {
        self.check_style(line);
        self.check_used_packages(line);
        self.check_entities(line);
        self.check_architectures(line);
        self.check_packages(line);
        self.check_package_bodies(line);
        self.check_line_length(line);
        self.check_for_others(line);
        self.check_time_units(line);
        self.check_reserved_words(line);
        self.check_latches(line);
        self.check_booleans(line);
        self.check_comment(line);
    }

    pub(crate) fn warn_identifier_case(&mut self, name: &str, lineref: LineRef) {
        let message = format!(
            "Invalid capitalization on '{}'. Non-constant identifiers should use all lower case.",
            name
        );
        self.report
            .emit(self.filename, Category::Identifiers, 1, lineref, &message);
    }

    pub(crate) fn add_other_checked(&mut self, name: &str, lineref: LineRef) {
        self.symbols.add_other(name, lineref);
        if !is_all_lower(name) {
            self.warn_identifier_case(name, lineref);
        }
    }

    pub(crate) fn add_referenced_checked(&mut self, name: &str, lineref: LineRef, enforce_caps: bool) {
        self.symbols.add_referenced(name, lineref);
        if enforce_caps && !is_all_lower(name) {
            self.warn_identifier_case(name, lineref);
        }
    }

    pub(crate) fn add_local_checked(
        &mut self,
        name: &str,
        stype: &str,
        init: Option<&str>,
        lineref: LineRef,
        is_constant: bool,
    ) {
        self.symbols.add_local(name, stype, init, lineref, is_constant);
        if !is_constant && !is_all_lower(name) {
            self.warn_identifier_case(name, lineref);
        }
    }

    /// Closes the innermost scope, reporting its never-referenced locals.
    pub(crate) fn pop_scope_and_report(&mut self) {
        for (name, lineref) in self.symbols.pop_scope() {
            let message = format!("Unused local identifier '{}'.", name);
            self.report
                .emit(self.filename, Category::Unused, 2, lineref, &message);
        }
    }
}

/// Has at least one letter and none of them upper-case.
pub(crate) fn is_all_lower(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && !name.chars().any(|c| c.is_uppercase())
}

/// Has at least one letter and none of them lower-case.
pub(crate) fn is_all_upper(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && !name.chars().any(|c| c.is_lowercase())
}
