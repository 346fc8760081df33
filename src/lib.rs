//! vhdllint is a style and correctness checker for VHDL source files. It is
//! a Rust rendition of the Google-lineage `vhdllint` linter, which itself
//! grew out of the cpplint family of tools.
//!
//! The checker scans source files with regex-level heuristics; there is no
//! parser and no elaboration. Every diagnostic carries a hierarchical
//! category ("runtime/sensitivity", "whitespace/tab", ...) and a confidence
//! score from 1 (could be legitimate) to 5 (certain), and can be suppressed
//! with an inline `NOLINT(category)` comment.
//!
//! # Command-line use
//!
//! ```console
//! $ vhdllint --verbose=3 rtl/*.vhd
//! ```
//!
//! See `vhdllint --help` for the output formats (emacs, eclipse, vs7,
//! junit, sed) and the filter syntax.
//!
//! # Programmatic use
//!
//! ```no_run
//! use vhdllint::lint::Linter;
//! use vhdllint::report::Report;
//!
//! # fn main() -> std::io::Result<()> {
//! let mut report = Report::new(Default::default())?;
//! let mut linter = Linter::default();
//! linter.process_file("core.vhd", &mut report)?;
//! report.summarize();
//! report.flush(&mut std::io::stdout(), &mut std::io::stderr())?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

mod config;

/// The analysis engine.
pub mod lint;

/// Diagnostic categories, filtering, NOLINT suppression and output formats.
pub mod report;
