use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::symbols::{is_reserved_word, IdentKind, PortMode};
use super::Checker;
use crate::report::{Category, LineRef};

/// An identifier use: `abc`, `abc(0)`, `abc.xyz(0)`.
pub(crate) const IDENT_USE: &str = r"((\w[\w\.]*)(\s*\(.*?\))?)";

/// Packages that must not be used; `ieee.numeric_std` replaces them.
const PACKAGES_DEPRECATED: &[&str] = &["std_logic_arith", "std_logic_signed", "std_logic_unsigned"];

static LIBRARY_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\blibrary\b\s+(.*?);").unwrap());
static USE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*\buse\b\s+(.*?);").unwrap());

/// Words outside quoted literals.
static WORDS_OUTSIDE_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|'[^']*'|(\w+)"#).unwrap());

static WORDLIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\w']+\b").unwrap());

static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^.*?{}\s*[<:]=(.*);", IDENT_USE)).unwrap());

static EQUALITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"((\w+)\s*(/?=)\s*(\w+))").unwrap());

static IF_CONDITION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(if|elsif)\b(.*?)\bthen\b").unwrap());

static WHEN_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*?\b\w+\b\s*[<:]=\s*((.*?)\s*\bwhen\b\s*(.*?)\s*(\belse\b\s*(.*?)\s*)?)+;")
        .unwrap()
});
static WHEN_CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bwhen\b\s*(.*?)\s*(\belse\b|;)").unwrap());

static ASSERT_CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\bassert\b\s+(.*?)\s+(report|$)").unwrap());

static ARITHMETIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"({iu}\s*(\+|\-|\*|/)\s*{iu})",
        iu = IDENT_USE
    ))
    .unwrap()
});

/// Quoted literals and operator expressions are consumed so only bare
/// identifier uses fall through to the last alternative.
static BARE_OPERAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"["'].*?["']|.+?\s*(<=|>=|<|>|=|/=|\+|\-|\*|/)\s*.+|{}"#,
        IDENT_USE
    ))
    .unwrap()
});

/// Signals written and read by one line, split on `<=`/`:=`.
#[derive(Debug, Default)]
pub(crate) struct UsedVariables {
    pub(crate) write: BTreeSet<String>,
    pub(crate) read: BTreeSet<String>,
    pub(crate) is_assign: bool,
}

impl Checker<'_> {
    /// Computes the signal identifiers written and read by `line`.
    pub(crate) fn find_used_variables(&self, line: &str) -> UsedVariables {
        let mut used = UsedVariables::default();
        let read_text;
        if let Some(caps) = ASSIGNMENT.captures(line) {
            let lhs = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            for word in WORDLIKE.find_iter(lhs) {
                if self.symbols.is_signal(word.as_str()) {
                    used.write.insert(word.as_str().to_string());
                }
            }
            read_text = caps.get(4).map(|m| m.as_str()).unwrap_or_default().to_string();
            used.is_assign = true;
        } else {
            read_text = line.to_string();
        }
        for word in WORDLIKE.find_iter(&read_text) {
            if self.symbols.is_signal(word.as_str()) {
                used.read.insert(word.as_str().to_string());
            }
        }
        used
    }

    /// Marks every known identifier mentioned in `text` as referenced and
    /// flags uses whose casing differs from the declaration.
    pub(crate) fn check_identifiers_string(&mut self, text: &str, line_num: usize) {
        for caps in WORDS_OUTSIDE_QUOTES.captures_iter(text) {
            let Some(word) = caps.get(1) else {
                continue;
            };
            let word = word.as_str();
            let Some(id) = self.symbols.lookup(word) else {
                continue;
            };
            self.symbols.inc_refs(id);
            let ident = self.symbols.get(id);
            log::debug!("detected reference of identifier '{}' on line {}", word, line_num);
            if word != ident.name {
                let message = format!(
                    "Inconsistent capitalization on identifier '{}'. Declared as '{}' on line {}",
                    word, ident.name, ident.lineref.line
                );
                let lineref = LineRef::from_str(line_num, text, word);
                self.report.emit(
                    self.filename,
                    Category::Capitalization,
                    1,
                    lineref,
                    &message,
                );
            }
        }
    }

    /// Identifier-use pass for one line of the comment-stripped view.
    pub(crate) fn check_identifiers(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();
        self.check_identifiers_string(&line, line_num);

        let used = self.find_used_variables(&line);
        if used.is_assign {
            self.check_read_identifiers(line_num, &used.read);
        }
    }

    /// Reading an `out` port on the right-hand side is a VHDL-2008-ism.
    pub(crate) fn check_read_identifiers(&mut self, line_num: usize, read_vars: &BTreeSet<String>) {
        let line = self.lines.lines[line_num].clone();
        for r in read_vars {
            let Some(id) = self.symbols.typed(r) else {
                continue;
            };
            if let IdentKind::Port(_, PortMode::Out) = self.symbols.get(id).kind {
                let lineref = LineRef::from_str(line_num, &line, r);
                self.report.emit(
                    self.filename,
                    Category::Vhdl2008Outputs,
                    4,
                    lineref,
                    &format!("Avoid VHDL2008 reading of output port on '{}'.", r),
                );
            }
        }
    }

    /// Rules for the condition of an `if`/`elsif`/`when`/`assert`.
    pub(crate) fn check_condition(&mut self, line_num: usize, cond: &str) {
        let line = self.lines.lines[line_num].clone();

        // Arithmetic on signals inside a condition usually belongs in a
        // separate assignment where the synthesized adder is visible.
        for caps in ARITHMETIC.captures_iter(cond) {
            let expr = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let w1 = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let w2 = caps.get(6).map(|m| m.as_str()).unwrap_or_default();
            if self.symbols.is_signal_or_variable(w1) || self.symbols.is_signal_or_variable(w2) {
                let lineref = LineRef::from_str(line_num, &line, expr);
                self.report.emit(
                    self.filename,
                    Category::Arithmetic,
                    4,
                    lineref,
                    "Avoid arithmetic operations on signals in conditional checks.",
                );
            }
        }

        // A bare identifier as a whole condition only works for booleans
        // before VHDL-2008.
        for caps in BARE_OPERAND.captures_iter(cond) {
            let Some(word) = caps.get(3) else {
                continue;
            };
            let word = word.as_str();
            let Some(id) = self.symbols.typed(word) else {
                continue;
            };
            let boolean = self
                .symbols
                .get(id)
                .type_info()
                .map(|t| t.is_boolean())
                .unwrap_or(false);
            if !boolean {
                let lineref = LineRef::from_str(line_num, &line, word);
                self.report.emit(
                    self.filename,
                    Category::Vhdl2008,
                    4,
                    lineref,
                    &format!("Avoid VHDL2008 'boolean style' conditional on '{}'.", word),
                );
            }
        }

        let used = self.find_used_variables(&line);
        self.check_read_identifiers(line_num, &used.read);
    }

    /// Boolean-literal comparisons and the conditions of `if`/`when` forms.
    pub(crate) fn check_booleans(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();

        for caps in EQUALITY.captures_iter(&line) {
            let expr = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let w1 = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let w2 = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
            let literal = |w: &str| w.eq_ignore_ascii_case("true") || w.eq_ignore_ascii_case("false");
            if literal(w1) || literal(w2) {
                let lineref = LineRef::from_str(line_num, &line, expr);
                self.report.emit(
                    self.filename,
                    Category::Booleans,
                    1,
                    lineref,
                    "Redundant boolean equality check. Use 'VALUE' instead of 'VALUE = true', \
                     and 'not VALUE' instead of 'VALUE = false'",
                );
            }
        }

        if let Some(caps) = IF_CONDITION.captures(&line) {
            let cond = caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();
            self.check_condition(line_num, &cond);
        }

        if WHEN_ASSIGNMENT.is_match(&line) {
            let conds: Vec<String> = WHEN_CONDITION
                .captures_iter(&line)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect();
            for cond in conds {
                self.check_condition(line_num, &cond);
            }
        }
    }

    /// Single-line `assert <condition> [report ...]` statements.
    pub(crate) fn check_asserts(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();
        if let Some(caps) = ASSERT_CONDITION.captures(&line) {
            let cond = caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
            log::debug!("detected assert '{}'", cond);
            self.check_condition(line_num, &cond);
        }
    }

    /// `library`/`use` clauses: registers the named packages and flags the
    /// deprecated arithmetic packages.
    pub(crate) fn check_used_packages(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();

        if let Some(caps) = LIBRARY_CLAUSE.captures(&line) {
            let libs: String = caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split_whitespace()
                .collect();
            for lib in libs.split(',') {
                let lineref = LineRef::from_str(line_num, &line, lib);
                self.add_other_checked(lib, lineref);
            }
            self.check_identifiers(line_num);
        }

        if let Some(caps) = USE_CLAUSE.captures(&line) {
            let uses: String = caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split_whitespace()
                .collect();
            for word in uses.split(',').flat_map(|u| u.split('.')) {
                if is_reserved_word(word) {
                    continue;
                }
                let lineref = LineRef::from_str(line_num, &line, word);
                self.add_other_checked(word, lineref);

                if PACKAGES_DEPRECATED.contains(&word.to_lowercase().as_str()) {
                    self.report.emit(
                        self.filename,
                        Category::Deprecated,
                        5,
                        lineref,
                        &format!(
                            "Non-standard package '{}'. Use ieee.numeric_std instead.",
                            word
                        ),
                    );
                }
            }
            self.check_identifiers(line_num);
        }
    }

    /// Post-file scan: everything declared but never referenced.
    pub(crate) fn check_unused_identifiers(&mut self) {
        let unused: Vec<(String, LineRef)> = self
            .symbols
            .all_ids()
            .map(|id| self.symbols.get(id))
            .filter(|ident| ident.expects_references() && !ident.is_referenced())
            .map(|ident| (ident.name.clone(), ident.lineref))
            .collect();
        for (name, lineref) in unused {
            self.report.emit(
                self.filename,
                Category::Unused,
                2,
                lineref,
                &format!("Unused identifier '{}'.", name),
            );
        }
    }
}
