use once_cell::sync::Lazy;
use regex::Regex;

use super::expr;
use super::Checker;
use crate::report::{Category, LineRef};

/// The declaration shape:
/// `[variable|signal|constant] name{, name} : [dir] type [:= init] [;]`
static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(\b(variable|signal|constant)\b)?\s*(.+?)\s*:\s*(\b\w+\b)?\s*(\b\w[^;:]+)\s*(:=\s*([^;]+))?;?",
    )
    .unwrap()
});

static AGGREGATE_INIT: Lazy<Regex> = Lazy::new(|| Regex::new(r":=\s*\(").unwrap());

/// A parsed declaration fragment.
#[derive(Debug)]
pub(crate) struct Declaration {
    /// `variable`, `signal` or `constant`, lower-cased, when present.
    pub(crate) decl_type: Option<String>,
    pub(crate) names: Vec<String>,
    /// The direction keyword of a port declaration (`in`, `out`, ...).
    pub(crate) direction: Option<String>,
    pub(crate) stype: String,
    pub(crate) init: Option<String>,
    /// Position just past the declaration, for re-scanning the same line.
    pub(crate) end_pos: usize,
}

/// Options for [`Checker::match_declaration`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DeclOptions<'a> {
    /// Start scanning at this column.
    pub(crate) pos: usize,
    /// Truncate the line here first (the close of a port/generic clause).
    pub(crate) endpos: Option<usize>,
    /// Suppress the unranged-integer diagnostics.
    pub(crate) skip_int_range: bool,
    /// Only match declarations introduced by this keyword.
    pub(crate) req_decl_type: Option<&'a str>,
}

impl Checker<'_> {
    /// Parses a declaration starting at `opts.pos` on `line_num` of the
    /// comment-stripped view. Emits the multiple-names and unranged-integer
    /// diagnostics as side effects. Returns `None` when the text is not a
    /// declaration (or not of the requested kind).
    pub(crate) fn match_declaration(
        &mut self,
        line_num: usize,
        opts: DeclOptions<'_>,
    ) -> Option<Declaration> {
        let lines = self.lines;
        let mut oline = lines.lines[line_num].as_str();
        if let Some(endpos) = opts.endpos {
            oline = oline.get(..endpos).unwrap_or(oline);
        }
        let rest = oline.get(opts.pos..)?;

        let caps = DECLARATION.captures(rest)?;
        let decl_type = caps.get(2).map(|m| m.as_str().to_lowercase());
        if let Some(required) = opts.req_decl_type {
            if decl_type.as_deref() != Some(required) {
                return None;
            }
        }

        let names_raw = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        let direction = caps.get(4).map(|m| m.as_str().trim().to_string());
        let stype = caps
            .get(5)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let mut init = caps.get(7).map(|m| m.as_str().trim().to_string());
        let end_pos = opts.pos + caps.get(0).unwrap().end();

        let names: Vec<String> = names_raw
            .split_whitespace()
            .collect::<String>()
            .split(',')
            .map(|n| n.to_string())
            .collect();

        // A parenthesized initializer may be a multi-line aggregate; pick up
        // the full expression and store it whitespace-collapsed.
        if let Some(m) = caps.get(6).and_then(|g| AGGREGATE_INIT.find(g.as_str())) {
            let open = opts.pos + caps.get(6).unwrap().start() + m.end() - 1;
            if let Some((text, end_line, _)) = expr::extract_expression(lines, line_num, open) {
                if end_line > line_num {
                    let collapsed: String = text.split_whitespace().collect();
                    init = Some(format!("({})", collapsed));
                }
            }
        }

        if names.len() > 1 {
            self.report.emit(
                self.filename,
                Category::Declarations,
                1,
                LineRef::from_str(line_num, oline, names_raw),
                "Avoid using multiple declarations per line.",
            );
        }

        if decl_type.as_deref() != Some("constant") && !opts.skip_int_range {
            let unranged = match stype.as_str() {
                "integer" => Some("Integer types must have a range specified."),
                "natural" => Some("Natural types must have a range specified."),
                "positive" => Some("Positive types must have a range specified."),
                _ => None,
            };
            if let Some(message) = unranged {
                self.report.emit(
                    self.filename,
                    Category::Integers,
                    5,
                    LineRef::from_str(line_num, oline, &stype),
                    message,
                );
            }
        }

        Some(Declaration {
            decl_type,
            names,
            direction,
            stype,
            init,
            end_pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::testing::checker;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_signal_declaration() {
        let (lines, mut report) = checker::views(&["  signal cnt_r : unsigned(7 downto 0);"]);
        let mut chk = checker::new(&lines, &mut report);
        let decl = chk
            .match_declaration(0, DeclOptions::default())
            .expect("declaration");
        assert_eq!(decl.decl_type.as_deref(), Some("signal"));
        assert_eq!(decl.names, vec!["cnt_r"]);
        assert_eq!(decl.direction, None);
        assert_eq!(decl.stype, "unsigned(7 downto 0)");
        assert_eq!(decl.init, None);
    }

    #[test]
    fn parses_a_port_declaration_with_direction() {
        let (lines, mut report) = checker::views(&["    clk_i : in std_logic;"]);
        let mut chk = checker::new(&lines, &mut report);
        let decl = chk
            .match_declaration(0, DeclOptions::default())
            .expect("declaration");
        assert_eq!(decl.decl_type, None);
        assert_eq!(decl.direction.as_deref(), Some("in"));
        assert_eq!(decl.stype, "std_logic");
    }

    #[test]
    fn requested_kind_mismatch_is_no_match() {
        let (lines, mut report) = checker::views(&["  signal cnt_r : std_logic;"]);
        let mut chk = checker::new(&lines, &mut report);
        let opts = DeclOptions {
            req_decl_type: Some("constant"),
            ..DeclOptions::default()
        };
        assert!(chk.match_declaration(0, opts).is_none());
    }

    #[test]
    fn multiple_names_are_flagged() {
        let (lines, mut report) = checker::views(&["  signal a, b : std_logic;"]);
        {
            let mut chk = checker::new(&lines, &mut report);
            let decl = chk
                .match_declaration(0, DeclOptions::default())
                .expect("declaration");
            assert_eq!(decl.names, vec!["a", "b"]);
        }
        assert_eq!(report.error_count(), 1);
        assert!(report.pending()[0]
            .1
            .contains("Avoid using multiple declarations per line."));
    }

    #[test]
    fn unranged_integer_is_an_error_except_on_constants() {
        let (lines, mut report) = checker::views(&[
            "  signal depth : integer;",
            "  constant C_DEPTH : integer := 4;",
        ]);
        {
            let mut chk = checker::new(&lines, &mut report);
            chk.match_declaration(0, DeclOptions::default()).unwrap();
            chk.match_declaration(1, DeclOptions::default()).unwrap();
        }
        assert_eq!(report.error_count(), 1);
        assert!(report.pending()[0]
            .1
            .contains("Integer types must have a range specified."));
    }

    #[test]
    fn ranged_integer_is_fine() {
        let (lines, mut report) = checker::views(&["  signal depth : integer range 0 to 7;"]);
        {
            let mut chk = checker::new(&lines, &mut report);
            let decl = chk.match_declaration(0, DeclOptions::default()).unwrap();
            // The first word of a two-word type lands in the direction slot.
            assert_eq!(decl.direction.as_deref(), Some("integer"));
            assert_eq!(decl.stype, "range 0 to 7");
        }
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn multiline_aggregate_initializer_is_collected() {
        let (lines, mut report) = checker::views(&[
            "  constant C_INIT : t_rec := (",
            "    a => '0',",
            "    b => '1'",
            "  );",
        ]);
        let mut chk = checker::new(&lines, &mut report);
        let decl = chk.match_declaration(0, DeclOptions::default()).unwrap();
        assert_eq!(decl.init.as_deref(), Some("(a=>'0',b=>'1')"));
    }

    #[test]
    fn initializer_is_captured() {
        let (lines, mut report) = checker::views(&["  constant C_W : natural := 8;"]);
        let mut chk = checker::new(&lines, &mut report);
        let decl = chk.match_declaration(0, DeclOptions::default()).unwrap();
        assert_eq!(decl.init.as_deref(), Some("8"));
    }
}
