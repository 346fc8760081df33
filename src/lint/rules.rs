use once_cell::sync::Lazy;
use regex::Regex;

use super::symbols::is_reserved_word;
use super::Checker;
use crate::report::{
    Category, LineRef, MSG_COMMENT_SPACE, MSG_TAB, MSG_TRAILING_WHITESPACE,
};

/// Three or more consecutive blank lines are redundant.
const BLANK_LINE_THRESHOLD: usize = 3;

static BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").unwrap());
static COMMENT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*--").unwrap());
static CALL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w\s*\(").unwrap());
static ESCAPED_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\.").unwrap());

static TODO_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--(\s*)TODO(\(.+?\))?:?(\s|$)?").unwrap());
static COMMENT_NO_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^--[^ ]*\w").unwrap());
static COMMENT_RULER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(---)(\s+|$)").unwrap());

static OTHERS_ZEROS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^.*(<=|:=|=>)\s*([xX]?"0+")"#).unwrap());
static OTHERS_HEX_ONES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^.*(<=|:=|=>)\s*([xX]"F+")"#).unwrap());
static OTHERS_BIN_ONES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^.*(<=|:=|=>)\s*[^xX]("1+")"#).unwrap());

static TIME_UNITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*\b((\d+)(ps|ns|us|ms|sec|min|hr))").unwrap());

static WORDS_OUTSIDE_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'].*?["']|(\w+)"#).unwrap());

static LATCH_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*?\b\w+\b\s*<=\s*.*?\bwhen\b").unwrap());
static ELSE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\belse\b").unwrap());

static COPYRIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"Copyright").unwrap());

pub(crate) fn is_blank_line(line: &str) -> bool {
    BLANK.is_match(line)
}

pub(crate) fn is_blank_or_comment_line(line: &str) -> bool {
    BLANK.is_match(line) || COMMENT_LINE.is_match(line)
}

/// `X <= Y; ` ends a statement; `X <= Y` continues on the next line, and
/// continuation lines are exempt from the indent rule.
fn is_assignment_continuation(prev: &str) -> bool {
    if !prev.contains("<=") {
        return false;
    }
    if prev.ends_with(';') {
        return false;
    }
    if let Some(head) = prev.strip_suffix("then") {
        let boundary = head
            .chars()
            .last()
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true);
        if boundary {
            return false;
        }
    }
    true
}

impl Checker<'_> {
    /// Raw-line whitespace rules: tabs, odd indent, trailing whitespace,
    /// redundant blank lines.
    pub(crate) fn check_style(&mut self, line_num: usize) {
        let lines = self.lines;
        let line = &lines.raw[line_num];
        let prev = if line_num > 0 {
            lines.raw[line_num - 1].as_str()
        } else {
            ""
        };

        if line.contains('\t') {
            self.report.emit(
                self.filename,
                Category::Tab,
                1,
                LineRef::from_str_unbounded(line_num, line, "\t"),
                MSG_TAB,
            );
        }

        let initial_spaces = line.chars().take_while(|&c| c == ' ').count();

        // emacs puts function/procedure/type continuation lines at an odd
        // indent; so do hanging assignments. Those are exempt.
        let prev_is_call = CALL_OPEN.is_match(prev);
        let prev_is_assign = is_assignment_continuation(prev);
        if initial_spaces % 2 != 0 && !prev_is_call && !prev_is_assign {
            let prev_initial_spaces = prev.chars().take_while(|&c| c == ' ').count();
            if prev_initial_spaces != initial_spaces {
                self.report.emit(
                    self.filename,
                    Category::Indent,
                    3,
                    LineRef::new(line_num, 0, initial_spaces),
                    "Weird number of spaces at line-start. Are you using a 2-space indent?",
                );
            }
        }

        if line
            .chars()
            .last()
            .map(|c| c.is_whitespace())
            .unwrap_or(false)
        {
            let len = line.chars().count();
            self.report.emit(
                self.filename,
                Category::EndOfLine,
                4,
                LineRef::span(line_num, len - 1, 1),
                MSG_TRAILING_WHITESPACE,
            );
        }

        let window_end = lines.num_lines().min(line_num + BLANK_LINE_THRESHOLD);
        let blanks = (line_num..window_end)
            .filter(|&l| is_blank_line(&lines.raw[l]))
            .count();
        if blanks >= BLANK_LINE_THRESHOLD {
            self.report.emit(
                self.filename,
                Category::BlankLine,
                4,
                LineRef::only_line(line_num),
                "Redundant blank lines. Consider deleting some of these extra lines.",
            );
        }
    }

    /// Comment formatting: TODO shape and the space after `--`.
    pub(crate) fn check_comment(&mut self, line_num: usize) {
        let line = self.lines.raw[line_num].clone();
        let Some(commentpos) = line.find("--") else {
            return;
        };
        // A marker inside a string literal is not a comment.
        let prefix = ESCAPED_CHAR.replace_all(&line[..commentpos], "");
        if prefix.matches('"').count() % 2 != 0 {
            return;
        }

        let comment = &line[commentpos..];
        if let Some(caps) = TODO_COMMENT.captures(comment) {
            let leading = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let wpos = commentpos + 2;
            let wepos = wpos + leading.len();
            if leading.len() > 1 {
                self.report.emit(
                    self.filename,
                    Category::TodoSpacing,
                    2,
                    LineRef::new(line_num, wpos, wepos),
                    "Too many spaces before TODO",
                );
            }

            let username = caps.get(2);
            if username.is_none() {
                self.report.emit(
                    self.filename,
                    Category::Todo,
                    2,
                    LineRef::span(line_num, wepos + 4, 1),
                    "Missing username in TODO; it should look like \
                     \"-- TODO(my_username): Stuff.\"",
                );
            }

            let middle = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            if middle != " " && !middle.is_empty() {
                let col = commentpos + username.map(|m| m.end() + 2).unwrap_or(2);
                self.report.emit(
                    self.filename,
                    Category::TodoSpacing,
                    2,
                    LineRef::span(line_num, col, 1),
                    "TODO(my_username) should be followed by a space",
                );
            }
        }

        if COMMENT_NO_SPACE.is_match(comment) && !COMMENT_RULER.is_match(comment) {
            self.report.emit(
                self.filename,
                Category::Comments,
                4,
                LineRef::span(line_num, commentpos + 2, 1),
                MSG_COMMENT_SPACE,
            );
        }
    }

    /// `"0000"`-style aggregates that should be `(others=>'0')`.
    pub(crate) fn check_for_others(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();
        let mut flag = |caps: Option<regex::Captures<'_>>, replacement: &str| {
            if let Some(caps) = caps {
                let m = caps.get(2).unwrap();
                let message = format!("Use '{}' instead of '{}'", replacement, m.as_str());
                self.report.emit(
                    self.filename,
                    Category::Others,
                    1,
                    LineRef::new(line_num, m.start(), m.end()),
                    &message,
                );
            }
        };
        flag(OTHERS_ZEROS.captures(&line), "(others=>'0')");
        flag(OTHERS_HEX_ONES.captures(&line), "(others=>'1')");
        flag(OTHERS_BIN_ONES.captures(&line), "(others=>'1')");
    }

    /// `10ns` is missing the space the LRM requires before the unit.
    pub(crate) fn check_time_units(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();
        for caps in TIME_UNITS.captures_iter(&line) {
            let orig = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let val = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let units = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            let message = format!(
                "Missing space before time units. Use '{} {}' instead of '{}'",
                val, units, orig
            );
            let lineref = LineRef::from_str(line_num, &line, orig);
            self.report
                .emit(self.filename, Category::Units, 2, lineref, &message);
        }
    }

    /// Reserved words must be lower case.
    pub(crate) fn check_reserved_words(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();
        for caps in WORDS_OUTSIDE_QUOTES.captures_iter(&line) {
            let Some(word) = caps.get(1) else {
                continue;
            };
            let word = word.as_str();
            if !is_reserved_word(word) {
                continue;
            }
            if word.chars().any(|c| c.is_uppercase()) {
                let message = format!(
                    "Invalid capitalization on '{}'. Reserved words should use all lower case.",
                    word
                );
                let lineref = LineRef::from_str(line_num, &line, word);
                self.report
                    .emit(self.filename, Category::Reserved, 2, lineref, &message);
            }
        }
    }

    /// `X <= Y when Z;` with no `else` infers a latch.
    pub(crate) fn check_latches(&mut self, line_num: usize) {
        let line = self.lines.lines[line_num].clone();
        let Some(m) = LATCH_HEAD.find(&line) else {
            return;
        };
        let rest = &line[m.end()..];
        let Some(semi) = rest.find(';') else {
            return;
        };
        if !ELSE_WORD.is_match(&rest[..semi]) {
            self.report.emit(
                self.filename,
                Category::Latches,
                5,
                LineRef::only_line(line_num),
                "Inferred latch detected. Output must be defined for all branch paths.",
            );
        }
    }

    pub(crate) fn check_line_length(&mut self, line_num: usize) {
        let line = &self.lines.raw[line_num];
        let len = line.chars().count();
        if self.line_length > 0 && len > self.line_length {
            let message = format!(
                "Line length is {} characters. Lines should be <= {} characters long",
                len, self.line_length
            );
            self.report.emit(
                self.filename,
                Category::LineLength,
                2,
                LineRef::only_line(line_num),
                &message,
            );
        }
    }
}

/// A "Copyright" line must appear within the first 30 lines.
pub(crate) fn check_for_copyright(filename: &str, lines: &[String], report: &mut crate::report::Report) {
    let found = lines
        .iter()
        .take(31)
        .skip(1)
        .any(|line| COPYRIGHT.is_match(line));
    if !found {
        report.emit(
            filename,
            Category::Copyright,
            5,
            LineRef::only_line(1),
            "No copyright message found.  \
             You should have a line: \"Copyright [year] <Copyright Owner>\"",
        );
    }
}

/// The first line of the file must be a `--` header comment.
pub(crate) fn check_for_header(filename: &str, lines: &[String], report: &mut crate::report::Report) {
    if lines.len() < 2 || !lines[1].starts_with("--") {
        report.emit(
            filename,
            Category::Header,
            5,
            LineRef::only_line(1),
            "No file header found.",
        );
    }
}

/// NUL bytes and Unicode replacement characters both mean trouble for the
/// toolchain downstream.
pub(crate) fn check_for_bad_characters(
    filename: &str,
    lines: &[String],
    report: &mut crate::report::Report,
) {
    for (linenum, line) in lines.iter().enumerate() {
        if line.contains('\u{fffd}') {
            report.emit(
                filename,
                Category::Utf8,
                5,
                LineRef::only_line(linenum),
                "Line contains invalid UTF-8 (or Unicode replacement character).",
            );
        }
        if line.contains('\0') {
            report.emit(
                filename,
                Category::Nul,
                5,
                LineRef::from_str_unbounded(linenum, line, "\0"),
                "Line contains NUL byte.",
            );
        }
    }
}

/// The file must end with a newline; with the trailing sentinel in place,
/// the last-but-one entry is empty exactly when it does.
pub(crate) fn check_for_newline_at_eof(
    filename: &str,
    lines: &[String],
    report: &mut crate::report::Report,
) {
    if lines.len() < 3 {
        return;
    }
    let last = &lines[lines.len() - 2];
    if !last.is_empty() {
        let col = last.chars().count().saturating_sub(1);
        report.emit(
            filename,
            Category::EndingNewline,
            5,
            LineRef::span(lines.len() - 2, col, 1),
            "Could not find a newline character at the end of the file.",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::testing::checker;
    use crate::report::Report;
    use pretty_assertions::assert_eq;

    fn rendered(report: &Report) -> Vec<String> {
        report.pending().iter().map(|(_, t)| t.clone()).collect()
    }

    #[test]
    fn tab_is_flagged() {
        let (lines, mut report) = checker::views(&["\tq <= d;"]);
        checker::new(&lines, &mut report).check_style(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Tab found; better to use spaces")));
    }

    #[test]
    fn odd_indent_is_flagged_but_continuations_are_not() {
        let (lines, mut report) = checker::views(&[
            "  q <= a and",
            "       b;",
            "   y <= c;",
        ]);
        {
            let mut chk = checker::new(&lines, &mut report);
            chk.check_style(1);
            chk.check_style(2);
        }
        let out = rendered(&report);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("test.vhd:2:"));
        assert!(out[0].contains("Weird number of spaces at line-start."));
    }

    #[test]
    fn trailing_whitespace_is_flagged() {
        let (lines, mut report) = checker::views(&["q <= d;  "]);
        checker::new(&lines, &mut report).check_style(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Line ends in whitespace.")));
    }

    #[test]
    fn three_blank_lines_are_redundant() {
        let (lines, mut report) = checker::views(&["a", "", "", "", "b"]);
        {
            let mut chk = checker::new(&lines, &mut report);
            for l in 0..5 {
                chk.check_style(l);
            }
        }
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn comment_without_space_is_flagged() {
        let (lines, mut report) = checker::views(&["--comment", "-- fine", "----------"]);
        {
            let mut chk = checker::new(&lines, &mut report);
            for l in 0..3 {
                chk.check_comment(l);
            }
        }
        assert_eq!(report.error_count(), 1);
        assert!(rendered(&report)[0].contains("Should have a space between -- and comment"));
    }

    #[test]
    fn todo_without_username_is_flagged() {
        let (lines, mut report) = checker::views(&["-- TODO: fix reset polarity"]);
        checker::new(&lines, &mut report).check_comment(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Missing username in TODO")));
    }

    #[test]
    fn todo_with_username_passes() {
        let (lines, mut report) = checker::views(&["-- TODO(jdoe): fix reset polarity"]);
        checker::new(&lines, &mut report).check_comment(0);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn zeros_literal_suggests_others() {
        let (lines, mut report) = checker::views(&[r#"  q <= "0000";"#]);
        checker::new(&lines, &mut report).check_for_others(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Use '(others=>'0')' instead of '\"0000\"'")));
    }

    #[test]
    fn hex_ones_literal_suggests_others() {
        let (lines, mut report) = checker::views(&[r#"  q <= x"FF";"#]);
        checker::new(&lines, &mut report).check_for_others(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Use '(others=>'1')'")));
    }

    #[test]
    fn time_unit_without_space_is_flagged() {
        let (lines, mut report) = checker::views(&["  wait for 10ns;"]);
        checker::new(&lines, &mut report).check_time_units(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Use '10 ns' instead of '10ns'")));
    }

    #[test]
    fn time_unit_with_space_passes() {
        let (lines, mut report) = checker::views(&["  wait for 10 ns;"]);
        checker::new(&lines, &mut report).check_time_units(0);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn uppercase_reserved_words_are_flagged() {
        let (lines, mut report) = checker::views(&["IF x = '1' THEN"]);
        checker::new(&lines, &mut report).check_reserved_words(0);
        let out = rendered(&report);
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("Invalid capitalization on 'IF'."));
        assert!(out[1].contains("Invalid capitalization on 'THEN'."));
        assert!(out.iter().all(|l| l.contains("[readability/reserved] [2]")));
    }

    #[test]
    fn reserved_word_in_string_is_ignored() {
        let (lines, mut report) = checker::views(&[r#"  msg <= "THEN";"#]);
        checker::new(&lines, &mut report).check_reserved_words(0);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn when_without_else_is_a_latch() {
        let (lines, mut report) = checker::views(&["  y <= a when sel = '1';"]);
        checker::new(&lines, &mut report).check_latches(0);
        let out = rendered(&report);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("Inferred latch detected."));
        assert!(out[0].contains("[runtime/latches] [5]"));
    }

    #[test]
    fn when_with_else_is_not_a_latch() {
        let (lines, mut report) = checker::views(&["  y <= a when sel = '1' else b;"]);
        checker::new(&lines, &mut report).check_latches(0);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn long_line_is_flagged() {
        let long = format!("  q <= {};", "a".repeat(90));
        let (lines, mut report) = checker::views(&[&long]);
        checker::new(&lines, &mut report).check_line_length(0);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("Lines should be <= 80 characters long")));
    }

    #[test]
    fn missing_copyright_is_reported() {
        let lines: Vec<String> = ["// s", "-- header", "entity e is", "// s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut report = Report::new(Default::default()).unwrap();
        check_for_copyright("t.vhd", &lines, &mut report);
        assert!(rendered(&report)
            .iter()
            .any(|l| l.contains("No copyright message found.")));
    }

    #[test]
    fn missing_header_is_reported() {
        let lines: Vec<String> = ["// s", "entity e is", "// s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut report = Report::new(Default::default()).unwrap();
        check_for_header("t.vhd", &lines, &mut report);
        assert!(rendered(&report).iter().any(|l| l.contains("No file header found.")));
    }

    #[test]
    fn missing_final_newline_is_reported() {
        let lines: Vec<String> = ["// s", "q <= d;", "// s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut report = Report::new(Default::default()).unwrap();
        check_for_newline_at_eof("t.vhd", &lines, &mut report);
        assert_eq!(report.error_count(), 1);

        let lines: Vec<String> = ["// s", "q <= d;", "", "// s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut report = Report::new(Default::default()).unwrap();
        check_for_newline_at_eof("t.vhd", &lines, &mut report);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn nul_byte_is_reported() {
        let lines: Vec<String> = ["// s", "q <= d;\0", "// s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut report = Report::new(Default::default()).unwrap();
        check_for_bad_characters("t.vhd", &lines, &mut report);
        assert!(rendered(&report).iter().any(|l| l.contains("NUL byte")));
    }
}
