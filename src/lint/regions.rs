use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::decl::DeclOptions;
use super::expr;
use super::idents::IDENT_USE;
use super::rules::is_blank_or_comment_line;
use super::symbols::{Driver, PortMode};
use super::Checker;
use crate::report::{Category, LineRef};

/// Components that must stay component-instantiated (vendor IP); everything
/// else should use direct instantiation.
const COMPONENTS_IGNORED: &[&str] = &[
    "axis_register_slice_v1_1_15_axis_register_slice",
    "axis_dwidth_converter_v1_1_14_axis_dwidth_converter",
    "axis_clock_converter_v1_1_20_axis_clock_converter",
    "iobuf",
];

const PORT_MODES: &str = "[in, out, inout]";
const PORT_TYPES: &str = "[std_logic, std_logic_vector]";

static ENTITY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*\bentity\s+(.+?)\s+is").unwrap());
static ARCHITECTURE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\barchitecture\s+(.+?)\s+of\s+(.+?)\s+is").unwrap());
static PACKAGE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\bpackage\s+(\w+?)\s+is").unwrap());
static PACKAGE_BODY_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\bpackage\s+body\s+(\w+?)\s+is").unwrap());
static FUNCTION_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\b(pure|impure)\s+)?\bfunction\s+(\w+)").unwrap());
static PROCEDURE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\bprocedure\s+(\w+)").unwrap());
static COMPONENT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\bcomponent\s+(\w+)").unwrap());
static RECORD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btype\s+(\w+)\s+is\s+record\b").unwrap());
static PROCESS_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*((.*?)\s*:)?\s*\bprocess\b\s*(\((.*)\))?").unwrap());
static PORT_MAP_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*((.*?)\s*:)?\s*\bport map").unwrap());

static GENERIC_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bgeneric\s*\(").unwrap());
static PORT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bport\s*\(").unwrap());
static PROCESS_SENSITIVITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bprocess\s*\(").unwrap());
static PORT_MAP_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bport\s+map\s*\(").unwrap());
static FUNCTION_PARAMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction\s+(\w+)\s*\(").unwrap());
static PROCEDURE_PARAMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bprocedure\s+(\w+)\s*\(").unwrap());

static TYPE_ENUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btype\s+(\w+)\s+is\s*\(").unwrap());
static SUBTYPE_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsubtype\s+(\w+)\s+is").unwrap());
static ALIAS_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\balias\s+(\w+)\b").unwrap());

static BASE_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(\w+)\s*(\(.*?\))?").unwrap());

static ARCH_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*\bbegin\b").unwrap());
static ANY_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*\bbegin\b").unwrap());
static RETURN_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*\breturn\b.*;").unwrap());

static WHILE_LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*?\bwhile.*?\bloop\b").unwrap());
static FOR_LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*?\bfor.*?\bloop\b").unwrap());
static WAIT_STMT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*?\bwait\b").unwrap());
static EXIT_STMT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*?\bexit\b").unwrap());

static CASE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*((.*?)\s*:)?.*\bcase\s+(.+?)\s+is").unwrap());
static LOOP_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*((.*?)\s*:)?.*\bloop\b\s*$").unwrap());
static WHEN_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*?\bwhen\s+(.*?)\s*=>").unwrap());
static STATE_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*?((.*?)\s*[<:]=(.*?))\s*;").unwrap());

static TICK_EVENT_USE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^.*?({})'event", IDENT_USE)).unwrap());
static RISING_EDGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^.*\brising_edge\s*\(({})\)", IDENT_USE)).unwrap());
static FALLING_EDGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^.*\bfalling_edge\s*\(({})\)", IDENT_USE)).unwrap());
static TICK_EVENT_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*?(\w+)'event").unwrap());

static CLK_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(\w+.)?clk.*").unwrap());
static CLK_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*clk$").unwrap());
static CLK_I_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*clk_i$").unwrap());

static FSM_ST_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ST_.*").unwrap());
static FSM_ST_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*_ST$").unwrap());

static SENSITIVITY_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\w']+\b").unwrap());

fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut cur = String::new();
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                cur.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                cur.push(c);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

/// `end <keyword>` / `end <name>` / `end <keyword> <name>` at region close.
fn end_keyword_pattern(keyword: &str, name: &str) -> String {
    if name.is_empty() {
        format!(r"(?i)^.*\bend\s+({})\b", keyword)
    } else {
        let name = regex::escape(name);
        format!(
            r"(?i)^.*\bend\s+({kw}|{name}|{kw}\s+{name})\b",
            kw = keyword,
            name = name
        )
    }
}

/// Function/procedure/record closers also allow a bare `end;`.
fn end_subprogram_pattern(keyword: &str, name: &str) -> String {
    let name = regex::escape(name);
    format!(
        r"(?i)^.*\bend\b\s*({kw}|{name}|{kw}\s+{name}|)\s*;",
        kw = keyword,
        name = name
    )
}

impl Checker<'_> {
    fn find_region_end(&self, pattern: &str, from: usize) -> Option<usize> {
        let re = Regex::new(pattern).ok()?;
        (from..self.lines.num_lines()).find(|&l| re.is_match(&self.lines.lines[l]))
    }

    fn prev_line_blank_or_comment(&self, line_num: usize) -> bool {
        if line_num == 0 {
            return true;
        }
        is_blank_or_comment_line(&self.lines.raw[line_num - 1])
    }

    fn next_line_blank_or_comment(&self, line_num: usize) -> bool {
        match self.lines.raw.get(line_num + 1) {
            Some(line) => is_blank_or_comment_line(line),
            None => true,
        }
    }

    fn blank_line_warning(&mut self, line_num: usize, message: &str) {
        self.report.emit(
            self.filename,
            Category::BlankLine,
            4,
            LineRef::only_line(line_num),
            message,
        );
    }

    // ------------------------------------------------------------------
    // entity

    pub(crate) fn check_entities(&mut self, line_num: usize) {
        let lines = self.lines;
        let Some(caps) = ENTITY_OPEN.captures(&lines.lines[line_num]) else {
            return;
        };
        let name = caps.get(1).unwrap().as_str().to_string();
        let Some(end_line) = self.find_region_end(&end_keyword_pattern("entity", &name), line_num)
        else {
            return;
        };
        self.check_entity(line_num, end_line, &name);
    }

    fn check_entity(&mut self, start_line: usize, end_line: usize, name: &str) {
        let lines = self.lines;
        let line = &lines.lines[start_line];
        log::debug!("detected entity '{}' on lines {}-{}", name, start_line, end_line);
        self.add_other_checked(name, LineRef::from_str(start_line, line, name));

        if !self.prev_line_blank_or_comment(start_line) {
            self.blank_line_warning(start_line, "Blank line should come before entity declaration.");
        }

        if !self.filename.contains(&name.to_lowercase()) {
            let message = format!("Filename should contain entity name '{}'", name.to_lowercase());
            self.report.emit(
                self.filename,
                Category::Filename,
                1,
                LineRef::only_line(start_line),
                &message,
            );
        }

        for l in start_line..end_line {
            self.check_generics(l);
            self.check_ports(l);
        }

        if !self.next_line_blank_or_comment(end_line) {
            self.blank_line_warning(end_line, "Blank line should come after entity end.");
        }
    }

    /// Generic clause: constants, `UPPER` with a `G_` prefix.
    fn check_generics(&mut self, line_num: usize) {
        let lines = self.lines;
        let Some(m) = GENERIC_CLAUSE.find(&lines.lines[line_num]) else {
            return;
        };
        let open = m.end() - 1;
        let Some((_, el, endpos)) = expr::extract_expression(lines, line_num, open) else {
            return;
        };

        let mut l = line_num;
        let mut pos = open + 1;
        while l <= el {
            let opts = DeclOptions {
                pos,
                endpos: if l == el { Some(endpos.saturating_sub(1)) } else { None },
                skip_int_range: true,
                req_decl_type: None,
            };
            let Some(decl) = self.match_declaration(l, opts) else {
                l += 1;
                pos = 0;
                continue;
            };
            pos = decl.end_pos;

            let pline = &lines.lines[l];
            for name in &decl.names {
                log::debug!(
                    "detected generic declaration '{}' : {} := {:?}",
                    name,
                    decl.stype,
                    decl.init
                );
                let lineref = LineRef::from_str(l, pline, name);
                let id = self
                    .symbols
                    .add_constant(name, &decl.stype, decl.init.as_deref(), lineref);
                self.symbols.add_driver(id, Driver::Once { line: l });

                if !super::is_all_upper(name) {
                    let message = format!(
                        "Invalid capitalization on '{}'. Generic names should use all upper case.",
                        name
                    );
                    self.report
                        .emit(self.filename, Category::Constants, 1, lineref, &message);
                }
                if !name.to_uppercase().starts_with("G_") {
                    let message = format!(
                        "Invalid naming convention on '{}'. Generic names should use prefix 'G_'.",
                        name
                    );
                    self.report
                        .emit(self.filename, Category::Naming, 1, lineref, &message);
                }
            }
        }
    }

    /// Port clause: modes restricted to in/out/inout, types to
    /// std_logic/std_logic_vector; inputs get a declaration driver.
    fn check_ports(&mut self, line_num: usize) {
        let lines = self.lines;
        let Some(m) = PORT_CLAUSE.find(&lines.lines[line_num]) else {
            return;
        };
        let open = m.end() - 1;
        let Some((_, endline, endpos)) = expr::extract_expression(lines, line_num, open) else {
            return;
        };

        // Mark referenced types before the names below shadow the scan.
        for l in line_num..=endline {
            self.check_identifiers(l);
        }

        let mut l = line_num;
        let mut pos = open + 1;
        while l <= endline {
            let opts = DeclOptions {
                pos,
                endpos: if l == endline {
                    Some(endpos.saturating_sub(1))
                } else {
                    None
                },
                skip_int_range: false,
                req_decl_type: None,
            };
            let Some(decl) = self.match_declaration(l, opts) else {
                l += 1;
                pos = 0;
                continue;
            };
            pos = decl.end_pos;

            let base_stype = BASE_TYPE
                .captures(&decl.stype)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .unwrap_or(&decl.stype)
                .to_string();
            let mode_text = decl.direction.clone().unwrap_or_default();
            let mode = PortMode::parse(&mode_text);

            let pline = &lines.lines[l];
            for name in &decl.names {
                log::debug!(
                    "detected port declaration '{}'/{}/{}/{:?}",
                    name,
                    mode_text,
                    decl.stype,
                    decl.init
                );
                let lineref = LineRef::from_str(l, pline, name);
                let id = self.symbols.add_port(
                    name,
                    &decl.stype,
                    decl.init.as_deref(),
                    mode.clone(),
                    lineref,
                );
                if !super::is_all_lower(name) {
                    self.warn_identifier_case(name, lineref);
                }
                if mode.drives_signal() {
                    self.symbols.add_driver(id, Driver::Once { line: l });
                }

                if matches!(mode, PortMode::Other(_)) {
                    let message = format!(
                        "Invalid port mode '{}'. Allowed modes are {}",
                        mode_text, PORT_MODES
                    );
                    self.report.emit(
                        self.filename,
                        Category::PortModes,
                        1,
                        LineRef::from_str(l, pline, &mode_text),
                        &message,
                    );
                }

                if !base_stype.eq_ignore_ascii_case("std_logic")
                    && !base_stype.eq_ignore_ascii_case("std_logic_vector")
                {
                    let message = format!(
                        "Invalid port type '{}'. Allowed types are {}",
                        base_stype, PORT_TYPES
                    );
                    self.report.emit(
                        self.filename,
                        Category::PortTypes,
                        1,
                        LineRef::from_str(l, pline, &base_stype),
                        &message,
                    );
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // architecture

    pub(crate) fn check_architectures(&mut self, line_num: usize) {
        let lines = self.lines;
        let Some(caps) = ARCHITECTURE_OPEN.captures(&lines.lines[line_num]) else {
            return;
        };
        let name = caps.get(1).unwrap().as_str().to_string();
        let Some(end_line) =
            self.find_region_end(&end_keyword_pattern("architecture", &name), line_num)
        else {
            return;
        };
        self.check_architecture(line_num, end_line, &name);
    }

    fn check_architecture(&mut self, start_line: usize, end_line: usize, name: &str) {
        let lines = self.lines;
        log::debug!(
            "detected architecture '{}' on lines {}-{}",
            name,
            start_line,
            end_line
        );
        self.add_other_checked(name, LineRef::from_str(start_line, &lines.lines[start_line], name));

        if !self.prev_line_blank_or_comment(start_line) {
            self.blank_line_warning(
                start_line,
                "Blank line should come before architecture declaration.",
            );
        }
        if !self.next_line_blank_or_comment(start_line) {
            self.blank_line_warning(
                start_line,
                "Blank line should come after architecture declaration.",
            );
        }

        // Declarative part, up to `begin`.
        let mut l = start_line;
        while l <= end_line {
            if let Some(f_end) = self.check_functions(l, false) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_procedures(l, false) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_components(l) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_records(l) {
                l = f_end + 1;
                continue;
            }
            if ARCH_BEGIN.is_match(&lines.lines[l]) {
                break;
            }
            self.check_identifiers(l);
            self.check_constants(l, false);
            self.check_signals(l);
            self.check_types(l, false);
            self.check_asserts(l);
            l += 1;
        }

        if !self.prev_line_blank_or_comment(l) {
            self.blank_line_warning(l, "Blank line should come before architecture begin.");
        }
        if !self.next_line_blank_or_comment(l) {
            self.blank_line_warning(l, "Blank line should come after architecture begin.");
        }

        // Statement part.
        while l <= end_line {
            if let Some(f_end) = self.check_port_maps(l) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_processes(l) {
                l = f_end + 1;
                continue;
            }
            self.check_identifiers(l);
            self.check_asserts(l);
            l += 1;
        }

        if !self.prev_line_blank_or_comment(end_line) {
            self.blank_line_warning(end_line, "Blank line should come before architecture end.");
        }
    }

    // ------------------------------------------------------------------
    // package and package body

    pub(crate) fn check_packages(&mut self, line_num: usize) {
        let lines = self.lines;
        let Some(caps) = PACKAGE_OPEN.captures(&lines.lines[line_num]) else {
            return;
        };
        let name = caps.get(1).unwrap().as_str().to_string();
        let Some(end_line) = self.find_region_end(&end_keyword_pattern("package", &name), line_num)
        else {
            return;
        };
        self.check_package(line_num, end_line, &name);
    }

    fn check_package(&mut self, start_line: usize, end_line: usize, name: &str) {
        let lines = self.lines;
        log::debug!("detected package '{}' on lines {}-{}", name, start_line, end_line);
        self.add_other_checked(name, LineRef::from_str(start_line, &lines.lines[start_line], name));

        if !self.prev_line_blank_or_comment(start_line) {
            self.blank_line_warning(start_line, "Blank line should come before package declaration.");
        }
        if !self.next_line_blank_or_comment(start_line) {
            self.blank_line_warning(start_line, "Blank line should come after package declaration.");
        }

        let mut l = start_line;
        while l <= end_line {
            if let Some(f_end) = self.check_function_declarations(l) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_procedure_declarations(l) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_records(l) {
                l = f_end + 1;
                continue;
            }
            self.check_identifiers(l);
            self.check_constants(l, true);
            self.check_types(l, true);
            l += 1;
        }

        if !self.prev_line_blank_or_comment(end_line) {
            self.blank_line_warning(end_line, "Blank line should come before package end.");
        }
        if !self.next_line_blank_or_comment(end_line) {
            self.blank_line_warning(end_line, "Blank line should come after package end.");
        }
    }

    pub(crate) fn check_package_bodies(&mut self, line_num: usize) {
        let lines = self.lines;
        let Some(caps) = PACKAGE_BODY_OPEN.captures(&lines.lines[line_num]) else {
            return;
        };
        let name = caps.get(1).unwrap().as_str().to_string();
        let Some(end_line) =
            self.find_region_end(&end_keyword_pattern(r"package\s+body", &name), line_num)
        else {
            return;
        };
        self.check_package_body(line_num, end_line, &name);
    }

    fn check_package_body(&mut self, start_line: usize, end_line: usize, name: &str) {
        let lines = self.lines;
        log::debug!(
            "detected package body '{}' on lines {}-{}",
            name,
            start_line,
            end_line
        );
        self.add_other_checked(name, LineRef::from_str(start_line, &lines.lines[start_line], name));

        if !self.prev_line_blank_or_comment(start_line) {
            self.blank_line_warning(
                start_line,
                "Blank line should come before package body declaration.",
            );
        }
        if !self.next_line_blank_or_comment(start_line) {
            self.blank_line_warning(
                start_line,
                "Blank line should come after package body declaration.",
            );
        }

        let mut l = start_line;
        while l <= end_line {
            if let Some(f_end) = self.check_functions(l, true) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_procedures(l, true) {
                l = f_end + 1;
                continue;
            }
            self.check_constants(l, true);
            self.check_identifiers(l);
            l += 1;
        }

        if !self.prev_line_blank_or_comment(end_line) {
            self.blank_line_warning(end_line, "Blank line should come before package body end.");
        }
    }

    // ------------------------------------------------------------------
    // subprograms

    /// Function bodies. `assume_external` marks the name as referenced
    /// up-front; it is set by package-level callers whose declarations are
    /// part of an interface.
    pub(crate) fn check_functions(&mut self, line_num: usize, assume_external: bool) -> Option<usize> {
        let lines = self.lines;
        let caps = FUNCTION_OPEN.captures(&lines.lines[line_num])?;
        let name = caps.get(3).unwrap().as_str().to_string();
        let end_line = self.find_region_end(&end_subprogram_pattern("function", &name), line_num)?;
        self.check_subprogram(line_num, end_line, &name, &FUNCTION_PARAMS, assume_external);
        Some(end_line)
    }

    /// Procedure bodies; same shape as functions.
    pub(crate) fn check_procedures(
        &mut self,
        line_num: usize,
        assume_external: bool,
    ) -> Option<usize> {
        let lines = self.lines;
        let caps = PROCEDURE_OPEN.captures(&lines.lines[line_num])?;
        let name = caps.get(1).unwrap().as_str().to_string();
        let end_line =
            self.find_region_end(&end_subprogram_pattern("procedure", &name), line_num)?;
        self.check_subprogram(line_num, end_line, &name, &PROCEDURE_PARAMS, assume_external);
        Some(end_line)
    }

    fn check_subprogram(
        &mut self,
        start_line: usize,
        end_line: usize,
        name: &str,
        params: &Regex,
        assume_external: bool,
    ) {
        let lines = self.lines;
        let line = &lines.lines[start_line];
        log::debug!(
            "detected subprogram '{}' on lines {}-{}",
            name,
            start_line,
            end_line
        );
        self.add_referenced_checked(name, LineRef::from_str(start_line, line, name), true);
        self.symbols.push_scope();

        if assume_external {
            if let Some(id) = self.symbols.lookup(name) {
                self.symbols.inc_refs(id);
            }
        }

        // Parameter list, possibly spanning lines.
        let mut el = start_line;
        if let Some(m) = params.find(line) {
            let open = m.end() - 1;
            if let Some((_, param_end, endpos)) = expr::extract_expression(lines, start_line, open) {
                el = param_end;
                let mut l = start_line;
                let mut pos = open + 1;
                let mut scanned = start_line;
                while l <= el {
                    if l > scanned {
                        self.check_identifiers(l);
                        scanned = l;
                    }
                    let opts = DeclOptions {
                        pos,
                        endpos: if l == el {
                            Some(endpos.saturating_sub(1))
                        } else {
                            None
                        },
                        skip_int_range: true,
                        req_decl_type: None,
                    };
                    let Some(decl) = self.match_declaration(l, opts) else {
                        l += 1;
                        pos = 0;
                        continue;
                    };
                    pos = decl.end_pos;
                    let pline = &lines.lines[l];
                    for pname in &decl.names {
                        log::debug!("detected parameter '{}' : {} on line {}", pname, decl.stype, l);
                        let lineref = LineRef::from_str(l, pline, pname);
                        self.add_local_checked(
                            pname,
                            &decl.stype,
                            decl.init.as_deref(),
                            lineref,
                            false,
                        );
                    }
                }
            }
        }

        for l in el + 1..end_line {
            self.check_booleans(l);
            self.check_identifiers(l);
            self.check_variables(l, true);
            self.check_local_constants(l);
            self.check_asserts(l);
        }

        self.pop_scope_and_report();
    }

    /// Function declarations in a package spec end at the `return` clause.
    fn check_function_declarations(&mut self, line_num: usize) -> Option<usize> {
        let lines = self.lines;
        let caps = FUNCTION_OPEN.captures(&lines.lines[line_num])?;
        let name = caps.get(3).unwrap().as_str().to_string();
        let end_line = (line_num..lines.num_lines())
            .find(|&l| RETURN_END.is_match(&lines.lines[l]))?;
        log::debug!(
            "detected function declaration '{}' on lines {}-{}",
            name,
            line_num,
            end_line
        );
        self.add_referenced_checked(
            name.as_str(),
            LineRef::from_str(line_num, &lines.lines[line_num], &name),
            true,
        );
        if let Some(id) = self.symbols.lookup(&name) {
            self.symbols.inc_refs(id);
        }
        Some(end_line)
    }

    /// Procedure declarations in a package spec end with the parameter list.
    fn check_procedure_declarations(&mut self, line_num: usize) -> Option<usize> {
        let lines = self.lines;
        let line = &lines.lines[line_num];
        let caps = PROCEDURE_PARAMS.captures(line)?;
        let name = caps.get(1).unwrap().as_str().to_string();
        let open = caps.get(0).unwrap().end() - 1;
        let (_, end_line, _) = expr::extract_expression(lines, line_num, open)?;
        log::debug!(
            "detected procedure declaration '{}' on lines {}-{}",
            name,
            line_num,
            end_line
        );
        self.add_referenced_checked(&name, LineRef::from_str(line_num, line, &name), true);
        if let Some(id) = self.symbols.lookup(&name) {
            self.symbols.inc_refs(id);
        }
        Some(end_line)
    }

    // ------------------------------------------------------------------
    // components and records

    pub(crate) fn check_components(&mut self, line_num: usize) -> Option<usize> {
        let lines = self.lines;
        let caps = COMPONENT_OPEN.captures(&lines.lines[line_num])?;
        let name = caps.get(1).unwrap().as_str().to_string();
        let end_line = self.find_region_end(&end_keyword_pattern("component", &name), line_num)?;

        log::debug!("detected component '{}' on lines {}-{}", name, line_num, end_line);
        let lineref = LineRef::from_str(line_num, &lines.lines[line_num], &name);
        self.add_referenced_checked(&name, lineref, true);

        if !COMPONENTS_IGNORED.contains(&name.to_lowercase().as_str()) {
            let message = format!(
                "Detected component '{}'. Direct instantiation is preferred over component where possible.",
                name
            );
            self.report
                .emit(self.filename, Category::Components, 1, lineref, &message);
        }
        Some(end_line)
    }

    pub(crate) fn check_records(&mut self, line_num: usize) -> Option<usize> {
        let lines = self.lines;
        let caps = RECORD_OPEN.captures(&lines.lines[line_num])?;
        let name = caps.get(1).unwrap().as_str().to_string();
        let end_line = self.find_region_end(&end_subprogram_pattern("record", &name), line_num)?;

        log::debug!("detected record '{}' on lines {}-{}", name, line_num, end_line);
        self.add_referenced_checked(
            &name,
            LineRef::from_str(line_num, &lines.lines[line_num], &name),
            true,
        );

        for l in line_num..end_line {
            self.check_identifiers(l);
            if let Some(decl) = self.match_declaration(l, DeclOptions::default()) {
                for element in &decl.names {
                    log::debug!("detected record element '{}' : {}", element, decl.stype);
                }
            }
        }
        Some(end_line)
    }

    // ------------------------------------------------------------------
    // declarations

    pub(crate) fn check_constants(&mut self, line_num: usize, in_pkg: bool) {
        let opts = DeclOptions {
            req_decl_type: Some("constant"),
            ..DeclOptions::default()
        };
        let Some(decl) = self.match_declaration(line_num, opts) else {
            return;
        };
        let lines = self.lines;
        let line = &lines.lines[line_num];
        for name in &decl.names {
            log::debug!(
                "detected constant declaration '{}' : {} := {:?}",
                name,
                decl.stype,
                decl.init
            );
            let lineref = LineRef::from_str(line_num, line, name);
            let id = self
                .symbols
                .add_constant(name, &decl.stype, decl.init.as_deref(), lineref);
            self.symbols.add_driver(id, Driver::Once { line: line_num });
            if in_pkg {
                self.symbols.inc_refs(id);
            }
            self.warn_constant_naming(name, lineref, "Constant");
        }
    }

    pub(crate) fn check_signals(&mut self, line_num: usize) {
        let opts = DeclOptions {
            req_decl_type: Some("signal"),
            ..DeclOptions::default()
        };
        let Some(decl) = self.match_declaration(line_num, opts) else {
            return;
        };
        let lines = self.lines;
        let line = &lines.lines[line_num];
        for name in &decl.names {
            log::debug!(
                "detected signal declaration '{}' : {} := {:?}",
                name,
                decl.stype,
                decl.init
            );
            let lineref = LineRef::from_str(line_num, line, name);
            self.symbols
                .add_signal(name, &decl.stype, decl.init.as_deref(), lineref);
            if !super::is_all_lower(name) {
                self.warn_identifier_case(name, lineref);
            }
        }
    }

    /// Type, subtype and alias declarations. Enum values must be UPPER, and
    /// FSM state enums must use `ST_*` / `*_ST` names.
    pub(crate) fn check_types(&mut self, line_num: usize, in_pkg: bool) {
        let lines = self.lines;
        let line = &lines.lines[line_num];

        if let Some(caps) = TYPE_ENUM.captures(line) {
            let name = caps.get(1).unwrap().as_str().to_string();
            let open = caps.get(0).unwrap().end() - 1;
            if let Some((text, _, _)) = expr::extract_expression(lines, line_num, open) {
                let joined: String = text.split_whitespace().collect();
                let enum_vals: Vec<&str> = joined.split(',').collect();
                self.add_referenced_checked(&name, LineRef::from_str(line_num, line, &name), true);
                log::debug!("detected type declaration '{}' is {:?}", name, enum_vals);
                if in_pkg {
                    if let Some(id) = self.symbols.lookup(&name) {
                        self.symbols.inc_refs(id);
                    }
                }

                let fsm_type =
                    name.to_lowercase().contains("state") || name.to_lowercase().contains("fsm");
                for val in enum_vals {
                    if !super::is_all_upper(val) {
                        let message = format!(
                            "Invalid capitalization on '{}'. Enum values should use all upper case.",
                            val
                        );
                        self.report.emit(
                            self.filename,
                            Category::Constants,
                            1,
                            LineRef::from_str(line_num, line, val),
                            &message,
                        );
                    }
                    if fsm_type
                        && !FSM_ST_PREFIX.is_match(&val.to_uppercase())
                        && !FSM_ST_SUFFIX.is_match(&val.to_uppercase())
                    {
                        let message = format!(
                            "Invalid naming convention on enum FSM type '{}'. Enum type names should use ST_ or _ST.",
                            val
                        );
                        self.report.emit(
                            self.filename,
                            Category::Naming,
                            1,
                            LineRef::from_str(line_num, line, val),
                            &message,
                        );
                    }
                }
            }
        }

        if let Some(caps) = SUBTYPE_DECL.captures(line) {
            let name = caps.get(1).unwrap().as_str();
            self.add_referenced_checked(name, LineRef::from_str(line_num, line, name), false);
            log::debug!("detected subtype declaration '{}'", name);
            if in_pkg {
                if let Some(id) = self.symbols.lookup(name) {
                    self.symbols.inc_refs(id);
                }
            }
        }

        if let Some(caps) = ALIAS_DECL.captures(line) {
            let name = caps.get(1).unwrap().as_str();
            self.add_referenced_checked(name, LineRef::from_str(line_num, line, name), true);
            log::debug!("detected alias declaration '{}'", name);
            if in_pkg {
                if let Some(id) = self.symbols.lookup(name) {
                    self.symbols.inc_refs(id);
                }
            }
        }
    }

    /// Variable declarations in the current scope; returns the names so the
    /// process pass can warn about variable use.
    pub(crate) fn check_variables(&mut self, line_num: usize, skip_int_range: bool) -> Vec<String> {
        let opts = DeclOptions {
            skip_int_range,
            req_decl_type: Some("variable"),
            ..DeclOptions::default()
        };
        let Some(decl) = self.match_declaration(line_num, opts) else {
            return Vec::new();
        };
        let lines = self.lines;
        let line = &lines.lines[line_num];
        for name in &decl.names {
            log::debug!(
                "detected local '{}' : {} := {:?} on line {}",
                name,
                decl.stype,
                decl.init,
                line_num
            );
            self.warn_if_shadowing(name, line_num, "variable");
            let lineref = LineRef::from_str(line_num, line, name);
            self.add_local_checked(name, &decl.stype, decl.init.as_deref(), lineref, false);
        }
        decl.names
    }

    pub(crate) fn check_local_constants(&mut self, line_num: usize) {
        let opts = DeclOptions {
            skip_int_range: true,
            req_decl_type: Some("constant"),
            ..DeclOptions::default()
        };
        let Some(decl) = self.match_declaration(line_num, opts) else {
            return;
        };
        let lines = self.lines;
        let line = &lines.lines[line_num];
        for name in &decl.names {
            log::debug!(
                "detected local constant '{}' : {} := {:?} on line {}",
                name,
                decl.stype,
                decl.init,
                line_num
            );
            self.warn_if_shadowing(name, line_num, "constant");
            let lineref = LineRef::from_str(line_num, line, name);
            self.warn_constant_naming(name, lineref, "Constant");
            self.add_local_checked(name, &decl.stype, decl.init.as_deref(), lineref, true);
        }
    }

    fn warn_if_shadowing(&mut self, name: &str, line_num: usize, what: &str) {
        if !self.symbols.is_referenced_kind(name) {
            return;
        }
        let Some(id) = self.symbols.lookup(name) else {
            return;
        };
        let shadowed = self.symbols.get(id);
        if matches!(
            shadowed.kind,
            super::symbols::IdentKind::Variable(_) | super::symbols::IdentKind::LocalConstant(_)
        ) {
            return;
        }
        let shadowed_line = shadowed.lineref.line;
        let shadowed_ref = shadowed.lineref;
        let line = &self.lines.lines[line_num];
        let message = format!(
            "Local {} '{}' shadows previously declared identifier. Previous declared on line {}.",
            what, name, shadowed_line
        );
        self.report.emit(
            self.filename,
            Category::Shadow,
            4,
            LineRef::from_str(line_num, line, name),
            &message,
        );
        let message = format!(
            "Identifier is shadowed by later declared local {} '{}'.",
            what, name
        );
        self.report
            .emit(self.filename, Category::Shadow, 4, shadowed_ref, &message);
    }

    fn warn_constant_naming(&mut self, name: &str, lineref: LineRef, what: &str) {
        if !super::is_all_upper(name) {
            let message = format!(
                "Invalid capitalization on '{}'. {} names should use all upper case.",
                name, what
            );
            self.report
                .emit(self.filename, Category::Constants, 1, lineref, &message);
        }
        if !name.to_uppercase().starts_with("C_") {
            let message = format!(
                "Invalid naming convention on '{}'. {} names should use prefix 'C_'.",
                name, what
            );
            self.report
                .emit(self.filename, Category::Naming, 1, lineref, &message);
        }
    }

    // ------------------------------------------------------------------
    // processes

    pub(crate) fn check_processes(&mut self, line_num: usize) -> Option<usize> {
        let lines = self.lines;
        let line = &lines.lines[line_num];
        let caps = PROCESS_OPEN.captures(line)?;
        let label = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|l| !l.is_empty());
        let end_line = self.find_region_end(
            &end_keyword_pattern("process", label.as_deref().unwrap_or("")),
            line_num,
        )?;

        let mut sensitivity = Vec::new();
        if let Some(m) = PROCESS_SENSITIVITY.find(line) {
            if let Some((text, _, _)) = expr::extract_expression(lines, line_num, m.end() - 1) {
                sensitivity = SENSITIVITY_WORD
                    .find_iter(&text.to_lowercase())
                    .map(|m| m.as_str().to_string())
                    .filter(|w| w == "all" || self.symbols.is_signal(w))
                    .collect();
            }
        }

        self.check_process(line_num, end_line, label.as_deref(), &sensitivity);
        Some(end_line)
    }

    fn check_process(
        &mut self,
        start_line: usize,
        end_line: usize,
        label: Option<&str>,
        sensitivity: &[String],
    ) {
        let lines = self.lines;
        log::debug!(
            "detected process '{:?}' on lines {}-{} ({:?})",
            label,
            start_line,
            end_line,
            sensitivity
        );
        let sline = &lines.lines[start_line];
        if let Some(label) = label {
            self.add_other_checked(label, LineRef::from_str(start_line, sline, label));
        }

        let mut written: BTreeSet<String> = BTreeSet::new();
        let mut inputs: BTreeSet<String> = BTreeSet::new();
        let contains_all = sensitivity.iter().any(|s| s == "all");

        self.symbols.push_scope();

        if contains_all {
            self.report.emit(
                self.filename,
                Category::Vhdl2008Sensitivity,
                4,
                LineRef::from_str(start_line, sline, "all"),
                "Avoid VHDL2008 construct 'all' in sensitivity list.",
            );
        }

        // Duplicates, first occurrence order.
        let mut checked: Vec<&str> = Vec::new();
        let mut dups: Vec<&str> = Vec::new();
        for item in sensitivity {
            if checked.contains(&item.as_str()) {
                continue;
            }
            checked.push(item.as_str());
            if sensitivity.iter().filter(|x| *x == item).count() > 1 {
                dups.push(item.as_str());
            }
        }
        for item in dups {
            let message = format!("Duplicate signal '{}' in sensitivity list.", item);
            self.report.emit(
                self.filename,
                Category::Sensitivity,
                4,
                LineRef::from_str_last(start_line, sline, item),
                &message,
            );
        }

        // No sensitivity list at all means a simulation process.
        let sim_process = sensitivity.is_empty();

        // A clock edge anywhere in the body makes the process sequential.
        let mut sequential = false;
        let mut clk_name = String::new();
        let mut clk_line = start_line;
        for l in start_line..end_line {
            let pline = &lines.lines[l];
            clk_line = l;
            let hit = TICK_EVENT_USE
                .captures(pline)
                .or_else(|| RISING_EDGE.captures(pline))
                .or_else(|| FALLING_EDGE.captures(pline));
            if let Some(caps) = hit {
                sequential = true;
                clk_name = caps.get(1).unwrap().as_str().to_string();
                break;
            }
        }

        if !sim_process && sequential {
            if !sensitivity.contains(&clk_name.to_lowercase()) && !contains_all {
                let message = format!("Missing clock '{}' from sensitivity list", clk_name);
                self.report.emit(
                    self.filename,
                    Category::Sensitivity,
                    5,
                    LineRef::from_str(clk_line, &lines.lines[clk_line], &clk_name),
                    &message,
                );
            }

            if !CLK_PREFIX.is_match(&clk_name)
                && !CLK_SUFFIX.is_match(&clk_name)
                && !CLK_I_SUFFIX.is_match(&clk_name)
            {
                let message = format!(
                    "Invalid naming convention on clock signal '{}'. Allowed conventions are [clk_*, *_clk, *_clk_i].",
                    clk_name
                );
                self.report.emit(
                    self.filename,
                    Category::Naming,
                    1,
                    LineRef::from_str(clk_line, &lines.lines[clk_line], &clk_name),
                    &message,
                );
            }

            // Clock plus an optional async reset.
            if sensitivity.len() > 2 {
                self.report.emit(
                    self.filename,
                    Category::Sensitivity,
                    4,
                    LineRef::only_line(start_line),
                    "Superfluous items in sensitivity list. Sequential processes should have at \
                     most 2 items (clock, async reset).",
                );
            }
        }

        // Declarative part.
        let mut l = start_line;
        while l <= end_line {
            let pline = &lines.lines[l];
            self.check_identifiers(l);

            if let Some(f_end) = self.check_functions(l, false) {
                l = f_end + 1;
                continue;
            }
            if let Some(f_end) = self.check_procedures(l, false) {
                l = f_end + 1;
                continue;
            }

            let names = self.check_variables(l, sim_process);
            if !names.is_empty() && !sim_process {
                self.report.emit(
                    self.filename,
                    Category::Variables,
                    4,
                    LineRef::from_str(l, pline, &names[0]),
                    "Variables are easily misused and should be avoided.",
                );
            }

            self.check_local_constants(l);

            if ANY_BEGIN.is_match(pline) {
                break;
            }
            l += 1;
        }

        // Statement part.
        let body_line = l;
        for l in body_line..end_line {
            let pline = &lines.lines[l];

            if let Some(caps) = CASE_OPEN.captures(pline) {
                let case_label = caps.get(2).map(|m| m.as_str().to_string());
                let case_name = caps.get(3).unwrap().as_str().to_string();
                let end_pat = format!(
                    r"(?i)^.*\bend\s+case(\s+{})?\b",
                    regex::escape(case_label.as_deref().unwrap_or(""))
                );
                let end_re = Regex::new(&end_pat).ok();
                let case_end = end_re
                    .and_then(|re| (l..end_line).find(|&ll| re.is_match(&lines.lines[ll])));
                match case_end {
                    Some(case_end) => self.check_case_statement(
                        l,
                        case_end,
                        case_label.as_deref(),
                        &case_name,
                        sequential,
                    ),
                    None => break,
                }
            }

            if let Some(caps) = LOOP_OPEN.captures(pline) {
                let loop_label = caps.get(2).map(|m| m.as_str().to_string());
                let end_pat = format!(
                    r"(?i)^.*\bend\s+loop(\s+{})?\b",
                    regex::escape(loop_label.as_deref().unwrap_or(""))
                );
                let end_re = Regex::new(&end_pat).ok();
                let loop_end = end_re
                    .and_then(|re| (l..end_line).find(|&ll| re.is_match(&lines.lines[ll])));
                match loop_end {
                    Some(loop_end) => self.check_loop(l, loop_end, loop_label.as_deref()),
                    None => break,
                }
            }

            if !sim_process {
                if let Some(caps) = TICK_EVENT_WORD.captures(pline) {
                    let name = caps.get(1).unwrap();
                    let message = format!(
                        "Use 'rising_edge/falling_edge({})' instead of '{}'event'",
                        name.as_str(),
                        name.as_str()
                    );
                    self.report.emit(
                        self.filename,
                        Category::RisingEdge,
                        4,
                        LineRef::new(l, name.start(), name.end()),
                        &message,
                    );
                }
            }

            let used = self.find_used_variables(pline);
            for w in &used.write {
                written.insert(w.to_lowercase());
                if let Some(id) = self.symbols.typed(w) {
                    self.symbols
                        .add_driver(id, Driver::Process { scope: start_line, line: l });
                }
            }
            for r in &used.read {
                inputs.insert(r.to_lowercase());
            }

            self.check_identifiers(l);
            self.check_asserts(l);

            // A second process writing the same signal is a multiple-driver
            // error on the later write.
            for w in &used.write {
                let Some(id) = self.symbols.typed(w) else {
                    continue;
                };
                if self.symbols.get(id).has_multiple_drivers() {
                    let prior: Vec<String> = self
                        .symbols
                        .get(id)
                        .prior_driver_lines()
                        .iter()
                        .map(|line| line.to_string())
                        .collect();
                    let message = format!(
                        "Multiple drivers on signal '{}'. Previous drivers are on line(s): {}.",
                        w,
                        prior.join(",")
                    );
                    self.report.emit(
                        self.filename,
                        Category::MultipleDrivers,
                        5,
                        LineRef::from_str(l, pline, w),
                        &message,
                    );
                }
            }

            if !sim_process && !sequential {
                for r in &used.read {
                    if !sensitivity.contains(&r.to_lowercase()) && !contains_all {
                        let message = format!("Missing signal '{}' from sensitivity list", r);
                        self.report.emit(
                            self.filename,
                            Category::Sensitivity,
                            5,
                            LineRef::from_str(l, pline, r),
                            &message,
                        );
                    }
                }
            }
        }

        // Listed but never read.
        let mut seen: Vec<&String> = Vec::new();
        for item in sensitivity {
            if seen.contains(&item) {
                continue;
            }
            seen.push(item);
            if !inputs.contains(item) && item != "all" {
                let message = format!("Extra signal '{}' in sensitivity list.", item);
                self.report.emit(
                    self.filename,
                    Category::Sensitivity,
                    4,
                    LineRef::from_str(start_line, sline, item),
                    &message,
                );
            }
        }

        // A combinational output that is also an input feeds back on itself.
        if !sim_process && !sequential {
            for name in written.intersection(&inputs) {
                let message = format!("Possible combinational loop detected on signal '{}'.", name);
                self.report.emit(
                    self.filename,
                    Category::CombinationalLoop,
                    5,
                    LineRef::only_line(start_line),
                    &message,
                );
            }
        }

        self.process_drivers.extend(written);
        self.pop_scope_and_report();
    }

    // ------------------------------------------------------------------
    // case statements and loops

    /// In a sequential case over the state register, `state <= <current>` in
    /// the `when <current>` branch is a redundant self-assignment.
    fn check_case_statement(
        &mut self,
        start_line: usize,
        end_line: usize,
        label: Option<&str>,
        name: &str,
        is_sequential: bool,
    ) {
        let lines = self.lines;
        log::debug!(
            "detected case statement '{}' on lines {}-{}",
            name,
            start_line,
            end_line
        );
        if let Some(label) = label {
            self.add_other_checked(label, LineRef::from_str(start_line, &lines.lines[start_line], label));
        }

        let mut current_state: Option<String> = None;
        for l in start_line..end_line {
            let pline = &lines.lines[l];

            if let Some(caps) = WHEN_STATE.captures(pline) {
                current_state = Some(caps.get(1).unwrap().as_str().to_string());
            }

            if !is_sequential {
                continue;
            }
            let (Some(caps), Some(state)) = (STATE_ASSIGN.captures(pline), &current_state) else {
                continue;
            };
            let stmt = caps.get(1).unwrap().as_str().trim();
            let lhs = caps.get(2).unwrap().as_str().trim();
            let rhs = caps.get(3).unwrap().as_str().trim();
            if lhs.eq_ignore_ascii_case(name) && rhs.eq_ignore_ascii_case(state) {
                let message = format!("Redundant assignment of state '{}' to '{}'", name, state);
                self.report.emit(
                    self.filename,
                    Category::Fsm,
                    4,
                    LineRef::from_str(l, pline, stmt),
                    &message,
                );
            }
        }
    }

    /// Unconditional loops must contain a `wait` or an `exit`.
    fn check_loop(&mut self, start_line: usize, end_line: usize, label: Option<&str>) {
        let lines = self.lines;
        log::debug!("detected loop '{:?}' on lines {}-{}", label, start_line, end_line);
        if let Some(label) = label {
            self.add_other_checked(label, LineRef::from_str(start_line, &lines.lines[start_line], label));
        }

        let pline = &lines.lines[start_line];
        if WHILE_LOOP.is_match(pline) || FOR_LOOP.is_match(pline) {
            return;
        }

        let escapes = (start_line..end_line).any(|l| {
            WAIT_STMT.is_match(&lines.lines[l]) || EXIT_STMT.is_match(&lines.lines[l])
        });
        if !escapes {
            self.report.emit(
                self.filename,
                Category::Loops,
                4,
                LineRef::only_line(start_line),
                "Infinite loop. Loop must contain wait or exit statement.",
            );
        }
    }

    // ------------------------------------------------------------------
    // port maps

    pub(crate) fn check_port_maps(&mut self, line_num: usize) -> Option<usize> {
        let lines = self.lines;
        let line = &lines.lines[line_num];
        let caps = PORT_MAP_OPEN.captures(line)?;
        let label = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|l| !l.is_empty());

        let open = PORT_MAP_CLAUSE.find(line)?.end() - 1;
        let (text, end_line, _) = expr::extract_expression(lines, line_num, open)?;

        log::debug!(
            "detected port map '{:?}' on lines {}-{}",
            label,
            line_num,
            end_line
        );
        if let Some(label) = &label {
            self.add_other_checked(label, LineRef::from_str(line_num, line, label));
        }

        let joined: String = text.split_whitespace().collect();
        for mapping in split_top_level_commas(&joined) {
            let rhs = match mapping.split_once("=>") {
                Some((_, rhs)) => {
                    log::debug!("port mapping '{}'", mapping);
                    rhs.to_string()
                }
                None => {
                    self.report.emit(
                        self.filename,
                        Category::PortMaps,
                        4,
                        LineRef::only_line(line_num),
                        "Positional port mapping not allowed. Use named mapping.",
                    );
                    mapping.clone()
                }
            };

            self.check_identifiers_string(&rhs, line_num);
            if let Some(id) = self.symbols.typed(&rhs) {
                // Direction is unknown here; the association may or may not
                // drive the signal.
                self.symbols
                    .add_driver(id, Driver::Possible { line: line_num });
            }
        }
        Some(end_line)
    }
}
