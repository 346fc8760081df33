use ahash::AHashMap;
use indexmap::IndexMap;

use crate::report::LineRef;

/// All VHDL reserved words, plus the type names from the standard packages.
/// Reserved words are never treated as identifiers.
pub(crate) const RESERVED_WORDS: &[&str] = &[
    "abs",
    "access",
    "after",
    "alias",
    "all",
    "and",
    "architecture",
    "array",
    "assert",
    "attribute",
    "begin",
    "block",
    "body",
    "buffer",
    "bus",
    "case",
    "component",
    "configuration",
    "constant",
    "disconnect",
    "downto",
    "else",
    "elsif",
    "end",
    "entity",
    "exit",
    "file",
    "for",
    "function",
    "generate",
    "generic",
    "group",
    "guarded",
    "if",
    "impure",
    "in",
    "inertial",
    "inout",
    "is",
    "label",
    "library",
    "linkage",
    "literal",
    "loop",
    "map",
    "mod",
    "nand",
    "new",
    "next",
    "nor",
    "not",
    "null",
    "of",
    "on",
    "open",
    "or",
    "others",
    "out",
    "package",
    "port",
    "postponed",
    "procedure",
    "process",
    "pure",
    "range",
    "record",
    "register",
    "reject",
    "rem",
    "report",
    "return",
    "rol",
    "ror",
    "select",
    "severity",
    "signal",
    "shared",
    "sla",
    "sll",
    "sra",
    "srl",
    "subtype",
    "then",
    "to",
    "transport",
    "type",
    "unaffected",
    "units",
    "until",
    "use",
    "variable",
    "wait",
    "when",
    "while",
    "with",
    "xnor",
    "xor",
    // types from standard
    "bit",
    "bit_vector",
    "integer",
    "natural",
    "positive",
    "boolean",
    "string",
    "character",
    "real",
    "time",
    "delay_length",
    // types from std_logic_1164
    "std_ulogic",
    "std_ulogic_vector",
    "std_logic",
    "std_logic_vector",
    // types from numeric_std
    "signed",
    "unsigned",
    // types from textio
    "line",
    "text",
    "side",
    "width",
];

pub(crate) fn is_reserved_word(name: &str) -> bool {
    let lower = name.to_lowercase();
    RESERVED_WORDS.iter().any(|w| *w == lower)
}

/// A statement or port that assigns a value to a signal.
///
/// Equality is kind-dependent: declaration drivers compare by line, process
/// drivers by the owning process, and possible drivers (port maps, where the
/// direction is unknown) never count toward the known-driver set.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Driver {
    /// A one-off driver, e.g. an input port or a constant initializer.
    Once { line: usize },
    /// A write inside a process; `scope` is the process start line.
    Process { scope: usize, line: usize },
    /// A port-map association that may or may not drive the signal.
    Possible { line: usize },
}

impl Driver {
    pub(crate) fn line(&self) -> usize {
        match *self {
            Driver::Once { line } => line,
            Driver::Process { line, .. } => line,
            Driver::Possible { line } => line,
        }
    }

    fn is_possible(&self) -> bool {
        matches!(self, Driver::Possible { .. })
    }
}

impl PartialEq for Driver {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Driver::Once { line: a }, Driver::Once { line: b }) => a == b,
            (Driver::Process { scope: a, .. }, Driver::Process { scope: b, .. }) => a == b,
            (Driver::Possible { line: a }, Driver::Possible { line: b }) => a == b,
            _ => false,
        }
    }
}

/// The port direction of an entity port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PortMode {
    In,
    Out,
    Inout,
    /// Anything else on the declaration; flagged by the port-clause check.
    Other(String),
}

impl PortMode {
    pub(crate) fn parse(mode: &str) -> PortMode {
        match mode.to_lowercase().as_str() {
            "in" => PortMode::In,
            "out" => PortMode::Out,
            "inout" => PortMode::Inout,
            _ => PortMode::Other(mode.to_string()),
        }
    }

    pub(crate) fn drives_signal(&self) -> bool {
        matches!(self, PortMode::In | PortMode::Inout)
    }
}

/// Type information shared by the typed identifier kinds.
#[derive(Debug, Clone)]
pub(crate) struct TypeInfo {
    pub(crate) stype: String,
    #[allow(dead_code)]
    pub(crate) init: Option<String>,
    pub(crate) drivers: Vec<Driver>,
}

impl TypeInfo {
    fn new(stype: &str, init: Option<&str>) -> Self {
        TypeInfo {
            stype: stype.to_string(),
            init: init.map(|s| s.to_string()),
            drivers: Vec::new(),
        }
    }

    pub(crate) fn is_boolean(&self) -> bool {
        self.stype.eq_ignore_ascii_case("boolean")
    }
}

/// What an identifier is; the capability tests below are pattern checks.
#[derive(Debug, Clone)]
pub(crate) enum IdentKind {
    /// Libraries, architectures, entities, labels: declared, never typed.
    Plain,
    /// Types, functions, procedures, aliases: expected to be read somewhere.
    Referenced,
    Signal(TypeInfo),
    Port(TypeInfo, PortMode),
    Constant(TypeInfo),
    Variable(TypeInfo),
    LocalConstant(TypeInfo),
}

/// One declared identifier. Compared by case-folded name; the original
/// casing is kept for the capitalization checks.
#[derive(Debug, Clone)]
pub(crate) struct Ident {
    pub(crate) name: String,
    pub(crate) lineref: LineRef,
    pub(crate) refs: u32,
    pub(crate) kind: IdentKind,
}

impl Ident {
    pub(crate) fn is_referenced(&self) -> bool {
        self.refs > 0
    }

    pub(crate) fn type_info(&self) -> Option<&TypeInfo> {
        match &self.kind {
            IdentKind::Signal(t)
            | IdentKind::Port(t, _)
            | IdentKind::Constant(t)
            | IdentKind::Variable(t)
            | IdentKind::LocalConstant(t) => Some(t),
            _ => None,
        }
    }

    fn type_info_mut(&mut self) -> Option<&mut TypeInfo> {
        match &mut self.kind {
            IdentKind::Signal(t)
            | IdentKind::Port(t, _)
            | IdentKind::Constant(t)
            | IdentKind::Variable(t)
            | IdentKind::LocalConstant(t) => Some(t),
            _ => None,
        }
    }

    /// Referenced-capable identifiers take part in the unused-identifier
    /// scan; plain identifiers (labels, library names) do not.
    pub(crate) fn expects_references(&self) -> bool {
        !matches!(self.kind, IdentKind::Plain)
    }

    fn is_local(&self) -> bool {
        matches!(
            self.kind,
            IdentKind::Variable(_) | IdentKind::LocalConstant(_)
        )
    }

    /// More than one distinct known driver, under the per-kind equality.
    pub(crate) fn has_multiple_drivers(&self) -> bool {
        let Some(info) = self.type_info() else {
            return false;
        };
        let mut known: Vec<&Driver> = Vec::new();
        for driver in info.drivers.iter().filter(|d| !d.is_possible()) {
            if !known.iter().any(|k| **k == *driver) {
                known.push(driver);
            }
        }
        known.len() > 1
    }

    /// The lines of every driver but the last, ascending; used in the
    /// multiple-driver message.
    pub(crate) fn prior_driver_lines(&self) -> Vec<usize> {
        let Some(info) = self.type_info() else {
            return Vec::new();
        };
        let mut lines: Vec<usize> = info
            .drivers
            .iter()
            .take(info.drivers.len().saturating_sub(1))
            .map(|d| d.line())
            .collect();
        lines.sort_unstable();
        lines
    }
}

/// Index of an identifier in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SymId(usize);

/// Scoped mapping from case-folded name to identifier record.
///
/// Identifiers live in an arena and every name table holds indices, so
/// signals can refer to process drivers and vice versa without ownership
/// cycles. A fresh table is created for every file.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    arena: Vec<Ident>,
    signals: AHashMap<String, SymId>,
    constants: AHashMap<String, SymId>,
    others: AHashMap<String, SymId>,
    /// Insertion-ordered, so the unused-identifier report is stable.
    all: IndexMap<String, SymId>,
    scopes: Vec<AHashMap<String, SymId>>,
}

impl SymbolTable {
    pub(crate) fn new() -> Self {
        SymbolTable::default()
    }

    pub(crate) fn get(&self, id: SymId) -> &Ident {
        &self.arena[id.0]
    }

    fn intern(&mut self, name: &str, lineref: LineRef, kind: IdentKind) -> SymId {
        let id = SymId(self.arena.len());
        self.arena.push(Ident {
            name: name.to_string(),
            lineref,
            refs: 0,
            kind,
        });
        self.all.insert(name.to_lowercase(), id);
        id
    }

    pub(crate) fn add_signal(
        &mut self,
        name: &str,
        stype: &str,
        init: Option<&str>,
        lineref: LineRef,
    ) -> SymId {
        let id = self.intern(name, lineref, IdentKind::Signal(TypeInfo::new(stype, init)));
        self.signals.insert(name.to_lowercase(), id);
        id
    }

    pub(crate) fn add_port(
        &mut self,
        name: &str,
        stype: &str,
        init: Option<&str>,
        mode: PortMode,
        lineref: LineRef,
    ) -> SymId {
        let id = self.intern(
            name,
            lineref,
            IdentKind::Port(TypeInfo::new(stype, init), mode),
        );
        self.signals.insert(name.to_lowercase(), id);
        id
    }

    pub(crate) fn add_constant(
        &mut self,
        name: &str,
        stype: &str,
        init: Option<&str>,
        lineref: LineRef,
    ) -> SymId {
        let id = self.intern(
            name,
            lineref,
            IdentKind::Constant(TypeInfo::new(stype, init)),
        );
        self.constants.insert(name.to_lowercase(), id);
        id
    }

    pub(crate) fn add_other(&mut self, name: &str, lineref: LineRef) -> SymId {
        let id = self.intern(name, lineref, IdentKind::Plain);
        self.others.insert(name.to_lowercase(), id);
        id
    }

    pub(crate) fn add_referenced(&mut self, name: &str, lineref: LineRef) -> SymId {
        let id = self.intern(name, lineref, IdentKind::Referenced);
        self.others.insert(name.to_lowercase(), id);
        id
    }

    /// Adds a variable or local constant to the innermost scope.
    pub(crate) fn add_local(
        &mut self,
        name: &str,
        stype: &str,
        init: Option<&str>,
        lineref: LineRef,
        is_constant: bool,
    ) -> SymId {
        let kind = if is_constant {
            IdentKind::LocalConstant(TypeInfo::new(stype, init))
        } else {
            IdentKind::Variable(TypeInfo::new(stype, init))
        };
        let id = self.intern(name, lineref, kind);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_lowercase(), id);
        }
        id
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(AHashMap::new());
    }

    /// Pops the innermost scope and returns its never-referenced locals.
    /// A popped local is removed from `all` only if the slot still refers
    /// to the same record (it may have been shadowed since).
    pub(crate) fn pop_scope(&mut self) -> Vec<(String, LineRef)> {
        let mut unused = Vec::new();
        let Some(scope) = self.scopes.pop() else {
            return unused;
        };
        let mut ids: Vec<SymId> = scope.values().copied().collect();
        ids.sort_by_key(|id| id.0);
        for id in ids {
            let ident = &self.arena[id.0];
            if !ident.is_referenced() {
                unused.push((ident.name.clone(), ident.lineref));
            }
            let key = ident.name.to_lowercase();
            if self.all.get(&key) == Some(&id) {
                self.all.shift_remove(&key);
            }
        }
        unused
    }

    pub(crate) fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn signal(&self, name: &str) -> Option<SymId> {
        self.signals.get(&name.to_lowercase()).copied()
    }

    pub(crate) fn is_signal(&self, name: &str) -> bool {
        self.signal(name).is_some()
    }

    fn constant(&self, name: &str) -> Option<SymId> {
        self.constants.get(&name.to_lowercase()).copied()
    }

    /// The innermost local with this name, variable or constant.
    fn local(&self, name: &str) -> Option<SymId> {
        let key = name.to_lowercase();
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&key).copied())
    }

    /// Whether `name` is a local *variable* (not a local constant).
    pub(crate) fn is_variable(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.get(&key) {
                return !matches!(self.arena[id.0].kind, IdentKind::LocalConstant(_));
            }
        }
        false
    }

    pub(crate) fn is_signal_or_variable(&self, name: &str) -> bool {
        self.is_variable(name) || self.is_signal(name)
    }

    /// Any identifier known under this case-folded name.
    pub(crate) fn lookup(&self, name: &str) -> Option<SymId> {
        self.all.get(&name.to_lowercase()).copied()
    }

    /// Locals take precedence over signals, which take precedence over
    /// constants.
    pub(crate) fn typed(&self, name: &str) -> Option<SymId> {
        if self.is_variable(name) {
            return self.local(name);
        }
        self.signal(name).or_else(|| self.constant(name))
    }

    /// Whether `name` resolves to a referenced-capable identifier.
    pub(crate) fn is_referenced_kind(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|id| self.get(id).expects_references())
            .unwrap_or(false)
    }

    pub(crate) fn inc_refs(&mut self, id: SymId) {
        self.arena[id.0].refs += 1;
    }

    pub(crate) fn add_driver(&mut self, id: SymId, driver: Driver) {
        if let Some(info) = self.arena[id.0].type_info_mut() {
            info.drivers.push(driver);
        }
    }

    /// Declaration-ordered iteration over everything still in `all`.
    pub(crate) fn all_ids(&self) -> impl Iterator<Item = SymId> + '_ {
        self.all.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lr(line: usize) -> LineRef {
        LineRef::only_line(line)
    }

    #[test]
    fn typed_lookup_prefers_locals_over_signals() {
        let mut t = SymbolTable::new();
        let sig = t.add_signal("cnt", "std_logic", None, lr(1));
        t.push_scope();
        let var = t.add_local("CNT", "integer", None, lr(5), false);
        assert_eq!(t.typed("cnt"), Some(var));
        t.pop_scope();
        assert_eq!(t.typed("cnt"), Some(sig));
    }

    #[test]
    fn pop_scope_reports_unused_locals_in_declaration_order() {
        let mut t = SymbolTable::new();
        t.push_scope();
        t.add_local("v_a", "integer", None, lr(2), false);
        let used = t.add_local("v_b", "integer", None, lr(3), false);
        t.inc_refs(used);
        let unused = t.pop_scope();
        assert_eq!(unused, vec![("v_a".to_string(), lr(2))]);
        assert!(t.lookup("v_a").is_none());
        assert_eq!(t.scope_depth(), 0);
    }

    #[test]
    fn pop_scope_keeps_all_entry_that_was_shadowed() {
        let mut t = SymbolTable::new();
        t.push_scope();
        t.add_local("x", "integer", None, lr(2), false);
        // A later global declaration reuses the slot in `all`.
        let sig = t.add_signal("x", "std_logic", None, lr(4));
        t.inc_refs(sig);
        t.pop_scope();
        assert_eq!(t.lookup("x"), Some(sig));
    }

    #[test]
    fn process_drivers_compare_by_scope() {
        let mut t = SymbolTable::new();
        let id = t.add_signal("q", "std_logic", None, lr(1));
        t.add_driver(id, Driver::Process { scope: 10, line: 12 });
        t.add_driver(id, Driver::Process { scope: 10, line: 14 });
        assert!(!t.get(id).has_multiple_drivers());
        t.add_driver(id, Driver::Process { scope: 20, line: 22 });
        assert!(t.get(id).has_multiple_drivers());
        assert_eq!(t.get(id).prior_driver_lines(), vec![12, 14]);
    }

    #[test]
    fn possible_drivers_do_not_count() {
        let mut t = SymbolTable::new();
        let id = t.add_signal("q", "std_logic", None, lr(1));
        t.add_driver(id, Driver::Possible { line: 3 });
        t.add_driver(id, Driver::Process { scope: 10, line: 12 });
        assert!(!t.get(id).has_multiple_drivers());
    }

    #[test]
    fn declaration_driver_and_process_driver_are_distinct() {
        let mut t = SymbolTable::new();
        let id = t.add_port("d_i", "std_logic", None, PortMode::In, lr(1));
        t.add_driver(id, Driver::Once { line: 1 });
        assert!(!t.get(id).has_multiple_drivers());
        t.add_driver(id, Driver::Process { scope: 8, line: 9 });
        assert!(t.get(id).has_multiple_drivers());
    }

    #[test]
    fn reserved_words_are_case_folded() {
        assert!(is_reserved_word("THEN"));
        assert!(is_reserved_word("std_logic"));
        assert!(!is_reserved_word("clk_i"));
    }
}
