use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::str::FromStr;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use regex::Regex;

/// The default state of the category filter, overridden by
/// [`Report::set_filters`]. Entries must start with `+` or `-`.
pub const DEFAULT_FILTERS: &[&str] = &["-build/include_alpha"];

macro_rules! categories {
    ($($variant:ident => $name:expr,)*) => {
        /// The category of a diagnostic.
        ///
        /// Categories form a `area/rule` hierarchy; filters match on string
        /// prefixes of the category name.
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Category {
            $($variant,)*
        }

        impl Category {
            /// All categories, in the order they are listed by `--filter=`.
            pub const ALL: &'static [Category] = &[$(Category::$variant,)*];

            /// The `area/rule` name of this category.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Category::$variant => $name,)*
                }
            }
        }

        impl FromStr for Category {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Category::$variant),)*
                    _ => Err(()),
                }
            }
        }
    };
}

categories! {
    Arithmetic => "build/arithmetic",
    Deprecated => "build/deprecated",
    Filename => "build/filename",
    IncludeAlpha => "build/include_alpha",
    PortModes => "build/port_modes",
    PortTypes => "build/port_types",
    Shadow => "build/shadow",
    Unused => "build/unused",
    Vhdl2008 => "build/vhdl2008",
    Vhdl2008Sensitivity => "build/vhdl2008/sensitivity",
    Vhdl2008Outputs => "build/vhdl2008/outputs",
    Copyright => "legal/copyright",
    Booleans => "readability/booleans",
    Capitalization => "readability/capitalization",
    Constants => "readability/constants",
    Declarations => "readability/declarations",
    Components => "readability/components",
    Fsm => "readability/fsm",
    Header => "readability/header",
    Identifiers => "readability/identifiers",
    MultilineComment => "readability/multiline_comment",
    Naming => "readability/naming",
    Nolint => "readability/nolint",
    Nul => "readability/nul",
    Others => "readability/others",
    PortMaps => "readability/portmaps",
    Reserved => "readability/reserved",
    Todo => "readability/todo",
    Units => "readability/units",
    Utf8 => "readability/utf8",
    CombinationalLoop => "runtime/combinational_loop",
    Integers => "runtime/integers",
    Latches => "runtime/latches",
    Loops => "runtime/loops",
    MultipleDrivers => "runtime/multiple_drivers",
    RisingEdge => "runtime/rising_edge",
    Sensitivity => "runtime/sensitivity",
    Variables => "runtime/variables",
    BlankLine => "whitespace/blank_line",
    Comments => "whitespace/comments",
    EndOfLine => "whitespace/end_of_line",
    EndingNewline => "whitespace/ending_newline",
    Indent => "whitespace/indent",
    LineLength => "whitespace/line_length",
    Newline => "whitespace/newline",
    Tab => "whitespace/tab",
    TodoSpacing => "whitespace/todo",
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line/column span anchoring a diagnostic.
///
/// Columns are zero-based internally; the emacs format reports them
/// one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRef {
    /// One-based line number (line 0 is the leading sentinel).
    pub line: usize,
    /// Zero-based starting column.
    pub column: usize,
    /// Zero-based column just past the end of the span.
    pub end_column: usize,
}

impl LineRef {
    /// A span from `column` to `end_column` on `line`.
    pub fn new(line: usize, column: usize, end_column: usize) -> Self {
        LineRef {
            line,
            column,
            end_column,
        }
    }

    /// A span of `len` characters starting at `column`.
    pub fn span(line: usize, column: usize, len: usize) -> Self {
        LineRef {
            line,
            column,
            end_column: column + len,
        }
    }

    /// A reference to a whole line, with a nominal one-character span.
    pub fn only_line(line: usize) -> Self {
        LineRef {
            line,
            column: 0,
            end_column: 1,
        }
    }

    /// Locates the first word-bounded occurrence of `name` in `line`.
    /// Falls back to column zero when `name` cannot be found.
    pub fn from_str(line_num: usize, line: &str, name: &str) -> Self {
        Self::locate(line_num, line, name, true, false)
    }

    /// Like [`LineRef::from_str`] but without word-boundary anchoring, for
    /// names that are not words (tabs, NUL bytes).
    pub fn from_str_unbounded(line_num: usize, line: &str, name: &str) -> Self {
        Self::locate(line_num, line, name, false, false)
    }

    /// Locates the last word-bounded occurrence of `name` in `line`.
    pub fn from_str_last(line_num: usize, line: &str, name: &str) -> Self {
        Self::locate(line_num, line, name, true, true)
    }

    fn locate(line_num: usize, line: &str, name: &str, bounded: bool, last: bool) -> Self {
        let pattern = if bounded {
            format!(r"\b({})\b", regex::escape(name))
        } else {
            format!(r"({})", regex::escape(name))
        };
        let pos = Regex::new(&pattern)
            .ok()
            .and_then(|re| {
                if last {
                    re.find_iter(line).last()
                } else {
                    re.find(line)
                }
            })
            .map(|m| m.start())
            .unwrap_or(0);
        Self::span(line_num, pos, name.len())
    }
}

/// How diagnostics are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `file:line:[col,endcol]: msg [cat] [conf]` on stderr (the default).
    #[default]
    Emacs,
    /// `file:line: warning: msg [cat] [conf]` on stderr.
    Eclipse,
    /// `file(line): error vhdllint: [cat] msg [conf]` on stderr.
    Vs7,
    /// One XML document, buffered until the end of the run.
    Junit,
    /// GNU sed commands on stdout for diagnostics with a known fixup.
    Sed,
    /// Like `sed`, but the emitted command is named `gsed`.
    Gsed,
}

impl OutputFormat {
    /// Whether stdout is reserved for machine consumption in this format.
    pub fn is_machine(self) -> bool {
        matches!(
            self,
            OutputFormat::Junit | OutputFormat::Sed | OutputFormat::Gsed
        )
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emacs" => Ok(OutputFormat::Emacs),
            "eclipse" => Ok(OutputFormat::Eclipse),
            "vs7" => Ok(OutputFormat::Vs7),
            "junit" => Ok(OutputFormat::Junit),
            "sed" => Ok(OutputFormat::Sed),
            "gsed" => Ok(OutputFormat::Gsed),
            _ => Err(format!(
                "the only allowed output formats are emacs, eclipse, vs7, junit, sed and gsed (got '{}')",
                s
            )),
        }
    }
}

/// How the end-of-run summary aggregates error counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Counting {
    /// Only the total count.
    #[default]
    Total,
    /// Counts per top-level category (`build`, `whitespace`, ...).
    Toplevel,
    /// Counts per full category (`build/unused`, ...).
    Detailed,
}

impl FromStr for Counting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(Counting::Total),
            "toplevel" => Ok(Counting::Toplevel),
            "detailed" => Ok(Counting::Detailed),
            _ => Err(format!(
                "valid counting options are total, toplevel, and detailed (got '{}')",
                s
            )),
        }
    }
}

/// Which stream a rendered line belongs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output (sed commands, info messages).
    Out,
    /// Standard error (diagnostics, tool errors).
    Err,
}

/// Options controlling the diagnostic sink.
#[derive(Debug)]
pub struct Options {
    /// Diagnostics with confidence below this level are dropped. 0-5.
    pub verbose_level: u8,

    /// Output rendering; see [`OutputFormat`].
    pub output_format: OutputFormat,

    /// Summary aggregation; see [`Counting`].
    pub counting: Counting,

    /// Suppress info output when no errors are found.
    pub quiet: bool,

    /// Extra `±category`-prefix filters applied after [`DEFAULT_FILTERS`].
    pub filters: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            verbose_level: 1,
            output_format: OutputFormat::default(),
            counting: Counting::default(),
            quiet: false,
            filters: String::new(),
        }
    }
}

#[derive(Debug)]
struct JunitFailure {
    filename: String,
    line: usize,
    message: String,
    category: Category,
    confidence: u8,
}

/// Collects, filters, counts and renders diagnostics.
///
/// Every diagnostic passes three gates before it is rendered: NOLINT
/// suppression, the confidence/verbosity gate, and the `±prefix` filter
/// chain (evaluated left to right, last match wins). Rendered lines are
/// queued and drained with [`Report::flush`] so that callers control when
/// output reaches the real streams.
#[derive(Debug)]
pub struct Report {
    verbose_level: u8,
    output_format: OutputFormat,
    counting: Counting,
    quiet: bool,
    filters: Vec<String>,
    filters_backup: Vec<String>,

    error_count: u64,
    errors_by_category: BTreeMap<String, u64>,

    queued: Vec<(Stream, String)>,
    junit_errors: Vec<String>,
    junit_failures: Vec<JunitFailure>,

    suppressions: AHashMap<Option<Category>, AHashSet<usize>>,
    region_suppressions: AHashSet<Category>,
}

static NOLINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bNOLINT(NEXTLINE|BEGIN|END)?\b(\([^)]+\))?").unwrap());

impl Report {
    /// Creates a sink from `options`.
    ///
    /// Fails with [`io::ErrorKind::InvalidInput`] if `options.filters`
    /// contains an entry that does not start with `+` or `-`.
    pub fn new(options: Options) -> io::Result<Self> {
        let mut report = Report {
            verbose_level: options.verbose_level,
            output_format: options.output_format,
            counting: options.counting,
            quiet: options.quiet,
            filters: DEFAULT_FILTERS.iter().map(|f| f.to_string()).collect(),
            filters_backup: Vec::new(),
            error_count: 0,
            errors_by_category: BTreeMap::new(),
            queued: Vec::new(),
            junit_errors: Vec::new(),
            junit_failures: Vec::new(),
            suppressions: AHashMap::new(),
            region_suppressions: AHashSet::new(),
        };
        report.add_filters(&options.filters)?;
        report.filters_backup = report.filters.clone();
        Ok(report)
    }

    /// The number of diagnostics that passed all gates so far.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// The configured verbosity gate.
    pub fn verbose_level(&self) -> u8 {
        self.verbose_level
    }

    /// Whether info output is suppressed when no errors are found.
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// The configured output format.
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Replaces the filter chain with [`DEFAULT_FILTERS`] followed by the
    /// entries in `spec` (comma-separated `±prefix` terms).
    pub fn set_filters(&mut self, spec: &str) -> io::Result<()> {
        self.filters = DEFAULT_FILTERS.iter().map(|f| f.to_string()).collect();
        self.add_filters(spec)
    }

    /// Appends filters to the existing chain, validating every entry.
    pub fn add_filters(&mut self, spec: &str) -> io::Result<()> {
        for filt in spec.split(',') {
            let clean = filt.trim();
            if !clean.is_empty() {
                self.filters.push(clean.to_string());
            }
        }
        for filt in &self.filters {
            if !filt.starts_with('+') && !filt.starts_with('-') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "every filter must start with + or - ('{}' does not)",
                        filt
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Saves the current filter chain so per-file config overrides can be
    /// undone with [`Report::restore_filters`].
    pub fn backup_filters(&mut self) {
        self.filters_backup = self.filters.clone();
    }

    /// Restores the chain saved by [`Report::backup_filters`].
    pub fn restore_filters(&mut self) {
        self.filters = self.filters_backup.clone();
    }

    /// Clears all NOLINT bookkeeping; called at the start of every file.
    pub fn reset_suppressions(&mut self) {
        self.suppressions.clear();
        self.region_suppressions.clear();
    }

    /// Parses any NOLINT directive on `raw_line` and updates the
    /// suppression tables. An unknown category in the directive is itself a
    /// `readability/nolint` diagnostic.
    pub fn parse_nolint(&mut self, filename: &str, raw_line: &str, linenum: usize) {
        if let Some(caps) = NOLINT.captures(raw_line) {
            let kind = caps.get(1).map(|m| m.as_str());
            let suppressed_line = if kind == Some("NEXTLINE") {
                linenum + 1
            } else {
                linenum
            };

            match caps.get(2).map(|m| m.as_str()) {
                None | Some("(*)") => {
                    self.suppressions
                        .entry(None)
                        .or_default()
                        .insert(suppressed_line);
                }
                Some(spec) => {
                    let name = &spec[1..spec.len() - 1];
                    if let Ok(category) = name.parse::<Category>() {
                        match kind {
                            Some("BEGIN") => {
                                self.region_suppressions.insert(category);
                            }
                            Some("END") => {
                                self.region_suppressions.remove(&category);
                            }
                            _ => {}
                        }
                        self.suppressions
                            .entry(Some(category))
                            .or_default()
                            .insert(suppressed_line);
                    } else {
                        self.emit(
                            filename,
                            Category::Nolint,
                            5,
                            LineRef::from_str(linenum, raw_line, name),
                            &format!("Unknown NOLINT error category: {}", name),
                        );
                    }
                }
            }
        }

        // Lines inside an open NOLINTBEGIN region are suppressed as they
        // stream past.
        for category in self.region_suppressions.clone() {
            self.suppressions
                .entry(Some(category))
                .or_default()
                .insert(linenum);
        }
    }

    /// Whether any NOLINTBEGIN region is still open.
    pub fn has_open_regions(&self) -> bool {
        !self.region_suppressions.is_empty()
    }

    fn suppressed(&self, category: Category, linenum: usize) -> bool {
        let hit = |key: &Option<Category>| {
            self.suppressions
                .get(key)
                .map(|lines| lines.contains(&linenum))
                .unwrap_or(false)
        };
        hit(&Some(category)) || hit(&None)
    }

    fn should_print(&self, category: Category, confidence: u8, linenum: usize) -> bool {
        if self.suppressed(category, linenum) {
            return false;
        }
        if confidence < self.verbose_level {
            return false;
        }

        let name = category.as_str();
        let mut filtered = false;
        for filt in &self.filters {
            // Validated at filter-set time: every entry starts with + or -.
            if let Some(prefix) = filt.strip_prefix('-') {
                if name.starts_with(prefix) {
                    filtered = true;
                }
            } else if let Some(prefix) = filt.strip_prefix('+') {
                if name.starts_with(prefix) {
                    filtered = false;
                }
            }
        }
        !filtered
    }

    fn count(&mut self, category: Category) {
        self.error_count += 1;
        let key = match self.counting {
            Counting::Total => return,
            Counting::Toplevel => category
                .as_str()
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            Counting::Detailed => category.as_str().to_string(),
        };
        *self.errors_by_category.entry(key).or_insert(0) += 1;
    }

    /// Reports a diagnostic. Applies the three gates, bumps the counters,
    /// and queues the rendered line (or buffers it, for junit).
    pub fn emit(
        &mut self,
        filename: &str,
        category: Category,
        confidence: u8,
        lineref: LineRef,
        message: &str,
    ) {
        if !self.should_print(category, confidence, lineref.line) {
            return;
        }
        self.count(category);

        let line = lineref.line;
        match self.output_format {
            OutputFormat::Vs7 => {
                self.queued.push((
                    Stream::Err,
                    format!(
                        "{}({}): error vhdllint: [{}] {} [{}]\n",
                        filename, line, category, message, confidence
                    ),
                ));
            }
            OutputFormat::Eclipse => {
                self.queued.push((
                    Stream::Err,
                    format!(
                        "{}:{}: warning: {} [{}] [{}]\n",
                        filename, line, message, category, confidence
                    ),
                ));
            }
            OutputFormat::Junit => {
                self.junit_failures.push(JunitFailure {
                    filename: filename.to_string(),
                    line,
                    message: message.to_string(),
                    category,
                    confidence,
                });
            }
            OutputFormat::Sed | OutputFormat::Gsed => {
                let cmd = if self.output_format == OutputFormat::Sed {
                    "sed"
                } else {
                    "gsed"
                };
                if let Some(fixup) = sed_fixup(message) {
                    self.queued.push((
                        Stream::Out,
                        format!(
                            "{} -i '{}{}' {} # {} [{}] [{}]\n",
                            cmd, line, fixup, filename, message, category, confidence
                        ),
                    ));
                } else {
                    self.queued.push((
                        Stream::Err,
                        format!(
                            "# {}:{}: \"{}\" [{}] [{}]\n",
                            filename, line, message, category, confidence
                        ),
                    ));
                }
            }
            OutputFormat::Emacs => {
                self.queued.push((
                    Stream::Err,
                    format!(
                        "{}:{}:[{},{}]: {} [{}] [{}]\n",
                        filename,
                        line,
                        lineref.column + 1,
                        lineref.end_column + 1,
                        message,
                        category,
                        confidence
                    ),
                ));
            }
        }
    }

    /// Queues an informational message on stdout, unless the format
    /// reserves stdout for machine consumption.
    pub fn info(&mut self, message: &str) {
        if !self.output_format.is_machine() {
            self.queued.push((Stream::Out, message.to_string()));
        }
    }

    /// Reports a tool failure (not a diagnostic): collected for junit,
    /// queued on stderr otherwise.
    pub fn tool_error(&mut self, message: &str) {
        if self.output_format == OutputFormat::Junit {
            self.junit_errors.push(message.trim_end().to_string());
        } else {
            self.queued.push((Stream::Err, message.to_string()));
        }
    }

    /// Queues the end-of-run summary: per-category counts (when counting is
    /// not `total`) and the total.
    pub fn summarize(&mut self) {
        let lines: Vec<String> = self
            .errors_by_category
            .iter()
            .map(|(category, count)| {
                format!("Category '{}' errors found: {}\n", category, count)
            })
            .collect();
        for line in lines {
            self.info(&line);
        }
        if self.error_count > 0 {
            let total = format!("Total errors found: {}\n", self.error_count);
            self.info(&total);
        }
    }

    /// Queues the buffered junit document, if that format is selected.
    /// Call once, after the last file.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.output_format == OutputFormat::Junit {
            let xml = self.junit_xml()?;
            self.queued.push((Stream::Err, xml));
        }
        Ok(())
    }

    /// Renders the buffered junit failures and tool errors as one XML
    /// document.
    pub fn junit_xml(&self) -> io::Result<String> {
        let num_errors = self.junit_errors.len();
        let num_failures = self.junit_failures.len();

        let mut writer = Writer::new(Vec::new());
        let mut testsuite = BytesStart::new("testsuite");
        testsuite.push_attribute(("errors", num_errors.to_string().as_str()));
        testsuite.push_attribute(("failures", num_failures.to_string().as_str()));
        testsuite.push_attribute(("name", "vhdllint"));

        let write = |r: Result<(), quick_xml::Error>| {
            r.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        };

        if num_errors == 0 && num_failures == 0 {
            testsuite.push_attribute(("tests", "1"));
            write(writer.write_event(Event::Start(testsuite)))?;
            let mut passed = BytesStart::new("testcase");
            passed.push_attribute(("name", "passed"));
            write(writer.write_event(Event::Empty(passed)))?;
        } else {
            let tests = (num_errors + num_failures).to_string();
            testsuite.push_attribute(("tests", tests.as_str()));
            write(writer.write_event(Event::Start(testsuite)))?;

            if num_errors > 0 {
                let mut testcase = BytesStart::new("testcase");
                testcase.push_attribute(("name", "errors"));
                write(writer.write_event(Event::Start(testcase)))?;
                write(writer.write_event(Event::Start(BytesStart::new("error"))))?;
                let text = self.junit_errors.join("\n");
                write(writer.write_event(Event::Text(BytesText::new(&text))))?;
                write(writer.write_event(Event::End(BytesEnd::new("error"))))?;
                write(writer.write_event(Event::End(BytesEnd::new("testcase"))))?;
            }

            if num_failures > 0 {
                // One testcase per file, in first-failure order.
                let mut order: Vec<&str> = Vec::new();
                for failure in &self.junit_failures {
                    if !order.contains(&failure.filename.as_str()) {
                        order.push(&failure.filename);
                    }
                }
                for file in order {
                    let mut testcase = BytesStart::new("testcase");
                    testcase.push_attribute(("name", file));
                    write(writer.write_event(Event::Start(testcase)))?;
                    write(writer.write_event(Event::Start(BytesStart::new("failure"))))?;
                    let text = self
                        .junit_failures
                        .iter()
                        .filter(|f| f.filename == file)
                        .map(|f| {
                            format!(
                                "{}: {} [{}] [{}]",
                                f.line, f.message, f.category, f.confidence
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    write(writer.write_event(Event::Text(BytesText::new(&text))))?;
                    write(writer.write_event(Event::End(BytesEnd::new("failure"))))?;
                    write(writer.write_event(Event::End(BytesEnd::new("testcase"))))?;
                }
            }
        }
        write(writer.write_event(Event::End(BytesEnd::new("testsuite"))))?;

        let body = String::from_utf8(writer.into_inner())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n{}", body))
    }

    /// The queued output lines, in emission order. Mostly useful in tests.
    pub fn pending(&self) -> &[(Stream, String)] {
        &self.queued
    }

    /// Drains the queued output to the given streams.
    pub fn flush(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<()> {
        for (stream, text) in self.queued.drain(..) {
            match stream {
                Stream::Out => out.write_all(text.as_bytes())?,
                Stream::Err => err.write_all(text.as_bytes())?,
            }
        }
        Ok(())
    }
}

/// Message text for tab characters; keyed by the sed fixup table.
pub(crate) const MSG_TAB: &str = "Tab found; better to use spaces";
/// Message text for trailing whitespace; keyed by the sed fixup table.
pub(crate) const MSG_TRAILING_WHITESPACE: &str =
    "Line ends in whitespace. Consider deleting these extra spaces.";
/// Message text for missing comment spacing; keyed by the sed fixup table.
pub(crate) const MSG_COMMENT_SPACE: &str = "Should have a space between -- and comment";

/// The sed expression that fixes `message`, when one is known.
fn sed_fixup(message: &str) -> Option<&'static str> {
    match message {
        MSG_TAB => Some(r"s/\t/  /g"),
        MSG_TRAILING_WHITESPACE => Some(r"s/\s*$//"),
        MSG_COMMENT_SPACE => Some(r"s/--/-- /"),
        _ => None,
    }
}
