use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use env_logger::Env;
use walkdir::WalkDir;

use vhdllint::lint::{Linter, Options as LintOptions};
use vhdllint::report::{Category, Counting, Options as ReportOptions, OutputFormat, Report};

#[derive(Debug, Parser)]
#[command(
    name = "vhdllint",
    version,
    about = "Style checker for VHDL source files.",
    after_help = "\
Every problem is given a confidence score from 1-5, with 5 meaning we are
certain of the problem, and 1 meaning it could be a legitimate construct.
To suppress false positives, add a 'NOLINT(category)' comment to the line,
'NOLINTNEXTLINE(category)' to the line above, or wrap a region in
'NOLINTBEGIN(category)' ... 'NOLINTEND(category)'. Pass --filter= with no
value to list all categories."
)]
struct Opt {
    /// Output format (emacs|eclipse|vs7|junit|sed|gsed)
    #[arg(long, value_name = "FORMAT", default_value = "emacs")]
    output: OutputFormat,

    /// Only report problems with confidence >= this level (0-5)
    #[arg(long, value_name = "LEVEL", default_value_t = 1)]
    verbose: u8,

    /// Comma-separated category filters, each starting with + or -.
    /// An empty value lists every category and exits.
    #[arg(long, value_name = "FILTERS")]
    filter: Option<String>,

    /// How the summary counts errors (total|toplevel|detailed)
    #[arg(long, value_name = "STYLE", default_value = "total")]
    counting: Counting,

    /// The allowed line length
    #[arg(long = "linelength", value_name = "DIGITS", default_value_t = 80)]
    line_length: usize,

    /// Root subdirectory, relative to the repository top level
    #[arg(long, value_name = "SUBDIR")]
    root: Option<PathBuf>,

    /// The top level directory of the repository
    #[arg(long, value_name = "PATH")]
    repository: Option<PathBuf>,

    /// The file extensions to check
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Exclude the given path (file, or directory subtree); may repeat
    #[arg(long, value_name = "PATH")]
    exclude: Vec<PathBuf>,

    /// Replace listed directories with all files that descend from them
    #[arg(long)]
    recursive: bool,

    /// Don't print anything if no errors are found
    #[arg(short, long)]
    quiet: bool,

    /// VHDL source files; '-' reads stdin
    files: Vec<String>,
}

/// Replaces directories with the matching files beneath them; everything is
/// then filtered by extension, as listing a directory opts into the sweep.
fn expand_directories(files: Vec<String>, extensions: &[String]) -> Vec<String> {
    let mut expanded = BTreeSet::new();
    for file in files {
        if !Path::new(&file).is_dir() {
            expanded.insert(file);
            continue;
        }
        for entry in WalkDir::new(&file).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() {
                expanded.insert(entry.path().to_string_lossy().into_owned());
            }
        }
    }

    expanded
        .into_iter()
        .filter(|file| {
            let ext = Path::new(file)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            extensions.iter().any(|e| *e == ext)
        })
        .collect()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(path)
    }
}

/// Drops every file that equals, or descends from, an excluded path.
fn filter_excluded(files: Vec<String>, excludes: &[PathBuf]) -> Vec<String> {
    let excludes: Vec<PathBuf> = excludes.iter().map(|e| absolute(e)).collect();
    files
        .into_iter()
        .filter(|file| {
            let abs = absolute(Path::new(file));
            !excludes.iter().any(|e| abs.starts_with(e))
        })
        .collect()
}

fn main() -> io::Result<()> {
    let opt = Opt::parse();

    // Initialize logger; --verbose=0 turns on the detection trace.
    if !opt.quiet {
        env_logger::Builder::from_env(Env::default().default_filter_or(if opt.verbose == 0 {
            "debug"
        } else {
            "warn"
        }))
        .init();
    }

    if let Some(filter) = opt.filter.as_deref() {
        if filter.is_empty() {
            for category in Category::ALL {
                eprintln!("  {}", category);
            }
            return Ok(());
        }
    }

    let extensions = if opt.extensions.is_empty() {
        vec!["vhd".to_string(), "vhdl".to_string()]
    } else {
        opt.extensions.clone()
    };

    let mut files = opt.files.clone();
    if files.is_empty() {
        eprintln!("FATAL ERROR: No files were specified.");
        process::exit(1);
    }
    if opt.recursive {
        files = expand_directories(files, &extensions);
    }
    if !opt.exclude.is_empty() {
        files = filter_excluded(files, &opt.exclude);
    }
    files.sort();

    let mut report = match Report::new(ReportOptions {
        verbose_level: opt.verbose,
        output_format: opt.output,
        counting: opt.counting,
        quiet: opt.quiet,
        filters: opt.filter.clone().unwrap_or_default(),
    }) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("FATAL ERROR: {}", e);
            process::exit(1);
        }
    };

    let mut linter = Linter::new(LintOptions {
        line_length: opt.line_length,
        extensions,
        root: opt.root.clone(),
        repository: opt.repository.clone(),
    });

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    for file in &files {
        linter.process_file(file, &mut report)?;
        report.flush(&mut out, &mut err)?;
    }

    if !report.quiet() || report.error_count() > 0 {
        report.summarize();
    }
    report.finish()?;
    report.flush(&mut out, &mut err)?;

    process::exit(i32::from(report.error_count() > 0));
}
