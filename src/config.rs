//! Per-directory configuration: `VHDLLINT.cfg` files discovered by walking
//! up from each linted file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::lint;
use crate::report::Report;

/// The configuration file name looked up in every ancestor directory.
pub const CONFIG_FILE: &str = "VHDLLINT.cfg";

fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    }
}

/// Applies every `VHDLLINT.cfg` found between `filename` and the filesystem
/// root (stopping early at `set noparent`) to `options` and `report`.
/// Filters accumulate outermost-first, so nested directories win.
///
/// Returns `false` if an `exclude_files` pattern says the file should not
/// be processed at all. Malformed entries are tool errors, never fatal.
pub(crate) fn process_overrides(
    filename: &str,
    options: &mut lint::Options,
    report: &mut Report,
) -> bool {
    let mut cfg_filters: Vec<String> = Vec::new();
    let mut keep_looking = true;
    let mut base_name: Option<PathBuf> = None;
    let mut current = absolute(filename);

    while keep_looking {
        let Some(component) = current.file_name().map(|n| n.to_os_string()) else {
            break;
        };
        let parent = match current.parent() {
            Some(parent) => parent.to_path_buf(),
            None => break,
        };
        base_name = Some(match base_name {
            Some(rest) => Path::new(&component).join(rest),
            None => PathBuf::from(&component),
        });
        let cfg_file = parent.join(CONFIG_FILE);
        current = parent;
        if !cfg_file.is_file() {
            continue;
        }

        let contents = match fs::read_to_string(&cfg_file) {
            Ok(contents) => contents,
            Err(_) => {
                report.tool_error(&format!(
                    "Skipping config file '{}': Can't open for reading\n",
                    cfg_file.display()
                ));
                keep_looking = false;
                continue;
            }
        };

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default();
            if line.trim().is_empty() {
                continue;
            }

            let (name, val) = match line.split_once('=') {
                Some((name, val)) => (name.trim(), val.trim()),
                None => (line.trim(), ""),
            };
            match name {
                "set noparent" => keep_looking = false,
                "filter" => cfg_filters.push(val.to_string()),
                "exclude_files" => {
                    // Matched against the path below the config file's
                    // directory, anchored at its first component.
                    let matched = Regex::new(val)
                        .map(|re| {
                            base_name
                                .as_ref()
                                .and_then(|b| b.to_str())
                                .map(|b| re.find(b).map(|m| m.start() == 0).unwrap_or(false))
                                .unwrap_or(false)
                        })
                        .unwrap_or_else(|_| {
                            report.tool_error(&format!(
                                "Invalid configuration option ({}) in file {}\n",
                                name,
                                cfg_file.display()
                            ));
                            false
                        });
                    if matched {
                        if report.quiet() {
                            return false;
                        }
                        report.info(&format!(
                            "Ignoring \"{}\": file excluded by \"{}\". File path component \
                             \"{}\" matches pattern \"{}\"\n",
                            filename,
                            cfg_file.display(),
                            base_name
                                .as_ref()
                                .map(|b| b.display().to_string())
                                .unwrap_or_default(),
                            val
                        ));
                        return false;
                    }
                }
                "linelength" => match val.parse::<usize>() {
                    Ok(length) => options.line_length = length,
                    Err(_) => report.tool_error("Line length must be numeric.\n"),
                },
                "extensions" => {
                    options.extensions = val.split(',').map(|e| e.trim().to_string()).collect();
                }
                "root" => {
                    let dir = cfg_file.parent().unwrap_or(Path::new("")).to_path_buf();
                    options.root = Some(dir.join(val));
                }
                _ => {
                    report.tool_error(&format!(
                        "Invalid configuration option ({}) in file {}\n",
                        name,
                        cfg_file.display()
                    ));
                }
            }
        }
    }

    // Outermost config first, so closer directories override.
    for filters in cfg_filters.iter().rev() {
        if let Err(e) = report.add_filters(filters) {
            report.tool_error(&format!("{}\n", e));
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_cfg(dir: &Path, contents: &str) {
        let mut file = fs::File::create(dir.join(CONFIG_FILE)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn linelength_override_applies() {
        let tmp = tempfile::tempdir().unwrap();
        write_cfg(tmp.path(), "linelength=120\n");
        let file = tmp.path().join("core.vhd");
        fs::write(&file, "").unwrap();

        let mut options = lint::Options::default();
        let mut report = Report::new(Default::default()).unwrap();
        assert!(process_overrides(
            file.to_str().unwrap(),
            &mut options,
            &mut report
        ));
        assert_eq!(options.line_length, 120);
    }

    #[test]
    fn exclude_files_pattern_skips_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_cfg(tmp.path(), "exclude_files=.*_tb\\.vhd\n");
        let file = tmp.path().join("core_tb.vhd");
        fs::write(&file, "").unwrap();

        let mut options = lint::Options::default();
        let mut report = Report::new(Default::default()).unwrap();
        assert!(!process_overrides(
            file.to_str().unwrap(),
            &mut options,
            &mut report
        ));
    }

    #[test]
    fn set_noparent_stops_the_walk() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("rtl");
        fs::create_dir(&sub).unwrap();
        write_cfg(tmp.path(), "linelength=200\n");
        write_cfg(&sub, "set noparent\nlinelength=100\n");
        let file = sub.join("core.vhd");
        fs::write(&file, "").unwrap();

        let mut options = lint::Options::default();
        let mut report = Report::new(Default::default()).unwrap();
        assert!(process_overrides(
            file.to_str().unwrap(),
            &mut options,
            &mut report
        ));
        assert_eq!(options.line_length, 100);
    }

    #[test]
    fn unknown_option_is_a_tool_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_cfg(tmp.path(), "frobnicate=yes\n");
        let file = tmp.path().join("core.vhd");
        fs::write(&file, "").unwrap();

        let mut options = lint::Options::default();
        let mut report = Report::new(Default::default()).unwrap();
        assert!(process_overrides(
            file.to_str().unwrap(),
            &mut options,
            &mut report
        ));
        assert!(report.pending().iter().any(|(_, t)| t
            .contains("Invalid configuration option (frobnicate)")));
    }

    #[test]
    fn filters_accumulate_outermost_first() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("rtl");
        fs::create_dir(&sub).unwrap();
        write_cfg(tmp.path(), "set noparent\nfilter=-whitespace\n");
        write_cfg(&sub, "filter=+whitespace/tab\n");
        let file = sub.join("core.vhd");
        fs::write(&file, "").unwrap();

        let mut options = lint::Options::default();
        let mut report = Report::new(Default::default()).unwrap();
        assert!(process_overrides(
            file.to_str().unwrap(),
            &mut options,
            &mut report
        ));
        // -whitespace applied first, +whitespace/tab second: tabs survive.
        use crate::report::{Category, LineRef};
        report.emit("core.vhd", Category::Tab, 5, LineRef::only_line(1), "t");
        report.emit("core.vhd", Category::Indent, 5, LineRef::only_line(1), "i");
        assert_eq!(report.error_count(), 1);
    }
}
