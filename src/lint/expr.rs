use once_cell::sync::Lazy;
use regex::Regex;

use super::cleanse::CleansedLines;

/// An `operator<` overload-style prefix; a `<` after it is not a bracket.
static OPERATOR_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\boperator\s*$").unwrap());

/// `<<` or `<=` at the opening position is an operator, not a bracket.
static SHIFT_OR_COMPARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<[<=]").unwrap());

/// Scans one `elided` line for the end of the bracketed expression whose
/// nesting state is `stack`. Returns `Ok(pos)` with the position just after
/// the matching close, or `Err(stack)` to continue on the next line.
/// An empty `Err` stack means the expression can never close (unbalanced).
fn find_end_of_expression_in_line(
    line: &str,
    startpos: usize,
    mut stack: Vec<char>,
) -> Result<usize, Vec<char>> {
    let bytes = line.as_bytes();
    for i in startpos..bytes.len() {
        let ch = bytes[i] as char;
        match ch {
            '(' | '[' | '{' => stack.push(ch),
            '<' => {
                if i > 0 && bytes[i - 1] == b'<' {
                    // Left shift operator; unwind the tentative push.
                    if stack.last() == Some(&'<') {
                        stack.pop();
                        if stack.is_empty() {
                            return Err(Vec::new());
                        }
                    }
                } else if i > 0
                    && line
                        .get(..i)
                        .map_or(false, |prefix| OPERATOR_SUFFIX.is_match(prefix))
                {
                    // operator<, not a bracket
                } else {
                    stack.push('<');
                }
            }
            ')' | ']' | '}' => {
                // A pending '<' cannot match a closing bracket; it must
                // have been a comparison operator.
                while stack.last() == Some(&'<') {
                    stack.pop();
                }
                if stack.is_empty() {
                    return Err(Vec::new());
                }
                let matches = matches!(
                    (stack.last(), ch),
                    (Some('('), ')') | (Some('['), ']') | (Some('{'), '}')
                );
                if matches {
                    stack.pop();
                    if stack.is_empty() {
                        return Ok(i + 1);
                    }
                } else {
                    // Mismatched brackets.
                    return Err(Vec::new());
                }
            }
            '>' => {
                // Ignore `->` and operator functions.
                if i > 0
                    && (bytes[i - 1] == b'-'
                        || line
                            .get(..i - 1)
                            .map_or(false, |prefix| OPERATOR_SUFFIX.is_match(prefix)))
                {
                    continue;
                }
                if stack.last() == Some(&'<') {
                    stack.pop();
                    if stack.is_empty() {
                        return Ok(i + 1);
                    }
                }
            }
            ';' => {
                // A statement end; pending '<' must have been operators.
                while stack.last() == Some(&'<') {
                    stack.pop();
                }
                if stack.is_empty() {
                    return Err(Vec::new());
                }
            }
            _ => {}
        }
    }
    Err(stack)
}

/// If `(line, pos)` on the `elided` view points at `(`, `[` or `{`, finds
/// the line and position just past the matching close, scanning forward
/// across lines. Returns `None` if the expression never closes (or `pos`
/// does not point at an opening bracket).
pub(crate) fn close_expression(
    clean_lines: &CleansedLines,
    mut linenum: usize,
    pos: usize,
) -> Option<(usize, usize)> {
    let line = &clean_lines.elided[linenum];
    let opener = line.as_bytes().get(pos).map(|&b| b as char)?;
    if !matches!(opener, '(' | '[' | '{' | '<') || SHIFT_OR_COMPARE.is_match(&line[pos..]) {
        return None;
    }

    let mut stack = Vec::new();
    match find_end_of_expression_in_line(line, pos, stack) {
        Ok(end) => return Some((linenum, end)),
        Err(s) => stack = s,
    }

    while !stack.is_empty() && linenum + 1 < clean_lines.num_lines() {
        linenum += 1;
        match find_end_of_expression_in_line(&clean_lines.elided[linenum], 0, stack) {
            Ok(end) => return Some((linenum, end)),
            Err(s) => stack = s,
        }
    }
    None
}

/// Returns the text between the bracket at `(linenum, pos)` and its close
/// (exclusive on both sides, lines concatenated), along with the close's
/// line and end position. The content comes from the comment-stripped view.
pub(crate) fn extract_expression(
    clean_lines: &CleansedLines,
    linenum: usize,
    pos: usize,
) -> Option<(String, usize, usize)> {
    let (end_line, end_pos) = close_expression(clean_lines, linenum, pos)?;
    if linenum == end_line {
        let line = &clean_lines.lines[linenum];
        let text = line
            .get(pos + 1..end_pos.saturating_sub(1))
            .unwrap_or_default()
            .to_string();
        return Some((text, end_line, end_pos));
    }

    let mut text = clean_lines.lines[linenum]
        .get(pos + 1..)
        .unwrap_or_default()
        .to_string();
    for l in linenum + 1..end_line {
        text.push_str(&clean_lines.lines[l]);
    }
    let last = &clean_lines.lines[end_line];
    text.push_str(last.get(..end_pos.saturating_sub(1)).unwrap_or(last));
    Some((text, end_line, end_pos))
}
