use crate::invoke::{InvokeError, ProcessResult};
use serde_json::Value;

/// Widest slice of a context line shown in a diagnostic. Minified output is
/// one huge line, so the window follows the error column.
const CONTEXT_WIDTH: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine {
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutcome {
    Success {
        value: Value,
    },
    ProcessFailure {
        exit_code: i32,
        stderr: String,
    },
    ParseFailure {
        raw: String,
        message: String,
        line: usize,
        column: usize,
        context: Vec<ContextLine>,
    },
    SpawnFailure {
        reason: String,
    },
    TimedOut {
        secs: u64,
    },
}

impl ParsedOutcome {
    pub fn from_invocation(result: Result<ProcessResult, InvokeError>) -> Self {
        match result {
            Ok(result) => normalize(&result),
            Err(InvokeError::TimedOut(secs)) => Self::TimedOut { secs },
            Err(e) => Self::SpawnFailure {
                reason: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Human-readable failure text, `None` for `Success`.
    pub fn error_detail(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::ProcessFailure { exit_code, stderr } => {
                let stderr = stderr.trim_end();
                Some(if stderr.is_empty() {
                    format!("CLI error: process exited with code {exit_code}")
                } else {
                    format!("CLI error: {stderr}")
                })
            }
            Self::ParseFailure {
                message,
                line,
                column,
                context,
                ..
            } => Some(format!(
                "Failed to parse CLI output as JSON: {message} (line {line}, column {column})\n{}",
                render_context(context, *line, *column)
            )),
            Self::SpawnFailure { reason } => Some(format!("Failed to run CLI: {reason}")),
            Self::TimedOut { secs } => Some(format!("CLI timed out after {secs}s")),
        }
    }
}

/// Interprets captured output. Stdout that parses as one JSON document wins
/// regardless of exit code or stderr.
pub fn normalize(result: &ProcessResult) -> ParsedOutcome {
    let text = match std::str::from_utf8(&result.stdout) {
        Ok(text) => text,
        Err(e) => {
            let lossy = String::from_utf8_lossy(&result.stdout).into_owned();
            let valid = &result.stdout[..e.valid_up_to()];
            let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
            let line_start = valid
                .iter()
                .rposition(|b| *b == b'\n')
                .map(|i| i + 1)
                .unwrap_or(0);
            let byte_col = e.valid_up_to() - line_start + 1;
            return parse_failure(lossy, "output is not valid UTF-8".to_string(), line, byte_col);
        }
    };

    match serde_json::from_str::<Value>(text) {
        Ok(value) => ParsedOutcome::Success { value },
        Err(_) if text.trim().is_empty() && result.exit_code != 0 => {
            ParsedOutcome::ProcessFailure {
                exit_code: result.exit_code,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            }
        }
        Err(e) => parse_failure(text.to_string(), bare_message(&e), e.line(), e.column()),
    }
}

fn bare_message(err: &serde_json::Error) -> String {
    let full = err.to_string();
    let suffix = format!(" at line {} column {}", err.line(), err.column());
    full.strip_suffix(&suffix).unwrap_or(&full).to_string()
}

fn parse_failure(raw: String, message: String, line: usize, byte_col: usize) -> ParsedOutcome {
    let (line, column, context) = locate(&raw, line, byte_col);
    ParsedOutcome::ParseFailure {
        raw,
        message,
        line,
        column,
        context,
    }
}

/// Maps a parser position (1-based line, byte column) onto the text: clamped
/// line, 1-based character column, and the surrounding lines.
pub fn locate(text: &str, line: usize, byte_col: usize) -> (usize, usize, Vec<ContextLine>) {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let line = line.clamp(1, lines.len());
    let current = lines[line - 1];

    let mut idx = byte_col.saturating_sub(1).min(current.len());
    while !current.is_char_boundary(idx) {
        idx -= 1;
    }
    let max_col = current.chars().count().max(1);
    let column = (current[..idx].chars().count() + 1).min(max_col);

    let first = line.saturating_sub(1).max(1);
    let last = (line + 1).min(lines.len());
    let context = (first..=last)
        .map(|n| ContextLine {
            number: n,
            text: lines[n - 1].to_string(),
        })
        .collect();
    (line, column, context)
}

fn render_context(context: &[ContextLine], line: usize, column: usize) -> String {
    let width = context
        .iter()
        .map(|c| c.number.to_string().len())
        .max()
        .unwrap_or(1);
    let start = column.saturating_sub(1 + CONTEXT_WIDTH / 2);
    let mut out = Vec::with_capacity(context.len() + 1);
    for c in context {
        let marker = if c.number == line { '>' } else { ' ' };
        let (clipped, lead) = clip(&c.text, start);
        out.push(format!("{marker} {:>width$} | {clipped}", c.number));
        if c.number == line {
            let pad = " ".repeat(column - 1 - start + lead);
            out.push(format!("  {:>width$} | {pad}^", ""));
        }
    }
    out.join("\n")
}

/// Cuts a `CONTEXT_WIDTH` character window out of `text` starting at char
/// `start`. Returns the window and how many marker chars were prepended.
fn clip(text: &str, start: usize) -> (String, usize) {
    let total = text.chars().count();
    if total <= CONTEXT_WIDTH && start == 0 {
        return (text.to_string(), 0);
    }
    let window: String = text.chars().skip(start).take(CONTEXT_WIDTH).collect();
    let lead = usize::from(start > 0 && start < total);
    let mut out = String::with_capacity(window.len() + 8);
    if lead == 1 {
        out.push('…');
    }
    out.push_str(&window);
    if start + CONTEXT_WIDTH < total {
        out.push('…');
    }
    (out, lead)
}
