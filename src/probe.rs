use crate::config::Config;
use crate::fmt::{paint, Tone};
use crate::invoke::{CliInvoker, ProcessResult};
use crate::normalize::{normalize, ParsedOutcome};
use crate::paths;
use anyhow::Result;

const STDOUT_PREVIEW_BYTES: usize = 200;
const DECODED_PREVIEW_CHARS: usize = 500;

/// `twlint-mcp debug <args>...`: one raw run of the analysis program with
/// everything it produced laid out for inspection.
pub async fn run(config: &Config, raw_args: &[String]) -> Result<()> {
    let args = paths::expand_all(raw_args)?;
    let invoker = CliInvoker::from_config(config);
    let cwd = std::env::current_dir()?;

    println!(
        "{} {} {}",
        paint(Tone::Strong, "Command:"),
        invoker.node(),
        invoker.command_line(&args).join(" ")
    );
    println!("{} {}", paint(Tone::Strong, "Working directory:"), cwd.display());

    match invoker.invoke(&args).await {
        Ok(result) => {
            for line in report(&result) {
                println!("{line}");
            }
        }
        Err(e) => println!("\n{} {e}", paint(Tone::Fail, "Exception:")),
    }
    Ok(())
}

pub fn report(result: &ProcessResult) -> Vec<String> {
    let mut out = vec![
        String::new(),
        format!("Return code: {}", result.exit_code),
        format!("Stdout length: {} bytes", result.stdout.len()),
        format!("Stderr length: {} bytes", result.stderr.len()),
    ];

    if !result.stderr.is_empty() {
        out.push(String::new());
        out.push("Stderr output:".to_string());
        out.push(String::from_utf8_lossy(&result.stderr).trim_end().to_string());
    }

    let preview = &result.stdout[..result.stdout.len().min(STDOUT_PREVIEW_BYTES)];
    out.push(String::new());
    out.push(format!("Stdout output (first {STDOUT_PREVIEW_BYTES} bytes):"));
    out.push(format!("{:?}", String::from_utf8_lossy(preview)));
    out.push(String::new());

    match normalize(result) {
        ParsedOutcome::Success { value } => {
            out.push(paint(Tone::Pass, "JSON parsed successfully!"));
            out.push(serde_json::to_string_pretty(&value).unwrap_or_default());
        }
        ParsedOutcome::ParseFailure {
            raw,
            message,
            line,
            column,
            context,
        } => {
            let decoded: String = raw.chars().take(DECODED_PREVIEW_CHARS).collect();
            out.push(format!("Decoded output ({} chars): {decoded:?}", raw.chars().count()));
            out.push(format!("{} {message}", paint(Tone::Fail, "JSON parse error:")));
            out.push(format!("Error position: line {line}, column {column}"));
            for c in context {
                let label = match c.number.cmp(&line) {
                    std::cmp::Ordering::Less => "Previous line",
                    std::cmp::Ordering::Equal => "Problematic line",
                    std::cmp::Ordering::Greater => "Next line",
                };
                out.push(format!("{label} {}: {:?}", c.number, c.text));
            }
        }
        other => {
            if let Some(detail) = other.error_detail() {
                out.push(paint(Tone::Fail, detail));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fmt::strip_ansi;

    fn plain(lines: Vec<String>) -> Vec<String> {
        lines.iter().map(|l| strip_ansi(l)).collect()
    }

    #[test]
    fn report_for_valid_output() {
        let lines = plain(report(&ProcessResult {
            exit_code: 0,
            stdout: br#"{"summary":{}}"#.to_vec(),
            stderr: Vec::new(),
        }));
        assert!(lines.contains(&"Return code: 0".to_string()));
        assert!(lines.contains(&"Stdout length: 14 bytes".to_string()));
        assert!(!lines.iter().any(|l| l == "Stderr output:"));
        assert!(lines.contains(&"JSON parsed successfully!".to_string()));
    }

    #[test]
    fn report_for_malformed_output_names_lines() {
        let lines = plain(report(&ProcessResult {
            exit_code: 0,
            stdout: b"{\n\"a\": 1,\n}\n".to_vec(),
            stderr: b"warn: slow\n".to_vec(),
        }));
        assert!(lines.contains(&"warn: slow".to_string()));
        assert!(lines.contains(&"Error position: line 3, column 1".to_string()));
        assert!(lines.contains(&"Previous line 2: \"\\\"a\\\": 1,\"".to_string()));
        assert!(lines.contains(&"Problematic line 3: \"}\"".to_string()));
        assert!(lines.contains(&"Next line 4: \"\"".to_string()));
    }

    #[test]
    fn report_preview_is_capped() {
        let lines = report(&ProcessResult {
            exit_code: 0,
            stdout: vec![b'x'; 500],
            stderr: Vec::new(),
        });
        let preview = lines
            .iter()
            .find(|l| l.starts_with("\"x"))
            .unwrap();
        assert_eq!(preview.len(), STDOUT_PREVIEW_BYTES + 2);
    }

    #[test]
    fn report_for_process_failure() {
        let lines = plain(report(&ProcessResult {
            exit_code: 1,
            stdout: Vec::new(),
            stderr: b"boom".to_vec(),
        }));
        assert_eq!(lines.last().unwrap(), "CLI error: boom");
    }
}
