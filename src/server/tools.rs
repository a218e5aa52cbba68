use super::schema::{ToolKind, ToolRegistry};
use crate::{
    invoke::CliInvoker,
    normalize::ParsedOutcome,
    paths::{self, PathResolutionError},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("argument '{name}' must be {expected}")]
    InvalidArgument {
        name: &'static str,
        expected: &'static str,
    },
    #[error("Failed to run CLI: {0}")]
    Path(#[from] PathResolutionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolReply {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ContentBlock { kind: "text", text }],
            is_error,
        }
    }

    pub fn success(text: String) -> Self {
        Self::text(text, false)
    }

    pub fn error(detail: impl std::fmt::Display) -> Self {
        Self::text(format!("Error: {detail}"), true)
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::text(format!("Unknown tool: {name}"), true)
    }
}

/// Turns a tool call into one run of the analysis program and packages
/// whatever came back.
#[derive(Debug)]
pub struct Dispatcher {
    registry: ToolRegistry,
    invoker: CliInvoker,
    home: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, invoker: CliInvoker) -> Self {
        Self {
            registry,
            invoker,
            home: dirs::home_dir(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, name: &str, args: &serde_json::Value) -> ToolReply {
        let Some(tool) = self.registry.get(name) else {
            tracing::debug!(tool = name, "unknown tool");
            return replied(name, ToolReply::unknown_tool(name));
        };
        tracing::debug!(tool = name, "received");

        let cli_args = match build_args(tool.kind, args, self.home.as_deref()) {
            Ok(a) => a,
            Err(e) => return replied(name, ToolReply::error(e)),
        };
        tracing::debug!(tool = name, args = ?cli_args, "arguments built");

        tracing::debug!(tool = name, program = self.invoker.node(), "process spawned");
        let result = self.invoker.invoke(&cli_args).await;
        match &result {
            Ok(r) => tracing::debug!(
                tool = name,
                exit_code = r.exit_code,
                stdout_bytes = r.stdout.len(),
                stderr_bytes = r.stderr.len(),
                "output captured"
            ),
            Err(e) => tracing::debug!(tool = name, error = %e, "output captured"),
        }

        let outcome = ParsedOutcome::from_invocation(result);
        tracing::debug!(tool = name, ok = outcome.is_success(), "normalized");
        replied(name, reply_for(outcome))
    }
}

fn replied(tool: &str, reply: ToolReply) -> ToolReply {
    tracing::debug!(tool, is_error = reply.is_error, "replied");
    reply
}

pub(super) fn reply_for(outcome: ParsedOutcome) -> ToolReply {
    match outcome {
        ParsedOutcome::Success { value } => match serde_json::to_string_pretty(&value) {
            Ok(text) => ToolReply::success(text),
            Err(e) => ToolReply::error(e),
        },
        other => match other.error_detail() {
            Some(detail) => ToolReply::error(detail),
            None => ToolReply::error("unexpected outcome"),
        },
    }
}

/// Arguments are validated before any path is expanded, so a malformed call
/// reports the bad argument even when no home directory is known.
pub(super) fn build_args(
    kind: ToolKind,
    args: &serde_json::Value,
    home: Option<&Path>,
) -> Result<Vec<String>, RequestError> {
    match kind {
        ToolKind::CheckDirectory => {
            let css_path = arg_str(args, "css_path")?;
            let files = arg_str_list(args, "files")?;
            let no_filter = arg_bool(args, "no_filter")?.unwrap_or(false);
            let css_path = paths::expand_home_with(css_path, home)?;
            let files = paths::expand_all_with(&files, home)?;
            Ok(cli_args(&css_path, no_filter, files))
        }
        ToolKind::CheckFile => {
            let css_path = arg_str(args, "css_path")?;
            let file = arg_str(args, "file")?;
            let css_path = paths::expand_home_with(css_path, home)?;
            let file = paths::expand_home_with(file, home)?;
            Ok(cli_args(&css_path, false, vec![file]))
        }
    }
}

/// `--json --path <css> [--no-filter] <targets...>`; flags always precede
/// positionals.
pub(super) fn cli_args(css_path: &str, no_filter: bool, targets: Vec<String>) -> Vec<String> {
    let mut out = vec!["--json".to_string(), "--path".to_string(), css_path.to_string()];
    if no_filter {
        out.push("--no-filter".to_string());
    }
    out.extend(targets);
    out
}

fn present<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    args.get(key).filter(|v| !v.is_null())
}

pub(super) fn arg_str<'a>(
    args: &'a serde_json::Value,
    key: &'static str,
) -> Result<&'a str, RequestError> {
    present(args, key)
        .ok_or(RequestError::MissingArgument(key))?
        .as_str()
        .ok_or(RequestError::InvalidArgument {
            name: key,
            expected: "a string",
        })
}

fn arg_str_list(args: &serde_json::Value, key: &'static str) -> Result<Vec<String>, RequestError> {
    let invalid = RequestError::InvalidArgument {
        name: key,
        expected: "an array of strings",
    };
    let items = present(args, key)
        .ok_or(RequestError::MissingArgument(key))?
        .as_array()
        .ok_or(invalid)?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or(RequestError::InvalidArgument {
                    name: key,
                    expected: "an array of strings",
                })
        })
        .collect()
}

fn arg_bool(args: &serde_json::Value, key: &'static str) -> Result<Option<bool>, RequestError> {
    present(args, key)
        .map(|v| {
            v.as_bool().ok_or(RequestError::InvalidArgument {
                name: key,
                expected: "a boolean",
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    fn fake_cli(dir: &Path, body: &str) -> CliInvoker {
        let script = dir.join("cli.sh");
        std::fs::write(&script, body).unwrap();
        CliInvoker::new("sh", script, None)
    }

    fn dispatcher(invoker: CliInvoker) -> Dispatcher {
        Dispatcher::new(ToolRegistry::new(), invoker)
    }

    fn build(kind: ToolKind, args: &serde_json::Value) -> Result<Vec<String>, RequestError> {
        build_args(kind, args, Some(Path::new("/home/dev")))
    }

    fn text(reply: &ToolReply) -> &str {
        assert_eq!(reply.content.len(), 1);
        assert_eq!(reply.content[0].kind, "text");
        &reply.content[0].text
    }

    #[test]
    fn check_directory_args_in_fixed_order() {
        let args = json!({
            "css_path": "app/globals.css",
            "files": ["src/**/*.tsx", "index.html"],
            "no_filter": true,
        });
        assert_eq!(
            build(ToolKind::CheckDirectory, &args).unwrap(),
            vec![
                "--json",
                "--path",
                "app/globals.css",
                "--no-filter",
                "src/**/*.tsx",
                "index.html"
            ]
        );
    }

    #[test]
    fn no_filter_defaults_to_off() {
        let args = json!({ "css_path": "a.css", "files": ["b.html"] });
        assert_eq!(
            build(ToolKind::CheckDirectory, &args).unwrap(),
            vec!["--json", "--path", "a.css", "b.html"]
        );
        let args = json!({ "css_path": "a.css", "files": ["b.html"], "no_filter": null });
        assert!(!build(ToolKind::CheckDirectory, &args)
            .unwrap()
            .contains(&"--no-filter".to_string()));
    }

    #[test]
    fn check_file_args() {
        let args = json!({ "css_path": "styles.css", "file": "index.html" });
        assert_eq!(
            build(ToolKind::CheckFile, &args).unwrap(),
            vec!["--json", "--path", "styles.css", "index.html"]
        );
    }

    #[test]
    fn home_marker_is_expanded_in_every_path_field() {
        let args = json!({ "css_path": "~/app/globals.css", "files": ["~/app/*.tsx", "~"] });
        let built = build(ToolKind::CheckDirectory, &args).unwrap();
        assert_eq!(built[2], "/home/dev/app/globals.css");
        assert_eq!(built[3..], ["/home/dev/app/*.tsx", "/home/dev"]);

        let args = json!({ "css_path": "a.css", "file": "~/index.html" });
        let built = build(ToolKind::CheckFile, &args).unwrap();
        assert_eq!(built[3], "/home/dev/index.html");
    }

    #[test]
    fn unexpandable_path_fails_before_anything_runs() {
        let args = json!({ "css_path": "~/a.css", "file": "b.html" });
        let err = build_args(ToolKind::CheckFile, &args, None).unwrap_err();
        assert!(matches!(err, RequestError::Path(_)));
        assert_eq!(
            err.to_string(),
            "Failed to run CLI: cannot expand '~/a.css': home directory is not available"
        );

        // argument problems win over a missing home
        let err = build_args(ToolKind::CheckFile, &json!({ "css_path": "~/a.css" }), None)
            .unwrap_err();
        assert!(matches!(err, RequestError::MissingArgument("file")));
    }

    #[test]
    fn missing_required_argument() {
        let err = build(ToolKind::CheckFile, &json!({ "css_path": "a.css" })).unwrap_err();
        assert_eq!(err.to_string(), "missing required argument 'file'");
        let err = build(ToolKind::CheckDirectory, &serde_json::Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "missing required argument 'css_path'");
    }

    #[test]
    fn wrong_argument_types() {
        let err = build(
            ToolKind::CheckDirectory,
            &json!({ "css_path": "a.css", "files": "b.html" }),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "argument 'files' must be an array of strings");

        let err = build(
            ToolKind::CheckDirectory,
            &json!({ "css_path": "a.css", "files": ["ok", 3] }),
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::InvalidArgument { name: "files", .. }));

        let err = build(
            ToolKind::CheckDirectory,
            &json!({ "css_path": "a.css", "files": [], "no_filter": "yes" }),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "argument 'no_filter' must be a boolean");
    }

    #[tokio::test]
    async fn unknown_tool_spawns_nothing() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran");
        let invoker = fake_cli(dir.path(), &format!("touch '{}'\n", marker.display()));
        let reply = dispatcher(invoker).dispatch("count_classes", &json!({})).await;
        assert_eq!(text(&reply), "Unknown tool: count_classes");
        assert!(reply.is_error);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn path_without_home_is_an_error_reply() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran");
        let dispatcher = Dispatcher {
            home: None,
            ..dispatcher(fake_cli(dir.path(), &format!("touch '{}'\n", marker.display())))
        };
        let reply = dispatcher
            .dispatch("check_directory", &json!({ "css_path": "a.css", "files": ["~/src/*.tsx"] }))
            .await;
        assert!(reply.is_error);
        assert_eq!(
            text(&reply),
            "Error: Failed to run CLI: cannot expand '~/src/*.tsx': home directory is not available"
        );
        assert!(!marker.exists());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn events(&self) -> Vec<String> {
            const NAMES: [&str; 7] = [
                "unknown tool",
                "received",
                "arguments built",
                "process spawned",
                "output captured",
                "normalized",
                "replied",
            ];
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .filter_map(|l| NAMES.iter().find(|n| l.contains(*n)))
                .map(|n| n.to_string())
                .collect()
        }
    }

    async fn traced_dispatch(
        dispatcher: &Dispatcher,
        name: &str,
        args: serde_json::Value,
    ) -> Vec<String> {
        let log = Captured::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_target(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        dispatcher.dispatch(name, &args).await;
        log.events()
    }

    #[tokio::test]
    async fn every_request_state_is_logged() {
        let dir = tempdir().unwrap();
        let d = dispatcher(fake_cli(dir.path(), "printf '{}'\n"));
        let args = json!({ "css_path": "a.css", "file": "b.html" });
        assert_eq!(
            traced_dispatch(&d, "check_file", args).await,
            [
                "received",
                "arguments built",
                "process spawned",
                "output captured",
                "normalized",
                "replied"
            ]
        );
    }

    #[tokio::test]
    async fn failed_spawn_still_logs_captured_and_replied() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("cli.js");
        std::fs::write(&script, "").unwrap();
        let d = dispatcher(CliInvoker::new("no-such-node-binary-xyz", script, None));
        let args = json!({ "css_path": "a.css", "file": "b.html" });
        let events = traced_dispatch(&d, "check_file", args).await;
        assert!(events.ends_with(&[
            "process spawned".to_string(),
            "output captured".to_string(),
            "normalized".to_string(),
            "replied".to_string(),
        ]));
    }

    #[tokio::test]
    async fn early_exits_still_reply() {
        let dir = tempdir().unwrap();
        let d = dispatcher(fake_cli(dir.path(), "printf '{}'\n"));
        assert_eq!(
            traced_dispatch(&d, "nope", json!({})).await,
            ["unknown tool", "replied"]
        );
        assert_eq!(
            traced_dispatch(&d, "check_file", json!({})).await,
            ["received", "replied"]
        );
    }

    #[tokio::test]
    async fn missing_argument_is_an_error_reply() {
        let dir = tempdir().unwrap();
        let invoker = fake_cli(dir.path(), "echo '{}'\n");
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "file": "index.html" }))
            .await;
        assert_eq!(text(&reply), "Error: missing required argument 'css_path'");
    }

    #[tokio::test]
    async fn success_is_pretty_printed() {
        let dir = tempdir().unwrap();
        let invoker = fake_cli(
            dir.path(),
            "printf '{\"summary\":{\"total\":1},\"invalidClasses\":[\"foo-bar\"],\"byFile\":[]}'\n",
        );
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "css_path": "styles.css", "file": "index.html" }))
            .await;
        assert!(!reply.is_error);
        let expected = json!({"summary":{"total":1},"invalidClasses":["foo-bar"],"byFile":[]});
        assert_eq!(text(&reply), serde_json::to_string_pretty(&expected).unwrap());
    }

    #[tokio::test]
    async fn program_sees_built_arguments() {
        let dir = tempdir().unwrap();
        let invoker = fake_cli(
            dir.path(),
            "printf '['; sep=''; for a in \"$@\"; do printf '%s\"%s\"' \"$sep\" \"$a\"; sep=','; done; printf ']'\n",
        );
        let reply = dispatcher(invoker)
            .dispatch(
                "check_directory",
                &json!({ "css_path": "a.css", "files": ["x.html", "y.html"], "no_filter": true }),
            )
            .await;
        let argv: Vec<String> = serde_json::from_str(text(&reply)).unwrap();
        assert_eq!(
            argv,
            vec!["--json", "--path", "a.css", "--no-filter", "x.html", "y.html"]
        );
    }

    #[tokio::test]
    async fn process_failure_reports_stderr() {
        let dir = tempdir().unwrap();
        let invoker = fake_cli(dir.path(), "echo 'file not found: styles.css' >&2\nexit 1\n");
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "css_path": "styles.css", "file": "index.html" }))
            .await;
        assert!(reply.is_error);
        assert_eq!(text(&reply), "Error: CLI error: file not found: styles.css");
    }

    #[tokio::test]
    async fn nonzero_exit_with_json_is_passed_through() {
        let dir = tempdir().unwrap();
        let invoker = fake_cli(dir.path(), "printf '{\"summary\":{\"invalid\":3}}'\nexit 1\n");
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "css_path": "a.css", "file": "b.html" }))
            .await;
        assert!(!reply.is_error);
        assert!(text(&reply).contains("\"invalid\": 3"));
    }

    #[tokio::test]
    async fn malformed_output_cites_position() {
        let dir = tempdir().unwrap();
        let invoker = fake_cli(dir.path(), "printf '{\"a\":1,}'\n");
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "css_path": "a.css", "file": "b.html" }))
            .await;
        let text = text(&reply);
        assert!(text.starts_with("Error: Failed to parse CLI output as JSON:"));
        assert!(text.contains("line 1, column 8"));
        assert!(text.contains(r#"{"a":1,}"#));
    }

    #[tokio::test]
    async fn missing_cli_script_is_an_error_reply() {
        let dir = tempdir().unwrap();
        let invoker = CliInvoker::new("sh", dir.path().join("dist/cli.js"), None);
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "css_path": "a.css", "file": "b.html" }))
            .await;
        assert!(text(&reply).starts_with("Error: Failed to run CLI: CLI tool not found at"));
    }

    #[tokio::test]
    async fn missing_node_is_an_error_reply() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("cli.js");
        std::fs::write(&script, "").unwrap();
        let invoker = CliInvoker::new("no-such-node-binary-xyz", script, None);
        let reply = dispatcher(invoker)
            .dispatch("check_file", &json!({ "css_path": "a.css", "file": "b.html" }))
            .await;
        assert!(text(&reply).starts_with("Error: Failed to run CLI: no-such-node-binary-xyz:"));
    }
}
