use crate::config::{self, Config, KNOWN_KEYS};
use crate::fmt::{paint, short_path, Tone};
use crate::invoke;
use std::time::Duration;

const PROBE_TIMEOUT_SECS: u64 = 5;

/// Prints one line per check. Returns false if anything failed.
pub async fn run(config: &Config) -> bool {
    println!();
    println!("{}", paint(Tone::Muted, "── twlint-mcp doctor ──────────────────────────"));
    println!();

    let mut pass = 0;
    let mut fail = 0;

    check_node(&config.node, &mut pass, &mut fail).await;
    check_cli(config, &mut pass, &mut fail);
    check_config(&mut pass);
    match config.timeout_secs {
        Some(secs) => info(&format!("invocations time out after {secs}s")),
        None => skipped("no invocation timeout (TIMEOUT_SECS unset)"),
    }

    let fail_tone = if fail > 0 { Tone::Fail } else { Tone::Muted };
    println!();
    println!(
        "  {} passed  {} failed",
        paint(Tone::Strong, pass),
        paint(fail_tone, fail)
    );
    println!();
    fail == 0
}

async fn check_node(node: &str, pass: &mut u32, fail: &mut u32) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let probe = invoke::run(
        node,
        &["--version".to_string()],
        &cwd,
        Some(Duration::from_secs(PROBE_TIMEOUT_SECS)),
    )
    .await;
    match probe {
        Ok(r) if r.exit_code == 0 => {
            let version = String::from_utf8_lossy(&r.stdout).trim().to_string();
            ok(&format!("{node} runnable ({version})"), pass);
        }
        Ok(r) => err(&format!("{node} --version exited with code {}", r.exit_code), fail),
        Err(e) => err(&format!("{node} not runnable: {e}"), fail),
    }
}

fn check_cli(config: &Config, pass: &mut u32, fail: &mut u32) {
    let display = short_path(&config.cli);
    if config.cli.is_file() {
        ok(&format!("CLI found ({display})"), pass);
    } else {
        err(
            &format!("CLI not found at {display} (run 'pnpm run build' or set TWLINT_CLI)"),
            fail,
        );
    }
}

fn check_config(pass: &mut u32) {
    let Some(path) = config::config_path().filter(|p| p.exists()) else {
        skipped("no config file (~/.twlint/config)");
        return;
    };

    let file = config::load_file();
    if file.is_empty() {
        skipped("config file empty");
        return;
    }
    let mut keys: Vec<&str> = file.keys().map(|k| k.as_str()).collect();
    keys.sort_unstable();
    ok(
        &format!(
            "config loaded from {} ({})",
            short_path(&path),
            keys.join(", ")
        ),
        pass,
    );
    for key in unknown_keys(&keys) {
        info(&format!("unknown config key: {key}"));
    }
}

fn unknown_keys<'a>(keys: &[&'a str]) -> Vec<&'a str> {
    keys.iter()
        .copied()
        .filter(|k| !KNOWN_KEYS.contains(k))
        .collect()
}

fn mark(tone: Tone, symbol: &str, msg: &str) {
    println!("  {}  {msg}", paint(tone, symbol));
}

fn ok(msg: &str, pass: &mut u32) {
    mark(Tone::Pass, "✓", msg);
    *pass += 1;
}

fn err(msg: &str, fail: &mut u32) {
    mark(Tone::Fail, "✗", msg);
    *fail += 1;
}

fn info(msg: &str) {
    mark(Tone::Strong, "i", msg);
}

fn skipped(msg: &str) {
    mark(Tone::Muted, "-", msg);
}
