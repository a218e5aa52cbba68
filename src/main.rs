mod config;
mod doctor;
mod fmt;
mod invoke;
mod normalize;
mod paths;
mod probe;
mod server;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // only the leading word is ours; everything after `debug` belongs to the CLI
    let command = args.first().map(|s| s.as_str());
    match command {
        Some("help" | "--help" | "-h") => {
            print_help();
            return Ok(());
        }
        Some("--version" | "-V") => {
            println!("twlint-mcp {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let config = config::Config::load()?;
    init_tracing(&config.log);

    match command {
        Some("doctor") => {
            if !doctor::run(&config).await {
                std::process::exit(1);
            }
            return Ok(());
        }
        Some("debug") => return probe::run(&config, &args[1..]).await,
        Some(other) => bail!("unknown command '{other}' (see twlint-mcp --help)"),
        None => {}
    }

    let session_id = Uuid::new_v4();
    tracing::info!("session={session_id}");
    tracing::info!("node={} cli={}", config.node, config.cli.display());
    match config.timeout_secs {
        Some(secs) => tracing::info!("timeout={secs}s"),
        None => tracing::info!("timeout=none"),
    }

    let dispatcher = server::tools::Dispatcher::new(
        server::registry(),
        invoke::CliInvoker::from_config(&config),
    );
    server::run(server::ServerContext::new(dispatcher), session_id).await
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("twlint-mcp {}", env!("CARGO_PKG_VERSION"));
    println!("MCP server that checks Tailwind class usage through the twlint CLI.\n");
    println!("USAGE:");
    println!("  twlint-mcp                      MCP server mode (reads stdio)");
    println!("  twlint-mcp debug <args>...      Run the CLI once with raw arguments and show what it printed");
    println!("  twlint-mcp doctor               Check node, the CLI script and configuration");
    println!("  twlint-mcp help                 Show this message\n");
    println!("TOOLS:");
    println!("  check_directory   css_path, files[], no_filter?");
    println!("  check_file        css_path, file\n");
    println!("ENVIRONMENT (also read as KEY=VALUE from ~/.twlint/config without the prefix):");
    println!("  TWLINT_NODE           Executable that runs the CLI (default: node)");
    println!("  TWLINT_CLI            Path to the CLI script (default: dist/cli.js)");
    println!("  TWLINT_TIMEOUT_SECS   Kill a CLI run after this many seconds (default: no limit)");
    println!("  TWLINT_LOG            Log filter, e.g. debug or warn (default: info)");
}
