use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

mod execute;
pub mod schema;
pub mod tools;

use schema::ToolRegistry;
use tools::Dispatcher;

const JSONRPC_METHOD_NOT_FOUND: i32 = -32601;
const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Default)]
struct SessionCounters {
    total: AtomicU64,
    errors: AtomicU64,
}

/// Shared by every in-flight request; nothing in here is mutated after startup
/// except the counters.
pub struct ServerContext {
    pub dispatcher: Dispatcher,
    counters: SessionCounters,
}

impl ServerContext {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            counters: SessionCounters::default(),
        }
    }
}

pub async fn run(ctx: ServerContext, session_id: Uuid) -> Result<()> {
    let ctx = Arc::new(ctx);
    let started = std::time::Instant::now();
    serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        Arc::clone(&ctx),
    )
    .await?;
    print_session_summary(session_id, &ctx.counters, started.elapsed().as_secs());
    Ok(())
}

/// Reads newline-delimited JSON-RPC from `reader` until EOF. Tool calls run
/// concurrently; a single writer task owns `writer` so replies never interleave.
pub async fn serve<R, W>(reader: R, writer: W, ctx: Arc<ServerContext>) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<serde_json::Value>();
    let writer_task = tokio::spawn(write_responses(rx, writer));
    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let msg: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("skipping unparsable message: {e}");
                continue;
            }
        };

        let method = msg.get("method").and_then(|m| m.as_str());
        if method == Some("tools/call") && msg.get("id").is_none() {
            // a tool call sent as a notification has nowhere to deliver its result
            tracing::debug!("ignoring tools/call without id");
            continue;
        }

        if method == Some("tools/call") {
            let ctx = Arc::clone(&ctx);
            let tx = tx.clone();
            in_flight.spawn(async move {
                let (response, is_error) = execute::on_tool_call(&msg, &ctx).await;
                ctx.counters.total.fetch_add(1, Ordering::Relaxed);
                if is_error {
                    ctx.counters.errors.fetch_add(1, Ordering::Relaxed);
                }
                let _ = tx.send(response);
            });
        } else if let Some(response) = dispatch(&msg, &ctx) {
            let _ = tx.send(response);
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("tool call task failed: {e}");
        }
    }
    drop(tx);
    writer_task.await?
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<serde_json::Value>, mut writer: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let json = serde_json::to_string(&response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(writer)
}

fn dispatch(msg: &serde_json::Value, ctx: &ServerContext) -> Option<serde_json::Value> {
    let method = msg.get("method")?.as_str()?;
    // notifications carry no id and get no reply
    msg.get("id")?;

    Some(match method {
        "initialize" => on_initialize(msg),
        "ping" => on_ping(msg),
        "tools/list" => schema::on_tools_list(msg, ctx.dispatcher.registry()),
        _ => on_unknown_method(msg, method),
    })
}

fn on_initialize(msg: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": msg["id"],
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "twlint", "version": env!("CARGO_PKG_VERSION") },
        },
    })
}

fn on_ping(msg: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "jsonrpc": "2.0", "id": msg["id"], "result": {} })
}

fn on_unknown_method(msg: &serde_json::Value, method: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": msg["id"],
        "error": {
            "code": JSONRPC_METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}"),
        },
    })
}

fn print_session_summary(session_id: Uuid, c: &SessionCounters, elapsed: u64) {
    let sid = &session_id.to_string()[..8];
    tracing::info!(
        "session {sid} ended: {} calls, {} errors, {elapsed}s",
        c.total.load(Ordering::Relaxed),
        c.errors.load(Ordering::Relaxed),
    );
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::new()
}
