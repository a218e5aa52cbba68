use super::tools::ToolReply;
use std::time::Instant;

pub(super) async fn on_tool_call(
    msg: &serde_json::Value,
    ctx: &super::ServerContext,
) -> (serde_json::Value, bool) {
    let (tool, arguments) = parse_tool_call(msg);
    let started = Instant::now();
    let reply = ctx.dispatcher.dispatch(&tool, &arguments).await;
    let duration_us = started.elapsed().as_micros() as u64;
    log_event(&tool, duration_us, &reply);
    (build_response(msg, &reply), reply.is_error)
}

fn parse_tool_call(msg: &serde_json::Value) -> (String, serde_json::Value) {
    let tool = msg
        .get("params")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("")
        .to_string();
    let arguments = msg
        .get("params")
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    (tool, arguments)
}

/// Tool failures stay inside `result`; JSON-RPC errors are for protocol faults.
fn build_response(msg: &serde_json::Value, reply: &ToolReply) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": msg["id"],
        "result": { "content": reply.content, "isError": reply.is_error },
    })
}

fn log_event(tool: &str, duration_us: u64, reply: &ToolReply) {
    let dur = fmt_duration(duration_us);
    if reply.is_error {
        let first = reply
            .content
            .first()
            .and_then(|b| b.text.lines().next())
            .unwrap_or("");
        tracing::warn!("[ERR] {tool}  ({dur})  {first}");
    } else {
        tracing::info!("[OK ] {tool}  ({dur})");
    }
}

pub(crate) fn fmt_duration(us: u64) -> String {
    match us {
        us if us < 1_000 => format!("{us}µs"),
        us if us < 1_000_000 => format!("{:.1}ms", us as f64 / 1_000.0),
        us => format!("{:.1}s", us as f64 / 1_000_000.0),
    }
}
