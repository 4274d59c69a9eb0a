//! smartmarks RPC server: JSON-RPC over stdin/stdout for an external UI shell.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"title":"...","url":"..."}}
//! Response: {"id":1, "result":{"view":{...}}} or {"id":1, "error":"..."}
//! Push:     {"event":"view", "view":{...}} whenever the view changes

use std::time::Instant;

use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use smartmarks::app::{self, App};
use smartmarks::rpc_handler::handle_method;

#[derive(Debug, Parser)]
#[command(name = "smartmarks-rpc", version, about = "smartmarks JSON-RPC bridge")]
struct Args {
    /// Use the in-process backend instead of the hosted one.
    #[arg(long)]
    offline: bool,

    /// Settings file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<String>,

    /// Maximum requests accepted per second.
    #[arg(long, default_value_t = 200)]
    max_rps: u32,
}

/// Fixed one-second window request limiter.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            request_count: 0,
            max_per_second,
        }
    }

    /// Returns true if the request is allowed.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::init_tracing();
    let args = Args::parse();
    let app = App::launch(args.config, args.offline)?;

    // Single writer so responses and pushes never interleave mid-line.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            let line = format!("{}\n", message);
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let mut views = app.handle.watch();
    let push_tx = out_tx.clone();
    let pusher = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            match serde_json::to_value(&view) {
                Ok(view) => {
                    if push_tx.send(json!({"event": "view", "view": view})).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not serialize view"),
            }
        }
    });

    let mut rate_limiter = RateLimiter::new(args.max_rps);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };
        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(Value::as_str).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or_else(|| json!({}));
        tracing::debug!(method, "rpc request");

        let response = match handle_method(&app.handle, method, &params).await {
            Ok(result) => json!({"id": id, "result": result}),
            Err(error) => json!({"id": id, "error": error}),
        };
        let _ = out_tx.send(response);
    }

    pusher.abort();
    app.shutdown().await?;
    drop(out_tx);
    writer.await?;
    Ok(())
}
