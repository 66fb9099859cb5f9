//! JSON-lines host adapter.
//!
//! Each input line is one event; each output line answers one event.
//! `install` and `activate` are awaited before the next line is read, which
//! is the lifecycle barrier. Fetch events run concurrently and answer in
//! completion order, tagged with the caller's `id`.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use swcache_core::Request;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::{ErrorBody, HostError};
use crate::handler::{FetchOutcome, ServiceWorker};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Install,
    Activate,
    Fetch(FetchEvent),
}

#[derive(Debug, Deserialize)]
pub struct FetchEvent {
    pub id: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Lifecycle reply with the report's fields inlined next to `type` and `ok`.
fn success<T: Serialize>(kind: &str, report: &T) -> Value {
    let mut reply = json!({ "type": kind, "ok": true });
    if let (Some(fields), Ok(Value::Object(report))) = (reply.as_object_mut(), serde_json::to_value(report)) {
        fields.extend(report);
    }
    reply
}

fn failure(kind: &str, err: HostError) -> Value {
    json!({ "type": kind, "ok": false, "error": ErrorBody::from(err) })
}

/// Bodies that are valid UTF-8 go out as text, anything else as base64.
fn encode_body(body: &[u8]) -> (&'static str, String) {
    match std::str::from_utf8(body) {
        Ok(text) => ("utf8", text.to_string()),
        Err(_) => ("base64", STANDARD.encode(body)),
    }
}

/// Any parseable URL is accepted; scheme and origin are the classifier's call.
fn to_request(event: &FetchEvent) -> Result<Request, HostError> {
    let mut request = Request::new(&event.method, &event.url)?;
    for (name, value) in &event.headers {
        request = request.with_header(name, value);
    }
    Ok(request)
}

async fn handle_fetch(worker: &ServiceWorker, event: FetchEvent) -> Value {
    let request = match to_request(&event) {
        Ok(request) => request,
        Err(e) => return json!({ "type": "fetch", "id": event.id, "ok": false, "error": ErrorBody::from(e) }),
    };

    match worker.fetch(&request).await {
        Ok(FetchOutcome::PassThrough(criteria)) => json!({
            "type": "fetch",
            "id": event.id,
            "ok": true,
            "handled": false,
            "failing": criteria.failing(),
        }),
        Ok(FetchOutcome::Respond(served)) => {
            let (encoding, body) = encode_body(&served.response.body);
            json!({
                "type": "fetch",
                "id": event.id,
                "ok": true,
                "handled": true,
                "source": served.source,
                "status": served.response.status,
                "content_type": served.response.content_type,
                "headers": served.response.headers,
                "body_encoding": encoding,
                "body": body,
            })
        }
        Err(e) => json!({
            "type": "fetch",
            "id": event.id,
            "ok": false,
            "handled": true,
            "error": ErrorBody::from(HostError::from(e)),
        }),
    }
}

/// Serve events from `input` until EOF, writing replies to `output`.
///
/// Returns the output once every in-flight fetch has answered and every
/// background cache write has settled.
pub async fn run<R, W>(worker: Arc<ServiceWorker>, input: R, output: W) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Value>(64);

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(reply) = rx.recv().await {
            let mut line = serde_json::to_vec(&reply)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }
        Ok::<W, anyhow::Error>(output)
    });

    let mut lines = input.lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<Event>(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed event");
                tx.send(failure("error", HostError::InvalidEvent(e.to_string()))).await?;
                continue;
            }
        };

        match event {
            Event::Install => {
                let reply = match worker.install().await {
                    Ok(report) => success("install", &report),
                    Err(e) => failure("install", e.into()),
                };
                tx.send(reply).await?;
            }
            Event::Activate => {
                let reply = match worker.activate().await {
                    Ok(report) => success("activate", &report),
                    Err(e) => failure("activate", e.into()),
                };
                tx.send(reply).await?;
            }
            Event::Fetch(event) => {
                let worker = Arc::clone(&worker);
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let reply = handle_fetch(&worker, event).await;
                    if tx.send(reply).await.is_err() {
                        tracing::warn!("reply channel closed before fetch answered");
                    }
                });
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "fetch task failed");
        }
    }
    worker.settle().await;
    drop(tx);

    writer.await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, ORIGIN};
    use swcache_core::{AppConfig, CacheDb};

    async fn run_lines(input: &str, network: Arc<FakeNetwork>) -> Vec<Value> {
        let config = AppConfig { origin: ORIGIN.into(), precache_bucket: "achilles-static".into(), ..Default::default() };
        network.serve_manifest(&config.static_cache_items);
        let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let worker = Arc::new(ServiceWorker::new(config, store, network).unwrap());

        let output = run(worker, input.as_bytes(), Vec::new()).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn by_id<'a>(replies: &'a [Value], id: &str) -> &'a Value {
        replies.iter().find(|r| r["id"] == id).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_replies_in_order() {
        let input = "{\"type\":\"install\"}\n{\"type\":\"activate\"}\n";
        let replies = run_lines(input, Arc::new(FakeNetwork::new())).await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["type"], "install");
        assert_eq!(replies[0]["ok"], true);
        assert_eq!(replies[0]["signal"], "skip_waiting");
        assert_eq!(replies[1]["type"], "activate");
        assert_eq!(replies[1]["signal"], "claim");
        assert_eq!(replies[1]["deleted"], json!([]));
        assert_eq!(replies[1]["kept"], json!(["achilles-static"]));
    }

    #[tokio::test]
    async fn test_fetch_events() {
        let network = Arc::new(FakeNetwork::new());
        let input = [
            r#"{"type":"install"}"#,
            r#"{"type":"activate"}"#,
            r#"{"type":"fetch","id":"css","url":"http://localhost:8080/css/styles.css"}"#,
            r#"{"type":"fetch","id":"api","url":"http://localhost:8080/api/items"}"#,
            r#"{"type":"fetch","id":"post","url":"http://localhost:8080/css/x.css","method":"POST"}"#,
        ]
        .join("\n");
        let replies = run_lines(&input, network.clone()).await;

        let css = by_id(&replies, "css");
        assert_eq!(css["handled"], true);
        assert_eq!(css["source"], "cache");
        assert_eq!(css["status"], 200);

        let api = by_id(&replies, "api");
        assert_eq!(api["handled"], false);
        assert_eq!(api["failing"], json!(["matches_path_pattern"]));

        let post = by_id(&replies, "post");
        assert_eq!(post["failing"], json!(["is_get_request"]));
    }

    #[tokio::test]
    async fn test_rejected_lifecycle_and_bad_lines() {
        let input = "{\"type\":\"activate\"}\nnot json\n{\"type\":\"fetch\",\"id\":\"x\",\"url\":\"/relative\"}\n";
        let replies = run_lines(input, Arc::new(FakeNetwork::new())).await;

        assert_eq!(replies[0]["type"], "activate");
        assert_eq!(replies[0]["ok"], false);
        assert_eq!(replies[0]["error"]["code"], "INVALID_TRANSITION");
        assert_eq!(replies[1]["type"], "error");
        assert_eq!(replies[1]["error"]["code"], "INVALID_INPUT");
        let bad = by_id(&replies, "x");
        assert_eq!(bad["ok"], false);
        assert_eq!(bad["error"]["code"], "INVALID_URL");
    }

    #[tokio::test]
    async fn test_foreign_schemes_pass_through() {
        let input = [
            r#"{"type":"fetch","id":"ext","url":"chrome-extension://abc/script.js"}"#,
            r#"{"type":"fetch","id":"data","url":"data:text/plain,hello"}"#,
        ]
        .join("\n");
        let replies = run_lines(&input, Arc::new(FakeNetwork::new())).await;

        for id in ["ext", "data"] {
            let reply = by_id(&replies, id);
            assert_eq!(reply["ok"], true, "{id}");
            assert_eq!(reply["handled"], false, "{id}");
            let failing = reply["failing"].as_array().unwrap();
            assert!(failing.contains(&json!("is_from_my_origin")), "{id}");
        }
    }

    #[tokio::test]
    async fn test_binary_body_survives_the_wire() {
        let gif: &[u8] = &[71, 73, 70, 56, 57, 97, 255, 128, 0, 195];
        let network = Arc::new(FakeNetwork::new());
        network.route_bytes("/images/nyan-cat.gif", 200, gif, "image/gif");
        let input = [
            r#"{"type":"install"}"#,
            r#"{"type":"activate"}"#,
            r#"{"type":"fetch","id":"gif","url":"http://localhost:8080/images/nyan-cat.gif"}"#,
            r#"{"type":"fetch","id":"css","url":"http://localhost:8080/css/styles.css"}"#,
        ]
        .join("\n");
        let replies = run_lines(&input, network).await;

        let reply = by_id(&replies, "gif");
        assert_eq!(reply["source"], "cache");
        assert_eq!(reply["body_encoding"], "base64");
        let decoded = STANDARD.decode(reply["body"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, gif);

        let css = by_id(&replies, "css");
        assert_eq!(css["body_encoding"], "utf8");
        assert_eq!(css["body"], "precached /css/styles.css");
    }

    #[tokio::test]
    async fn test_exhausted_fetch_reports_error() {
        let network = Arc::new(FakeNetwork::new());
        network.set_offline(true);
        let input = r#"{"type":"fetch","id":"p","url":"http://localhost:8080/2024/post/","headers":{"Accept":"text/html"}}"#;
        let replies = run_lines(input, network).await;

        let reply = by_id(&replies, "p");
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["handled"], true);
        assert_eq!(reply["error"]["code"], "OFFLINE_UNAVAILABLE");
    }
}
