//! Record-change channel over the Realtime websocket.
//!
//! The socket lives at `{realtime}/v1/websocket?apikey=..&vsn=1.0.0` and
//! speaks Phoenix channel frames as JSON. Each subscription is one socket
//! that joins topic `realtime:<schema>:<table>` with a `postgres_changes`
//! binding and the user's access token. After an `ok` join reply the
//! server pushes one `postgres_changes` frame per row change. A heartbeat
//! on the `phoenix` topic keeps the socket open.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::SupabaseClient;
use crate::backend::listener::{FeedSubscription, Listener};
use crate::backend::{ChangeFeed, FeedFilter};
use crate::types::errors::RealtimeError;
use crate::types::events::ChangeEvent;
use crate::types::session::Session;

const PROTOCOL_VSN: &str = "1.0.0";
const JOIN_REF: &str = "1";
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type FrameSink = SplitSink<Socket, Message>;
type FrameStream = SplitStream<Socket>;

/// One Phoenix channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    fn push(topic: &str, event: &str, payload: Value, msg_ref: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            msg_ref: Some(msg_ref),
            join_ref: Some(JOIN_REF.to_string()),
        }
    }
}

/// What an incoming frame means to a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Change(ChangeEvent),
    /// Answer to the push with `msg_ref`; `Err` carries the refusal reason.
    Reply {
        msg_ref: Option<String>,
        outcome: Result<(), String>,
    },
    /// The server ended the channel.
    Closed(String),
    Other,
}

/// [`ChangeFeed`] over the Realtime websocket.
pub struct SupabaseFeed {
    client: SupabaseClient,
    realtime_url: String,
}

impl SupabaseFeed {
    pub fn new(client: SupabaseClient, realtime_url: &str) -> Self {
        Self {
            client,
            realtime_url: realtime_url.trim_end_matches('/').to_string(),
        }
    }

    /// Socket URL: the realtime endpoint with a `ws`/`wss` scheme.
    pub fn websocket_url(&self) -> Result<String, RealtimeError> {
        let invalid = |reason: String| RealtimeError::Network(format!("invalid realtime url: {reason}"));
        let mut url = url::Url::parse(&format!("{}/v1/websocket", self.realtime_url))
            .map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(invalid(format!("unsupported scheme {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| invalid(format!("cannot use scheme {scheme}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", self.client.anon_key())
            .append_pair("vsn", PROTOCOL_VSN);
        Ok(url.to_string())
    }
}

pub fn topic_for(filter: &FeedFilter) -> String {
    format!("realtime:{}:{}", filter.schema, filter.table)
}

/// Join push binding `filter` as a `postgres_changes` listener.
pub fn join_message(topic: &str, filter: &FeedFilter, access_token: &str) -> PhoenixMessage {
    let mut binding = json!({
        "event": "*",
        "schema": filter.schema,
        "table": filter.table,
    });
    if let Some(owner) = &filter.owner {
        binding["filter"] = json!(format!("user_id=eq.{owner}"));
    }
    let payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [binding],
        },
        "access_token": access_token,
    });
    PhoenixMessage::push(topic, "phx_join", payload, JOIN_REF.to_string())
}

pub fn heartbeat_message(msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
        join_ref: None,
    }
}

fn leave_message(topic: &str, msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage::push(topic, "phx_leave", json!({}), msg_ref.to_string())
}

/// Decodes the payload of a channel event. Only `postgres_changes` carries
/// a row change, nested under `data`; everything else yields `None`.
pub fn parse_change_event(event: &str, payload: &Value) -> Result<Option<ChangeEvent>, RealtimeError> {
    match event {
        "postgres_changes" => match payload.get("data") {
            Some(data) if !data.is_null() => serde_json::from_value::<ChangeEvent>(data.clone())
                .map(Some)
                .map_err(|e| RealtimeError::Decode(e.to_string())),
            _ => Ok(None),
        },
        "presence_state" | "presence_diff" | "system" | "heartbeat" => Ok(None),
        other => {
            tracing::debug!(event = other, "ignoring change feed event");
            Ok(None)
        }
    }
}

fn reply_reason(payload: &Value) -> String {
    let response = payload.get("response");
    response
        .and_then(|r| r.get("reason"))
        .or(response)
        .and_then(Value::as_str)
        .unwrap_or("join refused")
        .to_string()
}

pub fn classify(message: &PhoenixMessage) -> Result<Inbound, RealtimeError> {
    let payload = &message.payload;
    let status = payload.get("status").and_then(Value::as_str);
    match message.event.as_str() {
        "phx_reply" => Ok(Inbound::Reply {
            msg_ref: message.msg_ref.clone(),
            outcome: match status {
                Some("ok") => Ok(()),
                _ => Err(reply_reason(payload)),
            },
        }),
        "phx_close" => Ok(Inbound::Closed("channel closed".to_string())),
        "phx_error" => Ok(Inbound::Closed("channel error".to_string())),
        "system" if status == Some("error") => {
            let reason = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("subscription error");
            Ok(Inbound::Closed(reason.to_string()))
        }
        event => Ok(parse_change_event(event, payload)?.map_or(Inbound::Other, Inbound::Change)),
    }
}

/// Decodes a text frame for `topic`. Frames for other topics yield `None`.
pub fn inbound(text: &str, topic: &str) -> Result<Option<Inbound>, RealtimeError> {
    let message: PhoenixMessage =
        serde_json::from_str(text).map_err(|e| RealtimeError::Decode(e.to_string()))?;
    if message.topic != topic {
        return Ok(None);
    }
    classify(&message).map(Some)
}

fn connect_error(err: WsError) -> RealtimeError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            let body = response
                .body()
                .as_deref()
                .map(String::from_utf8_lossy)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
            let message = body.unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("upgrade refused").to_string()
            });
            RealtimeError::Backend {
                status: status.as_u16(),
                message,
            }
        }
        other => RealtimeError::Network(other.to_string()),
    }
}

async fn send(sink: &mut FrameSink, message: &PhoenixMessage) -> Result<(), RealtimeError> {
    let text = serde_json::to_string(message).map_err(|e| RealtimeError::Decode(e.to_string()))?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| RealtimeError::Network(e.to_string()))
}

/// Reads frames until the server answers the join.
async fn await_join(stream: &mut FrameStream, topic: &str) -> Result<(), RealtimeError> {
    while let Some(frame) = stream.next().await {
        let text = match frame.map_err(|e| RealtimeError::Network(e.to_string()))? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match inbound(&text, topic)? {
            Some(Inbound::Reply { msg_ref, outcome }) if msg_ref.as_deref() == Some(JOIN_REF) => {
                return outcome.map_err(RealtimeError::Rejected);
            }
            Some(Inbound::Closed(reason)) => return Err(RealtimeError::Rejected(reason)),
            _ => {}
        }
    }
    Err(RealtimeError::Network("socket closed before the join was answered".to_string()))
}

/// Forwards changes until the server ends the channel or `stop` fires.
/// Returning drops `tx`, which ends the subscription for its holder.
async fn pump(
    mut sink: FrameSink,
    mut stream: FrameStream,
    topic: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
    stop: CancellationToken,
) {
    let mut heartbeat = tokio::time::interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut next_ref: u64 = 1;
    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                next_ref += 1;
                // Best effort; the socket is going away either way.
                let _ = send(&mut sink, &leave_message(&topic, next_ref)).await;
                let _ = sink.close().await;
                tracing::debug!("change feed unsubscribed");
                break;
            }
            _ = heartbeat.tick() => {
                next_ref += 1;
                if let Err(e) = send(&mut sink, &heartbeat_message(next_ref)).await {
                    tracing::warn!(error = %e, "change feed heartbeat failed");
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match inbound(&text, &topic) {
                    Ok(Some(Inbound::Change(change))) => {
                        if tx.send(change).is_err() {
                            break;
                        }
                    }
                    Ok(Some(Inbound::Closed(reason))) => {
                        tracing::warn!(%reason, "change channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "undecodable change event"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!("change feed socket closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "change feed socket error");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ChangeFeed for SupabaseFeed {
    async fn subscribe(
        &self,
        session: &Session,
        filter: &FeedFilter,
    ) -> Result<FeedSubscription, RealtimeError> {
        let url = self.websocket_url()?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(connect_error)?;
        let (mut sink, mut stream) = socket.split();

        let topic = topic_for(filter);
        send(&mut sink, &join_message(&topic, filter, &session.access_token)).await?;
        tokio::time::timeout(JOIN_TIMEOUT, await_join(&mut stream, &topic))
            .await
            .map_err(|_| RealtimeError::Network("timed out joining the change channel".to_string()))??;
        tracing::info!(%topic, owner = ?filter.owner, "change feed subscribed");

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(pump(sink, stream, topic, tx, cancel.clone()));
        Ok(Listener::detached(rx, cancel))
    }
}
