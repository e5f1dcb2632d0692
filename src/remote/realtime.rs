//! Supabase Realtime listener.
//!
//! Speaks just enough of the Phoenix channel protocol to join a
//! `postgres_changes` channel for one user's rows and turn every change
//! message into a [`ChangeSignal`]. The message payload is ignored.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ChangeSignal, Subscription, SubscriptionHandle, UserId, SIGNAL_BUFFER};

/// Channel topic joined for note changes
const CHANNEL_TOPIC: &str = "realtime:notes_changes";

/// Initial backoff delay on connection failure
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Maximum backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(300);
/// The server drops sockets that stay silent for longer than 30s
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Where and as whom to listen
#[derive(Debug, Clone)]
pub struct RealtimeTarget {
    pub base_url: String,
    pub api_key: String,
    pub access_token: String,
    pub table: String,
    pub user: UserId,
}

/// Start a listener task for the target's rows.
///
/// Reconnects with exponential backoff until the returned subscription's
/// handle is shut down or dropped, or until its signal receiver is dropped.
pub fn start_listener(target: RealtimeTarget) -> Subscription {
    let (signals_tx, signals_rx) = mpsc::channel(SIGNAL_BUFFER);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        listen_loop(target, signals_tx, shutdown_rx).await;
    });

    Subscription {
        signals: signals_rx,
        handle: SubscriptionHandle::new(shutdown_tx),
    }
}

/// Websocket endpoint for a project URL
pub fn websocket_url(base_url: &str, api_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        base,
        urlencoding::encode(api_key)
    )
}

fn join_message(target: &RealtimeTarget, msg_ref: u64) -> String {
    serde_json::json!({
        "topic": CHANNEL_TOPIC,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": target.table,
                    "filter": format!("user_id=eq.{}", target.user),
                }],
            },
            "access_token": target.access_token,
        },
        "ref": msg_ref.to_string(),
        "join_ref": msg_ref.to_string(),
    })
    .to_string()
}

fn heartbeat_message(msg_ref: u64) -> String {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// What an incoming frame means to the listener
#[derive(Debug, PartialEq, Eq)]
enum FrameKind {
    Joined,
    Change,
    Rejected(String),
    Other,
}

fn classify(text: &str) -> FrameKind {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("realtime: unparseable frame: {}", e);
            return FrameKind::Other;
        }
    };
    if frame.topic != CHANNEL_TOPIC {
        return FrameKind::Other;
    }
    match frame.event.as_str() {
        "postgres_changes" => FrameKind::Change,
        "phx_reply" => match frame.payload.get("status").and_then(|s| s.as_str()) {
            Some("ok") => FrameKind::Joined,
            Some("error") => FrameKind::Rejected(frame.payload["response"].to_string()),
            _ => FrameKind::Other,
        },
        "phx_error" | "phx_close" => FrameKind::Rejected(frame.event),
        _ => FrameKind::Other,
    }
}

async fn listen_loop(
    target: RealtimeTarget,
    signals_tx: mpsc::Sender<ChangeSignal>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let ws_url = websocket_url(&target.base_url, &target.api_key);
    let mut backoff = INITIAL_BACKOFF;
    let mut msg_ref: u64 = 0;

    log::info!("realtime: starting listener for user {}", target.user);

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::error::TryRecvError::Disconnected) => {
                log::info!("realtime: shutdown requested for user {}", target.user);
                return;
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
        }

        let mut joined = false;

        match connect_async(ws_url.as_str()).await {
            Ok((stream, _response)) => {
                let (mut write, mut read) = stream.split();

                msg_ref += 1;
                if let Err(e) = write.send(Message::Text(join_message(&target, msg_ref))).await {
                    log::warn!("realtime: failed to send join: {}", e);
                } else {
                    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
                    // first tick completes immediately
                    heartbeat.tick().await;

                    loop {
                        tokio::select! {
                            message = read.next() => {
                                match message {
                                    Some(Ok(Message::Text(text))) => match classify(&text) {
                                        FrameKind::Joined => {
                                            if !joined {
                                                log::info!("realtime: joined {} for user {}", CHANNEL_TOPIC, target.user);
                                            }
                                            joined = true;
                                            backoff = INITIAL_BACKOFF;
                                        }
                                        FrameKind::Change => {
                                            log::debug!("realtime: change signal for user {}", target.user);
                                            // A full buffer already holds a pending refetch
                                            if let Err(mpsc::error::TrySendError::Closed(_)) =
                                                signals_tx.try_send(ChangeSignal)
                                            {
                                                log::info!("realtime: receiver gone for user {}", target.user);
                                                return;
                                            }
                                        }
                                        FrameKind::Rejected(reason) => {
                                            log::warn!("realtime: channel rejected: {}", reason);
                                            break;
                                        }
                                        FrameKind::Other => {}
                                    },
                                    Some(Ok(Message::Close(_))) | None => {
                                        log::info!("realtime: socket closed for user {}", target.user);
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        log::warn!("realtime: socket error: {}", e);
                                        break;
                                    }
                                }
                            }
                            _ = heartbeat.tick() => {
                                msg_ref += 1;
                                if let Err(e) = write.send(Message::Text(heartbeat_message(msg_ref))).await {
                                    log::warn!("realtime: heartbeat failed: {}", e);
                                    break;
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                log::info!("realtime: shutdown requested for user {}", target.user);
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("realtime: failed to connect for user {}: {}", target.user, e);
            }
        }

        if signals_tx.is_closed() {
            return;
        }

        // shorter delay if the channel had been joined
        let reconnect_delay = if joined {
            INITIAL_BACKOFF
        } else {
            backoff = (backoff * 2).min(MAX_BACKOFF);
            backoff
        };

        log::info!("realtime: reconnecting in {:?}", reconnect_delay);

        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = shutdown_rx.recv() => {
                log::info!("realtime: shutdown during reconnect delay for user {}", target.user);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RealtimeTarget {
        RealtimeTarget {
            base_url: "https://abc.supabase.co".to_string(),
            api_key: "pk".to_string(),
            access_token: "jwt".to_string(),
            table: "notes".to_string(),
            user: UserId::new("u-1"),
        }
    }

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("https://abc.supabase.co/", "p k"),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=p%20k&vsn=1.0.0"
        );
        assert!(websocket_url("http://localhost:54321", "k").starts_with("ws://localhost:54321/"));
    }

    #[test]
    fn test_join_filters_by_user() {
        let join: serde_json::Value = serde_json::from_str(&join_message(&target(), 7)).unwrap();
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["ref"], "7");
        let change = &join["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["table"], "notes");
        assert_eq!(change["filter"], "user_id=eq.u-1");
        assert_eq!(join["payload"]["access_token"], "jwt");
    }

    #[test]
    fn test_classify_frames() {
        let change = r#"{"topic":"realtime:notes_changes","event":"postgres_changes","payload":{"data":{}},"ref":null}"#;
        assert_eq!(classify(change), FrameKind::Change);

        let joined = r#"{"topic":"realtime:notes_changes","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(classify(joined), FrameKind::Joined);

        let rejected = r#"{"topic":"realtime:notes_changes","event":"phx_reply","payload":{"status":"error","response":{"reason":"bad token"}},"ref":"1"}"#;
        assert!(matches!(classify(rejected), FrameKind::Rejected(_)));

        let heartbeat = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#;
        assert_eq!(classify(heartbeat), FrameKind::Other);

        assert_eq!(classify("not json"), FrameKind::Other);
    }
}
