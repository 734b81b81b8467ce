use actix_web::{web, Error, HttpRequest, Responder};
use actix_ws::{self, Message};
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;

use crate::capture::manager::{CaptureManager, LogEvent};
use crate::models::stats::LogStats;

// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

// Send at most one stats update per interval
const STATS_THROTTLE: Duration = Duration::from_secs(1);

/// WebSocket message types that can be sent to clients
#[derive(Serialize)]
#[serde(tag = "type")]
enum WsOutMessage {
    #[serde(rename = "stats")]
    Stats { stats: LogStats },

    #[serde(rename = "event")]
    Event { event: LogEvent },
}

/// Handle WebSocket connections
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    capture_manager: web::Data<Arc<CaptureManager>>,
) -> Result<impl Responder, Error> {
    let addr = req
        .peer_addr()
        .map(|peer_addr| peer_addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("WebSocket connection from: {}", addr);

    let (response, session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let cm = capture_manager.get_ref().clone();
    let mut events_rx = cm.subscribe();

    let session_for_handler = session.clone();
    let session_for_updates = session.clone();
    let session_for_heartbeat = session;

    actix_web::rt::spawn(async move {
        let started = Instant::now();
        let last_heartbeat = Arc::new(AtomicU64::new(0));
        let last_heartbeat_for_handler = last_heartbeat.clone();

        let mut session_clone = session_for_handler.clone();
        if let Err(e) = send_stats(&mut session_clone, &cm).await {
            warn!("Failed to send initial stats: {}", e);
            return;
        }

        // Client messages: pings, commands and close
        let ws_msg_task = {
            let mut session = session_for_handler;
            let cm = cm.clone();

            async move {
                while let Some(Ok(msg)) = msg_stream.next().await {
                    match msg {
                        Message::Ping(bytes) => {
                            last_heartbeat_for_handler
                                .store(started.elapsed().as_secs(), Ordering::SeqCst);
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Pong(_) => {
                            last_heartbeat_for_handler
                                .store(started.elapsed().as_secs(), Ordering::SeqCst);
                        }
                        Message::Text(text) => {
                            debug!("Received text message: {}", text);
                            last_heartbeat_for_handler
                                .store(started.elapsed().as_secs(), Ordering::SeqCst);
                            if text.trim() == "stats" {
                                if let Err(e) = send_stats(&mut session, &cm).await {
                                    warn!("Failed to send stats: {}", e);
                                    break;
                                }
                            }
                        }
                        Message::Close(_) => {
                            info!("Client requested close");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        };

        // Log changes: forwarded as they happen, stats throttled
        let updates_task = {
            let mut session = session_for_updates;
            let cm = cm.clone();

            async move {
                let mut ticker = interval(STATS_THROTTLE);
                let mut pending = false;

                loop {
                    tokio::select! {
                        event = events_rx.recv() => match event {
                            Ok(event) => {
                                pending = true;
                                // Appends are frequent; only structural changes are forwarded
                                if !matches!(event, LogEvent::Recorded { .. }) {
                                    let msg = WsOutMessage::Event { event };
                                    if let Ok(json) = serde_json::to_string(&msg) {
                                        if session.text(json).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                debug!("WebSocket subscriber lagged by {} event(s)", skipped);
                                pending = true;
                            }
                            Err(RecvError::Closed) => break,
                        },
                        _ = ticker.tick() => {
                            if pending {
                                pending = false;
                                if send_stats(&mut session, &cm).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        };

        let heartbeat_task = {
            let mut session = session_for_heartbeat;

            async move {
                let mut heartbeat = interval(HEARTBEAT_INTERVAL);
                loop {
                    heartbeat.tick().await;

                    let now = started.elapsed().as_secs();
                    let last = last_heartbeat.load(Ordering::SeqCst);
                    if now.saturating_sub(last) > HEARTBEAT_INTERVAL.as_secs() * 3 {
                        warn!("WebSocket client heartbeat timed out");
                        let _ = session.close(None).await;
                        break;
                    }

                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = ws_msg_task => {},
            _ = updates_task => {},
            _ = heartbeat_task => {},
        }

        info!("WebSocket connection closed: {}", addr);
    });

    Ok(response)
}

/// Send current stats to WebSocket client
async fn send_stats(
    session: &mut actix_ws::Session,
    cm: &Arc<CaptureManager>,
) -> Result<(), actix_ws::Closed> {
    let msg = WsOutMessage::Stats { stats: cm.stats() };

    if let Ok(json) = serde_json::to_string(&msg) {
        session.text(json).await?;
    }

    Ok(())
}
