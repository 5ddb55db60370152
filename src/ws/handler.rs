//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::AppError;
use crate::playback::ViewHandle;
use crate::util::rate_limit::SocketRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// View to watch
    pub view: Uuid,
}

/// Reader → writer requests
enum Reply {
    Pong(u64),
    Resync,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let view = state
        .views
        .get(&query.view)
        .ok_or_else(|| AppError::NotFound(format!("View {} not found", query.view)))?;

    info!(view_id = %view.id, "WebSocket upgrade for view");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, view)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, view: ViewHandle) {
    let view_id = view.id;
    info!(view_id = %view_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        view_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(view_id = %view_id, error = %e, "Failed to send welcome");
        return;
    }

    let latest = view.latest_frame();
    if let Err(e) = send_msg(&mut ws_sink, &ServerMsg::Frame { frame: &latest }).await {
        debug!(view_id = %view_id, error = %e, "Failed to send first frame");
        return;
    }

    run_session(view, ws_sink, ws_stream).await;

    info!(view_id = %view_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    view: ViewHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
) {
    let view_id = view.id;
    let rate_limiter = SocketRateLimiter::new();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Reply>(16);
    let mut frame_rx = view.subscribe();

    // Spawn writer task: broadcast frames + replies -> WebSocket
    let writer_view = view.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = frame_rx.recv() => match result {
                    Ok(frame) => {
                        if let Err(e) = send_msg(&mut ws_sink, &ServerMsg::Frame { frame: &frame }).await {
                            debug!(view_id = %view_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Frames are full state, so the next one catches the client up
                        warn!(view_id = %view_id, lagged_count = n, "Client lagged, skipping {} frames", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(view_id = %view_id, "Frame channel closed");
                        break;
                    }
                },
                Some(reply) = reply_rx.recv() => {
                    let sent = match reply {
                        Reply::Pong(t) => {
                            send_msg(&mut ws_sink, &ServerMsg::Pong { t, server_time: unix_millis() }).await
                        }
                        Reply::Resync => {
                            let frame = writer_view.latest_frame();
                            send_msg(&mut ws_sink, &ServerMsg::Frame { frame: &frame }).await
                        }
                    };
                    if let Err(e) = sent {
                        debug!(view_id = %view_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                _ = writer_view.command_tx.closed() => {
                    let _ = send_msg(&mut ws_sink, &ServerMsg::ViewClosed { view_id }).await;
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> writer
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(view_id = %view_id, "Rate limited client message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Ping { t }) => Reply::Pong(t),
                    Ok(ClientMsg::Resync) => Reply::Resync,
                    Err(e) => {
                        warn!(view_id = %view_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };
                if reply_tx.send(reply).await.is_err() {
                    debug!(view_id = %view_id, "Writer stopped");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(view_id = %view_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(view_id = %view_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(view_id = %view_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg<'_>,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
