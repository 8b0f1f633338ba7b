//! Websocket endpoints for live stats and interactive terminals.
//!
//! Both adapt an axum socket into the engine's frame-based session API;
//! all session logic lives in `dockhand_engine::streaming`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use dockhand_engine::streaming::{run_stats_session, run_terminal_session};
use dockhand_engine::SessionFrame;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tracing::{info, warn};

use crate::AppState;

fn to_message(frame: SessionFrame) -> Message {
    match frame {
        SessionFrame::Text(text) => Message::Text(text),
        SessionFrame::Binary(data) => Message::Binary(data),
        SessionFrame::Close => Message::Close(None),
    }
}

/// Client messages as session frames. Pings and pongs are answered by
/// axum and dropped here; a transport error ends the session.
fn to_frame(message: Result<Message, axum::Error>) -> Option<SessionFrame> {
    match message {
        Ok(Message::Text(text)) => Some(SessionFrame::Text(text)),
        Ok(Message::Binary(data)) => Some(SessionFrame::Binary(data)),
        Ok(Message::Close(_)) | Err(_) => Some(SessionFrame::Close),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
    }
}

/// Split a socket into a frame sink and a frame stream.
pub fn split_socket(
    socket: WebSocket,
) -> (
    impl Sink<SessionFrame, Error = axum::Error> + Unpin + Send,
    impl Stream<Item = SessionFrame> + Unpin + Send,
) {
    let (tx, rx) = socket.split();
    let sink = tx.with(|frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = rx.filter_map(|message| future::ready(to_frame(message)));
    (sink, stream)
}

pub async fn container_stats(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        info!(%container, "Stats websocket connected");
        let (sink, inbound) = split_socket(socket);
        if let Err(e) = run_stats_session(
            state.engine.clone(),
            &container,
            state.config.stats_interval,
            sink,
            inbound,
        )
        .await
        {
            warn!(%container, error = %e, "Stats session ended with error");
        }
    })
}

pub async fn container_terminal(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        info!(%container, "Terminal websocket connected");
        let (sink, inbound) = split_socket(socket);
        if let Err(e) = run_terminal_session(
            state.engine.clone(),
            &container,
            state.config.terminal_shell.clone(),
            state.config.terminal_queue,
            sink,
            inbound,
        )
        .await
        {
            warn!(%container, error = %e, "Terminal session ended with error");
        }
    })
}
