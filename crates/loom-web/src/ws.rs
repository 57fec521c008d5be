use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use loom_core::hub::Subscription;

use crate::AppState;

pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream(socket, state.hub.subscribe()))
}

/// Forward records until the client goes away or the hub closes the stream.
async fn stream(socket: WebSocket, mut entries: Subscription) {
    let (mut sink, mut incoming) = socket.split();
    tracing::debug!("dashboard client connected");

    loop {
        tokio::select! {
            entry = entries.recv() => {
                let Some(entry) = entry else {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&*entry) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode record");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("dashboard client disconnected");
}
