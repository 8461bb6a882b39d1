//! Live channel: the WebSocket control socket and scratch-file serving.
//!
//! Protocol: the client opens the `/play` socket and sends
//! `{urlPath, password?}`;
//! the server answers with `{srcUrl}` followed by `{duration}`,
//! `{audioTracks}`, `{subtitleTracks}`, and `{videoRenditions}`. A later
//! `{seek}` restarts the encoder at the new offset. Errors close the socket
//! with a human-readable reason instead of an HTTP status; a disconnect —
//! clean or not — tears the session down.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use tc_core::LiveSessionId;

use crate::context::AppContext;
use crate::error::AppError;
use crate::live;
use crate::routes::serve_file;

/// GET /live/{session_id}/{file} — rolling playlist and segments from the
/// session's scratch directory.
pub async fn live_file(
    State(ctx): State<AppContext>,
    Path((session_id, file)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let id: LiveSessionId = session_id
        .parse()
        .map_err(|_| tc_core::Error::Validation("invalid session id".into()))?;

    let session = ctx
        .sessions
        .get(&id)
        .map(|e| e.value().clone())
        .ok_or_else(|| tc_core::Error::not_found("session", id))?;

    if file.contains('/') || file.contains('\\') || file.contains("..") || file.starts_with('.') {
        return Err(tc_core::Error::Validation("invalid file name".into()).into());
    }

    let content_type = match file.rsplit_once('.').map(|(_, ext)| ext) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        _ => "application/octet-stream",
    };

    // Live output churns; never let intermediaries cache it.
    Ok(serve_file(&session.scratch.join(&file), content_type, "no-store").await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientMessage {
    url_path: Option<String>,
    password: Option<String>,
    seek: Option<f64>,
}

/// GET /play — upgrade to the live control channel.
pub async fn ws_play(State(ctx): State<AppContext>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx)).into_response()
}

async fn handle_socket(mut socket: WebSocket, ctx: AppContext) {
    let mut current: Option<LiveSessionId> = None;

    loop {
        let message = match socket.recv().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!("live socket error: {e}");
                break;
            }
        };

        let parsed: ClientMessage = match serde_json::from_str(message.as_str()) {
            Ok(m) => m,
            Err(e) => {
                close_with(&mut socket, format!("invalid message: {e}")).await;
                break;
            }
        };

        if let Some(url_path) = parsed.url_path {
            // A fresh start replaces whatever this socket was playing.
            if let Some(old) = current.take() {
                live::stop_session(&ctx, old).await;
            }

            match live::start_session(&ctx, &url_path, parsed.password.as_deref()).await {
                Ok(start) => {
                    current = Some(start.id);
                    let sent = send_json(&mut socket, json!({ "srcUrl": start.src_url })).await
                        && send_json(&mut socket, json!({ "duration": start.duration })).await
                        && send_json(&mut socket, json!({ "audioTracks": start.audio_tracks }))
                            .await
                        && send_json(
                            &mut socket,
                            json!({ "subtitleTracks": start.subtitle_tracks }),
                        )
                        .await
                        && send_json(
                            &mut socket,
                            json!({ "videoRenditions": start.video_renditions }),
                        )
                        .await;
                    if !sent {
                        break;
                    }
                }
                Err(e) => {
                    close_with(&mut socket, e.to_string()).await;
                    break;
                }
            }
        } else if let Some(seek) = parsed.seek {
            let Some(id) = current else {
                close_with(&mut socket, "no active session".into()).await;
                break;
            };
            if let Err(e) = live::seek_session(&ctx, id, seek).await {
                close_with(&mut socket, e.to_string()).await;
                break;
            }
        }
    }

    // The aborted path and the clean path converge here: kill the encoder,
    // delete the scratch directory.
    if let Some(id) = current {
        live::stop_session(&ctx, id).await;
        tracing::debug!(
            error = %tc_core::Error::Aborted("live socket closed".into()),
            "Live channel ended"
        );
    }
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> bool {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .is_ok()
}

async fn close_with(socket: &mut WebSocket, reason: String) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::ERROR,
            reason: reason.into(),
        })))
        .await;
}
