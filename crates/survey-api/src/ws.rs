//! Live chart feed
//!
//! One WebSocket per survey. The subscriber first receives the current
//! live-flagged charts, then every update pushed after a submission change.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use survey_core::ports::outbound::live_topic;
use survey_core::{ChartData, LiveSubscription, SurveyError};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::AppState;

/// Client frame
#[derive(Debug, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
}

pub async fn live_feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Response> {
    // Unknown surveys never get a topic.
    snapshot(&state, survey_uuid).await?;

    // Read the charts again once subscribed so no update falls in between.
    let updates = state.live.subscribe(&live_topic(&survey_uuid));
    let initial = snapshot(&state, survey_uuid).await?;

    Ok(ws.on_upgrade(move |socket| stream_updates(socket, survey_uuid, initial, updates)))
}

async fn snapshot(state: &AppState, survey_uuid: Uuid) -> ApiResult<Vec<ChartData>> {
    match state.surveys.live_snapshot(survey_uuid).await {
        Ok(charts) => Ok(charts),
        Err(SurveyError::FormNotFound) => Ok(Vec::new()),
        Err(error) => Err(error.into()),
    }
}

async fn stream_updates(
    socket: WebSocket,
    survey_uuid: Uuid,
    initial: Vec<ChartData>,
    mut updates: LiveSubscription,
) {
    let (mut sink, mut stream) = socket.split();

    let hello = json!({ "type": "initial", "data": initial });
    if sink.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }
    debug!(%survey_uuid, "Live subscriber connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(payload) => {
                        if sink.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%survey_uuid, skipped, "Live subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let is_ping = serde_json::from_str::<WsMessage>(&text)
                            .is_ok_and(|parsed| parsed.msg_type == "ping");
                        if is_ping {
                            let pong = json!({ "type": "pong", "data": {} });
                            if sink.send(Message::Text(pong.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    // Dropping `updates` releases the topic if this was its last subscriber.
    debug!(%survey_uuid, "Live subscriber disconnected");
}
