//! Command endpoints: `/human`, `/humanaudio`, `/interrupt`, `/set_audiotype`.
//!
//! Every failure, including a malformed body, is answered with
//! `{code: -1, msg}` and HTTP 200.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use livetalk_core::{LiveTalkError, SessionId};
use livetalk_session::Command;
use tracing::{debug, warn};

use crate::server::GatewayState;
use crate::wire::{ApiResult, AudioTypeRequest, HumanKind, HumanRequest, InterruptRequest};

fn reply(result: Result<(), LiveTalkError>) -> Json<ApiResult> {
    match result {
        Ok(()) => Json(ApiResult::ok()),
        Err(e) => Json(ApiResult::error(e)),
    }
}

fn send(state: &GatewayState, session_id: SessionId, command: Command) -> Result<(), LiveTalkError> {
    state.manager.dispatch(session_id, command).map(|_| ())
}

pub async fn human(
    State(state): State<GatewayState>,
    payload: Result<Json<HumanRequest>, JsonRejection>,
) -> Json<ApiResult> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(e) => return Json(ApiResult::error(e.body_text())),
    };
    debug!(session_id = %request.sessionid, kind = ?request.kind, interrupt = request.interrupt, "Human message");

    reply(deliver(&state, request))
}

fn deliver(state: &GatewayState, request: HumanRequest) -> Result<(), LiveTalkError> {
    if request.interrupt {
        send(state, request.sessionid, Command::Interrupt)?;
    }
    let command = match request.kind {
        HumanKind::Echo => Command::Echo(request.text),
        HumanKind::Chat => Command::Chat(request.text),
    };
    send(state, request.sessionid, command)
}

pub async fn interrupt(
    State(state): State<GatewayState>,
    payload: Result<Json<InterruptRequest>, JsonRejection>,
) -> Json<ApiResult> {
    match payload {
        Ok(Json(request)) => reply(send(&state, request.sessionid, Command::Interrupt)),
        Err(e) => Json(ApiResult::error(e.body_text())),
    }
}

pub async fn set_audiotype(
    State(state): State<GatewayState>,
    payload: Result<Json<AudioTypeRequest>, JsonRejection>,
) -> Json<ApiResult> {
    match payload {
        Ok(Json(request)) => reply(send(
            &state,
            request.sessionid,
            Command::SetPlaybackState(request.audiotype),
        )),
        Err(e) => Json(ApiResult::error(e.body_text())),
    }
}

/// Multipart upload with a `sessionid` field and a `file` part.
pub async fn human_audio(
    State(state): State<GatewayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ApiResult> {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart).await,
        Err(e) => Err(e.body_text()),
    };
    let (session_id, filename, data) = match upload {
        Ok(upload) => upload,
        Err(msg) => {
            warn!(error = %msg, "Rejected audio upload");
            return Json(ApiResult::error(msg));
        }
    };

    // Checked before storing so unknown sessions leave nothing on disk.
    if state.manager.registry().lookup(session_id).is_none() {
        return reply(Err(LiveTalkError::SessionNotFound(session_id)));
    }
    let path = match state.audio_store.store(session_id, &filename, data).await {
        Ok(path) => path,
        Err(e) => return Json(ApiResult::error(e)),
    };
    reply(send(&state, session_id, Command::AudioFile(path)))
}

async fn read_upload(mut multipart: Multipart) -> Result<(SessionId, String, Bytes), String> {
    let mut session_id = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        match field.name() {
            Some("sessionid") => {
                let text = field.text().await.map_err(|e| e.body_text())?;
                let id = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| format!("invalid sessionid '{}'", text.trim()))?;
                session_id = Some(SessionId(id));
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.wav").to_string();
                let data = field.bytes().await.map_err(|e| e.body_text())?;
                file = Some((filename, data));
            }
            _ => {}
        }
    }
    let session_id = session_id.ok_or("missing sessionid field")?;
    let (filename, data) = file.ok_or("missing file field")?;
    Ok((session_id, filename, data))
}
