//! `POST /offer`: admit a session and answer its offer.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use livetalk_core::{SdpType, SessionDescription};
use tracing::{info, instrument, warn};

use crate::server::GatewayState;
use crate::wire::{ApiResult, OfferRequest, OfferResponse};

#[instrument(skip_all)]
pub async fn offer(
    State(state): State<GatewayState>,
    payload: Result<Json<OfferRequest>, JsonRejection>,
) -> Result<Json<OfferResponse>, Json<ApiResult>> {
    let Json(request) = payload.map_err(|e| Json(ApiResult::error(e.body_text())))?;
    if request.kind != SdpType::Offer {
        return Err(Json(ApiResult::error(format!("expected an offer, got {}", request.kind))));
    }

    match state.manager.offer(SessionDescription::offer(request.sdp)).await {
        Ok(answered) => {
            info!(session_id = %answered.session_id, sessions = state.manager.count(), "Offer answered");
            Ok(Json(OfferResponse {
                sdp: answered.answer.sdp,
                kind: answered.answer.kind,
                sessionid: answered.session_id,
            }))
        }
        Err(e) => {
            warn!(error = %e, "Offer failed");
            Err(Json(ApiResult::error(e)))
        }
    }
}
