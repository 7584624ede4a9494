//! Main HTTP gateway server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use livetalk_media::AudioStore;
use livetalk_session::SessionManager;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::{commands, health_api, signaling};

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: SessionManager,
    pub audio_store: Arc<AudioStore>,
}

impl GatewayState {
    pub fn new(manager: SessionManager, audio_store: AudioStore) -> Self {
        Self { manager, audio_store: Arc::new(audio_store) }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/offer", post(signaling::offer))
        .route("/human", post(commands::human))
        .route("/humanaudio", post(commands::human_audio))
        .route("/interrupt", post(commands::interrupt))
        .route("/set_audiotype", post(commands::set_audiotype))
        .route("/health", get(health_api::get_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` resolves, then tear down every session.
#[instrument(skip(state, shutdown))]
pub async fn start_server<F>(addr: SocketAddr, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let manager = state.manager.clone();
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway HTTP server listening on {}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    let cleaned = manager.shutdown().await;
    info!(cleaned, "Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use livetalk_core::{ModelKind, SessionId};
    use livetalk_render::{Avatar, SharedAssets};
    use livetalk_session::{EchoResponder, RendererFactory, SessionSettings};
    use livetalk_transport::{LocalTransportFactory, TransportOptions};
    use livetalk_tts::SilentTts;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::wire::{ApiResult, HealthReport, OfferResponse};

    const OFFER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0\r\n\
        m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:1\r\n";

    fn state_with_transports(upload_dir: &std::path::Path) -> (GatewayState, Arc<LocalTransportFactory>) {
        let assets = Arc::new(SharedAssets::new(
            ModelKind::MuseTalk,
            Avatar::synthetic("test", 4, 450, 450),
            50,
            16,
        ));
        let factory = RendererFactory::new("musetalk", assets, Arc::new(SilentTts::default()), 1).unwrap();
        let transports = Arc::new(LocalTransportFactory::new(TransportOptions::default()));
        let manager = SessionManager::new(
            SessionSettings::default(),
            factory,
            transports.clone(),
            Arc::new(EchoResponder::default()),
        );
        (GatewayState::new(manager, AudioStore::new(upload_dir)), transports)
    }

    fn state(upload_dir: &std::path::Path) -> GatewayState {
        state_with_transports(upload_dir).0
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn upload(id: SessionId, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let boundary = "livetalkboundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"sessionid\"\r\n\r\n{id}\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::post("/humanaudio")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn open_session(app: &Router) -> SessionId {
        let (status, body) = call(app, post_json("/offer", json!({"sdp": OFFER, "type": "offer"}))).await;
        assert_eq!(status, StatusCode::OK);
        let answer: OfferResponse = serde_json::from_value(body).unwrap();
        assert!(answer.sdp.starts_with("v=0"));
        answer.sessionid
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn offer_rejected_at_cap_until_first_session_closes() {
        let dir = tempfile::tempdir().unwrap();
        let (state, transports) = state_with_transports(dir.path());
        let app = router(state.clone());

        let a = open_session(&app).await;
        let (status, body) = call(&app, post_json("/offer", json!({"sdp": OFFER, "type": "offer"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"code": -1, "msg": "reach max session"}));
        assert_eq!(state.manager.count(), 1);

        let (_, health) = call(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        let health: HealthReport = serde_json::from_value(health).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.sessions, 1);
        assert_eq!(health.model, "musetalk");
        assert_eq!(health.active.len(), 1);
        assert_eq!(health.active[0].session_id, a);

        transports.get(a).unwrap().report(livetalk_core::ConnectionState::Closed);
        wait_until(|| state.manager.count() == 0).await;

        let b = open_session(&app).await;
        assert_eq!(state.manager.count(), 1);
        let (_, health) = call(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health["sessions"], 1);
        assert_eq!(health["active"][0]["sessionid"], json!(b));
        state.manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commands_answer_code_zero_or_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let app = router(state.clone());
        let id = open_session(&app).await;

        let (_, body) = call(
            &app,
            post_json("/human", json!({"sessionid": id, "type": "echo", "text": "hello", "interrupt": true})),
        )
        .await;
        assert_eq!(serde_json::from_value::<ApiResult>(body).unwrap(), ApiResult::ok());

        let (_, body) = call(&app, post_json("/interrupt", json!({"sessionid": id}))).await;
        assert_eq!(body["code"], 0);
        let (_, body) = call(&app, post_json("/set_audiotype", json!({"sessionid": id, "audiotype": 1}))).await;
        assert_eq!(body["code"], 0);

        let (status, body) = call(
            &app,
            post_json("/human", json!({"sessionid": 1, "type": "chat", "text": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], -1);
        assert_eq!(body["msg"], "session not found: 1");

        let (status, body) = call(&app, post_json("/human", json!({"type": "echo"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], -1);
        state.manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn audio_upload_is_stored_and_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let app = router(state.clone());
        let id = open_session(&app).await;

        let (_, body) = call(&app, upload(id, "hello.wav", "audio/wav", b"RIFF\x24\0\0\0WAVEfmt ")).await;
        assert_eq!(body["code"], 0);
        assert!(dir.path().join(format!("audio_{id}_hello.wav")).exists());
        state.manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn audio_upload_rejects_formats_that_cannot_play() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let app = router(state.clone());
        let id = open_session(&app).await;

        let mp3 = b"ID3\x03\0\0\0\0\0\x0f\xff\xfb\x90\x64";
        let (status, body) = call(&app, upload(id, "clip.mp3", "audio/mpeg", mp3)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], -1);
        assert!(body["msg"].as_str().unwrap().contains("audio/mpeg"));
        assert!(!dir.path().join(format!("audio_{id}_clip.mp3")).exists());
        state.manager.shutdown().await;
    }

    #[tokio::test]
    async fn audio_upload_requires_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path()));
        let (status, body) = call(&app, post_json("/humanaudio", json!({"sessionid": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], -1);
    }
}
