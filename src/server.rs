//! HTTPサーバー
//!
//! - `POST /answer`: 画像と座標を受けて解析結果を返す
//! - `GET /health`: 死活確認

use crate::config::Config;
use crate::image::MAX_IMAGE_BYTES;
use crate::invoker::create_invoker;
use crate::pipeline::Analyzer;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, MatchedPath, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::Span;

/// リクエスト本文の上限（10MB画像のBase64 + JSONの余白）
pub const MAX_BODY_BYTES: usize = MAX_IMAGE_BYTES / 3 * 4 + 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppState {
    analyzer: Analyzer,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/answer", post(answer))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %matched_path,
                    )
                })
                .on_request(|_request: &Request<_>, _span: &Span| {})
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &Span| {
                        let status = response.status().as_u16();
                        if status >= 500 {
                            tracing::error!(status, latency_ms = %latency.as_millis(), "request failed with server error");
                        } else {
                            tracing::info!(status, latency_ms = %latency.as_millis(), "request completed");
                        }
                    },
                ),
        )
}

async fn answer(State(state): State<AppState>, body: Bytes) -> Response {
    let (status, response) = state.analyzer.respond(&body).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.analyzer.model_name(),
    }))
}

/// サーバーを起動し、Ctrl-Cで停止する
///
/// 資格情報が無い場合は起動前に失敗する。
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let invoker = create_invoker(config)?;
    let analyzer = Analyzer::new(invoker, config.timeout());
    let app = router(AppState::new(analyzer));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("シャットダウン");
        })
        .await?;
    Ok(())
}
