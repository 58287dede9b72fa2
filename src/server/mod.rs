//! Server 모듈 - HTTP API
//!
//! `GET /` 상태 조회와 `POST /chat` 질의 응답 두 개의 엔드포인트를
//! 제공합니다. CORS는 전부 개방되어 있고 인증은 없습니다. 요청 처리 중의
//! 모든 실패는 상태 코드 변경 없이 `{success: false, error}` 페이로드로
//! 변환됩니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::{ChatAnswer, ChatService, SourceRef};

// ============================================================================
// State
// ============================================================================

/// 서버 공유 상태
#[derive(Clone)]
pub struct AppState {
    /// 질의 응답 서비스 (읽기 전용 공유)
    pub service: Arc<ChatService>,
    /// 표시용 모델 이름
    pub model_name: String,
}

// ============================================================================
// Wire Types
// ============================================================================

/// POST /chat 요청 본문
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// GET / 응답
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
    pub model: String,
    pub model_loaded: bool,
}

/// POST /chat 응답
///
/// 성공이면 answer/sources, 실패면 error만 채워집니다.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    fn ok(answer: ChatAnswer) -> Self {
        Self {
            success: true,
            answer: Some(answer.answer),
            sources: Some(answer.sources),
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            success: false,
            answer: None,
            sources: None,
            error: Some(error),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// 상태 조회 엔드포인트
async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok".to_string(),
        message: format!("세탁기 챗봇 API ({})", state.model_name),
        model: state.model_name.clone(),
        model_loaded: state.service.model_loaded(),
    })
}

/// 질의 응답 엔드포인트
///
/// 어떤 실패도 전송 계층 오류로 내보내지 않습니다.
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    match state.service.answer(&request.query).await {
        Ok(answer) => Json(ChatResponse::ok(answer)),
        Err(e) => {
            tracing::error!("오류: {}", e);
            Json(ChatResponse::fail(e.to_string()))
        }
    }
}

// ============================================================================
// Router / Startup
// ============================================================================

/// 라우터 구성
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP 서버 시작
pub async fn start(state: AppState, host: &str, port: u16) -> Result<()> {
    let model_name = state.model_name.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("바인드 실패: {}", addr))?;

    tracing::info!("세탁기 챗봇 API 서버 시작: http://{} (모델: {})", addr, model_name);

    axum::serve(listener, app).await.context("서버 실행 실패")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::generator::{GenerationParams, TextGenerator};
    use crate::knowledge::{ChunkStore, FlatIndex, ManualChunk};
    use async_trait::async_trait;

    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedding {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![text.chars().count() as f32, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct StubGenerator;

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> anyhow::Result<String> {
            Ok("표준 코스를 사용하세요.".to_string())
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }
    }

    fn make_state(with_generator: bool) -> AppState {
        let chunks = ChunkStore::new(vec![
            ManualChunk {
                page: 1,
                title: "설치".to_string(),
                content: "수평 바닥에 설치하세요.".to_string(),
            },
            ManualChunk {
                page: 5,
                title: "코스".to_string(),
                content: "표준 코스 안내.".to_string(),
            },
            ManualChunk {
                page: 9,
                title: "세제".to_string(),
                content: "세제 투입구 사용법.".to_string(),
            },
        ]);

        let mut index = FlatIndex::new(2);
        for i in 0..3 {
            index.add(vec![i as f32, 0.0]).unwrap();
        }

        let generator: Option<Box<dyn TextGenerator>> = if with_generator {
            Some(Box::new(StubGenerator))
        } else {
            None
        };

        let service = ChatService::new(
            Box::new(StubEmbedding),
            index,
            chunks,
            generator,
            GenerationParams::default(),
            3,
            300,
        )
        .unwrap();

        AppState {
            service: Arc::new(service),
            model_name: "A.X-4.0-Light-Q4_K_M".to_string(),
        }
    }

    #[tokio::test]
    async fn test_root_reports_model_loaded() {
        let Json(resp) = root(State(make_state(true))).await;
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.model, "A.X-4.0-Light-Q4_K_M");
        assert!(resp.model_loaded);

        let Json(resp) = root(State(make_state(false))).await;
        assert!(!resp.model_loaded);
    }

    #[tokio::test]
    async fn test_chat_success_payload() {
        let state = make_state(true);
        let Json(resp) = chat(
            State(state),
            Json(ChatRequest {
                query: "예약 세탁".to_string(),
            }),
        )
        .await;

        assert!(resp.success);
        assert_eq!(resp.answer.as_deref(), Some("표준 코스를 사용하세요."));
        assert_eq!(resp.sources.as_ref().unwrap().len(), 3);
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_chat_without_model_always_fails() {
        let state = make_state(false);

        for query in ["예약 세탁", "", "아무거나"] {
            let Json(resp) = chat(
                State(state.clone()),
                Json(ChatRequest {
                    query: query.to_string(),
                }),
            )
            .await;

            assert!(!resp.success);
            let error = resp.error.unwrap();
            assert!(!error.is_empty());
            assert!(resp.answer.is_none());
        }
    }

    #[tokio::test]
    async fn test_router_root_roundtrip() {
        use tower::ServiceExt;

        let app = build_router(make_state(false));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["status"], "ok");
        assert_eq!(value["model_loaded"], false);
    }

    #[tokio::test]
    async fn test_router_chat_failure_keeps_success_status() {
        use tower::ServiceExt;

        // 모델 미로드 상태에서도 전송 계층은 200을 유지해야 함
        let app = build_router(make_state(false));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(r#"{"query":"예약 세탁"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["success"], false);
        assert!(!value["error"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_chat_response_serialization_shape() {
        let fail = ChatResponse::fail("오류 메시지".to_string());
        let value = serde_json::to_value(&fail).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "오류 메시지");
        assert!(value.get("answer").is_none());
        assert!(value.get("sources").is_none());

        let ok = ChatResponse::ok(ChatAnswer {
            answer: "답".to_string(),
            sources: vec![SourceRef {
                page: 3,
                title: "제목".to_string(),
            }],
        });
        let value = serde_json::to_value(&ok).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["sources"][0]["page"], 3);
        assert!(value.get("error").is_none());
    }
}
