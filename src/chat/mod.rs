//! Chat 모듈 - 질의 응답 오케스트레이션
//!
//! 임베딩 → 벡터 검색 → 청크 해석 → 프롬프트 구성 → 생성의 한 사이클을
//! 담당합니다. 실패는 전부 `ChatError`로 수렴하며 경계 밖으로 panic을
//! 내보내지 않습니다.

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use crate::embedding::EmbeddingProvider;
use crate::generator::{GenerationParams, TextGenerator};
use crate::knowledge::{ChunkStore, FlatIndex, IndexHit};

// ============================================================================
// Types
// ============================================================================

/// 답변 출처 (매뉴얼 페이지/제목)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceRef {
    pub page: u32,
    pub title: String,
}

/// 질의 응답 결과
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    /// 생성된 답변 (trim 완료)
    pub answer: String,
    /// 가까운 순으로 정렬된 출처 목록
    pub sources: Vec<SourceRef>,
}

/// 질의 처리 오류
///
/// "모델 미로드"와 "그 외 모든 예외"의 두 종류만 구분합니다.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("모델이 로드되지 않았습니다. 모델 파일을 다운로드해주세요.")]
    ModelNotLoaded,

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

// ============================================================================
// ChatService
// ============================================================================

/// 질의 응답 서비스
///
/// 기동 시 한 번 만들어져 모든 요청이 읽기 전용으로 공유합니다.
pub struct ChatService {
    embedder: Box<dyn EmbeddingProvider>,
    index: FlatIndex,
    chunks: ChunkStore,
    generator: Option<Box<dyn TextGenerator>>,
    params: GenerationParams,
    top_k: usize,
    context_chars: usize,
}

impl ChatService {
    /// 새 서비스 생성
    ///
    /// 인덱스 크기와 청크 수, 인덱스 차원과 임베더 차원이 일치하는지
    /// 검증합니다. 불일치 상태로 서비스를 띄우면 검색이 조용히 잘못되므로
    /// 기동을 거부합니다.
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        index: FlatIndex,
        chunks: ChunkStore,
        generator: Option<Box<dyn TextGenerator>>,
        params: GenerationParams,
        top_k: usize,
        context_chars: usize,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            anyhow::bail!(
                "인덱스 크기({})와 청크 수({})가 다릅니다. ingest를 다시 실행하세요.",
                index.len(),
                chunks.len()
            );
        }
        if index.dimension() != embedder.dimension() {
            anyhow::bail!(
                "인덱스 차원({})과 임베더 차원({})이 다릅니다. ingest를 다시 실행하세요.",
                index.dimension(),
                embedder.dimension()
            );
        }

        Ok(Self {
            embedder,
            index,
            chunks,
            generator,
            params,
            top_k,
            context_chars,
        })
    }

    /// 생성기 로드 여부
    pub fn model_loaded(&self) -> bool {
        self.generator.is_some()
    }

    /// 질의 응답 한 사이클
    ///
    /// 1. 생성기가 없으면 즉시 실패
    /// 2. 쿼리 임베딩
    /// 3. 최근접 top_k 검색
    /// 4. 컨텍스트/출처 구성
    /// 5. 프롬프트 구성
    /// 6. 생성
    /// 7. trim 후 반환
    pub async fn answer(&self, query: &str) -> Result<ChatAnswer, ChatError> {
        let generator = self.generator.as_ref().ok_or(ChatError::ModelNotLoaded)?;

        tracing::info!("질문: {}", query);

        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&embedding, self.top_k);

        let (context, sources) = self.build_context(&hits)?;
        let prompt = build_prompt(&context, query);

        tracing::info!("LLM 답변 생성 중...");
        let output = generator.generate(&prompt, &self.params).await?;
        let answer = output.trim().to_string();

        tracing::info!("답변: {}...", truncate_chars(&answer, 100));

        Ok(ChatAnswer { answer, sources })
    }

    /// 검색 결과를 컨텍스트 텍스트와 출처 목록으로 변환
    ///
    /// 반환된 순서(가까운 순)를 그대로 사용하며, 중복 제거나 거리 임계값은
    /// 없습니다. 각 청크는 페이지 번호 프리픽스 뒤에 본문 앞부분만 붙입니다.
    fn build_context(&self, hits: &[IndexHit]) -> Result<(String, Vec<SourceRef>)> {
        let mut context = String::new();
        let mut sources = Vec::with_capacity(hits.len());

        for hit in hits {
            let chunk = self
                .chunks
                .get(hit.ordinal)
                .ok_or_else(|| anyhow::anyhow!("청크 ordinal 범위 초과: {}", hit.ordinal))?;

            context.push_str(&format!("[페이지 {}]\n", chunk.page));
            context.push_str(&truncate_chars(&chunk.content, self.context_chars));
            context.push_str("\n\n");

            sources.push(SourceRef {
                page: chunk.page,
                title: chunk.title.clone(),
            });
        }

        Ok((context, sources))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 고정 프롬프트 템플릿
///
/// 매뉴얼 내용만으로 한국어 답변을 하도록 지시합니다.
fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "당신은 삼성 세탁기 사용 설명서 전문 상담원입니다.\n\
         아래 매뉴얼을 참고하여 질문에 정확하고 친절하게 한국어로 답변하세요.\n\
         \n\
         매뉴얼 내용:\n\
         {}\n\
         질문: {}\n\
         \n\
         답변:",
        context, query
    )
}

/// 문자 수 기준 앞부분 자르기 (UTF-8 안전)
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ManualChunk;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// 쿼리 길이에 비례하는 결정적 벡터를 주는 테스트 임베더
    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.chars().count() as f32, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// 고정 답변을 돌려주는 테스트 생성기
    struct StubGenerator;

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok("  표준 코스를 사용하세요.  ".to_string())
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }
    }

    /// 항상 실패하는 테스트 생성기
    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            anyhow::bail!("생성 런타임 오류")
        }

        fn model_name(&self) -> &str {
            "failing-model"
        }
    }

    fn fixture_chunks() -> ChunkStore {
        ChunkStore::new(vec![
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
            ManualChunk {
                page: 20,
                title: "오류 코드".to_string(),
                content: "4C는 급수 오류입니다.".to_string(),
            },
        ])
    }

    /// 청크 ordinal i가 (2i, 0)에 놓인 인덱스
    fn fixture_index() -> FlatIndex {
        let mut index = FlatIndex::new(2);
        for i in 0..4 {
            index.add(vec![(i * 2) as f32, 0.0]).unwrap();
        }
        index
    }

    fn service(generator: Option<Box<dyn TextGenerator>>) -> ChatService {
        ChatService::new(
            Box::new(StubEmbedding),
            fixture_index(),
            fixture_chunks(),
            generator,
            GenerationParams::default(),
            3,
            300,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_answer_returns_top_k_sources_nearest_first() {
        let svc = service(Some(Box::new(StubGenerator)));

        // 4자 쿼리 → (4,0): ordinal 2(d=0)가 최근접, 1(d=2), 3(d=2) 순
        let result = svc.answer("가나다라").await.unwrap();

        assert_eq!(result.sources.len(), 3);
        assert_eq!(result.sources[0].page, 9);
        assert_eq!(result.sources[1].page, 5);
        assert_eq!(result.sources[2].page, 20);
        assert_eq!(result.answer, "표준 코스를 사용하세요.");
    }

    #[tokio::test]
    async fn test_answer_without_model() {
        let svc = service(None);

        let err = svc.answer("아무 질문").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelNotLoaded));
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn test_answer_empty_query() {
        let svc = service(Some(Box::new(StubGenerator)));

        // 빈 쿼리도 구조화된 결과 또는 오류로 끝나야 함 (panic 금지)
        let result = svc.answer("").await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().sources.len(), 3);
    }

    #[tokio::test]
    async fn test_generator_error_surfaces_as_internal() {
        let svc = service(Some(Box::new(FailingGenerator)));

        let err = svc.answer("질문").await.unwrap_err();
        assert!(matches!(err, ChatError::Internal(_)));
        assert!(err.to_string().contains("생성 런타임 오류"));
    }

    #[tokio::test]
    async fn test_context_respects_char_limit() {
        let long_content = "가".repeat(1000);
        let chunks = ChunkStore::new(vec![ManualChunk {
            page: 7,
            title: "긴 청크".to_string(),
            content: long_content,
        }]);

        let mut index = FlatIndex::new(2);
        index.add(vec![0.0, 0.0]).unwrap();

        let svc = ChatService::new(
            Box::new(StubEmbedding),
            index,
            chunks,
            None,
            GenerationParams::default(),
            3,
            300,
        )
        .unwrap();

        let hits = svc.index.search(&[0.0, 0.0], 3);
        let (context, sources) = svc.build_context(&hits).unwrap();

        assert_eq!(sources.len(), 1);
        assert!(context.contains("[페이지 7]"));
        // 페이지 프리픽스 + 300자 + 공백 줄
        let body: String = context
            .lines()
            .filter(|l| !l.starts_with("[페이지"))
            .collect();
        assert!(body.chars().count() <= 300);
    }

    #[tokio::test]
    async fn test_concurrent_queries_get_own_sources() {
        let svc = Arc::new(service(Some(Box::new(StubGenerator))));

        // "가" → (1,0) → 최근접 ordinal 0 / "가나다라마바사" → (7,0) → ordinal 3
        let a = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.answer("가").await })
        };
        let b = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.answer("가나다라마바사").await })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        assert_eq!(a.sources[0].page, 1); // ordinal 0
        assert_eq!(b.sources[0].page, 20); // ordinal 3
    }

    #[test]
    fn test_new_rejects_size_mismatch() {
        let mut index = FlatIndex::new(2);
        index.add(vec![0.0, 0.0]).unwrap();

        let result = ChatService::new(
            Box::new(StubEmbedding),
            index,
            fixture_chunks(), // 4 청크 vs 1 벡터
            None,
            GenerationParams::default(),
            3,
            300,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_rejects_dimension_mismatch() {
        let mut index = FlatIndex::new(5);
        for _ in 0..4 {
            index.add(vec![0.0; 5]).unwrap();
        }

        let result = ChatService::new(
            Box::new(StubEmbedding), // 2차원
            index,
            fixture_chunks(),
            None,
            GenerationParams::default(),
            3,
            300,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_prompt_contains_context_and_query() {
        let prompt = build_prompt("[페이지 3]\n내용\n\n", "예약 세탁은 어떻게 하나요?");
        assert!(prompt.contains("매뉴얼 내용:"));
        assert!(prompt.contains("[페이지 3]"));
        assert!(prompt.contains("질문: 예약 세탁은 어떻게 하나요?"));
        assert!(prompt.ends_with("답변:"));
    }

    #[test]
    fn test_truncate_chars_korean() {
        assert_eq!(truncate_chars("안녕하세요", 3), "안녕하");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
