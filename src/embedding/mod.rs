//! 임베딩 모듈 - 로컬 ONNX 모델을 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 로컬 임베딩 프로바이더입니다.
//! 시맨틱 검색을 위한 핵심 모듈이며, 외부 API 호출 없이 동작합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = LocalEmbedding::new()?;
//! let embedding = embedder.embed("세탁기 예약 기능").await?;
//! ```

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Local Embedding (fastembed)
// ============================================================================

/// 기본 임베딩 차원 (paraphrase-multilingual-MiniLM-L12-v2)
pub const EMBEDDING_DIMENSION: usize = 384;

/// 임베딩 모델 이름
const MODEL_NAME: &str = "paraphrase-multilingual-MiniLM-L12-v2";

/// 로컬 임베딩 구현체
///
/// fastembed의 다국어 MiniLM 모델을 사용합니다. 한국어 쿼리를 지원하며
/// 첫 생성 시 모델 파일이 캐시 디렉토리에 준비됩니다.
///
/// `TextEmbedding::embed`는 `&mut self`를 요구하므로 내부를 `Mutex`로
/// 감싸 공유합니다. 추론은 CPU 바운드라 `spawn_blocking`에서 수행합니다.
pub struct LocalEmbedding {
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl LocalEmbedding {
    /// 새 로컬 임베딩 인스턴스 생성
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ParaphraseMLMiniLML12V2)
                .with_show_download_progress(false),
        )
        .map_err(|e| anyhow::anyhow!("임베딩 모델 로드 실패: {}", e))?;

        tracing::info!("임베딩 모델 로드됨: {} ({} 차원)", MODEL_NAME, EMBEDDING_DIMENSION);

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            dimension: EMBEDDING_DIMENSION,
        })
    }

    /// 배치 임베딩 (블로킹)
    fn embed_blocking(model: &Arc<Mutex<TextEmbedding>>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut guard = model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        guard
            .embed(texts, None)
            .map_err(|e| anyhow::anyhow!("임베딩 생성 실패: {}", e))
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let model = Arc::clone(&self.model);
        let text = text.to_string();

        let mut embeddings =
            tokio::task::spawn_blocking(move || Self::embed_blocking(&model, vec![text]))
                .await
                .context("임베딩 작업 실패")??;

        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("임베딩 결과가 비어 있습니다"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || Self::embed_blocking(&model, texts))
            .await
            .context("임베딩 작업 실패")?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }
}

// ============================================================================
// Tests
// ============================================================================
