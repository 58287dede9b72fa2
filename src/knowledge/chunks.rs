//! Chunk Store - 매뉴얼 청크 저장소
//!
//! 오프라인 ingest가 생성한 청크 레코드 파일(JSON 배열)을 읽기 전용으로
//! 로드합니다. 청크의 ID는 배열 내 순서(ordinal)이며, 벡터 인덱스를 만들 때
//! 사용한 행 순서와 반드시 일치해야 합니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 매뉴얼 청크 한 건
///
/// 서비스 기동 시 로드된 이후에는 절대 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualChunk {
    /// 매뉴얼 페이지 번호 (1부터 시작)
    pub page: u32,
    /// 청크 제목 (페이지 첫 줄 기반)
    pub title: String,
    /// 청크 본문
    pub content: String,
}

// ============================================================================
// ChunkStore
// ============================================================================

/// 읽기 전용 청크 저장소
///
/// 순서가 보존된 청크 목록을 감싸고 ordinal 조회를 제공합니다.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Vec<ManualChunk>,
}

impl ChunkStore {
    /// 청크 목록으로 생성 (ingest 및 테스트용)
    pub fn new(chunks: Vec<ManualChunk>) -> Self {
        Self { chunks }
    }

    /// 청크 레코드 파일 로드
    ///
    /// # Arguments
    /// * `path` - JSON 배열 파일 경로 (예: data/chunks.json)
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("청크 파일을 읽을 수 없습니다: {:?}", path))?;

        let chunks: Vec<ManualChunk> = serde_json::from_str(&data)
            .with_context(|| format!("청크 파일 파싱 실패: {:?}", path))?;

        tracing::info!("청크 {} 건 로드됨: {:?}", chunks.len(), path);

        Ok(Self { chunks })
    }

    /// 청크 레코드 파일 저장 (ingest용)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("청크 파일 디렉토리 생성 실패")?;
            }
        }

        let data = serde_json::to_string_pretty(&self.chunks)
            .context("청크 직렬화 실패")?;

        std::fs::write(path, data)
            .with_context(|| format!("청크 파일 쓰기 실패: {:?}", path))?;

        Ok(())
    }

    /// ordinal로 청크 조회
    pub fn get(&self, ordinal: usize) -> Option<&ManualChunk> {
        self.chunks.get(ordinal)
    }

    /// 청크 개수
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 전체 청크 순회 (ordinal 순)
    pub fn iter(&self) -> impl Iterator<Item = &ManualChunk> {
        self.chunks.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
