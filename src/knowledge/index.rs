//! Vector Index - 플랫 L2 최근접 이웃 인덱스
//!
//! 청크 임베딩 전체를 메모리에 올려 두고 정확(exhaustive) L2 거리 검색을
//! 수행합니다. 인덱스 엔트리는 청크 저장소의 ordinal과 1:1로 대응합니다.
//! 파일로는 bincode로 직렬화되어 저장됩니다.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 검색 히트 한 건 (가까운 순으로 정렬되어 반환됨)
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// 청크 ordinal
    pub ordinal: usize,
    /// L2 거리 (작을수록 가까움)
    pub distance: f32,
}

// ============================================================================
// FlatIndex
// ============================================================================

/// 플랫 벡터 인덱스
///
/// 벡터는 삽입 순서대로 보관되며, 그 순서가 곧 청크 ordinal입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// 빈 인덱스 생성
    ///
    /// # Arguments
    /// * `dimension` - 임베딩 차원 수
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// 벡터 추가 (ordinal은 추가 순서)
    pub fn add(&mut self, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            anyhow::bail!(
                "벡터 차원 불일치: 기대 {}, 입력 {}",
                self.dimension,
                vector.len()
            );
        }
        self.vectors.push(vector);
        Ok(())
    }

    /// 최근접 k개 검색
    ///
    /// 모든 벡터와의 L2 거리를 계산해 가까운 순으로 최대 `k`개를 반환합니다.
    /// 임계값이나 중복 제거는 없습니다.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<IndexHit> {
        let mut hits: Vec<IndexHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| IndexHit {
                ordinal,
                distance: l2_distance(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    /// 인덱스 크기 (벡터 개수)
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// 임베딩 차원
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 인덱스 파일 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("인덱스 디렉토리 생성 실패")?;
            }
        }

        let mut file = BufWriter::new(
            File::create(path)
                .with_context(|| format!("인덱스 파일 생성 실패: {:?}", path))?,
        );
        bincode::serialize_into(&mut file, self)
            .with_context(|| format!("인덱스 직렬화 실패: {:?}", path))?;

        Ok(())
    }

    /// 인덱스 파일 로드
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = BufReader::new(
            File::open(path)
                .with_context(|| format!("인덱스 파일을 열 수 없습니다: {:?}", path))?,
        );
        let index: FlatIndex = bincode::deserialize_from(&mut file)
            .with_context(|| format!("인덱스 역직렬화 실패: {:?}", path))?;

        tracing::info!(
            "인덱스 로드됨: {} 벡터, {} 차원, {:?}",
            index.len(),
            index.dimension(),
            path
        );

        Ok(index)
    }
}

// ============================================================================
// Distance
// ============================================================================

/// L2 (유클리드) 거리
///
/// 길이가 다르면 겹치는 앞부분만 비교합니다.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Tests
// ============================================================================
