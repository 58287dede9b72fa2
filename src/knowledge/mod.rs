//! Knowledge 모듈 - 매뉴얼 지식 저장소
//!
//! - ChunkStore: 페이지/제목 메타데이터가 달린 매뉴얼 청크 (JSON 파일)
//! - FlatIndex: 청크 임베딩에 대한 플랫 L2 벡터 인덱스 (bincode 파일)
//! - Chunker: 추출 텍스트의 페이지 분리 및 청크 분할

mod chunker;
mod chunks;
mod index;

// Re-exports
pub use chunker::{chunk_manual_text, chunk_page, extract_title, parse_pages, ChunkConfig};
pub use chunks::{ChunkStore, ManualChunk};
pub use index::{l2_distance, FlatIndex, IndexHit};
