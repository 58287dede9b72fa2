//! setak-rag - 세탁기 매뉴얼 RAG 챗봇
//!
//! 매뉴얼 청크에 대한 로컬 벡터 검색과 GGUF LLM 생성을 결합해
//! 한국어 답변과 페이지 출처를 돌려주는 HTTP 서비스입니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod download;
pub mod embedding;
pub mod extractor;
pub mod generator;
pub mod knowledge;
pub mod server;

// Re-exports
pub use chat::{ChatAnswer, ChatError, ChatService, SourceRef};
pub use config::{ServiceConfig, DEFAULT_CONTEXT_CHARS, DEFAULT_TOP_K};
pub use embedding::{EmbeddingProvider, LocalEmbedding, EMBEDDING_DIMENSION};
pub use generator::{GenerationParams, GeneratorSettings, LlamaGenerator, TextGenerator};
pub use knowledge::{
    chunk_manual_text, ChunkConfig, ChunkStore, FlatIndex, IndexHit, ManualChunk,
};
pub use server::AppState;
