//! CLI 모듈
//!
//! setak-rag CLI 명령어 정의 및 구현
//!
//! - serve: 챗봇 HTTP 서비스 기동
//! - ingest: 추출 텍스트로 청크/인덱스 파일 생성
//! - extract: 매뉴얼 PDF에서 텍스트 추출
//! - download: GGUF 모델 다운로드
//! - status: 데이터/모델 파일 상태 확인

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::ChatService;
use crate::config::ServiceConfig;
use crate::download;
use crate::embedding::{EmbeddingProvider, LocalEmbedding};
use crate::extractor;
use crate::generator::{GenerationParams, LlamaGenerator, TextGenerator};
use crate::knowledge::{chunk_manual_text, ChunkConfig, ChunkStore, FlatIndex};
use crate::server::{self, AppState};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "setak-rag")]
#[command(version, about = "세탁기 매뉴얼 RAG 챗봇", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 챗봇 HTTP 서비스 기동
    Serve {
        /// 바인드 호스트
        #[arg(long)]
        host: Option<String>,

        /// 바인드 포트
        #[arg(short, long)]
        port: Option<u16>,

        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// 추출된 매뉴얼 텍스트로 청크/인덱스 파일 생성
    Ingest {
        /// 추출 텍스트 파일 경로
        #[arg(short, long, default_value = "extracted_text.txt")]
        input: PathBuf,

        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// 청크 최대 문자 수
        #[arg(long, default_value = "800")]
        max_chars: usize,

        /// 청크 오버랩 문자 수
        #[arg(long, default_value = "80")]
        overlap: usize,
    },

    /// 매뉴얼 PDF에서 텍스트 추출
    Extract {
        /// 매뉴얼 PDF 경로
        #[arg(short, long, default_value = "Washer.pdf")]
        pdf: PathBuf,

        /// 출력 텍스트 파일 경로
        #[arg(short, long, default_value = "extracted_text.txt")]
        output: PathBuf,
    },

    /// GGUF 모델 다운로드
    Download {
        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// 상태 확인
    Status {
        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            data_dir,
        } => cmd_serve(host, port, data_dir).await,
        Commands::Ingest {
            input,
            data_dir,
            max_chars,
            overlap,
        } => cmd_ingest(input, data_dir, max_chars, overlap).await,
        Commands::Extract { pdf, output } => cmd_extract(pdf, output).await,
        Commands::Download { data_dir } => cmd_download(data_dir).await,
        Commands::Status { data_dir } => cmd_status(data_dir).await,
    }
}

/// CLI 오버라이드를 반영한 설정 로드
fn load_config(data_dir: Option<PathBuf>) -> ServiceConfig {
    let mut config = ServiceConfig::from_env();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서비스 기동 명령어 (serve)
///
/// 모든 상태 의존성을 기동 시 한 번 로드합니다.
/// 순서: 임베딩 모델 → 벡터 인덱스 + 청크 저장소 → 생성기.
async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(data_dir);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    tracing::info!("모델 로딩 중...");

    // 1/3 임베딩 모델
    tracing::info!("1/3 임베딩 모델 로딩...");
    let embedder = LocalEmbedding::new().context("임베딩 모델 초기화 실패")?;

    // 2/3 벡터 인덱스 + 청크 저장소
    tracing::info!("2/3 벡터 인덱스 로딩...");
    let index = FlatIndex::load(&config.index_path())
        .context("벡터 인덱스 로드 실패 (ingest를 먼저 실행하세요)")?;
    let chunks = ChunkStore::load(&config.chunks_path())
        .context("청크 저장소 로드 실패 (ingest를 먼저 실행하세요)")?;

    // 3/3 생성기 (모델 파일이 없으면 미로드 상태로 기동)
    tracing::info!("3/3 LLM 모델 로딩...");
    let model_path = config.model_path();
    let generator: Option<Box<dyn TextGenerator>> = if model_path.exists() {
        let generator = LlamaGenerator::load(&model_path, config.generator_settings())
            .context("LLM 모델 로드 실패")?;
        Some(Box::new(generator))
    } else {
        tracing::warn!("모델 파일이 없습니다: {:?}", model_path);
        tracing::warn!("다운로드: setak-rag download 또는 {}", download::model_url());
        None
    };

    tracing::info!("모든 모델 로딩 완료");

    let service = ChatService::new(
        Box::new(embedder),
        index,
        chunks,
        generator,
        GenerationParams::default(),
        config.top_k,
        config.context_chars,
    )
    .context("서비스 초기화 실패")?;

    let state = AppState {
        service: Arc::new(service),
        model_name: config.model_name(),
    };

    server::start(state, &config.host, config.port).await
}

/// 인덱스 생성 명령어 (ingest)
///
/// 추출 텍스트를 페이지/청크로 나눠 임베딩하고 청크 파일과 인덱스 파일을
/// 함께 씁니다. 두 파일은 같은 순서로 생성되므로 크기/차원 불변식이
/// 구성 단계에서 보장됩니다.
async fn cmd_ingest(
    input: PathBuf,
    data_dir: Option<PathBuf>,
    max_chars: usize,
    overlap: usize,
) -> Result<()> {
    let config = load_config(data_dir);

    let text = std::fs::read_to_string(&input)
        .with_context(|| format!("추출 텍스트 파일을 읽을 수 없습니다: {:?}", input))?;

    let chunk_config = ChunkConfig {
        max_characters: max_chars,
        overlap_characters: overlap,
    };

    let chunks = chunk_manual_text(&text, &chunk_config);
    if chunks.is_empty() {
        anyhow::bail!("생성된 청크가 없습니다: {:?}", input);
    }

    println!("[*] 청크 {} 건 생성됨", chunks.len());
    println!("[*] 임베딩 생성 중...");

    let embedder = LocalEmbedding::new().context("임베딩 모델 초기화 실패")?;

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .context("청크 임베딩 실패")?;

    let mut index = FlatIndex::new(embedder.dimension());
    for embedding in embeddings {
        index.add(embedding).context("인덱스 구성 실패")?;
    }

    let store = ChunkStore::new(chunks);
    store.save(&config.chunks_path()).context("청크 파일 저장 실패")?;
    index.save(&config.index_path()).context("인덱스 파일 저장 실패")?;

    println!("[OK] 인덱스 생성 완료");
    println!("     청크: {:?} ({} 건)", config.chunks_path(), store.len());
    println!("     인덱스: {:?} ({} 벡터, {} 차원)", config.index_path(), index.len(), index.dimension());

    Ok(())
}

/// PDF 추출 명령어 (extract)
async fn cmd_extract(pdf: PathBuf, output: PathBuf) -> Result<()> {
    println!("[*] PDF 추출 중: {:?}", pdf);

    let text = extractor::extract_manual_text(&pdf).await?;

    std::fs::write(&output, &text)
        .with_context(|| format!("출력 파일 쓰기 실패: {:?}", output))?;

    println!("[OK] 추출 완료! {:?} 확인하세요", output);
    Ok(())
}

/// 모델 다운로드 명령어 (download)
async fn cmd_download(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(data_dir);

    println!("[*] 다운로드 경로: {:?}", config.models_dir());

    let path = download::download_model(&config.models_dir()).await?;

    println!("[OK] 모델 다운로드 완료: {:?}", path);
    Ok(())
}

/// 상태 명령어 (status)
///
/// 데이터 파일과 모델 파일의 존재 여부를 확인합니다.
async fn cmd_status(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(data_dir);

    println!("setak-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 데이터 디렉토리: {:?}", config.data_dir);

    // 청크 파일
    match ChunkStore::load(&config.chunks_path()) {
        Ok(store) => println!("[OK] 청크: {} 건 ({:?})", store.len(), config.chunks_path()),
        Err(_) => println!("[!] 청크 파일 없음: {:?} (ingest 필요)", config.chunks_path()),
    }

    // 인덱스 파일
    match FlatIndex::load(&config.index_path()) {
        Ok(index) => println!(
            "[OK] 인덱스: {} 벡터, {} 차원 ({:?})",
            index.len(),
            index.dimension(),
            config.index_path()
        ),
        Err(_) => println!("[!] 인덱스 파일 없음: {:?} (ingest 필요)", config.index_path()),
    }

    // 모델 파일
    let model_path = config.model_path();
    if model_path.exists() {
        let size = std::fs::metadata(&model_path).map(|m| m.len()).unwrap_or(0);
        println!("[OK] 모델: {} ({})", config.model_name(), format_bytes(size as usize));
    } else {
        println!("[!] 모델 파일 없음: {:?}", model_path);
        println!("    다운로드: setak-rag download");
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
