//! 모델 다운로드 모듈
//!
//! Hugging Face에서 GGUF 양자화 모델 파일을 지정 디렉토리로 스트리밍
//! 다운로드합니다. 일회성 오프라인 유틸리티이며, 이미 파일이 있으면
//! 건너뜁니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

// ============================================================================
// Constants
// ============================================================================

/// 모델 저장소 (Hugging Face)
pub const MODEL_REPO: &str = "mykor/A.X-4.0-Light-gguf";

/// 모델 파일 이름
pub const MODEL_FILENAME: &str = "A.X-4.0-Light-Q4_K_M.gguf";

/// 진행률 로그 간격 (바이트)
const PROGRESS_INTERVAL: u64 = 100 * 1024 * 1024;

/// 다운로드 URL 구성
pub fn model_url() -> String {
    format!("https://huggingface.co/{}/resolve/main/{}", MODEL_REPO, MODEL_FILENAME)
}

// ============================================================================
// Download
// ============================================================================

/// 모델 파일 다운로드
///
/// `.part` 임시 파일로 받은 뒤 완료 시 이름을 바꿉니다. 대상 파일이 이미
/// 있으면 아무것도 하지 않습니다.
///
/// # Arguments
/// * `dest_dir` - 모델 디렉토리 (예: data/models)
///
/// # Returns
/// 최종 모델 파일 경로
pub async fn download_model(dest_dir: &Path) -> Result<PathBuf> {
    let dest = dest_dir.join(MODEL_FILENAME);
    if dest.exists() {
        tracing::info!("모델 파일이 이미 있습니다: {:?}", dest);
        return Ok(dest);
    }

    if !dest_dir.exists() {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .context("모델 디렉토리 생성 실패")?;
    }

    let url = model_url();
    tracing::info!("모델 다운로드 시작: {}", url);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("HTTP 클라이언트 생성 실패")?;

    let response = client
        .get(&url)
        .send()
        .await
        .context("다운로드 요청 실패")?;

    if !response.status().is_success() {
        anyhow::bail!("다운로드 실패 ({}): {}", response.status(), url);
    }

    let total = response.content_length();
    let part_path = dest_dir.join(format!("{}.part", MODEL_FILENAME));

    let mut file = tokio::fs::File::create(&part_path)
        .await
        .with_context(|| format!("임시 파일 생성 실패: {:?}", part_path))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut next_progress = PROGRESS_INTERVAL;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("다운로드 스트림 오류")?;
        file.write_all(&chunk).await.context("파일 쓰기 실패")?;

        downloaded += chunk.len() as u64;
        if downloaded >= next_progress {
            match total {
                Some(total) => tracing::info!(
                    "다운로드 진행: {} / {} MB",
                    downloaded / (1024 * 1024),
                    total / (1024 * 1024)
                ),
                None => tracing::info!("다운로드 진행: {} MB", downloaded / (1024 * 1024)),
            }
            next_progress += PROGRESS_INTERVAL;
        }
    }

    file.flush().await.context("파일 flush 실패")?;
    drop(file);

    tokio::fs::rename(&part_path, &dest)
        .await
        .context("임시 파일 이름 변경 실패")?;

    tracing::info!("모델 다운로드 완료: {:?} ({} MB)", dest, downloaded / (1024 * 1024));

    Ok(dest)
}

// ============================================================================
// Tests
// ============================================================================
