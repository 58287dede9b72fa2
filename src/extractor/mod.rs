//! 매뉴얼 PDF 추출 모듈
//!
//! pdf-extract 크레이트로 세탁기 매뉴얼 PDF에서 페이지별 텍스트를 추출하고,
//! ingest가 읽는 평문 포맷(`--- 페이지 N ---` 마커 + 본문 + 표 행)으로
//! 변환합니다. 런타임 서비스가 아닌 일회성 오프라인 유틸리티입니다.

use std::path::Path;

use anyhow::{Context, Result};

// ============================================================================
// PDF Extraction
// ============================================================================

/// PDF에서 페이지별 텍스트 추출
///
/// (페이지 번호, 텍스트) 튜플 벡터로 반환합니다. 페이지 번호는 1부터
/// 시작합니다.
pub fn extract_pages(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("PDF 파일을 읽을 수 없습니다: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("PDF 텍스트 추출 실패: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!("PDF에서 추출된 텍스트가 없습니다: {:?} (스캔 문서일 수 있음)", path);
        return Ok(vec![(1, String::new())]);
    }

    let pages = split_pdf_pages(&text);

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

/// PDF 텍스트를 페이지별로 분리
///
/// 폼피드 문자(\x0c)를 우선 사용하고, 실패하면 전체를 한 페이지로
/// 취급합니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    vec![text.trim().to_string()]
}

/// 비동기 래퍼
///
/// PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
pub async fn extract_manual_text(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || extract_pages(&path))
        .await
        .context("PDF 추출 작업 실패")??;

    Ok(format_extracted_text(&pages))
}

// ============================================================================
// Output Formatting
// ============================================================================

/// 추출된 페이지들을 ingest 입력 포맷으로 변환
///
/// 페이지 마커, 페이지 본문, 표로 보이는 줄들의 파이프 구분 행을 순서대로
/// 이어 붙입니다.
pub fn format_extracted_text(pages: &[(usize, String)]) -> String {
    let mut out = String::new();

    for (page_num, text) in pages {
        out.push_str(&format!("\n--- 페이지 {} ---\n", page_num));
        out.push_str(text);

        let rows = detect_table_rows(text);
        if !rows.is_empty() {
            out.push_str("\n[표 발견]\n");
            for row in rows {
                out.push_str(&row);
                out.push('\n');
            }
        }

        out.push('\n');
    }

    out
}

/// 표로 보이는 줄을 파이프 구분 행으로 변환
///
/// pdf-extract는 표 구조를 따로 제공하지 않으므로, 넓은 공백 열로 나뉜
/// 셀이 3개 이상인 줄을 표 행으로 간주합니다.
fn detect_table_rows(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let cells: Vec<&str> = line
                .split("   ")
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();

            if cells.len() >= 3 {
                Some(cells.join(" | "))
            } else {
                None
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
