//! Text Chunking Module
//!
//! 추출된 매뉴얼 텍스트(`--- 페이지 N ---` 마커 포맷)를 페이지 단위로
//! 되돌린 뒤, 페이지별로 적절한 크기의 청크로 나눕니다.

use regex::Regex;

use super::chunks::ManualChunk;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
    /// 오버랩 크기 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 800,
            overlap_characters: 80,
        }
    }
}

// ============================================================================
// Page Parsing
// ============================================================================

/// 페이지 마커로 구분된 텍스트를 (페이지 번호, 본문) 목록으로 파싱
///
/// extract 명령이 쓴 `--- 페이지 N ---` 마커를 기준으로 분리합니다.
/// 마커가 하나도 없으면 전체를 1페이지로 취급합니다.
pub fn parse_pages(text: &str) -> Vec<(u32, String)> {
    let marker = Regex::new(r"(?m)^--- 페이지 (\d+) ---\s*$").expect("Invalid regex");

    let mut pages = Vec::new();
    let mut current_page: Option<u32> = None;
    let mut current_text = String::new();

    for line in text.lines() {
        if let Some(caps) = marker.captures(line) {
            if let Some(page) = current_page {
                let body = current_text.trim().to_string();
                if !body.is_empty() {
                    pages.push((page, body));
                }
            }
            current_page = caps[1].parse::<u32>().ok();
            current_text.clear();
        } else if current_page.is_some() {
            current_text.push_str(line);
            current_text.push('\n');
        }
    }

    if let Some(page) = current_page {
        let body = current_text.trim().to_string();
        if !body.is_empty() {
            pages.push((page, body));
        }
    }

    if pages.is_empty() && !text.trim().is_empty() {
        pages.push((1, text.trim().to_string()));
    }

    pages
}

/// 페이지 본문에서 제목 후보 추출
///
/// 비어 있지 않고, 숫자만으로 이루어지지 않았으며, 글자가 2자 이상인
/// 첫 줄을 제목으로 사용합니다. 최대 60자로 자릅니다.
pub fn extract_title(text: &str) -> String {
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if trimmed.chars().filter(|c| c.is_alphanumeric()).count() < 2 {
            continue;
        }
        return trimmed.chars().take(60).collect();
    }
    "무제".to_string()
}

// ============================================================================
// Chunking
// ============================================================================

/// 페이지 본문을 문자 수 기준 청크로 분할
///
/// UTF-8 경계를 깨지 않도록 char 단위로 자릅니다.
pub fn chunk_page(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![];
    }

    if chars.len() <= config.max_characters {
        return vec![text.to_string()];
    }

    let step = config
        .max_characters
        .saturating_sub(config.overlap_characters)
        .max(1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.max_characters).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }

        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// 추출된 전체 텍스트를 매뉴얼 청크 목록으로 변환
///
/// 각 페이지의 제목은 페이지 첫 줄에서 가져오며, 한 페이지가 여러 청크로
/// 나뉘어도 같은 페이지 번호와 제목을 공유합니다.
pub fn chunk_manual_text(text: &str, config: &ChunkConfig) -> Vec<ManualChunk> {
    let mut chunks = Vec::new();

    for (page, body) in parse_pages(text) {
        let title = extract_title(&body);

        for piece in chunk_page(&body, config) {
            chunks.push(ManualChunk {
                page,
                title: title.clone(),
                content: piece,
            });
        }
    }

    chunks
}

// ============================================================================
// Tests
// ============================================================================
