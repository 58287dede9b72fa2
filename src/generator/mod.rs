//! Generator 모듈 - llama.cpp 기반 로컬 텍스트 생성
//!
//! GGUF 양자화 모델 파일을 기동 시 한 번 로드하고, 요청마다 공유 가중치 위에
//! 새 디코드 컨텍스트를 만들어 생성합니다. CPU 전용이며 고정된 스레드 수를
//! 사용합니다. 디코딩 알고리즘 자체는 llama.cpp에 위임합니다.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;

// ============================================================================
// Generation Parameters
// ============================================================================

/// 생성 파라미터
///
/// 서비스 전체에서 고정값으로 사용됩니다. stop 시퀀스는 모델이 새 질문 턴을
/// 지어내는 것을 막기 위한 것입니다.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// 최대 생성 토큰 수
    pub max_tokens: usize,
    /// 온도
    pub temperature: f32,
    /// Nucleus sampling (top-p)
    pub top_p: f32,
    /// 반복 페널티
    pub repeat_penalty: f32,
    /// 생성 중단 시퀀스
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
            stop: vec![
                "질문:".to_string(),
                "\n질문".to_string(),
                "사용자:".to_string(),
            ],
        }
    }
}

/// 생성기 런타임 설정
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// 컨텍스트 길이
    pub context_length: u32,
    /// CPU 스레드 수
    pub threads: i32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            context_length: 2048,
            threads: 4,
        }
    }
}

// ============================================================================
// TextGenerator Trait
// ============================================================================

/// 텍스트 생성기 트레이트
///
/// 프롬프트를 받아 이어지는 텍스트를 생성하는 인터페이스입니다.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 프롬프트로부터 텍스트 생성
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// 모델 이름
    fn model_name(&self) -> &str;
}

// ============================================================================
// LlamaGenerator
// ============================================================================

/// llama.cpp GGUF 생성기 구현체
///
/// 모델 가중치는 `Arc`로 공유되고, `generate` 호출마다 독립된 컨텍스트가
/// 생성되므로 요청 간 상호 배제가 필요 없습니다.
pub struct LlamaGenerator {
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    settings: GeneratorSettings,
    model_name: String,
}

impl LlamaGenerator {
    /// GGUF 파일에서 모델 로드
    ///
    /// # Arguments
    /// * `model_path` - .gguf 모델 파일 경로
    /// * `settings` - 컨텍스트 길이/스레드 설정
    pub fn load(model_path: &Path, settings: GeneratorSettings) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("모델 파일이 없습니다: {:?}", model_path);
        }

        let backend = LlamaBackend::init()
            .map_err(|e| anyhow::anyhow!("llama.cpp 백엔드 초기화 실패: {}", e))?;

        // CPU 전용
        let model_params = LlamaModelParams::default().with_n_gpu_layers(0);

        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .with_context(|| format!("모델 로드 실패: {:?}", model_path))?;

        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        tracing::info!(
            "모델 로드됨: {} (ctx={}, threads={})",
            model_name,
            settings.context_length,
            settings.threads
        );

        Ok(Self {
            backend: Arc::new(backend),
            model: Arc::new(model),
            settings,
            model_name,
        })
    }

    /// 동기 생성 루프
    ///
    /// 프롬프트를 토큰화해 한 번에 디코드하고, 이후 토큰을 하나씩 샘플링하며
    /// stop 시퀀스가 나타나면 그 지점에서 출력을 잘라 반환합니다.
    fn generate_blocking(
        backend: &LlamaBackend,
        model: &LlamaModel,
        settings: &GeneratorSettings,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(settings.context_length))
            .with_n_threads(settings.threads)
            .with_n_threads_batch(settings.threads);

        let mut ctx = model
            .new_context(backend, ctx_params)
            .context("디코드 컨텍스트 생성 실패")?;

        let tokens = model
            .str_to_token(prompt, AddBos::Always)
            .context("프롬프트 토큰화 실패")?;

        let n_ctx = settings.context_length as usize;
        if tokens.len() + 1 >= n_ctx {
            anyhow::bail!(
                "프롬프트가 너무 깁니다: {} 토큰 (최대 {})",
                tokens.len(),
                n_ctx
            );
        }

        // 프롬프트 전체를 한 배치로 디코드
        let mut batch = LlamaBatch::new(n_ctx, 1);
        let last_index = tokens.len() as i32 - 1;
        for (i, token) in (0i32..).zip(tokens.into_iter()) {
            batch
                .add(token, i, &[0], i == last_index)
                .context("배치 구성 실패")?;
        }
        ctx.decode(&mut batch).context("프롬프트 디코드 실패")?;

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::penalties(64, params.repeat_penalty, 0.0, 0.0),
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(seed),
        ]);

        let mut n_cur = batch.n_tokens();
        let mut out_bytes: Vec<u8> = Vec::new();

        for _ in 0..params.max_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if model.is_eog_token(token) {
                break;
            }

            // 멀티바이트 문자가 토큰 경계에서 쪼개질 수 있으므로 바이트로 누적
            let piece = model
                .token_to_bytes(token, Special::Tokenize)
                .context("토큰 변환 실패")?;
            out_bytes.extend_from_slice(&piece);

            let text_so_far = String::from_utf8_lossy(&out_bytes);
            if let Some(pos) = find_stop(&text_so_far, &params.stop) {
                let mut output = text_so_far.into_owned();
                output.truncate(pos);
                return Ok(output);
            }

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .context("배치 구성 실패")?;
            n_cur += 1;
            ctx.decode(&mut batch).context("토큰 디코드 실패")?;
        }

        Ok(String::from_utf8_lossy(&out_bytes).into_owned())
    }
}

#[async_trait]
impl TextGenerator for LlamaGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let backend = Arc::clone(&self.backend);
        let model = Arc::clone(&self.model);
        let settings = self.settings.clone();
        let prompt = prompt.to_string();
        let params = params.clone();

        // 생성은 CPU 바운드이므로 spawn_blocking 사용
        tokio::task::spawn_blocking(move || {
            Self::generate_blocking(&backend, &model, &settings, &prompt, &params)
        })
        .await
        .context("생성 작업 실패")?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 출력에서 가장 먼저 나타나는 stop 시퀀스의 위치
fn find_stop(text: &str, stops: &[String]) -> Option<usize> {
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 400);
        assert!(params.stop.contains(&"질문:".to_string()));
    }

    #[test]
    fn test_find_stop_first_occurrence() {
        let stops = vec!["질문:".to_string(), "사용자:".to_string()];

        let text = "답변입니다.\n사용자: 다른 얘기\n질문: 또 다른";
        let pos = find_stop(text, &stops).unwrap();
        assert_eq!(&text[..pos], "답변입니다.\n");
    }

    #[test]
    fn test_find_stop_none() {
        let stops = vec!["질문:".to_string()];
        assert!(find_stop("깨끗한 답변", &stops).is_none());
    }

    #[test]
    fn test_find_stop_empty_stop_ignored() {
        let stops = vec![String::new()];
        assert!(find_stop("텍스트", &stops).is_none());
    }

    #[test]
    fn test_load_missing_model_file() {
        let result = LlamaGenerator::load(
            Path::new("/nonexistent/model.gguf"),
            GeneratorSettings::default(),
        );
        assert!(result.is_err());
    }
}
