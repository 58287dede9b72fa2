//! 설정 모듈
//!
//! 서비스 설정을 기본값 + 환경변수로 구성합니다. 선택적 `.env` 파일을
//! 두 후보 위치(작업 디렉토리, 그 상위의 프로젝트 루트)에서 로드하며,
//! 이미 설정된 프로세스 환경변수가 우선합니다.

use std::path::{Path, PathBuf};

use crate::generator::GeneratorSettings;

// ============================================================================
// Defaults
// ============================================================================

/// 검색할 최근접 청크 수
pub const DEFAULT_TOP_K: usize = 3;

/// 컨텍스트에 넣을 청크당 최대 문자 수
pub const DEFAULT_CONTEXT_CHARS: usize = 300;

/// 기본 모델 파일 이름
pub const DEFAULT_MODEL_FILE: &str = "A.X-4.0-Light-Q4_K_M.gguf";

// ============================================================================
// ServiceConfig
// ============================================================================

/// 서비스 설정
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// 바인드 호스트
    pub host: String,
    /// 바인드 포트
    pub port: u16,
    /// 데이터 디렉토리 (index/청크/모델 파일 위치)
    pub data_dir: PathBuf,
    /// 모델 파일 이름 (data_dir/models/ 아래)
    pub model_file: String,
    /// 검색할 최근접 청크 수
    pub top_k: usize,
    /// 컨텍스트에 넣을 청크당 최대 문자 수
    pub context_chars: usize,
    /// LLM 컨텍스트 길이
    pub context_length: u32,
    /// LLM CPU 스레드 수
    pub threads: i32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            top_k: DEFAULT_TOP_K,
            context_chars: DEFAULT_CONTEXT_CHARS,
            context_length: 2048,
            threads: 4,
        }
    }
}

impl ServiceConfig {
    /// 환경변수를 반영한 설정 생성
    ///
    /// `.env` 파일을 먼저 로드한 뒤 `SETAK_*` 변수를 읽습니다.
    pub fn from_env() -> Self {
        load_env_files();

        let mut config = Self::default();

        if let Ok(host) = std::env::var("SETAK_HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Some(port) = env_parse::<u16>("SETAK_PORT") {
            config.port = port;
        }
        if let Ok(dir) = std::env::var("SETAK_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(file) = std::env::var("SETAK_MODEL_FILE") {
            if !file.is_empty() {
                config.model_file = file;
            }
        }
        if let Some(threads) = env_parse::<i32>("SETAK_THREADS") {
            if threads > 0 {
                config.threads = threads;
            }
        }

        config
    }

    /// 벡터 인덱스 파일 경로
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("manual.index")
    }

    /// 청크 레코드 파일 경로
    pub fn chunks_path(&self) -> PathBuf {
        self.data_dir.join("chunks.json")
    }

    /// 모델 디렉토리 경로
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// 모델 파일 경로
    pub fn model_path(&self) -> PathBuf {
        self.models_dir().join(&self.model_file)
    }

    /// 표시용 모델 이름 (파일 이름에서 확장자 제거)
    pub fn model_name(&self) -> String {
        Path::new(&self.model_file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.model_file)
            .to_string()
    }

    /// 생성기 설정 변환
    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            context_length: self.context_length,
            threads: self.threads,
        }
    }
}

// ============================================================================
// Env File Loading
// ============================================================================

/// `.env` 파일 로드
///
/// 작업 디렉토리의 `.env`를 먼저, 그 다음 상위 디렉토리의 `.env`를
/// 로드합니다. dotenvy는 이미 존재하는 변수를 덮어쓰지 않으므로
/// 먼저 로드된 쪽과 프로세스 환경이 우선합니다.
pub fn load_env_files() {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let local = cwd.join(".env");
    if local.exists() {
        if dotenvy::from_path(&local).is_ok() {
            tracing::debug!(".env 로드됨: {:?}", local);
        }
    }

    if let Some(parent) = cwd.parent() {
        let root = parent.join(".env");
        if root.exists() {
            if dotenvy::from_path(&root).is_ok() {
                tracing::debug!(".env 로드됨: {:?}", root);
            }
        }
    }
}

/// 환경변수를 파싱해 반환 (없거나 파싱 실패 시 None)
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.context_chars, 300);
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn test_paths() {
        let config = ServiceConfig {
            data_dir: PathBuf::from("/tmp/setak"),
            ..Default::default()
        };

        assert_eq!(config.index_path(), PathBuf::from("/tmp/setak/manual.index"));
        assert_eq!(config.chunks_path(), PathBuf::from("/tmp/setak/chunks.json"));
        assert_eq!(
            config.model_path(),
            PathBuf::from("/tmp/setak/models/A.X-4.0-Light-Q4_K_M.gguf")
        );
    }

    #[test]
    fn test_model_name_strips_extension() {
        let config = ServiceConfig::default();
        assert_eq!(config.model_name(), "A.X-4.0-Light-Q4_K_M");
    }

    #[test]
    fn test_env_parse() {
        std::env::set_var("SETAK_TEST_PORT", "9100");
        assert_eq!(env_parse::<u16>("SETAK_TEST_PORT"), Some(9100));
        std::env::remove_var("SETAK_TEST_PORT");

        assert_eq!(env_parse::<u16>("SETAK_TEST_MISSING"), None);
    }
}
