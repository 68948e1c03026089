use crate::chunk::AggregatorConfig;
use crate::defaults;
use crate::stt::Provider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub aggregator: AggregatorConfig,
    pub stt: SttConfig,
    pub translate: TranslateConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// PCM accumulation window before a chunk is cut (milliseconds).
    pub chunk_ms: u64,
    pub level_window_ms: u64,
    pub poll_interval_ms: u64,
}

/// Voice activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadConfig {
    pub threshold_db: f32,
    pub hangover_ms: u64,
    pub turn_silence_ms: u64,
    pub frame_size: usize,
    /// Try the worker-thread detector first, falling back to in-thread.
    pub prefer_worker: bool,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub enabled: bool,
    pub provider: Provider,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    /// Source language hint, e.g. "ja".
    pub language: String,
    pub proxy_url: String,
}

/// Translation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    pub enabled: bool,
    pub target_language: String,
    pub formality: String,
    pub use_dictionary: bool,
    pub backlog_cap: usize,
    pub min_spacing_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
            level_window_ms: defaults::LEVEL_WINDOW_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold_db: defaults::VAD_THRESHOLD_DB,
            hangover_ms: defaults::VAD_HANGOVER_MS,
            turn_silence_ms: defaults::TURN_SILENCE_MS,
            frame_size: defaults::FRAME_SIZE,
            prefer_worker: true,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: Provider::Groq,
            groq_api_key: None,
            openai_api_key: None,
            model: None,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            proxy_url: defaults::DEFAULT_PROXY_URL.to_string(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_language: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
            formality: "formal".to_string(),
            use_dictionary: false,
            backlog_cap: defaults::TRANSLATION_BACKLOG,
            min_spacing_ms: defaults::TRANSLATION_SPACING_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is logged
    /// and also falls back to defaults so a broken config file cannot keep
    /// the app from starting.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                let missing = e
                    .downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false);
                if !missing {
                    tracing::warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                }
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - KAIGI_GROQ_API_KEY → stt.groq_api_key
    /// - KAIGI_OPENAI_API_KEY → stt.openai_api_key
    /// - KAIGI_MODEL → stt.model
    /// - KAIGI_LANGUAGE → stt.language
    /// - KAIGI_PROXY_URL → stt.proxy_url
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("KAIGI_GROQ_API_KEY")
            && !key.is_empty()
        {
            self.stt.groq_api_key = Some(key);
        }

        if let Ok(key) = std::env::var("KAIGI_OPENAI_API_KEY")
            && !key.is_empty()
        {
            self.stt.openai_api_key = Some(key);
        }

        if let Ok(model) = std::env::var("KAIGI_MODEL")
            && !model.is_empty()
        {
            self.stt.model = Some(model);
        }

        if let Ok(language) = std::env::var("KAIGI_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(url) = std::env::var("KAIGI_PROXY_URL")
            && !url.is_empty()
        {
            self.stt.proxy_url = url;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/kaigi/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kaigi")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_kaigi_env() {
        remove_env("KAIGI_GROQ_API_KEY");
        remove_env("KAIGI_OPENAI_API_KEY");
        remove_env("KAIGI_MODEL");
        remove_env("KAIGI_LANGUAGE");
        remove_env("KAIGI_PROXY_URL");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.chunk_ms, 1500);
        assert_eq!(config.vad.threshold_db, 12.0);
        assert_eq!(config.vad.hangover_ms, 200);
        assert_eq!(config.vad.turn_silence_ms, 600);
        assert!(config.vad.prefer_worker);
        assert_eq!(config.aggregator.min_bytes, 4096);
        assert_eq!(config.aggregator.max_backlog, 6);
        assert_eq!(config.stt.provider, Provider::Groq);
        assert_eq!(config.stt.language, "ja");
        assert!(config.stt.enabled);
        assert_eq!(config.translate.target_language, "en");
        assert_eq!(config.translate.backlog_cap, 50);
        assert_eq!(config.translate.min_spacing_ms, 250);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[audio]
sample_rate = 16000
chunk_ms = 2000

[vad]
threshold_db = 9.0
prefer_worker = false

[stt]
provider = "openai"
openai_api_key = "sk-test"
language = "en"

[translate]
enabled = false
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.chunk_ms, 2000);
        assert_eq!(config.vad.threshold_db, 9.0);
        assert!(!config.vad.prefer_worker);
        assert_eq!(config.stt.provider, Provider::Openai);
        assert_eq!(config.stt.openai_api_key.as_deref(), Some("sk-test"));
        assert!(!config.translate.enabled);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[stt]\nlanguage = \"en\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.vad.hangover_ms, 200);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not = valid [ toml").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_for_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/kaigi.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_for_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not toml [").unwrap();
        let config = Config::load_or_default(file.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_override_api_keys() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_kaigi_env();
        set_env("KAIGI_GROQ_API_KEY", "gsk_env");
        set_env("KAIGI_OPENAI_API_KEY", "sk_env");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.groq_api_key.as_deref(), Some("gsk_env"));
        assert_eq!(config.stt.openai_api_key.as_deref(), Some("sk_env"));
        clear_kaigi_env();
    }

    #[test]
    fn test_env_override_language_and_proxy() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_kaigi_env();
        set_env("KAIGI_LANGUAGE", "en");
        set_env("KAIGI_PROXY_URL", "http://127.0.0.1:8080");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.stt.proxy_url, "http://127.0.0.1:8080");
        clear_kaigi_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_kaigi_env();
        set_env("KAIGI_LANGUAGE", "");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.language, "ja");
        clear_kaigi_env();
    }

    #[test]
    fn test_default_path_ends_with_kaigi() {
        let path = Config::default_path();
        assert!(path.ends_with("kaigi/config.toml"));
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(back, config);
    }
}
