use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Generative model used for the scene breakdown
    pub generative: GenerativeConfig,

    /// Speech recognition settings
    pub speech: SpeechConfig,

    /// Video platform client settings
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// Google AI API key
    pub api_key: String,

    /// Model identifier, e.g. `gemini-1.5-flash`
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Retries for transient call failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base URL of the Generative Language API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout. Unset means the call may wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    /// Remote inference endpoint speaking the ASR pipeline protocol
    Http,
    /// Local whisper.cpp (requires the `whisper` feature)
    Whisper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,

    /// Model identifier (hub id for `http`, ggml model path for `whisper`)
    pub model_id: String,

    /// Target language; auto-detection is never used
    pub language: String,

    /// Inference endpoint base URL for the `http` backend
    pub endpoint: String,

    /// Bearer token for the inference endpoint
    #[serde(default)]
    pub api_token: Option<String>,

    /// Keep the loaded model for the lifetime of the process
    #[serde(default = "default_true")]
    pub cache_model: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Path to the yt-dlp executable
    pub yt_dlp_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name reported by `info`
    pub app_name: String,

    /// Directory for downloaded videos (system temp dir when unset)
    pub download_dir: Option<PathBuf>,

    /// Default output format
    pub default_output_format: String,
}

fn default_max_retries() -> u32 {
    2
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generative: GenerativeConfig {
                api_key: "".to_string(),
                model: "gemini-1.5-flash".to_string(),
                temperature: 0.0,
                max_retries: default_max_retries(),
                api_base: default_api_base(),
                request_timeout_secs: None,
            },
            speech: SpeechConfig {
                backend: SpeechBackend::Http,
                model_id: "openai/whisper-large-v3".to_string(),
                language: "english".to_string(),
                endpoint: "https://api-inference.huggingface.co".to_string(),
                api_token: None,
                cache_model: true,
            },
            platform: PlatformConfig::default(),
            app: AppConfig {
                app_name: "Youtube Video Analysis".to_string(),
                download_dir: None,
                default_output_format: "json".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration and make sure it is usable for an analysis
    pub async fn load() -> Result<Self> {
        let config = Self::read().await?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from file or create default, then apply environment overrides
    pub async fn read() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;
            Self::from_yaml(&content)?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-analyzer").join("config.yaml"))
    }

    /// Override file values with environment variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.generative.api_key = key;
        }
        if let Some(model) = lookup("MODEL") {
            self.generative.model = model;
        }
        if let Some(temperature) = lookup("TEMPERATURE") {
            self.generative.temperature = temperature
                .trim()
                .parse()
                .with_context(|| format!("TEMPERATURE is not a number: {}", temperature))?;
        }
        if let Some(model_id) = lookup("SPEECH_MODEL") {
            self.speech.model_id = model_id;
        }
        if let Some(language) = lookup("SPEECH_LANGUAGE") {
            self.speech.language = language;
        }
        if let Some(endpoint) = lookup("SPEECH_ENDPOINT") {
            self.speech.endpoint = endpoint;
        }
        if let Some(token) = lookup("SPEECH_API_TOKEN") {
            self.speech.api_token = Some(token);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.generative.api_key.trim().is_empty() {
            anyhow::bail!("Google API key must be configured (GOOGLE_API_KEY)");
        }

        if self.generative.model.trim().is_empty() {
            anyhow::bail!("Generative model must be configured (MODEL)");
        }

        if !(0.0..=2.0).contains(&self.generative.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.generative.temperature
            );
        }

        if self.speech.model_id.trim().is_empty() {
            anyhow::bail!("Speech model must be configured (SPEECH_MODEL)");
        }

        if self.speech.backend == SpeechBackend::Whisper && !cfg!(feature = "whisper") {
            anyhow::bail!("The whisper speech backend requires building with the `whisper` feature");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Generative Model: {}", self.generative.model);
        println!("  Temperature: {}", self.generative.temperature);
        println!("  Max Retries: {}", self.generative.max_retries);
        match self.generative.request_timeout_secs {
            Some(secs) => println!("  Request Timeout: {}s", secs),
            None => println!("  Request Timeout: none"),
        }
        println!("  Speech Backend: {:?}", self.speech.backend);
        println!("  Speech Model: {}", self.speech.model_id);
        println!("  Speech Language: {}", self.speech.language);
        println!("  yt-dlp: {}", self.platform.yt_dlp_path);
        if let Some(dir) = &self.app.download_dir {
            println!("  Download Dir: {}", dir.display());
        }
    }

    /// Directory that receives downloaded videos
    pub fn download_dir(&self) -> PathBuf {
        self.app
            .download_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("video-analyzer"))
    }
}
