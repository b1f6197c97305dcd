use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const HEYGEN_KEY_VAR: &str = "HEYGEN_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy server settings
    pub server: ServerConfig,

    /// Summarization provider (OpenAI chat completions)
    pub summarization: SummarizationConfig,

    /// Avatar video provider (HeyGen)
    pub video: VideoConfig,

    /// Generation workflow settings
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the proxy listens on
    pub bind: String,

    /// Origins allowed by CORS; empty means any origin
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Provider API key, read from `OPENAI_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,

    pub base_url: String,

    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Provider API key, read from `HEYGEN_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,

    pub base_url: String,

    pub avatar_id: String,

    pub avatar_style: String,

    pub voice_id: String,

    pub width: u32,

    pub height: u32,

    /// Ask the provider for a watermarked test render that costs no credits
    pub test_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Delay between job status checks
    pub poll_interval_ms: u64,

    /// Consecutive failed status checks tolerated before a run fails.
    /// Zero aborts on the first failure.
    pub max_transient_poll_errors: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.5,
            max_tokens: 1000,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.heygen.com".to_string(),
            avatar_id: "Brandon_expressive_public".to_string(),
            avatar_style: "normal".to_string(),
            voice_id: "fabf3d28753a4d7691d51bbf87d697fb".to_string(),
            width: 1280,
            height: 720,
            test_mode: false,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            max_transient_poll_errors: 0,
        }
    }
}

impl WorkflowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from `path`, the default locations, or defaults,
    /// then pick up provider keys from the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().filter(|p| p.exists()),
        };

        let mut config = match config_path {
            Some(config_path) => {
                let content = fs_err::read_to_string(&config_path)
                    .context("Failed to read config file")?;

                serde_yaml::from_str::<Config>(&content).context("Failed to parse config file")?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path().context("Could not determine config directory")?,
        };

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("blogcast.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join("blogcast").join("config.yaml"))
    }

    /// Read provider keys from the process environment. Blank values count
    /// as absent.
    pub fn apply_env(&mut self) {
        self.summarization.api_key = non_empty_env(OPENAI_KEY_VAR);
        self.video.api_key = non_empty_env(HEYGEN_KEY_VAR);
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        crate::utils::validate_and_normalize_url(&self.summarization.base_url)
            .context("Invalid summarization base_url")?;
        crate::utils::validate_and_normalize_url(&self.video.base_url)
            .context("Invalid video base_url")?;

        if self.workflow.poll_interval_ms == 0 {
            anyhow::bail!("workflow.poll_interval_ms must be greater than zero");
        }

        if self.video.width == 0 || self.video.height == 0 {
            anyhow::bail!("video.width and video.height must be non-zero");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Bind Address: {}", self.server.bind);
        if !self.server.cors_origins.is_empty() {
            println!("  CORS Origins: {}", self.server.cors_origins.join(", "));
        }
        println!("  Summarization URL: {}", self.summarization.base_url);
        println!("  Summarization Model: {}", self.summarization.model);
        println!(
            "  {}: {}",
            OPENAI_KEY_VAR,
            mask_key(self.summarization.api_key.as_deref())
        );
        println!("  Video URL: {}", self.video.base_url);
        println!("  Avatar: {} ({})", self.video.avatar_id, self.video.avatar_style);
        println!("  Voice: {}", self.video.voice_id);
        println!("  Dimension: {}x{}", self.video.width, self.video.height);
        if self.video.test_mode {
            println!("  Test Mode: on");
        }
        println!(
            "  {}: {}",
            HEYGEN_KEY_VAR,
            mask_key(self.video.api_key.as_deref())
        );
        println!("  Poll Interval: {}ms", self.workflow.poll_interval_ms);
        println!(
            "  Tolerated Poll Errors: {}",
            self.workflow.max_transient_poll_errors
        );
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn mask_key(key: Option<&str>) -> String {
    match key {
        Some(key) if key.len() > 8 && key.is_ascii() => format!("{}…{}", &key[..4], &key[key.len() - 4..]),
        Some(_) => "set".to_string(),
        None => "not set".to_string(),
    }
}
