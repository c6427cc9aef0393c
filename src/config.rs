use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const CONFIG_FILE: &str = "sandpipe.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Remote sandbox service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the sandbox REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for management calls (template/sandbox lookup, files)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Template every sandbox is created from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_name")]
    pub name: String,

    /// Container image used when the template has to be created
    #[serde(default = "default_template_image")]
    pub image: String,

    /// Only create the template when the lookup says it does not exist.
    /// When false, any lookup failure leads to creation.
    #[serde(default)]
    pub strict_lookup: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            name: default_template_name(),
            image: default_template_image(),
            strict_lookup: false,
        }
    }
}

/// Sandbox timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_create_timeout")]
    pub create_timeout_secs: u64,

    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: default_create_timeout(),
            readiness_timeout_secs: default_readiness_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl SandboxConfig {
    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System instruction handed to the agent
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

// Default value functions
fn default_api_url() -> String {
    "http://127.0.0.1:7700/v1".to_string()
}

fn default_api_key_env() -> String {
    "SANDPIPE_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_template_name() -> String {
    "python-sandbox".to_string()
}

fn default_template_image() -> String {
    "ubuntu:24.04".to_string()
}

fn default_create_timeout() -> u64 {
    180
}

fn default_readiness_timeout() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    30 * 60
}

fn default_system_prompt() -> String {
    "You are a helpful coding assistant with filesystem access via a sandbox.".to_string()
}

/// User-wide config file, e.g. `~/.config/sandpipe/sandpipe.toml`
fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sandpipe").join(CONFIG_FILE))
}

impl Config {
    /// Load configuration from the project directory, then the user config
    /// directory, using defaults if neither exists
    pub fn load(project_dir: &Path) -> Result<Self> {
        let project_path = project_dir.join(CONFIG_FILE);
        if project_path.exists() {
            return Self::load_file(&project_path);
        }

        match global_config_path() {
            Some(path) if path.exists() => Self::load_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn load_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }
}
