use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::os::fd::RawFd;
use std::path::Path;

pub mod validation;

/// Placeholder in the command template replaced by the child's channel descriptor.
pub const FD_PLACEHOLDER: &str = "{fd}";

/// Launcher configuration (YAML)
///
/// ```yaml
/// log_level: debug
/// exe_name: worker-host
/// command: ["my-worker", "--ipc-fd", "{fd}"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LauncherConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Label used in thread names for log correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe_name: Option<String>,

    /// Argument template; `argv[0]` is looked up through PATH
    #[serde(default)]
    pub command: Vec<String>,
}

impl LauncherConfig {
    /// Configuration for a command given on the command line
    pub fn from_command(command: Vec<String>) -> Self {
        Self {
            log_level: default_log_level(),
            exe_name: None,
            command,
        }
    }

    /// Load and validate configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        Self::load_from_string(&content)
    }

    /// Load and validate configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file without validating it, so command-line overrides
    /// can fill in missing fields first
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Render the argument vector for a child whose channel is `fd`
    pub fn render_command(&self, fd: RawFd) -> Vec<String> {
        let fd = fd.to_string();
        self.command
            .iter()
            .map(|arg| arg.replace(FD_PLACEHOLDER, &fd))
            .collect()
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))
}

fn default_log_level() -> String {
    "info".to_string()
}
