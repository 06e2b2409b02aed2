//! Agent configuration, a TOML file passed with `--config`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::wait::WaitPolicy;
use crate::io::metadata::IdentityOverrides;
use crate::io::process::CommandLimits;

/// Agent configuration (TOML).
///
/// Every field has a default, so an empty or missing file runs the agent
/// against the local docker socket with the stock schedule.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Desired-state endpoint. `--overlord-url` / `OVERLORD_URL` take precedence.
    pub overlord_url: Option<String>,

    /// Seconds slept between reconciliation cycles.
    pub poll_interval_secs: u64,

    /// Reserved container name owned by the agent.
    pub managed_name: String,

    pub docker_host: String,
    pub docker_bin: String,
    pub aws_bin: String,

    /// Wall-clock limit for every `docker`/`aws` subprocess.
    pub command_timeout_secs: u64,

    /// Captured stdout/stderr beyond this many bytes is dropped.
    pub output_limit_bytes: usize,

    /// Passed to `docker stop --time`.
    pub stop_timeout_secs: u64,

    pub stop_wait: StopWaitConfig,

    /// Instance metadata service base URL.
    pub metadata_url: String,

    /// Timeout for metadata and overlord HTTP requests.
    pub http_timeout_secs: u64,

    /// Pin the instance id instead of asking the metadata service.
    pub instance_id: Option<String>,

    /// Pin the region instead of deriving it from the availability zone.
    pub region: Option<String>,
}

/// Bounded wait for stopped containers to disappear.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StopWaitConfig {
    pub grace_secs: u64,
    pub interval_secs: u64,
    pub max_polls: u32,
}

impl Default for StopWaitConfig {
    fn default() -> Self {
        let policy = WaitPolicy::default();
        Self {
            grace_secs: policy.grace.as_secs(),
            interval_secs: policy.interval.as_secs(),
            max_polls: policy.max_polls,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            overlord_url: None,
            poll_interval_secs: 60,
            managed_name: "app".to_string(),
            docker_host: "unix:///run/docker.sock".to_string(),
            docker_bin: "docker".to_string(),
            aws_bin: "aws".to_string(),
            command_timeout_secs: 5 * 60,
            output_limit_bytes: 1_000_000,
            stop_timeout_secs: 10,
            stop_wait: StopWaitConfig::default(),
            metadata_url: "http://169.254.169.254".to_string(),
            http_timeout_secs: 10,
            instance_id: None,
            region: None,
        }
    }
}

fn non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must not be empty"));
    }
    Ok(())
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.stop_wait.max_polls == 0 {
            return Err(anyhow!("stop_wait.max_polls must be > 0"));
        }
        non_blank("managed_name", &self.managed_name)?;
        if self.managed_name.chars().any(char::is_whitespace) {
            return Err(anyhow!("managed_name must not contain whitespace"));
        }
        non_blank("docker_host", &self.docker_host)?;
        non_blank("docker_bin", &self.docker_bin)?;
        non_blank("aws_bin", &self.aws_bin)?;
        non_blank("metadata_url", &self.metadata_url)?;
        if let Some(url) = &self.overlord_url {
            non_blank("overlord_url", url)?;
        }
        if let Some(id) = &self.instance_id {
            non_blank("instance_id", id)?;
        }
        if let Some(region) = &self.region {
            non_blank("region", region)?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn command_limits(&self) -> CommandLimits {
        CommandLimits {
            timeout: Duration::from_secs(self.command_timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            grace: Duration::from_secs(self.stop_wait.grace_secs),
            interval: Duration::from_secs(self.stop_wait.interval_secs),
            max_polls: self.stop_wait.max_polls,
        }
    }

    pub fn identity_overrides(&self) -> IdentityOverrides {
        IdentityOverrides {
            instance_id: self.instance_id.clone(),
            region: self.region.clone(),
        }
    }

    /// The desired-state endpoint: `cli` (flag or env) first, then the file.
    pub fn overlord_url(&self, cli: Option<&str>) -> Result<String> {
        cli.map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .or_else(|| self.overlord_url.clone())
            .ok_or_else(|| anyhow!("OVERLORD_URL is not set (use --overlord-url or the env var)"))
    }
}

/// Load config from a TOML file.
///
/// With no path, or a path that does not exist, returns `AgentConfig::default()`.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let cfg = match path.filter(|path| path.exists()) {
        None => AgentConfig::default(),
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
        }
    };
    cfg.validate()?;
    Ok(cfg)
}
