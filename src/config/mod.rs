mod defaults;
mod servers;
mod validation;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Args;

pub use defaults::*;
pub use servers::{ServerConfig, ServersFile};
pub use validation::{expand_env_var_in_string, expand_env_vars, normalize_endpoint};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiSection {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PoolSection {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub max_rounds: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct McpSection {
    #[serde(default)]
    pub servers_file: Option<String>,
    #[serde(default)]
    pub handshake_timeout_secs: Option<u64>,
}

/// On-disk configuration, every field optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub mcp: McpSection,
    #[serde(default)]
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_endpoint: String,
    pub model: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_rounds: usize,
    pub model_timeout: Duration,
    pub max_tokens: u32,
    pub handshake_timeout: Duration,
    pub servers_file: PathBuf,
    pub verbose: bool,
}

impl Config {
    /// CLI args > environment > config file > defaults.
    pub fn from_env_and_args(args: &Args) -> Result<Self> {
        let file = FileConfig::load()?;

        // Still required from env var, never from a file.
        let api_key = env::var("OPENROUTER_API_KEY")
            .context("OPENROUTER_API_KEY environment variable not set")?;

        let api_endpoint = args
            .api_endpoint
            .clone()
            .or_else(|| env::var("AI_API_ENDPOINT").ok())
            .or(file.api.endpoint.clone())
            .map(|endpoint| normalize_endpoint(&endpoint))
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());

        let model = args
            .model
            .clone()
            .or_else(|| env::var("AI_MODEL").ok())
            .or(file.api.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let workers = args
            .workers
            .or_else(|| env_parse("AGENTPOOL_WORKERS"))
            .or(file.pool.workers)
            .unwrap_or_else(default_workers)
            .max(1);

        let queue_capacity = file
            .pool
            .queue_capacity
            .unwrap_or_else(default_queue_capacity)
            .max(1);

        let max_rounds = env_parse("AGENTPOOL_MAX_ROUNDS")
            .or(file.pool.max_rounds)
            .unwrap_or_else(default_max_rounds);

        let model_timeout = env_parse("AI_TIMEOUT")
            .or(file.api.timeout_secs)
            .unwrap_or_else(default_model_timeout_secs);

        let max_tokens = file.api.max_tokens.unwrap_or_else(default_max_tokens);

        let handshake_timeout = file
            .mcp
            .handshake_timeout_secs
            .unwrap_or_else(default_handshake_timeout_secs);

        let servers_file = args
            .servers
            .clone()
            .or_else(|| file.mcp.servers_file.as_deref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVERS_FILE));

        let verbose = args.verbose
            || env::var("AI_VERBOSE")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
            || file.verbose.unwrap_or(false);

        Ok(Config {
            api_key,
            api_endpoint,
            model,
            workers,
            queue_capacity,
            max_rounds,
            model_timeout: Duration::from_secs(model_timeout),
            max_tokens,
            handshake_timeout: Duration::from_secs(handshake_timeout),
            servers_file,
            verbose,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

impl FileConfig {
    pub fn load() -> Result<Self> {
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(FileConfig::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config file: {}", path.display())),
            _ => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config file: {}", path.display())),
        }
    }

    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".agentpool.yaml"),
            PathBuf::from(".agentpool.yml"),
            PathBuf::from(".agentpool.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let config_dir = config_dir.join("agentpool");
            paths.push(config_dir.join("agentpool.yaml"));
            paths.push(config_dir.join("agentpool.yml"));
            paths.push(config_dir.join("agentpool.json"));
        }

        paths
    }
}
