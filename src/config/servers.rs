use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::validation::{expand_env_var_in_string, expand_env_vars};

/// One external tool server to launch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    /// Copy with `${VAR}` references in args and env values expanded.
    pub fn expanded(&self) -> Self {
        Self {
            name: self.name.clone(),
            command: expand_env_var_in_string(&self.command),
            args: self.args.iter().map(|a| expand_env_var_in_string(a)).collect(),
            env: expand_env_vars(&self.env),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServersFile {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl ServersFile {
    /// A missing file means no servers; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no servers file");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read servers file: {}", path.display()))?;

        let file: ServersFile = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML servers file: {}", path.display()))?,
            _ => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON servers file: {}", path.display()))?,
        };

        Ok(Self {
            servers: file.servers.iter().map(ServerConfig::expanded).collect(),
        })
    }
}
