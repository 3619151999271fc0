use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::types::{ConfigFile, ConfigOverrides, ProviderConfig, DEFAULT_TIMEOUT_SECS};

/// Read a YAML provider config file.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse YAML content into a partial config.
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    let config: ConfigFile = serde_yaml::from_str(content)?;
    Ok(config)
}

/// Merge the optional config file with overrides and validate the result.
pub fn resolve(file: Option<ConfigFile>, overrides: ConfigOverrides) -> Result<ProviderConfig> {
    let file = file.unwrap_or_default();

    let host = overrides
        .host
        .or(file.host)
        .map(|h| h.trim().trim_end_matches('/').to_string())
        .unwrap_or_default();
    let api_key = overrides.api_key.or(file.api_key).unwrap_or_default();
    let timeout_secs = overrides
        .timeout_secs
        .or(file.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    if host.is_empty() {
        bail!("Dokploy host is not set. Use --host, DOKPLOY_HOST, or 'host' in the config file");
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        bail!("Dokploy host '{}' must start with http:// or https://", host);
    }
    if api_key.is_empty() {
        bail!("Dokploy API key is not set. Use --api-key, DOKPLOY_API_KEY, or 'api_key' in the config file");
    }
    if timeout_secs == 0 {
        bail!("timeout_secs must be greater than zero");
    }

    Ok(ProviderConfig {
        host,
        api_key,
        timeout_secs,
    })
}
