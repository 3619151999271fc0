use serde::Deserialize;

/// Default request timeout for remote calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Provider configuration: where the Dokploy API lives and how to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub host: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

/// Partial configuration as read from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Values supplied on the command line or through the environment.
/// These take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}
