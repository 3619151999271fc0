use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reset SIGPIPE to default behavior so piping (e.g. `dokploy-provider schema | jq`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use dokploy_provider::api::{
    ApiError, Application, Database, DatabaseCreate, DatabaseKind, DatabaseUpdate, DokployApi,
    DokployClient, EnvEdit,
};
use dokploy_provider::config::{self, ConfigOverrides};
use dokploy_provider::provider::{ApplyResponse, Diagnostic, DokployProvider, Dynamic};

/// dokploy-provider - reconcile Dokploy databases and environment variables
#[derive(Parser)]
#[command(name = "dokploy-provider", version, about, long_about = None)]
struct Cli {
    /// Path to a YAML provider config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dokploy server URL (e.g. https://dokploy.example.com)
    #[arg(long, env = "DOKPLOY_HOST")]
    host: Option<String>,

    /// Dokploy API key, sent as the x-api-key header
    #[arg(long, env = "DOKPLOY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print declared resource schemas as JSON
    Schema {
        /// Only this resource type
        type_name: Option<String>,
    },

    /// Print the state seeded from an import identifier
    Import {
        /// Resource type (e.g. dokploy_database)
        type_name: String,
        /// Remote identifier (`<type>:<id>` accepted for databases)
        id: String,
    },

    /// Create a resource from a planned state
    Create {
        type_name: String,
        /// Planned state JSON file
        #[arg(long)]
        plan: PathBuf,
    },

    /// Refresh a tracked state from the server
    Read {
        type_name: String,
        /// Current state JSON file
        #[arg(long)]
        state: PathBuf,
    },

    /// Update a resource in place
    Update {
        type_name: String,
        /// Prior state JSON file
        #[arg(long)]
        prior: PathBuf,
        /// Planned state JSON file
        #[arg(long)]
        plan: PathBuf,
    },

    /// Delete a resource
    Delete {
        type_name: String,
        /// Current state JSON file
        #[arg(long)]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Schema { ref type_name } => cmd_schema(type_name.as_deref()),
        Commands::Import {
            ref type_name,
            ref id,
        } => cmd_import(type_name, id),
        Commands::Create {
            ref type_name,
            ref plan,
        } => {
            let provider = connect(&cli)?;
            let planned = read_state_file(plan)?;
            let response = provider
                .create(type_name, &planned)
                .await
                .map_err(|e| anyhow!("{}", e.to_diagnostic()))?;
            emit(response)
        }
        Commands::Read {
            ref type_name,
            ref state,
        } => {
            let provider = connect(&cli)?;
            let current = read_state_file(state)?;
            let response = provider
                .read(type_name, &current)
                .await
                .map_err(|e| anyhow!("{}", e.to_diagnostic()))?;
            emit(response)
        }
        Commands::Update {
            ref type_name,
            ref prior,
            ref plan,
        } => {
            let provider = connect(&cli)?;
            let prior = read_state_file(prior)?;
            let planned = read_state_file(plan)?;
            let response = provider
                .update(type_name, &prior, &planned)
                .await
                .map_err(|e| anyhow!("{}", e.to_diagnostic()))?;
            emit(response)
        }
        Commands::Delete {
            ref type_name,
            ref state,
        } => {
            let provider = connect(&cli)?;
            let current = read_state_file(state)?;
            let response = provider
                .delete(type_name, &current)
                .await
                .map_err(|e| anyhow!("{}", e.to_diagnostic()))?;
            emit(response)
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Build a provider backed by the HTTP client, resolving config from all sources.
fn connect(cli: &Cli) -> Result<DokployProvider> {
    let file = match &cli.config {
        Some(path) => Some(config::load_config(path)?),
        None => None,
    };
    let overrides = ConfigOverrides {
        host: cli.host.clone(),
        api_key: cli.api_key.clone(),
        timeout_secs: cli.timeout,
    };
    let resolved = config::resolve(file, overrides)?;
    tracing::debug!(host = %resolved.host, timeout_secs = resolved.timeout_secs, "Connecting");

    let client = DokployClient::from_config(&resolved).context("Failed to build API client")?;
    Ok(DokployProvider::new(Arc::new(client)))
}

/// A provider for commands that never reach the server.
fn offline() -> DokployProvider {
    DokployProvider::new(Arc::new(Offline))
}

fn read_state_file(path: &Path) -> Result<Dynamic> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file as JSON: {}", path.display()))?;
    Ok(Dynamic::from_json(value))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_diagnostic(diag: &Diagnostic) {
    let label = if diag.is_error() {
        "Error:".red().bold()
    } else {
        "Warning:".yellow().bold()
    };
    eprintln!("{} {}", label, diag.summary.bold());
    if !diag.detail.is_empty() {
        eprintln!("  {}", diag.detail);
    }
}

/// Warnings to stderr, the new state (or `null`) to stdout.
fn emit(response: ApplyResponse) -> Result<()> {
    for diag in &response.diagnostics {
        print_diagnostic(diag);
    }
    let state = response
        .new_state
        .map(|s| s.to_json())
        .unwrap_or(serde_json::Value::Null);
    print_json(&state)
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn cmd_schema(type_name: Option<&str>) -> Result<()> {
    let provider = offline();
    match type_name {
        Some(name) => {
            let schema = provider
                .resource_schema(name)
                .map_err(|e| anyhow!("{}", e))?;
            print_json(&schema.to_json())
        }
        None => {
            let schemas: Vec<_> = provider.schema().iter().map(|s| s.to_json()).collect();
            print_json(&serde_json::Value::Array(schemas))
        }
    }
}

fn cmd_import(type_name: &str, id: &str) -> Result<()> {
    let provider = offline();
    let state = provider
        .import(type_name, id)
        .map_err(|e| anyhow!("{}", e))?;
    print_json(&state.to_json())
}

// ─── Offline API ─────────────────────────────────────────────────────────────

/// Stand-in API for `schema` and `import`; any remote call is a config error.
struct Offline;

impl Offline {
    fn unavailable<T>() -> Result<T, ApiError> {
        Err(ApiError::Config {
            message: "this command does not contact the Dokploy server".to_string(),
        })
    }
}

#[async_trait]
impl DokployApi for Offline {
    async fn create_database(
        &self,
        _kind: DatabaseKind,
        _request: &DatabaseCreate,
    ) -> Result<Database, ApiError> {
        Self::unavailable()
    }

    async fn get_database(&self, _id: &str, _kind: DatabaseKind) -> Result<Database, ApiError> {
        Self::unavailable()
    }

    async fn update_database(
        &self,
        _id: &str,
        _kind: DatabaseKind,
        _request: &DatabaseUpdate,
    ) -> Result<Database, ApiError> {
        Self::unavailable()
    }

    async fn delete_database(&self, _id: &str, _kind: DatabaseKind) -> Result<(), ApiError> {
        Self::unavailable()
    }

    async fn deploy_database(&self, _id: &str, _kind: DatabaseKind) -> Result<(), ApiError> {
        Self::unavailable()
    }

    async fn get_application(&self, _id: &str) -> Result<Application, ApiError> {
        Self::unavailable()
    }

    async fn update_application_env(
        &self,
        _id: &str,
        _edit: &EnvEdit,
        _create_env_file: Option<bool>,
    ) -> Result<(), ApiError> {
        Self::unavailable()
    }
}
