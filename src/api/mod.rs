pub mod client;
pub mod error;
pub mod models;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use client::DokployClient;
pub use error::ApiError;
pub use models::{Application, Database, DatabaseCreate, DatabaseKind, DatabaseUpdate, Family};

/// A whole-block edit of an application's environment variables.
///
/// The remote only stores the complete block, so every change is expressed as
/// one of these transforms over the current bag and written back in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvEdit {
    /// Overlay the given keys; keys not mentioned are kept.
    Merge(BTreeMap<String, String>),
    /// Drop every existing key, then write exactly the given keys.
    ReplaceAll(BTreeMap<String, String>),
    /// Drop every existing key.
    ClearAll,
}

impl EnvEdit {
    /// Apply this edit to the current bag.
    pub fn apply(&self, current: &mut BTreeMap<String, String>) {
        match self {
            EnvEdit::Merge(vars) => {
                current.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            EnvEdit::ReplaceAll(vars) => {
                current.clear();
                current.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            EnvEdit::ClearAll => current.clear(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnvEdit::Merge(_) => "merge",
            EnvEdit::ReplaceAll(_) => "replace_all",
            EnvEdit::ClearAll => "clear_all",
        }
    }
}

/// The Dokploy management API as seen by the reconcilers.
///
/// Implemented over HTTP by [`DokployClient`]; tests supply in-memory fakes.
#[async_trait]
pub trait DokployApi: Send + Sync {
    // ─── Databases ──────────────────────────────────────────────────────────

    async fn create_database(
        &self,
        kind: DatabaseKind,
        request: &DatabaseCreate,
    ) -> Result<Database, ApiError>;

    async fn get_database(&self, id: &str, kind: DatabaseKind) -> Result<Database, ApiError>;

    async fn update_database(
        &self,
        id: &str,
        kind: DatabaseKind,
        request: &DatabaseUpdate,
    ) -> Result<Database, ApiError>;

    async fn delete_database(&self, id: &str, kind: DatabaseKind) -> Result<(), ApiError>;

    /// Redeploy the database container with its current settings.
    async fn deploy_database(&self, id: &str, kind: DatabaseKind) -> Result<(), ApiError>;

    // ─── Applications ───────────────────────────────────────────────────────

    async fn get_application(&self, id: &str) -> Result<Application, ApiError>;

    /// Apply `edit` to the application's environment block and write it back.
    async fn update_application_env(
        &self,
        id: &str,
        edit: &EnvEdit,
        create_env_file: Option<bool>,
    ) -> Result<(), ApiError>;
}
