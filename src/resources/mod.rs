pub mod attr;
pub mod database;
pub mod environment_variables;

use async_trait::async_trait;
use thiserror::Error;

use crate::api::ApiError;
use crate::provider::diagnostics::Diagnostic;
use crate::provider::dynamic::Dynamic;
use crate::provider::schema::ResourceSchema;

pub use attr::{Attr, FromDynamic, ToDynamic};
pub use database::{DatabaseModel, DatabaseResource};
pub use environment_variables::{EnvironmentVariablesModel, EnvironmentVariablesResource};

/// Failures of a reconciliation pass. Remote messages are carried unchanged.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("error creating {resource}: {source}")]
    Create {
        resource: &'static str,
        source: ApiError,
    },

    #[error("error reading {resource}: {source}")]
    Read {
        resource: &'static str,
        source: ApiError,
    },

    #[error("error updating {resource}: {source}")]
    Update {
        resource: &'static str,
        source: ApiError,
    },

    #[error("error deleting {resource}: {source}")]
    Delete {
        resource: &'static str,
        source: ApiError,
    },

    #[error("invalid value for '{attribute}': {message}")]
    Decode { attribute: String, message: String },
}

impl ReconcileError {
    pub fn decode(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        ReconcileError::Decode {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// The remote error behind a failed call, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ReconcileError::Create { source, .. }
            | ReconcileError::Read { source, .. }
            | ReconcileError::Update { source, .. }
            | ReconcileError::Delete { source, .. } => Some(source),
            ReconcileError::Decode { .. } => None,
        }
    }

    /// One-line summary suitable for a diagnostic title.
    pub fn summary(&self) -> String {
        match self {
            ReconcileError::Create { resource, .. } => format!("Error creating {}", resource),
            ReconcileError::Read { resource, .. } => format!("Error reading {}", resource),
            ReconcileError::Update { resource, .. } => format!("Error updating {}", resource),
            ReconcileError::Delete { resource, .. } => format!("Error deleting {}", resource),
            ReconcileError::Decode { .. } => "Invalid configuration".to_string(),
        }
    }
}

/// State produced by a mutating pass, plus any non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<M> {
    pub state: M,
    pub warnings: Vec<Diagnostic>,
}

impl<M> Applied<M> {
    pub fn new(state: M) -> Self {
        Self {
            state,
            warnings: Vec::new(),
        }
    }
}

/// Result of a read pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<M> {
    Present(M),
    /// The remote object is gone; the runner should stop tracking it.
    Absent,
}

/// A typed resource state that can cross the dynamic-value boundary.
pub trait ResourceModel: Sized + Send + Sync {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ReconcileError>;
    fn to_dynamic(&self) -> Dynamic;
}

/// Decode one attribute of an object.
pub(crate) fn field<T: FromDynamic>(value: &Dynamic, name: &str) -> Result<T, ReconcileError> {
    T::from_dynamic(value.get(name)).map_err(|e| ReconcileError::decode(name, e))
}

/// Read a string attribute that must be known for the pass to proceed.
pub(crate) fn require_known<'a>(
    attr: &'a Attr<String>,
    name: &str,
) -> Result<&'a str, ReconcileError> {
    match attr {
        Attr::Known(v) => Ok(v),
        Attr::Unknown => Err(ReconcileError::decode(name, "value is not known yet")),
        Attr::Null => Err(ReconcileError::decode(name, "value is required")),
    }
}

/// The lifecycle contract every resource type implements.
///
/// The runner calls at most one operation at a time per resource instance and
/// persists whatever state comes back; reconcilers keep no state of their own.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Model: ResourceModel;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn create(&self, plan: Self::Model) -> Result<Applied<Self::Model>, ReconcileError>;

    async fn read(&self, state: Self::Model) -> Result<ReadOutcome<Self::Model>, ReconcileError>;

    async fn update(
        &self,
        plan: Self::Model,
        prior: Self::Model,
    ) -> Result<Applied<Self::Model>, ReconcileError>;

    async fn delete(&self, state: Self::Model) -> Result<(), ReconcileError>;

    /// Seed a state from an external identifier. A read pass fills in the rest.
    fn import(&self, id: &str) -> Self::Model;
}
