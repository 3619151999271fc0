pub mod diagnostics;
pub mod dynamic;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::api::DokployApi;
use crate::resources::{
    DatabaseResource, EnvironmentVariablesResource, ReadOutcome, ReconcileError, Reconciler,
    ResourceModel,
};

pub use diagnostics::{Diagnostic, Severity};
pub use dynamic::Dynamic;
pub use schema::{Attribute, AttributeType, ResourceSchema};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported resource type '{type_name}', expected one of: {known}")]
    UnknownResourceType { type_name: String, known: String },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl ProviderError {
    /// Render as an error diagnostic for the runner.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ProviderError::UnknownResourceType { .. } => {
                Diagnostic::error("Unsupported resource type", self.to_string())
            }
            ProviderError::Reconcile(e) => {
                let detail = match e.api_error() {
                    Some(api) => api.to_string(),
                    None => e.to_string(),
                };
                Diagnostic::error(e.summary(), detail)
            }
        }
    }
}

/// Outcome of one pass. `new_state` is `None` when the resource is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResponse {
    pub new_state: Option<Dynamic>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ApplyResponse {
    fn present(state: Dynamic, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            new_state: Some(state),
            diagnostics,
        }
    }

    fn absent() -> Self {
        Self {
            new_state: None,
            diagnostics: Vec::new(),
        }
    }
}

// ─── Type-erased Handlers ───────────────────────────────────────────────────

/// A reconciler seen through dynamic values, so handlers of different model
/// types can share one registry.
#[async_trait]
trait ResourceHandler: Send + Sync {
    fn schema(&self) -> ResourceSchema;
    async fn create(&self, planned: &Dynamic) -> Result<ApplyResponse, ReconcileError>;
    async fn read(&self, current: &Dynamic) -> Result<ApplyResponse, ReconcileError>;
    async fn update(
        &self,
        prior: &Dynamic,
        planned: &Dynamic,
    ) -> Result<ApplyResponse, ReconcileError>;
    async fn delete(&self, current: &Dynamic) -> Result<ApplyResponse, ReconcileError>;
    fn import(&self, id: &str) -> Dynamic;
}

#[async_trait]
impl<R> ResourceHandler for R
where
    R: Reconciler + 'static,
{
    fn schema(&self) -> ResourceSchema {
        Reconciler::schema(self)
    }

    async fn create(&self, planned: &Dynamic) -> Result<ApplyResponse, ReconcileError> {
        let plan = R::Model::from_dynamic(planned)?;
        let applied = Reconciler::create(self, plan).await?;
        Ok(ApplyResponse::present(
            applied.state.to_dynamic(),
            applied.warnings,
        ))
    }

    async fn read(&self, current: &Dynamic) -> Result<ApplyResponse, ReconcileError> {
        let state = R::Model::from_dynamic(current)?;
        Ok(match Reconciler::read(self, state).await? {
            ReadOutcome::Present(state) => ApplyResponse::present(state.to_dynamic(), Vec::new()),
            ReadOutcome::Absent => ApplyResponse::absent(),
        })
    }

    async fn update(
        &self,
        prior: &Dynamic,
        planned: &Dynamic,
    ) -> Result<ApplyResponse, ReconcileError> {
        let prior = R::Model::from_dynamic(prior)?;
        let plan = R::Model::from_dynamic(planned)?;
        let applied = Reconciler::update(self, plan, prior).await?;
        Ok(ApplyResponse::present(
            applied.state.to_dynamic(),
            applied.warnings,
        ))
    }

    async fn delete(&self, current: &Dynamic) -> Result<ApplyResponse, ReconcileError> {
        let state = R::Model::from_dynamic(current)?;
        Reconciler::delete(self, state).await?;
        Ok(ApplyResponse::absent())
    }

    fn import(&self, id: &str) -> Dynamic {
        Reconciler::import(self, id).to_dynamic()
    }
}

// ─── Provider ───────────────────────────────────────────────────────────────

/// Routes lifecycle calls to the reconciler registered for a type name.
pub struct DokployProvider {
    handlers: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
}

impl DokployProvider {
    pub fn new(api: Arc<dyn DokployApi>) -> Self {
        let mut provider = Self {
            handlers: BTreeMap::new(),
        };
        provider.register(DatabaseResource::new(api.clone()));
        provider.register(EnvironmentVariablesResource::new(api));
        provider
    }

    fn register<R: Reconciler + 'static>(&mut self, reconciler: R) {
        self.handlers
            .insert(reconciler.type_name(), Box::new(reconciler));
    }

    /// Registered resource type names, sorted.
    pub fn resource_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    fn handler(&self, type_name: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.handlers
            .get(type_name)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResourceType {
                type_name: type_name.to_string(),
                known: self.resource_types().join(", "),
            })
    }

    /// Declared schemas of every registered resource type.
    pub fn schema(&self) -> Vec<ResourceSchema> {
        self.handlers.values().map(|h| h.schema()).collect()
    }

    pub fn resource_schema(&self, type_name: &str) -> Result<ResourceSchema, ProviderError> {
        Ok(self.handler(type_name)?.schema())
    }

    pub async fn create(
        &self,
        type_name: &str,
        planned: &Dynamic,
    ) -> Result<ApplyResponse, ProviderError> {
        debug!(type_name, "create");
        Ok(self.handler(type_name)?.create(planned).await?)
    }

    pub async fn read(
        &self,
        type_name: &str,
        current: &Dynamic,
    ) -> Result<ApplyResponse, ProviderError> {
        debug!(type_name, "read");
        Ok(self.handler(type_name)?.read(current).await?)
    }

    pub async fn update(
        &self,
        type_name: &str,
        prior: &Dynamic,
        planned: &Dynamic,
    ) -> Result<ApplyResponse, ProviderError> {
        debug!(type_name, "update");
        Ok(self.handler(type_name)?.update(prior, planned).await?)
    }

    pub async fn delete(
        &self,
        type_name: &str,
        current: &Dynamic,
    ) -> Result<ApplyResponse, ProviderError> {
        debug!(type_name, "delete");
        Ok(self.handler(type_name)?.delete(current).await?)
    }

    /// Seed state from an import identifier. Follow with `read` to populate it.
    pub fn import(&self, type_name: &str, id: &str) -> Result<Dynamic, ProviderError> {
        Ok(self.handler(type_name)?.import(id))
    }
}
