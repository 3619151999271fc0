//! `dokploy_environment_variables`: the whole environment block of one
//! application, managed as a single resource.
//!
//! Create merges into whatever the application already carries, update
//! replaces the block outright, delete clears it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use super::attr::{Attr, ToDynamic};
use super::{
    field, require_known, Applied, ReadOutcome, ReconcileError, Reconciler, ResourceModel,
};
use crate::api::{ApiError, DokployApi, EnvEdit};
use crate::envfile;
use crate::provider::dynamic::Dynamic;
use crate::provider::schema::{Attribute, AttributeType, ResourceSchema};

pub const TYPE_NAME: &str = "dokploy_environment_variables";

const RESOURCE: &str = "environment variables";

/// Value `create_env_file` takes when the configuration leaves it out.
const DEFAULT_CREATE_ENV_FILE: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvironmentVariablesModel {
    pub id: Attr<String>,
    pub application_id: Attr<String>,
    pub variables: Attr<BTreeMap<String, String>>,
    pub create_env_file: Attr<bool>,
}

impl EnvironmentVariablesModel {
    fn require_variables(&self) -> Result<&BTreeMap<String, String>, ReconcileError> {
        let vars = match &self.variables {
            Attr::Known(vars) => vars,
            Attr::Unknown => {
                return Err(ReconcileError::decode("variables", "value is not known yet"))
            }
            Attr::Null => return Err(ReconcileError::decode("variables", "value is required")),
        };
        // Refuse entries the block format would mangle before anything is written.
        envfile::serialize(vars).map_err(|e| ReconcileError::decode("variables", e.to_string()))?;
        Ok(vars)
    }

    /// The flag as it will be settled into state.
    fn effective_create_env_file(&self) -> bool {
        self.create_env_file
            .known()
            .copied()
            .unwrap_or(DEFAULT_CREATE_ENV_FILE)
    }

    /// The parent application, falling back to `id` for freshly imported state.
    fn target_application(&self) -> Result<String, ReconcileError> {
        match (&self.application_id, &self.id) {
            (Attr::Known(app), _) => Ok(app.clone()),
            (_, Attr::Known(id)) => Ok(id.clone()),
            _ => require_known(&self.application_id, "application_id").map(str::to_string),
        }
    }

    fn settle(&mut self, application_id: &str) {
        self.id = Attr::Known(application_id.to_string());
        self.application_id = Attr::Known(application_id.to_string());
        if !self.create_env_file.is_known() {
            self.create_env_file = Attr::Known(DEFAULT_CREATE_ENV_FILE);
        }
    }
}

impl ResourceModel for EnvironmentVariablesModel {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ReconcileError> {
        Ok(Self {
            id: field(value, "id")?,
            application_id: field(value, "application_id")?,
            variables: field(value, "variables")?,
            create_env_file: field(value, "create_env_file")?,
        })
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::object([
            ("id", self.id.to_dynamic()),
            ("application_id", self.application_id.to_dynamic()),
            ("variables", self.variables.to_dynamic()),
            ("create_env_file", self.create_env_file.to_dynamic()),
        ])
    }
}

/// Reconciles `dokploy_environment_variables` against the remote API.
pub struct EnvironmentVariablesResource {
    api: Arc<dyn DokployApi>,
}

impl EnvironmentVariablesResource {
    pub fn new(api: Arc<dyn DokployApi>) -> Self {
        Self { api }
    }

    async fn write(
        &self,
        application_id: &str,
        edit: EnvEdit,
        create_env_file: Option<bool>,
    ) -> Result<(), ApiError> {
        debug!(application_id, edit = edit.name(), ?create_env_file, "Writing environment block");
        self.api
            .update_application_env(application_id, &edit, create_env_file)
            .await
    }
}

#[async_trait]
impl Reconciler for EnvironmentVariablesResource {
    type Model = EnvironmentVariablesModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema {
            type_name: TYPE_NAME,
            description: "Manages all environment variables for a Dokploy application as a single resource.",
            version: 0,
            attributes: vec![
                Attribute::computed("id", AttributeType::String),
                Attribute::required("application_id", AttributeType::String),
                Attribute::required(
                    "variables",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .sensitive(),
                Attribute::optional_computed("create_env_file", AttributeType::Bool)
                    .with_default(json!(DEFAULT_CREATE_ENV_FILE)),
            ],
        }
    }

    async fn create(
        &self,
        plan: EnvironmentVariablesModel,
    ) -> Result<Applied<EnvironmentVariablesModel>, ReconcileError> {
        let application_id = require_known(&plan.application_id, "application_id")?.to_string();
        let vars = plan.require_variables()?.clone();
        let count = vars.len();

        let env_file = Some(plan.effective_create_env_file());
        self.write(&application_id, EnvEdit::Merge(vars), env_file)
            .await
            .map_err(|source| ReconcileError::Create {
                resource: RESOURCE,
                source,
            })?;
        info!(application_id = %application_id, keys = count, "Environment variables merged");

        let mut state = plan;
        state.settle(&application_id);
        Ok(Applied::new(state))
    }

    async fn read(
        &self,
        state: EnvironmentVariablesModel,
    ) -> Result<ReadOutcome<EnvironmentVariablesModel>, ReconcileError> {
        let application_id = state.target_application()?;

        let app = match self.api.get_application(&application_id).await {
            Ok(app) => app,
            Err(e) if e.is_not_found() => {
                warn!(application_id = %application_id, "Application no longer exists, dropping from state");
                return Ok(ReadOutcome::Absent);
            }
            Err(source) => {
                return Err(ReconcileError::Read {
                    resource: RESOURCE,
                    source,
                })
            }
        };

        let vars = envfile::parse(app.env.as_deref().unwrap_or_default())
            .map_err(|e| ReconcileError::decode("variables", e.to_string()))?;

        let mut state = state;
        state.variables = Attr::Known(vars);
        // Not observable remotely: keep what is tracked.
        state.settle(&application_id);
        Ok(ReadOutcome::Present(state))
    }

    async fn update(
        &self,
        plan: EnvironmentVariablesModel,
        _prior: EnvironmentVariablesModel,
    ) -> Result<Applied<EnvironmentVariablesModel>, ReconcileError> {
        let application_id = require_known(&plan.application_id, "application_id")?.to_string();
        let vars = plan.require_variables()?.clone();
        let count = vars.len();

        let env_file = Some(plan.effective_create_env_file());
        self.write(&application_id, EnvEdit::ReplaceAll(vars), env_file)
            .await
            .map_err(|source| ReconcileError::Update {
                resource: RESOURCE,
                source,
            })?;
        info!(application_id = %application_id, keys = count, "Environment variables replaced");

        let mut state = plan;
        state.settle(&application_id);
        Ok(Applied::new(state))
    }

    async fn delete(&self, state: EnvironmentVariablesModel) -> Result<(), ReconcileError> {
        let application_id = state.target_application()?;

        let env_file = state.create_env_file.known().copied();
        match self.write(&application_id, EnvEdit::ClearAll, env_file).await {
            Ok(()) => {
                info!(application_id = %application_id, "Environment variables cleared");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(application_id = %application_id, "Application already gone, treating delete as done");
                Ok(())
            }
            Err(source) => Err(ReconcileError::Delete {
                resource: RESOURCE,
                source,
            }),
        }
    }

    fn import(&self, id: &str) -> EnvironmentVariablesModel {
        EnvironmentVariablesModel {
            id: Attr::Known(id.to_string()),
            application_id: Attr::Known(id.to_string()),
            ..Default::default()
        }
    }
}
