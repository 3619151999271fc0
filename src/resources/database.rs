//! `dokploy_database`: one resource shape over every database engine.
//!
//! The engine is selected by the `type` attribute and carried as a
//! [`DatabaseKind`] tag into a single create/read/update/delete call shape.
//! Engine-specific rules (root passwords, replica sets) are left to the
//! remote API to validate.

use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use super::attr::{Attr, ToDynamic};
use super::{
    field, require_known, Applied, ReadOutcome, ReconcileError, Reconciler, ResourceModel,
};
use crate::api::{Database, DatabaseCreate, DatabaseKind, DatabaseUpdate, DokployApi};
use crate::provider::diagnostics::Diagnostic;
use crate::provider::dynamic::Dynamic;
use crate::provider::schema::{Attribute, AttributeType, ResourceSchema};

pub const TYPE_NAME: &str = "dokploy_database";

const RESOURCE: &str = "database";

/// Tracked state of a database resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseModel {
    pub id: Attr<String>,
    pub environment_id: Attr<String>,
    pub kind: Attr<String>,
    pub name: Attr<String>,
    pub app_name: Attr<String>,
    pub description: Attr<String>,
    pub database_name: Attr<String>,
    pub database_user: Attr<String>,
    pub database_password: Attr<String>,
    pub database_root_password: Attr<String>,
    pub docker_image: Attr<String>,
    pub external_port: Attr<i64>,
    pub server_id: Attr<String>,
    pub application_status: Attr<String>,
    pub replica_sets: Attr<bool>,
    pub env: Attr<String>,
    pub memory_reservation: Attr<String>,
    pub memory_limit: Attr<String>,
    pub cpu_reservation: Attr<String>,
    pub cpu_limit: Attr<String>,
    pub command: Attr<String>,
    pub args: Attr<Vec<Attr<String>>>,
    pub replicas: Attr<i64>,
    pub stop_grace_period: Attr<i64>,
    pub redeploy_on_update: Attr<bool>,
}

impl DatabaseModel {
    /// The engine tag, if the state records one.
    pub fn database_kind(&self) -> Result<Option<DatabaseKind>, ReconcileError> {
        match &self.kind {
            Attr::Known(s) => s
                .parse::<DatabaseKind>()
                .map(Some)
                .map_err(|e: String| ReconcileError::decode("type", e)),
            _ => Ok(None),
        }
    }

    fn require_kind(&self) -> Result<DatabaseKind, ReconcileError> {
        require_known(&self.kind, "type")?;
        self.database_kind()?
            .ok_or_else(|| ReconcileError::decode("type", "value is required"))
    }

    /// `app_name` when the user set one, otherwise `name`.
    pub fn resolved_app_name(&self) -> String {
        match self.app_name.known_str() {
            Some(app_name) if !app_name.is_empty() => app_name.to_string(),
            _ => self.name.value_or_empty(),
        }
    }

    /// Arguments for create: an unset or not-yet-known list means no arguments.
    pub fn create_args(&self) -> Result<Vec<String>, ReconcileError> {
        match &self.args {
            Attr::Known(items) => known_elements(items),
            Attr::Null | Attr::Unknown => Ok(Vec::new()),
        }
    }

    /// Arguments for update: the list itself must be decodable.
    pub fn update_args(&self) -> Result<Vec<String>, ReconcileError> {
        match &self.args {
            Attr::Known(items) => known_elements(items),
            Attr::Null => Ok(Vec::new()),
            Attr::Unknown => Err(ReconcileError::decode("args", "value is not known yet")),
        }
    }

    /// Overwrite the attributes the remote side owns.
    fn apply_remote(&mut self, db: &Database) {
        self.id = Attr::Known(db.id.clone());
        self.app_name = Attr::Known(db.app_name.clone());
        self.application_status = Attr::Known(db.application_status.clone());
        self.memory_reservation = db.memory_reservation.clone().into();
        self.memory_limit = db.memory_limit.clone().into();
        self.cpu_reservation = db.cpu_reservation.clone().into();
        self.cpu_limit = db.cpu_limit.clone().into();
        self.replicas = db.replicas.into();
        self.stop_grace_period = db.stop_grace_period.into();

        // Server-side defaults are not adopted here; only Read fills args.
        self.args = match mem::take(&mut self.args) {
            Attr::Known(items) if !items.is_empty() => Attr::Known(items),
            _ => Attr::Null,
        };

        if !self.redeploy_on_update.is_known() {
            self.redeploy_on_update = Attr::Known(false);
        }
    }

    /// Fill attributes the state does not know yet from the remote object,
    /// leaving every known value alone.
    fn fill_unset(&mut self, db: &Database) {
        fn fill<T>(slot: &mut Attr<T>, remote: Option<T>) {
            *slot = mem::take(slot).or_known(remote.into());
        }

        // `name` is required, so it is only missing from freshly imported state.
        let imported = !self.name.is_known();

        fill(&mut self.environment_id, db.environment_id.clone());
        fill(&mut self.kind, db.kind.map(|k| k.as_str().to_string()));
        fill(&mut self.name, Some(db.name.clone()));
        fill(&mut self.description, db.description.clone());
        fill(&mut self.database_name, db.database_name.clone());
        fill(&mut self.database_user, db.database_user.clone());
        fill(&mut self.database_password, db.database_password.clone());
        fill(&mut self.database_root_password, db.database_root_password.clone());
        fill(&mut self.docker_image, db.docker_image.clone());
        fill(&mut self.external_port, db.external_port);
        fill(&mut self.server_id, db.server_id.clone());
        fill(&mut self.replica_sets, db.replica_sets);
        fill(&mut self.env, db.env.clone());
        fill(&mut self.command, db.command.clone());
        // The server may default args; adopt them only into imported state.
        if imported {
            let remote_args = db
                .args
                .clone()
                .map(|args| args.into_iter().map(Attr::Known).collect());
            fill(&mut self.args, remote_args);
        }
    }

    fn create_request(&self) -> Result<DatabaseCreate, ReconcileError> {
        Ok(DatabaseCreate {
            environment_id: self.environment_id.value_or_empty(),
            app_name: self.resolved_app_name(),
            name: self.name.value_or_empty(),
            description: self.description.known().cloned(),
            database_name: self.database_name.value_or_empty(),
            database_user: self.database_user.value_or_empty(),
            database_password: self.database_password.value_or_empty(),
            database_root_password: self.database_root_password.known().cloned(),
            docker_image: self.docker_image.known().cloned(),
            server_id: self.server_id.known().cloned(),
            replica_sets: self.replica_sets.known().copied().unwrap_or(false),
            args: self.create_args()?,
        })
    }

    fn update_request(&self) -> Result<DatabaseUpdate, ReconcileError> {
        Ok(DatabaseUpdate {
            name: self.name.value_or_empty(),
            app_name: self.resolved_app_name(),
            description: self.description.known().cloned(),
            database_password: self.database_password.known().cloned(),
            database_root_password: self.database_root_password.known().cloned(),
            docker_image: self.docker_image.known().cloned(),
            server_id: self.server_id.known().cloned(),
            replica_sets: self.replica_sets.known().copied().unwrap_or(false),
            env: self.env.known().cloned(),
            memory_reservation: self.memory_reservation.known().cloned(),
            memory_limit: self.memory_limit.known().cloned(),
            cpu_reservation: self.cpu_reservation.known().cloned(),
            cpu_limit: self.cpu_limit.known().cloned(),
            command: self.command.known().cloned(),
            application_status: self.application_status.known().cloned(),
            replicas: self.replicas.known().copied(),
            stop_grace_period: self.stop_grace_period.known().copied(),
            args: self.update_args()?,
        })
    }
}

fn known_elements(items: &[Attr<String>]) -> Result<Vec<String>, ReconcileError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Attr::Known(v) => Ok(v.clone()),
            Attr::Unknown => Err(ReconcileError::decode(
                format!("args[{}]", i),
                "value is not known yet",
            )),
            Attr::Null => Err(ReconcileError::decode(
                format!("args[{}]", i),
                "null elements are not allowed",
            )),
        })
        .collect()
}

impl ResourceModel for DatabaseModel {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ReconcileError> {
        Ok(Self {
            id: field(value, "id")?,
            environment_id: field(value, "environment_id")?,
            kind: field(value, "type")?,
            name: field(value, "name")?,
            app_name: field(value, "app_name")?,
            description: field(value, "description")?,
            database_name: field(value, "database_name")?,
            database_user: field(value, "database_user")?,
            database_password: field(value, "database_password")?,
            database_root_password: field(value, "database_root_password")?,
            docker_image: field(value, "docker_image")?,
            external_port: field(value, "external_port")?,
            server_id: field(value, "server_id")?,
            application_status: field(value, "application_status")?,
            replica_sets: field(value, "replica_sets")?,
            env: field(value, "env")?,
            memory_reservation: field(value, "memory_reservation")?,
            memory_limit: field(value, "memory_limit")?,
            cpu_reservation: field(value, "cpu_reservation")?,
            cpu_limit: field(value, "cpu_limit")?,
            command: field(value, "command")?,
            args: field(value, "args")?,
            replicas: field(value, "replicas")?,
            stop_grace_period: field(value, "stop_grace_period")?,
            redeploy_on_update: field(value, "redeploy_on_update")?,
        })
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::object([
            ("id", self.id.to_dynamic()),
            ("environment_id", self.environment_id.to_dynamic()),
            ("type", self.kind.to_dynamic()),
            ("name", self.name.to_dynamic()),
            ("app_name", self.app_name.to_dynamic()),
            ("description", self.description.to_dynamic()),
            ("database_name", self.database_name.to_dynamic()),
            ("database_user", self.database_user.to_dynamic()),
            ("database_password", self.database_password.to_dynamic()),
            ("database_root_password", self.database_root_password.to_dynamic()),
            ("docker_image", self.docker_image.to_dynamic()),
            ("external_port", self.external_port.to_dynamic()),
            ("server_id", self.server_id.to_dynamic()),
            ("application_status", self.application_status.to_dynamic()),
            ("replica_sets", self.replica_sets.to_dynamic()),
            ("env", self.env.to_dynamic()),
            ("memory_reservation", self.memory_reservation.to_dynamic()),
            ("memory_limit", self.memory_limit.to_dynamic()),
            ("cpu_reservation", self.cpu_reservation.to_dynamic()),
            ("cpu_limit", self.cpu_limit.to_dynamic()),
            ("command", self.command.to_dynamic()),
            ("args", self.args.to_dynamic()),
            ("replicas", self.replicas.to_dynamic()),
            ("stop_grace_period", self.stop_grace_period.to_dynamic()),
            ("redeploy_on_update", self.redeploy_on_update.to_dynamic()),
        ])
    }
}

/// Reconciles `dokploy_database` against the remote API.
pub struct DatabaseResource {
    api: Arc<dyn DokployApi>,
}

impl DatabaseResource {
    pub fn new(api: Arc<dyn DokployApi>) -> Self {
        Self { api }
    }

    /// Find a database whose engine is not recorded by trying each kind.
    async fn probe(&self, id: &str) -> Result<Option<Database>, ReconcileError> {
        for kind in DatabaseKind::ALL {
            match self.api.get_database(id, kind).await {
                Ok(db) => {
                    debug!(id, kind = %kind, "Resolved database kind");
                    return Ok(Some(db));
                }
                Err(e) if e.is_not_found() => continue,
                Err(source) => {
                    return Err(ReconcileError::Read {
                        resource: RESOURCE,
                        source,
                    })
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Reconciler for DatabaseResource {
    type Model = DatabaseModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        use AttributeType::{Bool, Int64, List, String};

        ResourceSchema {
            type_name: TYPE_NAME,
            description: "Manages a Dokploy database (postgres, mysql, mariadb, mongo or redis).",
            version: 0,
            attributes: vec![
                Attribute::computed("id", String),
                Attribute::required("environment_id", String).requires_replace(),
                Attribute::required("type", String)
                    .requires_replace()
                    .describe("One of postgres, mysql, mariadb, mongo, redis."),
                Attribute::required("name", String),
                Attribute::optional_computed("app_name", String)
                    .describe("Defaults to the resource name."),
                Attribute::optional("description", String),
                Attribute::required("database_name", String).requires_replace(),
                Attribute::required("database_user", String).requires_replace(),
                Attribute::required("database_password", String).sensitive(),
                Attribute::optional("database_root_password", String)
                    .sensitive()
                    .describe("Required by mysql and mariadb."),
                Attribute::optional("docker_image", String),
                Attribute::optional("external_port", Int64),
                Attribute::optional("server_id", String),
                Attribute::computed("application_status", String),
                Attribute::optional("replica_sets", Bool).describe("Only used by mongo."),
                Attribute::optional("env", String),
                Attribute::optional("memory_reservation", String),
                Attribute::optional("memory_limit", String),
                Attribute::optional("cpu_reservation", String),
                Attribute::optional("cpu_limit", String),
                Attribute::optional("command", String),
                Attribute::optional("args", List(Box::new(String))),
                Attribute::optional("replicas", Int64),
                Attribute::optional("stop_grace_period", Int64),
                Attribute::optional_computed("redeploy_on_update", Bool)
                    .with_default(json!(false))
                    .describe("Redeploy the database after every in-place update."),
            ],
        }
    }

    async fn create(&self, plan: DatabaseModel) -> Result<Applied<DatabaseModel>, ReconcileError> {
        let kind = plan.require_kind()?;
        let request = plan.create_request()?;
        debug!(
            kind = %kind,
            app_name = %request.app_name,
            args = request.args.len(),
            "Creating database"
        );

        let db = self
            .api
            .create_database(kind, &request)
            .await
            .map_err(|source| ReconcileError::Create {
                resource: RESOURCE,
                source,
            })?;
        info!(id = %db.id, kind = %kind, "Database created");

        let mut state = plan;
        state.apply_remote(&db);
        Ok(Applied::new(state))
    }

    async fn read(&self, state: DatabaseModel) -> Result<ReadOutcome<DatabaseModel>, ReconcileError> {
        let id = require_known(&state.id, "id")?.to_string();

        let db = match state.database_kind()? {
            Some(kind) => match self.api.get_database(&id, kind).await {
                Ok(db) => db,
                Err(e) if e.is_not_found() => {
                    warn!(id = %id, kind = %kind, "Database no longer exists, dropping from state");
                    return Ok(ReadOutcome::Absent);
                }
                Err(source) => {
                    return Err(ReconcileError::Read {
                        resource: RESOURCE,
                        source,
                    })
                }
            },
            None => match self.probe(&id).await? {
                Some(db) => db,
                None => {
                    warn!(id = %id, "Database not found under any kind, dropping from state");
                    return Ok(ReadOutcome::Absent);
                }
            },
        };

        let mut state = state;
        state.fill_unset(&db);
        state.apply_remote(&db);
        Ok(ReadOutcome::Present(state))
    }

    async fn update(
        &self,
        plan: DatabaseModel,
        prior: DatabaseModel,
    ) -> Result<Applied<DatabaseModel>, ReconcileError> {
        // Identity and kind are immutable; address the remote object by what
        // was recorded, since a planned id is usually still unknown.
        let id = require_known(&prior.id, "id")?.to_string();
        let kind = prior.require_kind()?;
        let request = plan.update_request()?;
        debug!(id = %id, kind = %kind, "Updating database");

        let db = self
            .api
            .update_database(&id, kind, &request)
            .await
            .map_err(|source| ReconcileError::Update {
                resource: RESOURCE,
                source,
            })?;

        let mut warnings = Vec::new();
        if plan.redeploy_on_update.known().copied().unwrap_or(false) {
            match self.api.deploy_database(&id, kind).await {
                Ok(()) => info!(id = %id, kind = %kind, "Database redeployed after update"),
                Err(e) => {
                    warn!(id = %id, kind = %kind, error = %e, "Database updated but redeploy failed");
                    warnings.push(Diagnostic::warning(
                        "Database updated but redeploy failed",
                        e.to_string(),
                    ));
                }
            }
        }

        let mut state = plan;
        state.apply_remote(&db);
        Ok(Applied { state, warnings })
    }

    async fn delete(&self, state: DatabaseModel) -> Result<(), ReconcileError> {
        let id = require_known(&state.id, "id")?.to_string();

        let kind = match state.database_kind()? {
            Some(kind) => kind,
            None => match self.probe(&id).await? {
                Some(db) => db
                    .kind
                    .ok_or_else(|| ReconcileError::decode("type", "value is required"))?,
                None => {
                    debug!(id = %id, "Database already gone");
                    return Ok(());
                }
            },
        };

        match self.api.delete_database(&id, kind).await {
            Ok(()) => {
                info!(id = %id, kind = %kind, "Database deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(id = %id, kind = %kind, "Database already gone, treating delete as done");
                Ok(())
            }
            Err(source) => Err(ReconcileError::Delete {
                resource: RESOURCE,
                source,
            }),
        }
    }

    fn import(&self, id: &str) -> DatabaseModel {
        let mut model = DatabaseModel::default();
        match id.split_once(':') {
            Some((prefix, rest)) if !rest.is_empty() && prefix.parse::<DatabaseKind>().is_ok() => {
                model.kind = Attr::Known(prefix.to_string());
                model.id = Attr::Known(rest.to_string());
            }
            _ => model.id = Attr::Known(id.to_string()),
        }
        model
    }
}
