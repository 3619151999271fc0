//! In-memory Dokploy server shared by the reconciler tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dokploy_provider::api::{
    ApiError, Application, Database, DatabaseCreate, DatabaseKind, DatabaseUpdate, DokployApi,
    EnvEdit,
};
use dokploy_provider::envfile;

/// Suffix the fake server appends to every requested app name.
pub const APP_NAME_SUFFIX: &str = "-x1y2z3";

#[derive(Default)]
struct Inner {
    databases: BTreeMap<String, Database>,
    applications: BTreeMap<String, Application>,
    next_id: u64,
    /// Operation name -> (status, body) returned instead of succeeding.
    failures: HashMap<&'static str, (u16, String)>,
    calls: Vec<String>,
    env_writes: usize,
    last_create: Option<DatabaseCreate>,
    last_update: Option<DatabaseUpdate>,
    last_create_env_file: Option<Option<bool>>,
    /// Args the server fills in when a create or update sends none.
    default_args: Option<Vec<String>>,
}

#[derive(Default)]
pub struct FakeApi {
    inner: Mutex<Inner>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `operation` fail with the given HTTP status and body.
    pub fn fail(&self, operation: &'static str, status: u16, body: &str) {
        self.lock()
            .failures
            .insert(operation, (status, body.to_string()));
    }

    pub fn set_default_args(&self, args: &[&str]) {
        self.lock().default_args = Some(args.iter().map(|a| a.to_string()).collect());
    }

    pub fn add_application(&self, id: &str, env: &str) {
        self.lock().applications.insert(
            id.to_string(),
            Application {
                application_id: id.to_string(),
                name: Some(id.to_string()),
                app_name: Some(format!("{}{}", id, APP_NAME_SUFFIX)),
                env: Some(env.to_string()),
            },
        );
    }

    pub fn add_database(&self, db: Database) {
        self.lock().databases.insert(db.id.clone(), db);
    }

    pub fn remove_database(&self, id: &str) {
        self.lock().databases.remove(id);
    }

    pub fn database(&self, id: &str) -> Option<Database> {
        self.lock().databases.get(id).cloned()
    }

    pub fn database_count(&self) -> usize {
        self.lock().databases.len()
    }

    pub fn env_block(&self, id: &str) -> Option<String> {
        self.lock()
            .applications
            .get(id)
            .and_then(|app| app.env.clone())
    }

    pub fn env_vars(&self, id: &str) -> BTreeMap<String, String> {
        envfile::parse(&self.env_block(id).unwrap_or_default()).unwrap()
    }

    pub fn env_writes(&self) -> usize {
        self.lock().env_writes
    }

    pub fn last_create(&self) -> Option<DatabaseCreate> {
        self.lock().last_create.clone()
    }

    pub fn last_update(&self) -> Option<DatabaseUpdate> {
        self.lock().last_update.clone()
    }

    pub fn last_create_env_file(&self) -> Option<Option<bool>> {
        self.lock().last_create_env_file
    }

    /// Calls in order, e.g. `"postgres.update"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn record(&self, operation: &'static str, call: String) -> Result<(), ApiError> {
        let mut inner = self.lock();
        inner.calls.push(call);
        match inner.failures.get(operation) {
            Some((status, body)) => Err(ApiError::from_response(*status, body)),
            None => Ok(()),
        }
    }
}

fn not_found(what: &str, id: &str) -> ApiError {
    ApiError::from_response(404, &format!("{} {} Not Found", what, id))
}

#[async_trait]
impl DokployApi for FakeApi {
    async fn create_database(
        &self,
        kind: DatabaseKind,
        request: &DatabaseCreate,
    ) -> Result<Database, ApiError> {
        self.record("create_database", format!("{}.create", kind))?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let family = kind.family();
        let db = Database {
            id: format!("{}-{}", kind, inner.next_id),
            kind: Some(kind),
            name: request.name.clone(),
            app_name: format!("{}{}", request.app_name, APP_NAME_SUFFIX),
            description: request.description.clone(),
            database_name: family
                .takes_schema_and_user()
                .then(|| request.database_name.clone()),
            database_user: family
                .takes_schema_and_user()
                .then(|| request.database_user.clone()),
            database_password: Some(request.database_password.clone()),
            database_root_password: request.database_root_password.clone(),
            docker_image: request.docker_image.clone(),
            server_id: request.server_id.clone(),
            environment_id: Some(request.environment_id.clone()),
            application_status: "idle".to_string(),
            replica_sets: family.takes_replica_sets().then_some(request.replica_sets),
            args: if request.args.is_empty() {
                inner.default_args.clone()
            } else {
                Some(request.args.clone())
            },
            ..Default::default()
        };
        inner.last_create = Some(request.clone());
        inner.databases.insert(db.id.clone(), db.clone());
        Ok(db)
    }

    async fn get_database(&self, id: &str, kind: DatabaseKind) -> Result<Database, ApiError> {
        self.record("get_database", format!("{}.one", kind))?;
        self.lock()
            .databases
            .get(id)
            .filter(|db| db.kind == Some(kind))
            .cloned()
            .ok_or_else(|| not_found(kind.as_str(), id))
    }

    async fn update_database(
        &self,
        id: &str,
        kind: DatabaseKind,
        request: &DatabaseUpdate,
    ) -> Result<Database, ApiError> {
        self.record("update_database", format!("{}.update", kind))?;
        let mut inner = self.lock();
        inner.last_update = Some(request.clone());
        let default_args = inner.default_args.clone();
        let db = inner
            .databases
            .get_mut(id)
            .filter(|db| db.kind == Some(kind))
            .ok_or_else(|| not_found(kind.as_str(), id))?;

        db.name = request.name.clone();
        db.description = request.description.clone();
        if request.database_password.is_some() {
            db.database_password = request.database_password.clone();
        }
        db.docker_image = request.docker_image.clone();
        db.env = request.env.clone();
        db.memory_reservation = request.memory_reservation.clone();
        db.memory_limit = request.memory_limit.clone();
        db.cpu_reservation = request.cpu_reservation.clone();
        db.cpu_limit = request.cpu_limit.clone();
        db.command = request.command.clone();
        db.replicas = request.replicas;
        db.stop_grace_period = request.stop_grace_period;
        db.args = if request.args.is_empty() {
            default_args
        } else {
            Some(request.args.clone())
        };
        Ok(db.clone())
    }

    async fn delete_database(&self, id: &str, kind: DatabaseKind) -> Result<(), ApiError> {
        self.record("delete_database", format!("{}.remove", kind))?;
        let mut inner = self.lock();
        let exists = inner
            .databases
            .get(id)
            .map_or(false, |db| db.kind == Some(kind));
        if !exists {
            return Err(not_found(kind.as_str(), id));
        }
        inner.databases.remove(id);
        Ok(())
    }

    async fn deploy_database(&self, id: &str, kind: DatabaseKind) -> Result<(), ApiError> {
        self.record("deploy_database", format!("{}.deploy", kind))?;
        let mut inner = self.lock();
        match inner.databases.get_mut(id) {
            Some(db) => {
                db.application_status = "running".to_string();
                Ok(())
            }
            None => Err(not_found(kind.as_str(), id)),
        }
    }

    async fn get_application(&self, id: &str) -> Result<Application, ApiError> {
        self.record("get_application", "application.one".to_string())?;
        self.lock()
            .applications
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Application", id))
    }

    async fn update_application_env(
        &self,
        id: &str,
        edit: &EnvEdit,
        create_env_file: Option<bool>,
    ) -> Result<(), ApiError> {
        self.record("update_application_env", "application.saveEnvironment".to_string())?;
        let mut inner = self.lock();
        let app = inner
            .applications
            .get_mut(id)
            .ok_or_else(|| not_found("Application", id))?;

        let current = envfile::parse(app.env.as_deref().unwrap_or_default())
            .map_err(|e| ApiError::decode(e.to_string()))?;
        let mut next = current.clone();
        edit.apply(&mut next);
        if next == current && create_env_file.is_none() {
            return Ok(());
        }
        let block = envfile::serialize(&next).map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
        app.env = Some(block);
        inner.env_writes += 1;
        inner.last_create_env_file = Some(create_env_file);
        Ok(())
    }
}
