use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ApiError;

// ─── Database Kinds ─────────────────────────────────────────────────────────

/// The database engines Dokploy provisions. Each one selects its own endpoint
/// family (`postgres.create`, `mysql.one`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Postgres,
    Mysql,
    Mariadb,
    Mongo,
    Redis,
}

/// Variant families. Shapes which optional fields a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Relational engine authenticated by a single user password.
    Relational,
    /// Relational engine that also takes a root password.
    RelationalWithRoot,
    /// Key-value store; password only, no schema or user.
    KeyValue,
    /// Document store with optional replica sets.
    Document,
}

impl Family {
    pub fn takes_root_password(self) -> bool {
        matches!(self, Family::RelationalWithRoot)
    }

    pub fn takes_replica_sets(self) -> bool {
        matches!(self, Family::Document)
    }

    pub fn takes_schema_and_user(self) -> bool {
        !matches!(self, Family::KeyValue)
    }
}

impl DatabaseKind {
    /// Probe order used when a tracked database has no recorded kind.
    pub const ALL: [DatabaseKind; 5] = [
        DatabaseKind::Postgres,
        DatabaseKind::Mysql,
        DatabaseKind::Mariadb,
        DatabaseKind::Mongo,
        DatabaseKind::Redis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Mariadb => "mariadb",
            DatabaseKind::Mongo => "mongo",
            DatabaseKind::Redis => "redis",
        }
    }

    pub fn family(self) -> Family {
        match self {
            DatabaseKind::Postgres => Family::Relational,
            DatabaseKind::Mysql | DatabaseKind::Mariadb => Family::RelationalWithRoot,
            DatabaseKind::Mongo => Family::Document,
            DatabaseKind::Redis => Family::KeyValue,
        }
    }

    /// Name of the identifier field in request and response bodies, e.g. `postgresId`.
    pub fn id_field(self) -> String {
        format!("{}Id", self.as_str())
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let expected: Vec<&str> = DatabaseKind::ALL.iter().map(|k| k.as_str()).collect();
                format!(
                    "unsupported database type '{}', expected one of: {}",
                    s,
                    expected.join(", ")
                )
            })
    }
}

// ─── Database ───────────────────────────────────────────────────────────────

/// A provisioned database as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Database {
    pub id: String,
    pub kind: Option<DatabaseKind>,
    pub name: String,
    pub app_name: String,
    pub description: Option<String>,
    pub database_name: Option<String>,
    pub database_user: Option<String>,
    pub database_password: Option<String>,
    pub database_root_password: Option<String>,
    pub docker_image: Option<String>,
    pub external_port: Option<i64>,
    pub server_id: Option<String>,
    pub environment_id: Option<String>,
    pub application_status: String,
    pub replica_sets: Option<bool>,
    pub env: Option<String>,
    pub memory_reservation: Option<String>,
    pub memory_limit: Option<String>,
    pub cpu_reservation: Option<String>,
    pub cpu_limit: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub replicas: Option<i64>,
    pub stop_grace_period: Option<i64>,
}

/// Wire shape shared by every engine; the id lives under a kind-specific key.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DatabaseRecord {
    name: Option<String>,
    app_name: Option<String>,
    description: Option<String>,
    database_name: Option<String>,
    database_user: Option<String>,
    database_password: Option<String>,
    database_root_password: Option<String>,
    docker_image: Option<String>,
    external_port: Option<i64>,
    server_id: Option<String>,
    environment_id: Option<String>,
    application_status: Option<String>,
    replica_sets: Option<bool>,
    env: Option<String>,
    memory_reservation: Option<String>,
    memory_limit: Option<String>,
    cpu_reservation: Option<String>,
    cpu_limit: Option<String>,
    command: Option<String>,
    args: Option<Vec<String>>,
    replicas: Option<i64>,
    stop_grace_period_swarm: Option<i64>,
}

impl Database {
    /// Decode a response body for the given kind.
    pub fn from_json(kind: DatabaseKind, value: serde_json::Value) -> Result<Self, ApiError> {
        let id_field = kind.id_field();
        let id = value
            .get(&id_field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ApiError::decode(format!("{} response is missing '{}'", kind, id_field)))?;

        let record: DatabaseRecord = serde_json::from_value(value)
            .map_err(|e| ApiError::decode(format!("{} response: {}", kind, e)))?;

        Ok(Self {
            id,
            kind: Some(kind),
            name: record.name.unwrap_or_default(),
            app_name: record.app_name.unwrap_or_default(),
            description: record.description,
            database_name: record.database_name,
            database_user: record.database_user,
            database_password: record.database_password,
            database_root_password: record.database_root_password,
            docker_image: record.docker_image,
            external_port: record.external_port,
            server_id: record.server_id,
            environment_id: record.environment_id,
            application_status: record.application_status.unwrap_or_default(),
            replica_sets: record.replica_sets,
            env: record.env,
            memory_reservation: record.memory_reservation,
            memory_limit: record.memory_limit,
            cpu_reservation: record.cpu_reservation,
            cpu_limit: record.cpu_limit,
            command: record.command,
            args: record.args,
            replicas: record.replicas,
            stop_grace_period: record.stop_grace_period_swarm,
        })
    }
}

/// Arguments for creating a database.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseCreate {
    pub environment_id: String,
    pub app_name: String,
    pub name: String,
    pub description: Option<String>,
    pub database_name: String,
    pub database_user: String,
    pub database_password: String,
    pub database_root_password: Option<String>,
    pub docker_image: Option<String>,
    pub server_id: Option<String>,
    pub replica_sets: bool,
    pub args: Vec<String>,
}

/// Mutable fields sent on update. Identity, kind and scoping fields are not
/// representable here; changing them requires a replacement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseUpdate {
    pub name: String,
    pub app_name: String,
    pub description: Option<String>,
    pub database_password: Option<String>,
    pub database_root_password: Option<String>,
    pub docker_image: Option<String>,
    pub server_id: Option<String>,
    pub replica_sets: bool,
    pub env: Option<String>,
    pub memory_reservation: Option<String>,
    pub memory_limit: Option<String>,
    pub cpu_reservation: Option<String>,
    pub cpu_limit: Option<String>,
    pub command: Option<String>,
    pub application_status: Option<String>,
    pub replicas: Option<i64>,
    pub stop_grace_period: Option<i64>,
    pub args: Vec<String>,
}

// ─── Application ────────────────────────────────────────────────────────────

/// The subset of a Dokploy application the environment reconciler needs.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub application_id: String,
    pub name: Option<String>,
    pub app_name: Option<String>,
    pub env: Option<String>,
}
