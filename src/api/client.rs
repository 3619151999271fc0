use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::error::ApiError;
use super::models::{Application, Database, DatabaseCreate, DatabaseKind, DatabaseUpdate};
use super::{DokployApi, EnvEdit};
use crate::config::ProviderConfig;
use crate::envfile;

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for the Dokploy API (`{host}/api/<router>.<procedure>`).
pub struct DokployClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DokployClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ApiError> {
        if api_key.is_empty() {
            return Err(ApiError::Config {
                message: "API key is empty".to_string(),
            });
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.host,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        debug!(endpoint, "GET");
        let resp = self
            .http
            .get(self.url(endpoint))
            .header(API_KEY_HEADER, &self.api_key)
            .query(query)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ApiError> {
        debug!(endpoint, "POST");
        let resp = self
            .http
            .post(self.url(endpoint))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        read_json(resp).await
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, ApiError> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_response(status.as_u16(), &text));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::decode(format!("invalid JSON body: {}", e)))
}

fn insert_opt<T: Into<Value>>(body: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        body.insert(key.to_string(), v.into());
    }
}

fn id_body(kind: DatabaseKind, id: &str) -> Value {
    let mut body = Map::new();
    body.insert(kind.id_field(), json!(id));
    Value::Object(body)
}

fn create_body(kind: DatabaseKind, req: &DatabaseCreate) -> Value {
    let family = kind.family();
    let mut body = Map::new();
    body.insert("environmentId".into(), json!(req.environment_id));
    body.insert("name".into(), json!(req.name));
    body.insert("appName".into(), json!(req.app_name));
    body.insert("databasePassword".into(), json!(req.database_password));
    insert_opt(&mut body, "description", req.description.clone());
    insert_opt(&mut body, "dockerImage", req.docker_image.clone());
    insert_opt(&mut body, "serverId", req.server_id.clone());
    if family.takes_schema_and_user() {
        body.insert("databaseName".into(), json!(req.database_name));
        body.insert("databaseUser".into(), json!(req.database_user));
    }
    if family.takes_root_password() {
        body.insert(
            "databaseRootPassword".into(),
            json!(req.database_root_password.clone().unwrap_or_default()),
        );
    }
    if family.takes_replica_sets() {
        body.insert("replicaSets".into(), json!(req.replica_sets));
    }
    if !req.args.is_empty() {
        body.insert("args".into(), json!(req.args));
    }
    Value::Object(body)
}

fn update_body(id: &str, kind: DatabaseKind, req: &DatabaseUpdate) -> Value {
    let family = kind.family();
    let mut body = Map::new();
    body.insert(kind.id_field(), json!(id));
    body.insert("name".into(), json!(req.name));
    body.insert("appName".into(), json!(req.app_name));
    body.insert("args".into(), json!(req.args));
    insert_opt(&mut body, "description", req.description.clone());
    insert_opt(&mut body, "databasePassword", req.database_password.clone());
    insert_opt(&mut body, "dockerImage", req.docker_image.clone());
    insert_opt(&mut body, "serverId", req.server_id.clone());
    insert_opt(&mut body, "env", req.env.clone());
    insert_opt(&mut body, "memoryReservation", req.memory_reservation.clone());
    insert_opt(&mut body, "memoryLimit", req.memory_limit.clone());
    insert_opt(&mut body, "cpuReservation", req.cpu_reservation.clone());
    insert_opt(&mut body, "cpuLimit", req.cpu_limit.clone());
    insert_opt(&mut body, "command", req.command.clone());
    insert_opt(&mut body, "applicationStatus", req.application_status.clone());
    insert_opt(&mut body, "replicas", req.replicas);
    insert_opt(&mut body, "stopGracePeriodSwarm", req.stop_grace_period);
    if family.takes_root_password() {
        insert_opt(
            &mut body,
            "databaseRootPassword",
            req.database_root_password.clone(),
        );
    }
    if family.takes_replica_sets() {
        body.insert("replicaSets".into(), json!(req.replica_sets));
    }
    Value::Object(body)
}

#[async_trait]
impl DokployApi for DokployClient {
    async fn create_database(
        &self,
        kind: DatabaseKind,
        request: &DatabaseCreate,
    ) -> Result<Database, ApiError> {
        let resp = self
            .post(&format!("{}.create", kind), &create_body(kind, request))
            .await?;
        let db = Database::from_json(kind, resp)?;
        info!(kind = %kind, id = %db.id, "Database created");
        Ok(db)
    }

    async fn get_database(&self, id: &str, kind: DatabaseKind) -> Result<Database, ApiError> {
        let id_field = kind.id_field();
        let resp = self
            .get(&format!("{}.one", kind), &[(id_field.as_str(), id)])
            .await?;
        if resp.is_null() {
            return Err(ApiError::not_found(format!("{} {} Not Found", kind, id)));
        }
        Database::from_json(kind, resp)
    }

    async fn update_database(
        &self,
        id: &str,
        kind: DatabaseKind,
        request: &DatabaseUpdate,
    ) -> Result<Database, ApiError> {
        let resp = self
            .post(&format!("{}.update", kind), &update_body(id, kind, request))
            .await?;
        info!(kind = %kind, id, "Database updated");

        // Some API versions answer update with a bare `true`.
        if resp.get(kind.id_field()).is_some() {
            Database::from_json(kind, resp)
        } else {
            self.get_database(id, kind).await
        }
    }

    async fn delete_database(&self, id: &str, kind: DatabaseKind) -> Result<(), ApiError> {
        self.post(&format!("{}.remove", kind), &id_body(kind, id))
            .await?;
        info!(kind = %kind, id, "Database removed");
        Ok(())
    }

    async fn deploy_database(&self, id: &str, kind: DatabaseKind) -> Result<(), ApiError> {
        self.post(&format!("{}.deploy", kind), &id_body(kind, id))
            .await?;
        info!(kind = %kind, id, "Database deploy triggered");
        Ok(())
    }

    async fn get_application(&self, id: &str) -> Result<Application, ApiError> {
        let resp = self
            .get("application.one", &[("applicationId", id)])
            .await?;
        if resp.is_null() {
            return Err(ApiError::not_found(format!("Application {} Not Found", id)));
        }
        serde_json::from_value(resp)
            .map_err(|e| ApiError::decode(format!("application response: {}", e)))
    }

    async fn update_application_env(
        &self,
        id: &str,
        edit: &EnvEdit,
        create_env_file: Option<bool>,
    ) -> Result<(), ApiError> {
        let app = self.get_application(id).await?;
        let current = envfile::parse(app.env.as_deref().unwrap_or_default())
            .map_err(|e| ApiError::decode(format!("application {} env: {}", id, e)))?;

        let mut next = current.clone();
        edit.apply(&mut next);
        // The env-file flag is only carried by a write, so a hint forces one.
        if next == current && create_env_file.is_none() {
            debug!(application_id = id, edit = edit.name(), "Environment unchanged, skipping write");
            return Ok(());
        }
        let block = envfile::serialize(&next).map_err(|e| ApiError::InvalidRequest {
            message: format!("application {} env: {}", id, e),
        })?;

        let mut body = Map::new();
        body.insert("applicationId".into(), json!(id));
        body.insert("env".into(), json!(block));
        insert_opt(&mut body, "createEnvFile", create_env_file);
        self.post("application.saveEnvironment", &Value::Object(body))
            .await?;

        info!(
            application_id = id,
            edit = edit.name(),
            keys = next.len(),
            "Application environment saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> DatabaseCreate {
        DatabaseCreate {
            environment_id: "env-1".into(),
            app_name: "cache".into(),
            name: "cache".into(),
            database_name: "db".into(),
            database_user: "user".into(),
            database_password: "pw".into(),
            database_root_password: Some("root".into()),
            replica_sets: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_body_shaped_by_family() {
        let req = create_request();

        let redis = create_body(DatabaseKind::Redis, &req);
        assert!(redis.get("databaseName").is_none());
        assert!(redis.get("databaseRootPassword").is_none());
        assert!(redis.get("replicaSets").is_none());
        assert!(redis.get("args").is_none());

        let mysql = create_body(DatabaseKind::Mysql, &req);
        assert_eq!(mysql["databaseRootPassword"], "root");
        assert_eq!(mysql["databaseUser"], "user");

        let mongo = create_body(DatabaseKind::Mongo, &req);
        assert_eq!(mongo["replicaSets"], true);
        assert!(mongo.get("databaseRootPassword").is_none());
    }

    #[test]
    fn test_update_body_addresses_by_kind_id() {
        let req = DatabaseUpdate {
            name: "orders".into(),
            app_name: "orders-app".into(),
            replicas: Some(2),
            memory_limit: Some("512M".into()),
            ..Default::default()
        };
        let body = update_body("pg-1", DatabaseKind::Postgres, &req);
        assert_eq!(body["postgresId"], "pg-1");
        assert_eq!(body["replicas"], 2);
        assert_eq!(body["memoryLimit"], "512M");
        assert_eq!(body["args"], json!([]));
        assert!(body.get("cpuLimit").is_none());
        assert!(body.get("replicaSets").is_none());
    }

    #[test]
    fn test_new_rejects_empty_api_key() {
        let err = DokployClient::new("https://dokploy.test", "", Duration::from_secs(5));
        assert!(matches!(err, Err(ApiError::Config { .. })));
    }
}
