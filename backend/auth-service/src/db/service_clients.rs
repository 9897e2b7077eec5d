//! Service client registry for the client-credentials grant

use crate::error::Result;
use crate::models::ServiceClient;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;

#[async_trait]
pub trait ServiceClientRepository: Send + Sync {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ServiceClient>>;

    /// Insert unless the client id is already registered.
    ///
    /// Returns whether a row was written; existing clients are left untouched.
    async fn insert_if_absent(&self, client: &ServiceClient) -> Result<bool>;
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ServiceClientRecord {
    client_id: String,
    secret_hash: String,
    allowed_scopes: Vec<String>,
    enabled: bool,
}

impl From<ServiceClientRecord> for ServiceClient {
    fn from(record: ServiceClientRecord) -> Self {
        ServiceClient {
            client_id: record.client_id,
            secret_hash: record.secret_hash,
            allowed_scopes: record.allowed_scopes.into_iter().collect(),
            enabled: record.enabled,
        }
    }
}

pub struct PgServiceClientRepository {
    pool: PgPool,
}

impl PgServiceClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceClientRepository for PgServiceClientRepository {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ServiceClient>> {
        let record = sqlx::query_as::<_, ServiceClientRecord>(
            "SELECT client_id, secret_hash, allowed_scopes, enabled \
             FROM service_clients WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(ServiceClient::from))
    }

    async fn insert_if_absent(&self, client: &ServiceClient) -> Result<bool> {
        let scopes: Vec<String> = client.allowed_scopes.iter().cloned().collect();
        let result = sqlx::query(
            r#"
            INSERT INTO service_clients (client_id, secret_hash, allowed_scopes, enabled)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (client_id) DO NOTHING
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.secret_hash)
        .bind(&scopes)
        .bind(client.enabled)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Default)]
pub struct InMemoryServiceClientRepository {
    clients: DashMap<String, ServiceClient>,
}

impl InMemoryServiceClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, client_id: &str, enabled: bool) -> bool {
        match self.clients.get_mut(client_id) {
            Some(mut client) => {
                client.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ServiceClientRepository for InMemoryServiceClientRepository {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ServiceClient>> {
        Ok(self.clients.get(client_id).map(|entry| entry.value().clone()))
    }

    async fn insert_if_absent(&self, client: &ServiceClient) -> Result<bool> {
        match self.clients.entry(client.client_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(secret_hash: &str) -> ServiceClient {
        ServiceClient {
            client_id: "billing-service".into(),
            secret_hash: secret_hash.into(),
            allowed_scopes: ["ledger.read".to_string()].into(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let repo = InMemoryServiceClientRepository::new();
        assert!(repo.insert_if_absent(&client("first")).await.unwrap());
        assert!(!repo.insert_if_absent(&client("second")).await.unwrap());

        let stored = repo
            .find_by_client_id("billing-service")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.secret_hash, "first");
    }

    #[tokio::test]
    async fn test_disable_client() {
        let repo = InMemoryServiceClientRepository::new();
        repo.insert_if_absent(&client("hash")).await.unwrap();
        assert!(repo.set_enabled("billing-service", false));

        let stored = repo
            .find_by_client_id("billing-service")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.enabled);
        assert!(repo.find_by_client_id("unknown").await.unwrap().is_none());
    }
}
