//! Account lookups feeding the token issuer

use crate::error::{ApiError, Result};
use crate::models::{Account, AccountStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use jwt_security::Roles;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Match on username, or on email ignoring case
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, account_id: &str) -> Result<Option<Account>>;
}

/// Account database record
#[derive(Debug, Clone, sqlx::FromRow)]
struct AccountRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    status: String,
    roles: Vec<String>,
}

impl TryFrom<AccountRecord> for Account {
    type Error = ApiError;

    fn try_from(record: AccountRecord) -> Result<Self> {
        let status = record
            .status
            .parse::<AccountStatus>()
            .map_err(ApiError::Database)?;

        Ok(Account {
            id: record.id.to_string(),
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            status,
            roles: Roles::new(record.roles),
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, status, roles";

pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE username = $1 OR LOWER(email) = LOWER($1) \
             LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Account::try_from).transpose()
    }

    async fn find_by_id(&self, account_id: &str) -> Result<Option<Account>> {
        // Ids that are not UUIDs cannot exist in this table
        let Ok(id) = Uuid::parse_str(account_id) else {
            return Ok(None);
        };

        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Account::try_from).transpose()
    }
}

/// Directory held in memory, keyed by account id
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: DashMap<String, Account>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn set_status(&self, account_id: &str, status: AccountStatus) -> bool {
        match self.accounts.get_mut(account_id) {
            Some(mut account) => {
                account.status = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| {
                entry.username == identifier || entry.email.eq_ignore_ascii_case(identifier)
            })
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(account_id).map(|entry| entry.value().clone()))
    }
}
