use async_trait::async_trait;
use bson::{doc, Regex};
use chrono::Utc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use std::time::Duration;

use crate::config::StoreSettings;
use crate::error::StoreError;
use crate::types::{Account, NewAccount};

pub const ACCOUNTS_COLLECTION: &str = "accounts";

/// Single-document operations the identity code needs from the store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Anchored, fully case-insensitive equality match on the email field.
    async fn find_by_email_case_insensitive(
        &self,
        email: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Insert a new record; the store stamps both timestamps and assigns the
    /// id. Fails with DuplicateKey if the unique email constraint is violated.
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Persist a mutated record; the store stamps updated_at.
    async fn update(&self, account: &Account) -> Result<Account, StoreError>;

    async fn count_all(&self) -> Result<u64, StoreError>;

    async fn list_all(&self) -> Result<Vec<Account>, StoreError>;
}

/// Account store backed by a MongoDB collection.
pub struct MongoAccountStore {
    client: Client,
    accounts: Collection<Account>,
}

impl MongoAccountStore {
    /// Connect and ping the deployment so an unreachable store fails here,
    /// not halfway through an operation.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&settings.uri)
            .await
            .map_err(StoreError::Unavailable)?;

        // Options in the connection string win; env-supplied defaults fill
        // whatever the URI leaves unset.
        options.max_pool_size.get_or_insert(settings.max_pool_size);
        options
            .server_selection_timeout
            .get_or_insert(Duration::from_millis(settings.server_selection_timeout_ms));
        options
            .max_idle_time
            .get_or_insert(Duration::from_millis(settings.socket_idle_timeout_ms));

        let client = Client::with_options(options).map_err(StoreError::Unavailable)?;
        let database = client.database(&settings.database);
        if let Err(e) = database.run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(classify(e));
        }

        tracing::info!("Connected to credential store, database {}", settings.database);

        let accounts = database.collection::<Account>(ACCOUNTS_COLLECTION);
        Ok(Self { client, accounts })
    }

    /// Unique index on email, the serialization point for concurrent creates.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.accounts.create_index(index).await.map_err(classify)?;
        Ok(())
    }

    /// Close the connection pool. Callers run this on every exit path.
    pub async fn disconnect(self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl CredentialStore for MongoAccountStore {
    async fn find_by_email_case_insensitive(
        &self,
        email: &str,
    ) -> Result<Option<Account>, StoreError> {
        let filter = doc! { "email": anchored_case_insensitive(email) };
        self.accounts.find_one(filter).await.map_err(classify)
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let now = Utc::now();
        let mut record = Account {
            id: None,
            email: account.email,
            name: account.name,
            password_hash: account.password_hash,
            role: account.role,
            status: account.status,
            created_at: now,
            updated_at: now,
        };
        let result = self.accounts.insert_one(&record).await.map_err(classify)?;
        record.id = result.inserted_id.as_object_id();
        Ok(record)
    }

    async fn update(&self, account: &Account) -> Result<Account, StoreError> {
        let filter = match account.id {
            Some(id) => doc! { "_id": id },
            None => doc! { "email": account.email.as_str() },
        };
        let now = Utc::now();
        let update = doc! { "$set": {
            "email": account.email.as_str(),
            "name": account.name.as_str(),
            "password_hash": account.password_hash.as_str(),
            "role": account.role.to_string(),
            "status": account.status.to_string(),
            "updated_at": bson::DateTime::from_chrono(now),
        }};

        let result = self
            .accounts
            .update_one(filter, update)
            .await
            .map_err(classify)?;
        if result.matched_count == 0 {
            tracing::warn!("Update matched no record for {}", account.email);
        }

        let mut updated = account.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        self.accounts
            .count_documents(doc! {})
            .await
            .map_err(classify)
    }

    async fn list_all(&self) -> Result<Vec<Account>, StoreError> {
        let mut cursor = self.accounts.find(doc! {}).await.map_err(classify)?;
        let mut accounts = Vec::new();
        while cursor.advance().await.map_err(classify)? {
            accounts.push(cursor.deserialize_current().map_err(classify)?);
        }
        Ok(accounts)
    }
}

/// Build the anchored, case-insensitive pattern for an email lookup.
/// Escaping keeps this an equality match, never a substring or wildcard scan.
fn anchored_case_insensitive(email: &str) -> Regex {
    Regex {
        pattern: format!("^{}$", regex::escape(email)),
        options: "i".to_string(),
    }
}

fn classify(err: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::DuplicateKey
    } else if matches!(
        *err.kind,
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_)
    ) {
        StoreError::Codec(err)
    } else {
        StoreError::Unavailable(err)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

/// In-memory store used by unit tests. Each operation is atomic, matching
/// the single-document guarantees of the real adapter.
#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use bson::oid::ObjectId;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryAccountStore {
        accounts: Mutex<Vec<Account>>,
    }

    #[async_trait]
    impl CredentialStore for MemoryAccountStore {
        async fn find_by_email_case_insensitive(
            &self,
            email: &str,
        ) -> Result<Option<Account>, StoreError> {
            let accounts = self.accounts.lock().unwrap();
            Ok(accounts
                .iter()
                .find(|a| a.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts
                .iter()
                .any(|a| a.email.eq_ignore_ascii_case(&account.email))
            {
                return Err(StoreError::DuplicateKey);
            }
            let now = Utc::now();
            let record = Account {
                id: Some(ObjectId::new()),
                email: account.email,
                name: account.name,
                password_hash: account.password_hash,
                role: account.role,
                status: account.status,
                created_at: now,
                updated_at: now,
            };
            accounts.push(record.clone());
            Ok(record)
        }

        async fn update(&self, account: &Account) -> Result<Account, StoreError> {
            let mut accounts = self.accounts.lock().unwrap();
            let mut updated = account.clone();
            updated.updated_at = Utc::now();
            if let Some(slot) = accounts.iter_mut().find(|a| a.id == account.id) {
                *slot = updated.clone();
            }
            Ok(updated)
        }

        async fn count_all(&self) -> Result<u64, StoreError> {
            Ok(self.accounts.lock().unwrap().len() as u64)
        }

        async fn list_all(&self) -> Result<Vec<Account>, StoreError> {
            Ok(self.accounts.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryAccountStore;
    use super::*;
    use crate::types::{AccountStatus, Role};

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            role: Role::Admin,
            status: AccountStatus::Active,
        }
    }

    #[test]
    fn test_anchored_pattern_escapes_metacharacters() {
        let regex = anchored_case_insensitive("ops+admin@x.com");
        assert_eq!(regex.pattern, r"^ops\+admin@x\.com$");
        assert_eq!(regex.options, "i");
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_email() {
        let store = MemoryAccountStore::default();
        store.insert(new_account("a@b.com")).await.unwrap();
        let err = store.insert(new_account("A@B.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
        assert_eq!(store.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_finds_case_insensitively() {
        let store = MemoryAccountStore::default();
        store.insert(new_account("Admin@X.com")).await.unwrap();
        let found = store
            .find_by_email_case_insensitive("admin@x.com")
            .await
            .unwrap();
        assert_eq!(found.unwrap().email, "Admin@X.com");
    }

    #[tokio::test]
    async fn test_memory_store_update_stamps_updated_at() {
        let store = MemoryAccountStore::default();
        let created = store.insert(new_account("a@b.com")).await.unwrap();
        let mut changed = created.clone();
        changed.name = "Renamed".to_string();
        let updated = store.update(&changed).await.unwrap();
        assert!(updated.updated_at >= created.updated_at);
        let listed = store.list_all().await.unwrap();
        assert_eq!(listed[0].name, "Renamed");
    }
}
