use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ========== ACCOUNT ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Stored account document. The email is the unique key, matched
/// case-insensitively everywhere.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,     // admin | user
    pub status: AccountStatus, // active | inactive
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Hash-free projection safe to return and display.
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Fields a caller supplies for a new account; the store assigns the id and
/// both timestamps on insert.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
}

#[derive(Debug, Serialize, Clone)]
pub struct AccountProfile {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

// ========== RECONCILIATION ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    ReconciledExisting,
}

/// Result of the read-only identity check.
#[derive(Debug, Clone)]
pub struct IdentityReport {
    pub matched: bool,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

// ========== SESSION ==========
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub profile: AccountProfile,
}
