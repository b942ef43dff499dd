use crate::auth;
use crate::error::{IdentityError, StoreError};
use crate::store::CredentialStore;
use crate::types::{
    Account, AccountProfile, AccountStatus, IdentityReport, NewAccount, ReconcileOutcome, Role,
    Session,
};

/// Converge the store on exactly one admin account for the given email:
/// create it if absent, otherwise reset password, role, status and name.
/// Repeated calls are idempotent with respect to final state, though every
/// call rehashes the password.
pub async fn ensure_admin_identity<S: CredentialStore>(
    store: &S,
    email: &str,
    password: &str,
    name: &str,
) -> Result<(AccountProfile, ReconcileOutcome), IdentityError> {
    let email = require_credentials(email, password)?;

    match store.find_by_email_case_insensitive(email).await? {
        Some(account) => {
            let profile = reconcile_existing(store, account, password, name).await?;
            Ok((profile, ReconcileOutcome::ReconciledExisting))
        }
        None => {
            let fresh = NewAccount {
                email: email.to_string(),
                name: name.to_string(),
                password_hash: auth::hash_password(password)?,
                role: Role::Admin,
                status: AccountStatus::Active,
            };
            match store.insert(fresh).await {
                Ok(created) => {
                    tracing::info!("Created admin account for {}", created.email);
                    Ok((created.profile(), ReconcileOutcome::Created))
                }
                Err(StoreError::DuplicateKey) => {
                    // Another writer created this email between our lookup and
                    // insert; converge on their record instead.
                    tracing::warn!("Lost creation race for {}, falling back to update", email);
                    match store.find_by_email_case_insensitive(email).await? {
                        Some(account) => {
                            let profile =
                                reconcile_existing(store, account, password, name).await?;
                            Ok((profile, ReconcileOutcome::ReconciledExisting))
                        }
                        None => Err(IdentityError::Conflict),
                    }
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

async fn reconcile_existing<S: CredentialStore>(
    store: &S,
    mut account: Account,
    password: &str,
    name: &str,
) -> Result<AccountProfile, IdentityError> {
    account.password_hash = auth::hash_password(password)?;
    account.role = Role::Admin;
    account.status = AccountStatus::Active;
    account.name = name.to_string();

    let updated = store.update(&account).await?;
    tracing::info!("Reconciled existing account for {}", updated.email);
    Ok(updated.profile())
}

/// Read-only identity check: does the stored hash verify against the given
/// password? Never mutates the record, whatever the outcome.
pub async fn verify_identity<S: CredentialStore>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<IdentityReport, IdentityError> {
    let email = require_credentials(email, password)?;

    let account = store
        .find_by_email_case_insensitive(email)
        .await?
        .ok_or(IdentityError::NotFound)?;

    let matched = auth::verify_password(password, &account.password_hash)?;
    Ok(IdentityReport {
        matched,
        role: account.role,
        status: account.status,
        created_at: account.created_at,
    })
}

/// Read-only login: verify the password, require an active account and issue
/// a signed session token.
pub async fn authenticate<S: CredentialStore>(
    store: &S,
    email: &str,
    password: &str,
    session_secret: &str,
    session_ttl_secs: i64,
) -> Result<Session, IdentityError> {
    let email = require_credentials(email, password)?;

    let account = store
        .find_by_email_case_insensitive(email)
        .await?
        .ok_or(IdentityError::NotFound)?;

    if !auth::verify_password(password, &account.password_hash)? {
        return Err(IdentityError::Unauthorized);
    }
    if account.status != AccountStatus::Active {
        return Err(IdentityError::Unauthorized);
    }

    let token =
        auth::issue_session_token(&account.email, account.role, session_secret, session_ttl_secs)?;
    Ok(Session {
        token,
        profile: account.profile(),
    })
}

fn require_credentials<'a>(email: &'a str, password: &str) -> Result<&'a str, IdentityError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(IdentityError::Validation("email must not be empty".into()));
    }
    if password.is_empty() {
        return Err(IdentityError::Validation(
            "password must not be empty".into(),
        ));
    }
    Ok(email)
}
