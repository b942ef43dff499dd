use anyhow::Context;
use std::process::ExitCode;

use atrium_shared::accounts;
use atrium_shared::config::{AdminSettings, StoreSettings};
use atrium_shared::store::MongoAccountStore;
use atrium_shared::types::ReconcileOutcome;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Admin bootstrap failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let admin = AdminSettings::from_env().context("loading admin settings")?;
    let settings = StoreSettings::from_env().context("loading store settings")?;

    let store = MongoAccountStore::connect(&settings)
        .await
        .context("connecting to credential store")?;

    // The pool is released on success and failure alike.
    let result = bootstrap(&store, &admin).await;
    store.disconnect().await;
    result
}

async fn bootstrap(store: &MongoAccountStore, admin: &AdminSettings) -> anyhow::Result<()> {
    store
        .ensure_indexes()
        .await
        .context("ensuring account indexes")?;

    let (profile, outcome) =
        accounts::ensure_admin_identity(store, &admin.email, &admin.password, &admin.name).await?;

    match outcome {
        ReconcileOutcome::Created => {
            tracing::info!("Admin account created: {}", profile.email);
        }
        ReconcileOutcome::ReconciledExisting => {
            tracing::info!(
                "Admin account already existed, password and status reset: {}",
                profile.email
            );
        }
    }

    println!("Admin account ready");
    println!("  email:  {}", profile.email);
    println!("  name:   {}", profile.name);
    println!("  role:   {}", profile.role);
    println!("  status: {}", profile.status);
    Ok(())
}
