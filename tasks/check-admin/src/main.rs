use anyhow::Context;
use std::process::ExitCode;

use atrium_shared::accounts;
use atrium_shared::config::{AdminSettings, StoreSettings};
use atrium_shared::error::IdentityError;
use atrium_shared::store::{CredentialStore, MongoAccountStore};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Admin check failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let admin = AdminSettings::from_env().context("loading admin settings")?;
    let settings = StoreSettings::from_env().context("loading store settings")?;

    let store = MongoAccountStore::connect(&settings)
        .await
        .context("connecting to credential store")?;

    let result = diagnose(&store, &admin).await;
    store.disconnect().await;
    result
}

/// Read-only diagnostic: reports on the target account without ever writing.
async fn diagnose(store: &MongoAccountStore, admin: &AdminSettings) -> anyhow::Result<ExitCode> {
    let total = store.count_all().await?;
    tracing::info!("Credential store holds {} account(s)", total);

    match accounts::verify_identity(store, &admin.email, &admin.password).await {
        Ok(report) => {
            println!("Account found: {}", admin.email);
            println!("  role:       {}", report.role);
            println!("  status:     {}", report.status);
            println!("  created at: {}", report.created_at.to_rfc3339());
            println!(
                "  password:   {}",
                if report.matched { "matches" } else { "does NOT match" }
            );
            if !report.matched {
                tracing::warn!("Stored hash does not verify; run seed-admin to reset it");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(IdentityError::NotFound) => {
            println!("No account found for {}", admin.email);
            let accounts = store.list_all().await?;
            if accounts.is_empty() {
                println!("The accounts collection is empty.");
            } else {
                println!("Existing accounts:");
                for account in accounts {
                    println!(
                        "  {} (role: {}, status: {})",
                        account.email, account.role, account.status
                    );
                }
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
