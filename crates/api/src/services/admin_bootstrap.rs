//! Creates the first admin account on startup when configured.

use persistence::entities::{UserRoleDb, UserStatusDb};
use persistence::repositories::{NewUser, UserRepository};
use shared::password::{hash_password, PasswordError};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::AdminBootstrapConfig;

/// Error types for admin bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordError),
}

/// Bootstrap the admin user if configured and no admin exists yet.
///
/// Idempotent: returns `Ok(false)` when nothing was created.
pub async fn bootstrap_admin(
    pool: &PgPool,
    config: &AdminBootstrapConfig,
) -> Result<bool, BootstrapError> {
    let Some((email, password)) = config.credentials() else {
        if config.bootstrap_email.is_some() {
            warn!("GG__ADMIN__BOOTSTRAP_EMAIL is set without a password - skipping bootstrap");
        }
        return Ok(false);
    };

    let email = email.trim().to_lowercase();
    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;

    if UserRepository::admin_exists(&mut *tx).await?
        || UserRepository::email_exists(&mut *tx, &email).await?
    {
        info!("Admin user or bootstrap email already exists - skipping bootstrap");
        return Ok(false);
    }

    let admin = UserRepository::insert(
        &mut *tx,
        &NewUser {
            name: &config.bootstrap_name,
            email: &email,
            password_hash: &password_hash,
            contact: None,
            role: UserRoleDb::Admin,
            status: UserStatusDb::Active,
            invite_code: None,
            referred_by: None,
        },
    )
    .await?;

    tx.commit().await?;

    info!(email = %email, user_id = %admin.id, "Bootstrap admin user created");
    warn!(
        "SECURITY: Remove GG__ADMIN__BOOTSTRAP_EMAIL and GG__ADMIN__BOOTSTRAP_PASSWORD \
         from configuration after initial setup"
    );

    Ok(true)
}
