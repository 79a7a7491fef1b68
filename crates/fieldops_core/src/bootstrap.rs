//! Session check and profile bootstrap after sign-in.

use crate::{AuditError, Result, Services};
use fieldops_backend::{AuthSession, BackendError};
use fieldops_protocol::{Role, User};
use std::time::Duration;

/// The current session, treating a slow or failed check as signed out.
pub async fn check_session(services: &Services) -> Option<AuthSession> {
    let grace = Duration::from_millis(services.config.bootstrap.auth_grace_ms);
    match tokio::time::timeout(grace, services.auth.current_session()).await {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Session check failed, treating as signed out");
            None
        }
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "Session check timed out");
            None
        }
    }
}

/// Sign in with a password and set up the profile.
pub async fn sign_in(services: &Services, email: &str, password: &str) -> Result<User> {
    let session = services
        .auth
        .sign_in_with_password(email, password)
        .await?;
    bootstrap_profile(services, &session).await
}

/// Load the signed-in user's profile, creating a default one when missing.
///
/// Any failure signs out locally.
pub async fn bootstrap_profile(services: &Services, session: &AuthSession) -> Result<User> {
    match load_or_provision(services, session).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, role = user.role.as_str(), "Session ready");
            Ok(user)
        }
        Err(e) => {
            tracing::error!(user_id = %session.user_id, error = %e, "Failed to set up session");
            if let Err(sign_out) = services.auth.sign_out_local().await {
                tracing::warn!(error = %sign_out, "Local sign-out failed");
            }
            Err(AuditError::SessionSetup(format!(
                "{}\nPlease check the database permissions or try again.",
                e
            )))
        }
    }
}

async fn load_or_provision(
    services: &Services,
    session: &AuthSession,
) -> std::result::Result<User, BackendError> {
    if let Some(user) = fetch_with_retry(services, session).await? {
        return Ok(user);
    }

    tracing::warn!(user_id = %session.user_id, "Profile not found, creating one");
    let profile = User {
        id: session.user_id.clone(),
        name: None,
        email: session.email.clone().unwrap_or_default(),
        role: Role::Auditor,
        avatar_url: None,
        location: None,
    };
    services.db.insert_user(&profile).await
}

/// `Ok(None)` when the profile is still missing after every attempt.
async fn fetch_with_retry(
    services: &Services,
    session: &AuthSession,
) -> std::result::Result<Option<User>, BackendError> {
    let settings = &services.config.bootstrap;
    let attempts = settings.attempts.max(1);
    let mut last_transient = None;

    for attempt in 0..attempts {
        match services.db.get_user(&session.user_id).await {
            Ok(user) => return Ok(Some(user)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(attempt = attempt + 1, "Profile not found yet");
                last_transient = None;
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(attempt = attempt + 1, error = %e, "Profile fetch failed, retrying");
                last_transient = Some(e);
            }
            Err(e) => return Err(e),
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(retry_delay(settings.base_delay_ms, attempt)).await;
        }
    }

    match last_transient {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

/// Linear backoff: the wait after attempt `attempt` (0-based).
fn retry_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_delay_ms.saturating_mul(u64::from(attempt) + 1))
}
