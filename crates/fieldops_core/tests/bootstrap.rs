mod common;

use common::{seed_user, services, services_with};
use fieldops_backend::{AuthSession, BackendError, Table};
use fieldops_core::{bootstrap_profile, check_session, sign_in, AuditError};
use fieldops_ids::UserId;
use fieldops_protocol::{AppConfig, Role};
use fieldops_test_utils::fixtures::user;
use fieldops_test_utils::{FailureKind, MemoryBackend, Operation};
use std::time::Duration;

fn session_for(id: &UserId, email: &str) -> AuthSession {
    AuthSession {
        access_token: "token".into(),
        user_id: id.clone(),
        email: Some(email.to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_existing_profile_is_loaded() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let admin = seed_user(&services, &user(Role::Admin, "Rina")).await;
    backend.sign_in_as(admin.id.clone(), &admin.email);

    let session = check_session(&services).await.unwrap();
    let loaded = bootstrap_profile(&services, &session).await.unwrap();

    assert_eq!(loaded, admin);
    assert!(backend.is_signed_in());
}

#[tokio::test(start_paused = true)]
async fn test_missing_profile_is_provisioned_as_auditor() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let id = UserId::new();

    let loaded = bootstrap_profile(&services, &session_for(&id, "new@fieldops.test"))
        .await
        .unwrap();

    assert_eq!(loaded.id, id);
    assert_eq!(loaded.role, Role::Auditor);
    assert_eq!(loaded.email, "new@fieldops.test");
    assert_eq!(loaded.name, None);
    assert_eq!(backend.rows_in(Table::Users).len(), 1);
    // One read per attempt before giving up and inserting.
    assert_eq!(backend.select_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;
    backend.fail_next(Operation::Select, 2, FailureKind::Status(503));

    let loaded = bootstrap_profile(&services, &session_for(&auditor.id, &auditor.email))
        .await
        .unwrap();

    assert_eq!(loaded.id, auditor.id);
    assert_eq!(backend.rows_in(Table::Users).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_on_last_attempt_signs_out() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;
    backend.sign_in_as(auditor.id.clone(), &auditor.email);
    backend.fail_next(Operation::Select, 3, FailureKind::Unavailable);

    let err = bootstrap_profile(&services, &session_for(&auditor.id, &auditor.email))
        .await
        .unwrap_err();

    let AuditError::SessionSetup(message) = err else {
        panic!("expected a session setup error");
    };
    assert!(message.ends_with("Please check the database permissions or try again."));
    assert!(!backend.is_signed_in());
    // The profile was not replaced by a provisioned one.
    assert_eq!(backend.rows_in(Table::Users).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_permission_error_fails_without_retrying() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let id = UserId::new();
    backend.sign_in_as(id.clone(), "x@fieldops.test");
    backend.fail_next(Operation::Select, 1, FailureKind::Status(403));

    let err = bootstrap_profile(&services, &session_for(&id, "x@fieldops.test"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuditError::SessionSetup(_)));
    assert_eq!(backend.select_count(), 0);
    assert!(backend.rows_in(Table::Users).is_empty());
    assert!(!backend.is_signed_in());
}

#[tokio::test(start_paused = true)]
async fn test_slow_session_check_counts_as_signed_out() {
    let backend = MemoryBackend::new();
    let mut config = AppConfig::default();
    config.bootstrap.auth_grace_ms = 200;
    let services = services_with(&backend, config);
    backend.sign_in_as(UserId::new(), "slow@fieldops.test");
    backend.delay_session_check(Duration::from_secs(5));

    assert!(check_session(&services).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_session_check_counts_as_signed_out() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    backend.sign_in_as(UserId::new(), "a@fieldops.test");
    backend.fail_next(Operation::CurrentSession, 1, FailureKind::Unavailable);

    assert!(check_session(&services).await.is_none());
    assert!(check_session(&services).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_checks_credentials_then_loads_profile() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;
    backend.add_login(&auditor.email, "hunter2", auditor.id.clone());

    let err = sign_in(&services, &auditor.email, "wrong").await.unwrap_err();
    assert!(matches!(err, AuditError::Backend(BackendError::Unauthorized(_))));
    assert!(!backend.is_signed_in());

    let loaded = sign_in(&services, &auditor.email, "hunter2").await.unwrap();
    assert_eq!(loaded.id, auditor.id);
    assert!(backend.is_signed_in());
}
