//! Shared setup for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use fieldops_core::{AuditFlow, FixedClock, Services};
use fieldops_protocol::{
    AppConfig, Checklist, ChecklistItem, ChecklistStatus, ChecklistTemplate, NewChecklist, User,
};
use fieldops_session::{MemoryKeyStore, SessionStore};
use fieldops_test_utils::MemoryBackend;
use std::sync::Arc;

/// 2024-03-01 09:30 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

pub fn services(backend: &MemoryBackend) -> Services {
    services_with(backend, AppConfig::default())
}

pub fn services_with(backend: &MemoryBackend, config: AppConfig) -> Services {
    Services::new(
        backend.db(),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        config,
    )
    .with_clock(Arc::new(FixedClock(now())))
}

pub async fn seed_user(services: &Services, user: &User) -> User {
    services.db.insert_user(user).await.unwrap()
}

/// Insert one pending checklist built from `template`.
pub async fn assign(
    services: &Services,
    template: &ChecklistTemplate,
    auditor: &User,
    location: &str,
) -> Checklist {
    let planned = NewChecklist {
        title: template.title.clone(),
        location: Some(location.to_string()),
        assigned_to: auditor.id.clone(),
        due_date: now().date_naive(),
        status: ChecklistStatus::Pending,
        items: template
            .items
            .iter()
            .cloned()
            .map(ChecklistItem::from_definition)
            .collect(),
    };
    services
        .db
        .insert_checklists(&[planned])
        .await
        .unwrap()
        .remove(0)
}

pub fn session_store() -> SessionStore {
    SessionStore::new(Arc::new(MemoryKeyStore::unbounded()))
}

pub fn open_flow(services: &Services, checklist: Checklist, session: SessionStore) -> AuditFlow {
    AuditFlow::open(
        checklist,
        session,
        services.config.findings,
        services.clock.clone(),
    )
    .unwrap()
}
