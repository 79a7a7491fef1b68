//! Typed repository behaviour over the in-memory store.

use fieldops_backend::{BackendError, Table};
use fieldops_ids::{ChecklistId, ItemId, UserId};
use fieldops_protocol::{
    NewTask, Role, TaskPriority, TaskStatus, TemplateDraft, UserPatch,
};
use fieldops_test_utils::{fixtures, MemoryBackend};
use serde_json::json;

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    let backend = MemoryBackend::new();
    let err = backend.db().get_user(&UserId::new()).await.unwrap_err();
    assert!(err.is_not_found(), "{}", err);
    assert!(err.to_string().contains("PGRST116"));
}

#[tokio::test]
async fn test_user_update_returns_new_row() {
    let backend = MemoryBackend::new();
    let db = backend.db();
    let user = db.insert_user(&fixtures::user(Role::Auditor, "Siti")).await.unwrap();

    let patch = UserPatch {
        role: Some(Role::Admin),
        ..UserPatch::default()
    };
    let updated = db.update_user(&user.id, &patch).await.unwrap();
    assert_eq!(updated.role, Role::Admin);
    assert_eq!(updated.name.as_deref(), Some("Siti"));
}

#[tokio::test]
async fn test_template_without_id_is_inserted() {
    let backend = MemoryBackend::new();
    let db = backend.db();
    let template = fixtures::floor_template();
    let draft = TemplateDraft {
        id: None,
        title: template.title.clone(),
        items: template.items.clone(),
    };

    let saved = db.save_template(&draft).await.unwrap();
    let again = db
        .save_template(&TemplateDraft {
            id: Some(saved.id.clone()),
            title: "Renamed".into(),
            items: saved.items.clone(),
        })
        .await
        .unwrap();

    assert_eq!(again.id, saved.id);
    assert_eq!(again.title, "Renamed");
    assert_eq!(backend.rows_in(Table::ChecklistTemplates).len(), 1);
}

#[tokio::test]
async fn test_find_task_for_item_matches_checklist_and_item() {
    let backend = MemoryBackend::new();
    let db = backend.db();
    let checklist_id = ChecklistId::new();
    let item = ItemId::parse("q1").unwrap();

    let task = NewTask {
        title: "Floor".into(),
        checklist_item_id: item.clone(),
        checklist_id: checklist_id.clone(),
        priority: TaskPriority::High,
        assigned_to: None,
        due_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        status: TaskStatus::Open,
        description: String::new(),
        photo: None,
        created_at: chrono::Utc::now(),
    };
    let created = db.insert_tasks(&[task]).await.unwrap();

    let found = db.find_task_for_item(&checklist_id, &item).await.unwrap();
    assert_eq!(found.map(|t| t.id), Some(created[0].id.clone()));

    let other = db
        .find_task_for_item(&ChecklistId::new(), &item)
        .await
        .unwrap();
    assert!(other.is_none());
}

#[tokio::test]
async fn test_recipient_rpc_rejects_duplicates() {
    let backend = MemoryBackend::new();
    let db = backend.db();
    db.add_recipient("ops@fieldops.test", "ops").await.unwrap();
    let err = db.add_recipient("ops@fieldops.test", "ops").await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 409, .. }));

    let listed = db.list_recipients().await.unwrap();
    assert_eq!(listed.len(), 1);
    db.remove_recipient(&listed[0].id).await.unwrap();
    assert!(db.list_recipients().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_checklist_keeps_id_out_of_patch() {
    let backend = MemoryBackend::new();
    let stored = backend.seed(
        Table::Checklists,
        vec![json!({"title": "Opening", "status": "pending", "items": []})],
    );
    let db = backend.db();
    let id = ChecklistId::parse(stored[0]["id"].as_str().unwrap()).unwrap();

    let mut checklist = db.get_checklist(&id).await.unwrap();
    checklist.location = Some("Jakarta-1".into());
    let saved = db.update_checklist(&checklist).await.unwrap();

    assert_eq!(saved.id, id);
    assert_eq!(saved.location.as_deref(), Some("Jakarta-1"));
    assert_eq!(saved.created_at, checklist.created_at);
}
