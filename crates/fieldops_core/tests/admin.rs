mod common;

use common::{assign, now, open_flow, seed_user, services, session_store};
use fieldops_backend::BackendError;
use fieldops_core::notify::{
    add_recipient, list_recipients, remove_recipient, send_report_notification,
    send_test_notification,
};
use fieldops_core::queries::{
    admin_stats, completed_reports, list_findings, my_findings, resolve_finding, Completion,
    FindingFilter,
};
use fieldops_core::{
    create_assignments, Admin, AssignmentRequest, AuditError, ItemUpdate, ProgressLog,
    SubmissionPipeline,
};
use fieldops_protocol::{
    Answer, NewTask, OutletDraft, Role, TaskPriority, TaskStatus, TemplateDraft, YesNo,
};
use fieldops_test_utils::fixtures::{floor_template, png_media, user};
use fieldops_test_utils::memory::PUBLIC_URL_PREFIX;
use fieldops_test_utils::MemoryBackend;

#[tokio::test]
async fn test_assign_audit_submit_and_notify() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let admin = seed_user(&services, &user(Role::Admin, "Rina")).await;
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;

    let ops = Admin::new(&services, &admin).unwrap();
    let outlet = ops
        .add_outlet(&OutletDraft {
            name: "Jakarta-1".into(),
            address: Some("Jl. Sudirman 1".into()),
            manager_id: None,
        })
        .await
        .unwrap();
    let floor = floor_template();
    let template = ops
        .save_template(&TemplateDraft {
            id: None,
            title: floor.title.clone(),
            items: floor.items.clone(),
        })
        .await
        .unwrap();

    let created = create_assignments(
        &services,
        &admin,
        &AssignmentRequest {
            auditor: Some(auditor.id.clone()),
            outlets: vec![outlet.id.clone()],
            templates: vec![template.id.clone()],
            due_date: Some(now().date_naive()),
        },
    )
    .await
    .unwrap();
    assert_eq!(created.len(), 1);
    let checklist = created.into_iter().next().unwrap();
    assert_eq!(checklist.location.as_deref(), Some("Jakarta-1"));
    assert_eq!(checklist.assigned_to.as_ref(), Some(&auditor.id));

    let mut flow = open_flow(&services, checklist, session_store());
    flow.check_in().unwrap();
    flow.update_item(0, ItemUpdate::AddEvidence(png_media(16, 16)))
        .unwrap();
    assert!(flow
        .update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::RedFlag))))
        .unwrap());
    flow.update_item(0, ItemUpdate::SetNote(Some("Oil spill by the door".into())))
        .unwrap();
    assert_eq!(flow.open_findings(), 1);
    flow.next().unwrap();
    flow.set_signature(Some(png_media(30, 12))).unwrap();
    let outcome = SubmissionPipeline::new(&services)
        .submit(flow.checkout().unwrap(), &ProgressLog::new())
        .await
        .unwrap();
    flow.finish().unwrap();

    let findings = list_findings(&services, &FindingFilter::default())
        .await
        .unwrap();
    assert_eq!(findings.len(), 1);
    let view = &findings[0];
    assert_eq!(view.location.as_deref(), Some("Jakarta-1"));
    assert_eq!(view.question.as_deref(), Some("Is the floor clean?"));
    assert_eq!(view.auditor.as_deref(), Some("Dewi"));
    assert_eq!(view.task.priority, Some(TaskPriority::High));
    assert_eq!(view.task.description.as_deref(), Some("Oil spill by the door"));
    assert_eq!(
        view.task.due_date,
        chrono::NaiveDate::from_ymd_opt(2024, 3, 4)
    );
    assert_eq!(my_findings(&services, &auditor.id).await.unwrap().len(), 1);

    let checklists = services.db.list_checklists().await.unwrap();
    let reports = completed_reports(&checklists);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].report_url.as_deref(), Some(outcome.report_url.as_str()));

    add_recipient(&services, &admin, "ops@example.com", None)
        .await
        .unwrap();
    let sent = send_report_notification(&services, &outcome.checklist, Some(&auditor))
        .await
        .unwrap();
    assert_eq!(sent, 1);
    let invocations = backend.invocations();
    let (function, body) = invocations.last().unwrap();
    assert_eq!(function, "send-audit-report");
    assert_eq!(body["reportUrl"], outcome.report_url.as_str());
    assert_eq!(body["auditorName"], "Dewi");
    assert_eq!(body["location"], "Jakarta-1");
    assert_eq!(body["date"], "2024-03-01");

    let stats = admin_stats(&services, &admin).await.unwrap();
    assert_eq!(stats.users, 2);
    assert_eq!(stats.outlets, 1);
    assert_eq!(stats.templates, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.open_findings, 1);
    assert_eq!(stats.completion, Completion::Percent(100));
}

#[tokio::test]
async fn test_auditors_cannot_use_admin_operations() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;

    assert!(matches!(
        Admin::new(&services, &auditor),
        Err(AuditError::Forbidden(_))
    ));
    let err = create_assignments(&services, &auditor, &AssignmentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Forbidden(_)));
    assert!(matches!(
        admin_stats(&services, &auditor).await,
        Err(AuditError::Forbidden(_))
    ));
    assert!(matches!(
        list_recipients(&services, &auditor).await,
        Err(AuditError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_admin_cannot_delete_self_but_can_cancel_assignments() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let admin = seed_user(&services, &user(Role::Admin, "Rina")).await;
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;
    let checklist = assign(&services, &floor_template(), &auditor, "Jakarta-1").await;

    let ops = Admin::new(&services, &admin).unwrap();
    let err = ops.delete_user(&admin.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid input: You cannot delete your own account.");

    ops.cancel_checklist(&checklist.id).await.unwrap();
    assert!(services.db.list_checklists().await.unwrap().is_empty());

    ops.delete_user(&auditor.id).await.unwrap();
    assert_eq!(services.db.list_users().await.unwrap(), vec![admin]);
}

#[tokio::test]
async fn test_recipients_are_validated_and_deduplicated() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let admin = seed_user(&services, &user(Role::Admin, "Rina")).await;

    let err = add_recipient(&services, &admin, "not-an-address", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Invalid(_)));

    add_recipient(&services, &admin, " area.manager@example.com ", None)
        .await
        .unwrap();
    let err = add_recipient(&services, &admin, "area.manager@example.com", Some("AM"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuditError::Backend(BackendError::Status { status: 409, .. })
    ));

    let recipients = list_recipients(&services, &admin).await.unwrap();
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].email, "area.manager@example.com");
    assert_eq!(recipients[0].name.as_deref(), Some("area.manager"));

    let sent = send_test_notification(&services, &admin).await.unwrap();
    assert_eq!(sent, 2);
    let (_, body) = backend.invocations().pop().unwrap();
    assert_eq!(body["auditorName"], "Test User");
    assert_eq!(body["email"][1], admin.email.as_str());

    remove_recipient(&services, &admin, &recipients[0].id)
        .await
        .unwrap();
    assert!(list_recipients(&services, &admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_report_notification_needs_recipients() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;
    let mut checklist = assign(&services, &floor_template(), &auditor, "Jakarta-1").await;
    checklist.report_url = Some(format!("{}/field-ops-reports/r.pdf", PUBLIC_URL_PREFIX));

    let err = send_report_notification(&services, &checklist, Some(&auditor))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Invalid(_)));
    assert!(backend.invocations().is_empty());
}

#[tokio::test]
async fn test_resolve_finding_uploads_proof() {
    let backend = MemoryBackend::new();
    let services = services(&backend);
    let auditor = seed_user(&services, &user(Role::Auditor, "Dewi")).await;
    let other = seed_user(&services, &user(Role::Auditor, "Budi")).await;
    let checklist = assign(&services, &floor_template(), &auditor, "Jakarta-1").await;
    let item = &checklist.items[0];
    let task = services
        .db
        .insert_tasks(&[NewTask {
            title: "Issue with: Is the floor clean?".into(),
            checklist_item_id: item.id().clone(),
            checklist_id: checklist.id.clone(),
            priority: TaskPriority::Medium,
            assigned_to: Some(auditor.id.clone()),
            due_date: now().date_naive(),
            status: TaskStatus::Open,
            description: String::new(),
            photo: None,
            created_at: now(),
        }])
        .await
        .unwrap()
        .remove(0);

    let err = resolve_finding(&services, &other, &task.id, &png_media(8, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Forbidden(_)));

    let resolved = resolve_finding(&services, &auditor, &task.id, &png_media(8, 8))
        .await
        .unwrap();
    assert_eq!(resolved.status, TaskStatus::Resolved);
    let expected_path = format!(
        "{}/proof/{}-0.jpg",
        checklist.id,
        now().timestamp_millis()
    );
    assert_eq!(
        resolved.proof_of_fix,
        Some(format!("{}/field-ops-photos/{}", PUBLIC_URL_PREFIX, expected_path))
    );
    assert!(backend.object("field-ops-photos", &expected_path).is_some());

    let err = resolve_finding(&services, &auditor, &task.id, &png_media(8, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::InvalidState(_)));
    assert!(list_findings(
        &services,
        &FindingFilter {
            status: Some(TaskStatus::Open),
            priority: None,
        }
    )
    .await
    .unwrap()
    .is_empty());
}
