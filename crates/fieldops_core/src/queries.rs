//! Findings lists, report listings and dashboard figures.

use crate::admin::require_admin;
use crate::media::prepare_photo;
use crate::{AuditError, Result, Services};
use chrono::NaiveDate;
use fieldops_backend::UploadOptions;
use fieldops_ids::{ChecklistId, TaskId, UserId};
use fieldops_protocol::{
    media_object_path, Checklist, MediaRef, MediaSlot, Task, TaskPriority, TaskStatus, User,
};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;

/// A task with the names a findings list shows next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingView {
    pub task: Task,
    pub location: Option<String>,
    pub checklist_title: Option<String>,
    /// The question whose answer raised the finding.
    pub question: Option<String>,
    pub auditor: Option<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl FindingFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == Some(p))
    }
}

/// Join tasks with their checklists and users, filter, and sort by status
/// rank then newest first.
pub fn enrich_findings(
    tasks: Vec<Task>,
    checklists: &[Checklist],
    users: &[User],
    filter: &FindingFilter,
) -> Vec<FindingView> {
    let by_checklist: HashMap<&ChecklistId, &Checklist> =
        checklists.iter().map(|c| (&c.id, c)).collect();
    let names: HashMap<&UserId, &str> = users.iter().map(|u| (&u.id, u.display_name())).collect();
    let name_of = |id: Option<&UserId>| id.and_then(|id| names.get(id)).map(|n| n.to_string());

    let mut views: Vec<FindingView> = tasks
        .into_iter()
        .filter(|task| filter.matches(task))
        .map(|task| {
            let checklist = task
                .checklist_id
                .as_ref()
                .and_then(|id| by_checklist.get(id).copied());
            let question = checklist.and_then(|c| {
                task.checklist_item_id
                    .as_ref()
                    .and_then(|item_id| c.item(item_id))
                    .map(|item| item.definition.question.clone())
            });
            FindingView {
                location: checklist.and_then(|c| c.location.clone()),
                checklist_title: checklist.map(|c| c.title.clone()),
                question,
                auditor: name_of(checklist.and_then(|c| c.assigned_to.as_ref())),
                assignee: name_of(task.assigned_to.as_ref()),
                task,
            }
        })
        .collect();

    views.sort_by_key(|v| (v.task.status.rank(), Reverse(v.task.created_at)));
    views
}

pub async fn list_findings(services: &Services, filter: &FindingFilter) -> Result<Vec<FindingView>> {
    let db = &services.db;
    let tasks = db.list_tasks().await?;
    let checklists = db.list_checklists().await?;
    let users = db.list_users().await?;
    Ok(enrich_findings(tasks, &checklists, &users, filter))
}

/// Open or in-progress tasks assigned to `user`, newest first.
pub fn auditor_queue(tasks: Vec<Task>, user: &UserId) -> Vec<Task> {
    let mut queue: Vec<Task> = tasks
        .into_iter()
        .filter(|t| t.status.is_active() && t.assigned_to.as_ref() == Some(user))
        .collect();
    queue.sort_by_key(|t| Reverse(t.created_at));
    queue
}

pub async fn my_findings(services: &Services, user: &UserId) -> Result<Vec<Task>> {
    Ok(auditor_queue(services.db.list_tasks().await?, user))
}

/// Completed checklists that have a report, latest check-out first.
pub fn completed_reports(checklists: &[Checklist]) -> Vec<&Checklist> {
    let mut reports: Vec<&Checklist> = checklists
        .iter()
        .filter(|c| c.is_completed() && c.report_url.is_some())
        .collect();
    reports.sort_by_key(|c| Reverse(c.check_out_time));
    reports
}

/// Unfinished checklists due before `today`, latest due date first.
pub fn missed_checklists(checklists: &[Checklist], today: NaiveDate) -> Vec<&Checklist> {
    let mut missed: Vec<&Checklist> = checklists.iter().filter(|c| c.is_missed(today)).collect();
    missed.sort_by_key(|c| Reverse(c.due_date));
    missed
}

/// Share of completed checklists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Nothing assigned yet.
    Operational,
    Percent(u8),
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Operational => write!(f, "Operational"),
            Completion::Percent(p) => write!(f, "{}%", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminStats {
    pub users: usize,
    pub outlets: usize,
    pub templates: usize,
    pub checklists: usize,
    pub completed: usize,
    pub missed: usize,
    pub open_findings: usize,
    pub completion: Completion,
}

pub fn compute_stats(
    users: usize,
    outlets: usize,
    templates: usize,
    checklists: &[Checklist],
    tasks: &[Task],
    today: NaiveDate,
) -> AdminStats {
    let completed = checklists.iter().filter(|c| c.is_completed()).count();
    let completion = if checklists.is_empty() {
        Completion::Operational
    } else {
        Completion::Percent(((completed * 100) as f64 / checklists.len() as f64).round() as u8)
    };
    AdminStats {
        users,
        outlets,
        templates,
        checklists: checklists.len(),
        completed,
        missed: checklists.iter().filter(|c| c.is_missed(today)).count(),
        open_findings: tasks.iter().filter(|t| t.status.is_active()).count(),
        completion,
    }
}

pub async fn admin_stats(services: &Services, actor: &User) -> Result<AdminStats> {
    require_admin(actor)?;
    let db = &services.db;
    let users = db.list_users().await?;
    let outlets = db.list_outlets().await?;
    let templates = db.list_templates().await?;
    let checklists = db.list_checklists().await?;
    let tasks = db.list_tasks().await?;
    Ok(compute_stats(
        users.len(),
        outlets.len(),
        templates.len(),
        &checklists,
        &tasks,
        services.clock.today(),
    ))
}

/// Upload a proof photo and mark the task resolved.
///
/// Admins may resolve any task; other users only tasks assigned to them.
pub async fn resolve_finding(
    services: &Services,
    actor: &User,
    task_id: &TaskId,
    proof: &MediaRef,
) -> Result<Task> {
    let task = services.db.get_task(task_id).await?;
    if !actor.role.is_admin() && task.assigned_to.as_ref() != Some(&actor.id) {
        return Err(AuditError::forbidden("this finding is assigned to someone else"));
    }
    if task.status == TaskStatus::Resolved {
        return Err(AuditError::invalid_state("finding is already resolved"));
    }

    let proof_url = match proof {
        MediaRef::Url(url) => url.clone(),
        MediaRef::Elided => {
            return Err(AuditError::invalid("a proof photo is required"));
        }
        MediaRef::Local(_) => {
            let payload = proof.decode().map_err(|source| AuditError::Media {
                slot: MediaSlot::Proof.to_string(),
                source,
            })?;
            let prepared = prepare_photo(payload, &services.config.media);
            let timestamp = services.clock.now().timestamp_millis();
            let path = match &task.checklist_id {
                Some(checklist_id) => media_object_path(
                    checklist_id,
                    &MediaSlot::Proof,
                    timestamp,
                    0,
                    prepared.extension,
                ),
                None => format!("proof/{}/{}-0.{}", task.id, timestamp, prepared.extension),
            };
            let bucket = &services.config.backend.photos_bucket;
            services
                .objects
                .upload(
                    bucket,
                    &path,
                    prepared.bytes,
                    &UploadOptions::new(prepared.content_type),
                )
                .await?;
            services.objects.public_url(bucket, &path)
        }
    };

    let resolved = services.db.resolve_task(task_id, &proof_url).await?;
    tracing::info!(task_id = %task_id, actor = %actor.id, "Finding resolved");
    Ok(resolved)
}
