//! Row types owned by the backing store.

use crate::deserialize_null_default;
use crate::item::{ChecklistItem, Finding, ItemDefinition};
use crate::media::{deserialize_optional_media, MediaRef};
use crate::types::{ChecklistStatus, Role, TaskPriority, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use fieldops_ids::{
    ChecklistId, ItemId, OutletId, RecipientId, TaskId, TemplateId, UserId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl User {
    /// Name if set, otherwise the email address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.avatar_url.is_none() && self.location.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub id: OutletId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

/// Insert/update payload for an outlet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletDraft {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub id: TemplateId,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub items: Vec<ItemDefinition>,
}

/// Template save payload. Without an id the save is an insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TemplateId>,
    pub title: String,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub status: ChecklistStatus,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_media")]
    pub auditor_signature: Option<MediaRef>,
    #[serde(default, deserialize_with = "deserialize_optional_media")]
    pub selfie: Option<MediaRef>,
    #[serde(default)]
    pub report_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Checklist {
    pub fn item(&self, id: &ItemId) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ChecklistStatus::Completed
    }

    /// Not completed and due strictly before `today`.
    pub fn is_missed(&self, today: NaiveDate) -> bool {
        !self.is_completed() && self.due_date.map(|due| due < today).unwrap_or(false)
    }
}

/// Insert payload produced by assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChecklist {
    pub title: String,
    pub location: Option<String>,
    pub assigned_to: UserId,
    pub due_date: NaiveDate,
    pub status: ChecklistStatus,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub checklist_item_id: Option<ItemId>,
    #[serde(default)]
    pub checklist_id: Option<ChecklistId>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub status: TaskStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub proof_of_fix: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub checklist_item_id: ItemId,
    pub checklist_id: ChecklistId,
    pub priority: TaskPriority,
    pub assigned_to: Option<UserId>,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub description: String,
    /// Only durable URLs are written; local payloads never reach the row.
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Finding> for NewTask {
    fn from(finding: &Finding) -> Self {
        Self {
            title: finding.title.clone(),
            checklist_item_id: finding.checklist_item_id.clone(),
            checklist_id: finding.checklist_id.clone(),
            priority: finding.priority,
            assigned_to: finding.assigned_to.clone(),
            due_date: finding.due_date,
            status: finding.status,
            description: finding.description.clone(),
            photo: finding.photo.as_ref().and_then(|p| p.url()).map(str::to_string),
            created_at: finding.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub id: RecipientId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checklist_tolerates_null_collections() {
        let row = json!({
            "id": "0b6a4f1e-2d55-4f53-9d0e-5f7f9b2b8a11",
            "title": "Daily Walk",
            "location": "Jakarta-1",
            "status": null,
            "items": null,
            "auditor_signature": "",
            "selfie": null,
            "created_at": "2024-02-20T08:00:00.000000+00:00"
        });
        let checklist: Checklist = serde_json::from_value(row).unwrap();
        assert!(checklist.items.is_empty());
        assert_eq!(checklist.status, ChecklistStatus::Pending);
        assert!(checklist.auditor_signature.is_none());
    }

    #[test]
    fn test_missed_means_open_and_past_due() {
        let mut checklist: Checklist = serde_json::from_value(json!({
            "id": "0b6a4f1e-2d55-4f53-9d0e-5f7f9b2b8a11",
            "title": "Daily Walk",
            "due_date": "2024-03-01"
        }))
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert!(checklist.is_missed(today));
        assert!(!checklist.is_missed(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));

        checklist.status = ChecklistStatus::Completed;
        assert!(!checklist.is_missed(today));
    }

    #[test]
    fn test_new_task_drops_local_photo() {
        let finding = Finding {
            id: None,
            title: "Floor".into(),
            checklist_item_id: ItemId::parse("q1").unwrap(),
            checklist_id: ChecklistId::new(),
            priority: TaskPriority::Medium,
            assigned_to: None,
            due_date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            status: TaskStatus::Open,
            description: String::new(),
            photo: Some(MediaRef::Local("aGVsbG8=".into())),
            proof_of_fix: None,
            created_at: Utc::now(),
        };
        assert_eq!(NewTask::from(&finding).photo, None);
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            id: UserId::new(),
            name: Some("  ".into()),
            email: "a@b.c".into(),
            role: Role::Auditor,
            avatar_url: None,
            location: None,
        };
        assert_eq!(user.display_name(), "a@b.c");
    }
}
