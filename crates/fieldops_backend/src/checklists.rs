//! Checklist operations.

use crate::{FieldOpsDb, Query, Result, Table};
use fieldops_ids::{ChecklistId, UserId};
use fieldops_protocol::{Checklist, NewChecklist};
use serde_json::{json, Value};

impl FieldOpsDb {
    pub async fn list_checklists(&self) -> Result<Vec<Checklist>> {
        self.select_as(Table::Checklists, &Query::new().order_by("due_date", true))
            .await
    }

    pub async fn checklists_for_auditor(&self, auditor: &UserId) -> Result<Vec<Checklist>> {
        self.select_as(
            Table::Checklists,
            &Query::new().eq("assigned_to", auditor).order_by("due_date", true),
        )
        .await
    }

    pub async fn get_checklist(&self, id: &ChecklistId) -> Result<Checklist> {
        self.select_one(Table::Checklists, &Query::new().eq("id", id))
            .await
    }

    /// Create checklists in one batch.
    pub async fn insert_checklists(&self, checklists: &[NewChecklist]) -> Result<Vec<Checklist>> {
        let created: Vec<Checklist> = self.insert_as(Table::Checklists, checklists).await?;
        tracing::info!(count = created.len(), "Checklists created");
        Ok(created)
    }

    /// Write every field except `id` and `created_at`.
    pub async fn update_checklist(&self, checklist: &Checklist) -> Result<Checklist> {
        let mut row = serde_json::to_value(checklist)?;
        if let Value::Object(map) = &mut row {
            map.remove("id");
            map.remove("created_at");
        }
        self.update_by_id(Table::Checklists, checklist.id.as_str(), row)
            .await
    }

    pub async fn set_report_url(&self, id: &ChecklistId, url: &str) -> Result<Checklist> {
        self.update_by_id(Table::Checklists, id.as_str(), json!({ "report_url": url }))
            .await
    }

    /// Cancel an assignment by removing its row.
    pub async fn delete_checklist(&self, id: &ChecklistId) -> Result<()> {
        self.delete_by_id(Table::Checklists, id.as_str()).await
    }
}
