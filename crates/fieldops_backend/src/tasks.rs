//! Task (finding) operations.

use crate::{FieldOpsDb, Query, Result, Table};
use fieldops_ids::{ChecklistId, ItemId, TaskId};
use fieldops_protocol::{NewTask, Task, TaskStatus};
use serde_json::json;

impl FieldOpsDb {
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.select_as(Table::Tasks, &Query::new().order_by("created_at", false))
            .await
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.select_one(Table::Tasks, &Query::new().eq("id", id)).await
    }

    pub async fn tasks_for_checklist(&self, checklist_id: &ChecklistId) -> Result<Vec<Task>> {
        self.select_as(Table::Tasks, &Query::new().eq("checklist_id", checklist_id))
            .await
    }

    /// The task already raised for an item of a checklist, if any.
    pub async fn find_task_for_item(
        &self,
        checklist_id: &ChecklistId,
        item_id: &ItemId,
    ) -> Result<Option<Task>> {
        let mut tasks: Vec<Task> = self
            .select_as(
                Table::Tasks,
                &Query::new()
                    .eq("checklist_id", checklist_id)
                    .eq("checklist_item_id", item_id)
                    .order_by("created_at", true)
                    .limit(1),
            )
            .await?;
        Ok(if tasks.is_empty() { None } else { Some(tasks.remove(0)) })
    }

    /// Create tasks in one batch. Rows come back in input order.
    pub async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<Vec<Task>> {
        let created: Vec<Task> = self.insert_as(Table::Tasks, tasks).await?;
        tracing::info!(count = created.len(), "Tasks created");
        Ok(created)
    }

    pub async fn resolve_task(&self, id: &TaskId, proof_url: &str) -> Result<Task> {
        self.update_by_id(
            Table::Tasks,
            id.as_str(),
            json!({ "status": TaskStatus::Resolved, "proof_of_fix": proof_url }),
        )
        .await
    }

    pub async fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task> {
        self.update_by_id(Table::Tasks, id.as_str(), json!({ "status": status }))
            .await
    }
}
