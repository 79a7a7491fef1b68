use crate::{FieldOpsDb, Query, Result, Table};
use fieldops_ids::TemplateId;
use fieldops_protocol::{ChecklistTemplate, TemplateDraft};

impl FieldOpsDb {
    pub async fn list_templates(&self) -> Result<Vec<ChecklistTemplate>> {
        self.select_as(Table::ChecklistTemplates, &Query::new().order_by("title", true))
            .await
    }

    pub async fn get_template(&self, id: &TemplateId) -> Result<ChecklistTemplate> {
        self.select_one(Table::ChecklistTemplates, &Query::new().eq("id", id))
            .await
    }

    /// Upsert a template. A draft without an id becomes a new row.
    pub async fn save_template(&self, draft: &TemplateDraft) -> Result<ChecklistTemplate> {
        let row = serde_json::to_value(draft)?;
        let saved = self.rows.upsert(Table::ChecklistTemplates, row).await?;
        tracing::info!(
            template_id = saved.get("id").and_then(|v| v.as_str()).unwrap_or("?"),
            created = draft.id.is_none(),
            "Template saved"
        );
        Ok(serde_json::from_value(saved)?)
    }

    pub async fn delete_template(&self, id: &TemplateId) -> Result<()> {
        self.delete_by_id(Table::ChecklistTemplates, id.as_str()).await
    }
}
