//! Bulk checklist assignment: outlets × templates for one auditor.

use crate::admin::require_admin;
use crate::{AuditError, Result, Services};
use chrono::NaiveDate;
use fieldops_ids::{OutletId, TemplateId, UserId};
use fieldops_protocol::{
    Checklist, ChecklistItem, ChecklistStatus, ChecklistTemplate, NewChecklist, Outlet, User,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentRequest {
    pub auditor: Option<UserId>,
    pub outlets: Vec<OutletId>,
    pub templates: Vec<TemplateId>,
    pub due_date: Option<NaiveDate>,
}

/// Build one pending checklist per selected outlet and template.
///
/// Ids that match no known outlet or template are skipped.
pub fn plan_assignments(
    request: &AssignmentRequest,
    outlets: &[Outlet],
    templates: &[ChecklistTemplate],
) -> Result<Vec<NewChecklist>> {
    let auditor = request
        .auditor
        .clone()
        .ok_or_else(|| AuditError::invalid("an auditor is required"))?;
    if request.outlets.is_empty() {
        return Err(AuditError::invalid("select at least one outlet"));
    }
    if request.templates.is_empty() {
        return Err(AuditError::invalid("select at least one template"));
    }
    let due_date = request
        .due_date
        .ok_or_else(|| AuditError::invalid("a due date is required"))?;

    let mut planned = Vec::new();
    for outlet_id in &request.outlets {
        let Some(outlet) = outlets.iter().find(|o| &o.id == outlet_id) else {
            tracing::warn!(outlet_id = %outlet_id, "Unknown outlet, skipping");
            continue;
        };
        for template_id in &request.templates {
            let Some(template) = templates.iter().find(|t| &t.id == template_id) else {
                tracing::warn!(template_id = %template_id, "Unknown template, skipping");
                continue;
            };
            planned.push(NewChecklist {
                title: template.title.clone(),
                location: Some(outlet.name.clone()),
                assigned_to: auditor.clone(),
                due_date,
                status: ChecklistStatus::Pending,
                items: template
                    .items
                    .iter()
                    .cloned()
                    .map(ChecklistItem::from_definition)
                    .collect(),
            });
        }
    }

    if planned.is_empty() {
        return Err(AuditError::invalid("No valid assignments"));
    }
    Ok(planned)
}

/// Plan and insert assignments in one batch.
pub async fn create_assignments(
    services: &Services,
    actor: &User,
    request: &AssignmentRequest,
) -> Result<Vec<Checklist>> {
    require_admin(actor)?;
    let outlets = services.db.list_outlets().await?;
    let templates = services.db.list_templates().await?;
    let planned = plan_assignments(request, &outlets, &templates)?;
    let created = services.db.insert_checklists(&planned).await?;
    tracing::info!(
        actor = %actor.id,
        count = created.len(),
        "Checklists assigned"
    );
    Ok(created)
}
