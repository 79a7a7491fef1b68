//! Admin-only operations.

use crate::{AuditError, Result, Services};
use fieldops_ids::{ChecklistId, OutletId, TemplateId, UserId};
use fieldops_protocol::{
    ChecklistTemplate, Outlet, OutletDraft, QuestionType, TemplateDraft, User, UserPatch,
};
use std::collections::HashSet;

pub fn require_admin(actor: &User) -> Result<()> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(AuditError::forbidden(format!(
            "{} is not an admin",
            actor.display_name()
        )))
    }
}

/// Admin operations performed by one signed-in admin.
pub struct Admin<'a> {
    services: &'a Services,
    actor: &'a User,
}

impl<'a> Admin<'a> {
    /// Fails with `Forbidden` unless `actor` is an admin.
    pub fn new(services: &'a Services, actor: &'a User) -> Result<Self> {
        require_admin(actor)?;
        Ok(Self { services, actor })
    }

    pub async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        if patch.is_empty() {
            return Err(AuditError::invalid("nothing to update"));
        }
        let user = self.services.db.update_user(id, patch).await?;
        tracing::info!(actor = %self.actor.id, user_id = %id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(&self, id: &UserId) -> Result<()> {
        if *id == self.actor.id {
            return Err(AuditError::invalid("You cannot delete your own account."));
        }
        self.services.db.delete_user(id).await?;
        tracing::info!(actor = %self.actor.id, user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn add_outlet(&self, draft: &OutletDraft) -> Result<Outlet> {
        validate_outlet(draft)?;
        Ok(self.services.db.add_outlet(draft).await?)
    }

    pub async fn update_outlet(&self, id: &OutletId, draft: &OutletDraft) -> Result<Outlet> {
        validate_outlet(draft)?;
        Ok(self.services.db.update_outlet(id, draft).await?)
    }

    pub async fn delete_outlet(&self, id: &OutletId) -> Result<()> {
        Ok(self.services.db.delete_outlet(id).await?)
    }

    /// Insert when the draft has no id, otherwise replace.
    pub async fn save_template(&self, draft: &TemplateDraft) -> Result<ChecklistTemplate> {
        validate_template(draft)?;
        let saved = self.services.db.save_template(draft).await?;
        tracing::info!(
            template_id = %saved.id,
            items = saved.items.len(),
            created = draft.id.is_none(),
            "Template saved"
        );
        Ok(saved)
    }

    pub async fn delete_template(&self, id: &TemplateId) -> Result<()> {
        Ok(self.services.db.delete_template(id).await?)
    }

    /// Cancel an assignment. The row is deleted.
    pub async fn cancel_checklist(&self, id: &ChecklistId) -> Result<()> {
        self.services.db.delete_checklist(id).await?;
        tracing::info!(actor = %self.actor.id, checklist_id = %id, "Checklist cancelled");
        Ok(())
    }
}

fn validate_outlet(draft: &OutletDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(AuditError::invalid("outlet name is required"));
    }
    Ok(())
}

pub fn validate_template(draft: &TemplateDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(AuditError::invalid("template title is required"));
    }
    let mut seen = HashSet::new();
    for item in &draft.items {
        if item.question.trim().is_empty() {
            return Err(AuditError::invalid(format!("item '{}' has no question", item.id)));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(AuditError::invalid(format!("duplicate item id '{}'", item.id)));
        }
        if item.question_type == QuestionType::MultipleChoice && item.options.is_empty() {
            return Err(AuditError::invalid(format!(
                "'{}' is multiple choice but has no options",
                item.question
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_ids::ItemId;
    use fieldops_protocol::{ItemDefinition, Role};

    fn user(role: Role) -> User {
        User {
            id: UserId::new(),
            name: Some("Rina".into()),
            email: "rina@example.com".into(),
            role,
            avatar_url: None,
            location: None,
        }
    }

    #[test]
    fn test_auditors_are_forbidden() {
        assert!(require_admin(&user(Role::Admin)).is_ok());
        assert!(matches!(
            require_admin(&user(Role::Auditor)),
            Err(AuditError::Forbidden(_))
        ));
    }

    #[test]
    fn test_template_validation() {
        let mut draft = TemplateDraft {
            id: None,
            title: "Closing".into(),
            items: vec![ItemDefinition::new(
                ItemId::parse("a").unwrap(),
                "Pick one",
                QuestionType::MultipleChoice,
            )],
        };
        assert!(validate_template(&draft).is_err());

        draft.items[0].options = vec!["Good".into(), "Bad".into()];
        assert!(validate_template(&draft).is_ok());

        draft.items.push(draft.items[0].clone());
        assert!(validate_template(&draft).is_err());

        draft.items.pop();
        draft.title = "  ".into();
        assert!(validate_template(&draft).is_err());
    }
}
