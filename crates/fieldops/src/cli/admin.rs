//! Admin commands: assignments, master data, dashboard and report mail.

use crate::cli::context::Context;
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_date, print_json, print_table};
use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use fieldops_core::notify::{
    add_recipient, list_recipients, remove_recipient, send_report_notification,
    send_test_notification,
};
use fieldops_core::queries::admin_stats;
use fieldops_core::{create_assignments, Admin, AssignmentRequest};
use fieldops_ids::{ChecklistId, OutletId, RecipientId, TemplateId, UserId};
use fieldops_protocol::{ChecklistTemplate, Outlet, OutletDraft, Role, TemplateDraft, User, UserPatch};
use std::path::{Path, PathBuf};

#[derive(Debug, clap::Args)]
pub struct AssignArgs {
    /// Auditor id or e-mail
    #[arg(long)]
    pub auditor: String,

    /// Outlet id or name (repeatable)
    #[arg(long = "outlet", required = true)]
    pub outlets: Vec<String>,

    /// Template id or title (repeatable)
    #[arg(long = "template", required = true)]
    pub templates: Vec<String>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: NaiveDate,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecipientAction {
    /// List report recipients
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipient
    Add {
        /// E-mail address
        email: String,

        /// Display name (defaults to the part before '@')
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a recipient
    Remove {
        /// Recipient id
        id: RecipientId,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum OutletAction {
    /// List outlets
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add an outlet
    Add {
        name: String,
        #[arg(long)]
        address: Option<String>,
        /// Manager's user id
        #[arg(long)]
        manager: Option<UserId>,
    },
    /// Delete an outlet
    Remove { id: OutletId },
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateAction {
    /// List checklist templates
    List {
        #[arg(long)]
        json: bool,
    },
    /// Create or replace a template from a JSON file
    Import { file: PathBuf },
    /// Delete a template
    Remove { id: TemplateId },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserAction {
    /// List users
    List {
        #[arg(long)]
        json: bool,
    },
    /// Change a user's role
    SetRole { id: UserId, role: Role },
    /// Delete a user profile
    Remove { id: UserId },
}

pub async fn assign(ctx: &Context, args: AssignArgs) -> Result<()> {
    let actor = ctx.require_admin().await?;
    let db = &ctx.services.db;
    let users = db.list_users().await?;
    let outlets = db.list_outlets().await?;
    let templates = db.list_templates().await?;

    let auditor = find_user(&users, &args.auditor)?;
    let request = AssignmentRequest {
        auditor: Some(auditor.id.clone()),
        outlets: args
            .outlets
            .iter()
            .map(|o| find_outlet(&outlets, o).map(|o| o.id.clone()))
            .collect::<Result<_>>()?,
        templates: args
            .templates
            .iter()
            .map(|t| find_template(&templates, t).map(|t| t.id.clone()))
            .collect::<Result<_>>()?,
        due_date: Some(args.due),
    };

    let created = create_assignments(&ctx.services, &actor, &request).await?;
    println!(
        "Assigned {} checklist(s) to {}, due {}:",
        created.len(),
        auditor.display_name(),
        args.due
    );
    let rows = created
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.title.clone(),
                c.location.clone().unwrap_or_default(),
                format_date(c.due_date),
            ]
        })
        .collect();
    print_table(&["Id", "Title", "Location", "Due"], rows);
    Ok(())
}

pub async fn cancel(ctx: &Context, id: &ChecklistId) -> Result<()> {
    let actor = ctx.require_admin().await?;
    Admin::new(&ctx.services, &actor)?.cancel_checklist(id).await?;
    println!("Cancelled {}", id);
    Ok(())
}

pub async fn dashboard(ctx: &Context, json: bool) -> Result<()> {
    let actor = ctx.require_admin().await?;
    let stats = admin_stats(&ctx.services, &actor).await?;
    if json {
        return print_json(&serde_json::json!({
            "users": stats.users,
            "outlets": stats.outlets,
            "templates": stats.templates,
            "checklists": stats.checklists,
            "completed": stats.completed,
            "missed": stats.missed,
            "open_findings": stats.open_findings,
            "completion": stats.completion.to_string(),
        }));
    }
    print_table(
        &["Metric", "Value"],
        vec![
            vec!["Users".into(), stats.users.to_string()],
            vec!["Outlets".into(), stats.outlets.to_string()],
            vec!["Templates".into(), stats.templates.to_string()],
            vec!["Checklists".into(), stats.checklists.to_string()],
            vec!["Completed".into(), stats.completed.to_string()],
            vec!["Missed".into(), stats.missed.to_string()],
            vec!["Open findings".into(), stats.open_findings.to_string()],
            vec!["Completion".into(), stats.completion.to_string()],
        ],
    );
    Ok(())
}

pub async fn recipients(ctx: &Context, action: RecipientAction) -> Result<()> {
    let actor = ctx.require_admin().await?;
    match action {
        RecipientAction::List { json } => {
            let recipients = list_recipients(&ctx.services, &actor).await?;
            if json {
                return print_json(&recipients);
            }
            if recipients.is_empty() {
                println!("No recipients. Reports are not mailed until one is added.");
                return Ok(());
            }
            let rows = recipients
                .iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.email.clone(),
                        r.name.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["Id", "E-mail", "Name"], rows);
        }
        RecipientAction::Add { email, name } => {
            add_recipient(&ctx.services, &actor, &email, name.as_deref()).await?;
            println!("Added {}", email.trim());
        }
        RecipientAction::Remove { id } => {
            remove_recipient(&ctx.services, &actor, &id).await?;
            println!("Removed {}", id);
        }
    }
    Ok(())
}

pub async fn notify(ctx: &Context, checklist: Option<&ChecklistId>, test: bool) -> Result<()> {
    if test {
        let actor = ctx.require_admin().await?;
        let sent = send_test_notification(&ctx.services, &actor).await?;
        println!("Test mail sent to {} address(es).", sent);
        return Ok(());
    }

    let id = checklist.context("A checklist id is required")?;
    let user = ctx.current_user().await?;
    let db = &ctx.services.db;
    let checklist = db.get_checklist(id).await?;
    if !user.role.is_admin() && checklist.assigned_to.as_ref() != Some(&user.id) {
        return Err(HelpfulError::not_admin(&user)
            .with_context("Only admins and the checklist's auditor can mail its report")
            .into());
    }
    let auditor = match &checklist.assigned_to {
        Some(auditor_id) => db.get_user(auditor_id).await.ok(),
        None => None,
    };
    let sent = send_report_notification(&ctx.services, &checklist, auditor.as_ref()).await?;
    println!("Report mailed to {} recipient(s).", sent);
    Ok(())
}

pub async fn outlets(ctx: &Context, action: OutletAction) -> Result<()> {
    let actor = ctx.require_admin().await?;
    let admin = Admin::new(&ctx.services, &actor)?;
    match action {
        OutletAction::List { json } => {
            let outlets = ctx.services.db.list_outlets().await?;
            if json {
                return print_json(&outlets);
            }
            let rows = outlets
                .iter()
                .map(|o| {
                    vec![
                        o.id.to_string(),
                        o.name.clone(),
                        o.address.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["Id", "Name", "Address"], rows);
        }
        OutletAction::Add {
            name,
            address,
            manager,
        } => {
            let outlet = admin
                .add_outlet(&OutletDraft {
                    name,
                    address,
                    manager_id: manager,
                })
                .await?;
            println!("Added outlet {} ({})", outlet.name, outlet.id);
        }
        OutletAction::Remove { id } => {
            admin.delete_outlet(&id).await?;
            println!("Removed outlet {}", id);
        }
    }
    Ok(())
}

pub async fn templates(ctx: &Context, action: TemplateAction) -> Result<()> {
    let actor = ctx.require_admin().await?;
    let admin = Admin::new(&ctx.services, &actor)?;
    match action {
        TemplateAction::List { json } => {
            let templates = ctx.services.db.list_templates().await?;
            if json {
                return print_json(&templates);
            }
            let rows = templates
                .iter()
                .map(|t| vec![t.id.to_string(), t.title.clone(), t.items.len().to_string()])
                .collect();
            print_table(&["Id", "Title", "Items"], rows);
        }
        TemplateAction::Import { file } => {
            let draft = read_template(&file)?;
            let saved = admin.save_template(&draft).await?;
            println!(
                "Saved template {} ({} items) as {}",
                saved.title,
                saved.items.len(),
                saved.id
            );
        }
        TemplateAction::Remove { id } => {
            admin.delete_template(&id).await?;
            println!("Removed template {}", id);
        }
    }
    Ok(())
}

pub async fn users(ctx: &Context, action: UserAction) -> Result<()> {
    let actor = ctx.require_admin().await?;
    let admin = Admin::new(&ctx.services, &actor)?;
    match action {
        UserAction::List { json } => {
            let users = ctx.services.db.list_users().await?;
            if json {
                return print_json(&users);
            }
            let rows = users
                .iter()
                .map(|u| {
                    vec![
                        u.id.to_string(),
                        u.display_name().to_string(),
                        u.email.clone(),
                        u.role.to_string(),
                    ]
                })
                .collect();
            print_table(&["Id", "Name", "E-mail", "Role"], rows);
        }
        UserAction::SetRole { id, role } => {
            let user = admin
                .update_user(
                    &id,
                    &UserPatch {
                        role: Some(role),
                        ..UserPatch::default()
                    },
                )
                .await?;
            println!("{} is now {}", user.display_name(), user.role);
        }
        UserAction::Remove { id } => {
            admin.delete_user(&id).await?;
            println!("Removed user {}", id);
        }
    }
    Ok(())
}

fn read_template(path: &Path) -> Result<TemplateDraft> {
    if !path.is_file() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid template file", path.display()))
}

fn find_user<'a>(users: &'a [User], value: &str) -> Result<&'a User> {
    let value = value.trim();
    users
        .iter()
        .find(|u| u.id.as_str() == value || u.email.eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let known: Vec<String> = users
                .iter()
                .filter(|u| u.role == Role::Auditor)
                .map(|u| u.email.clone())
                .collect();
            HelpfulError::unknown_reference("auditor", value, &known).into()
        })
}

fn find_outlet<'a>(outlets: &'a [Outlet], value: &str) -> Result<&'a Outlet> {
    let value = value.trim();
    outlets
        .iter()
        .find(|o| o.id.as_str() == value || o.name.eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let known: Vec<String> = outlets.iter().map(|o| o.name.clone()).collect();
            HelpfulError::unknown_reference("outlet", value, &known).into()
        })
}

fn find_template<'a>(templates: &'a [ChecklistTemplate], value: &str) -> Result<&'a ChecklistTemplate> {
    let value = value.trim();
    templates
        .iter()
        .find(|t| t.id.as_str() == value || t.title.eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let known: Vec<String> = templates.iter().map(|t| t.title.clone()).collect();
            HelpfulError::unknown_reference("template", value, &known).into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outlet(name: &str) -> Outlet {
        Outlet {
            id: OutletId::new(),
            name: name.into(),
            address: None,
            manager_id: None,
        }
    }

    #[test]
    fn test_find_outlet_by_name_or_id() {
        let outlets = vec![outlet("Jakarta-1"), outlet("Bandung-2")];
        assert_eq!(find_outlet(&outlets, "jakarta-1").unwrap().name, "Jakarta-1");
        let id = outlets[1].id.to_string();
        assert_eq!(find_outlet(&outlets, &id).unwrap().name, "Bandung-2");

        let err = find_outlet(&outlets, "Surabaya").unwrap_err();
        assert!(err.to_string().contains("Jakarta-1, Bandung-2"));
    }

    #[test]
    fn test_find_user_by_email() {
        let users = vec![User {
            id: UserId::new(),
            name: Some("Dewi".into()),
            email: "dewi@example.com".into(),
            role: Role::Auditor,
            avatar_url: None,
            location: None,
        }];
        assert_eq!(
            find_user(&users, " DEWI@example.com ").unwrap().display_name(),
            "Dewi"
        );
        let err = find_user(&users, "budi@example.com").unwrap_err();
        assert!(err.to_string().contains("dewi@example.com"));
    }

    #[test]
    fn test_find_template_lists_titles() {
        let templates = vec![ChecklistTemplate {
            id: TemplateId::new(),
            title: "Floor check".into(),
            items: Vec::new(),
        }];
        assert!(find_template(&templates, "floor check").is_ok());
        let err = find_template(&templates, "Kitchen").unwrap_err();
        assert!(err.to_string().contains("Floor check"));
    }

    #[test]
    fn test_read_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floor.json");
        std::fs::write(
            &path,
            r#"{"title": "Floor check", "items": [
                {"id": "q1", "question": "Is the floor clean?", "type": "yes-no",
                 "required": true, "minPhotos": 1}
            ]}"#,
        )
        .unwrap();

        let draft = read_template(&path).unwrap();
        assert_eq!(draft.id, None);
        assert_eq!(draft.title, "Floor check");
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].min_photos, Some(1));

        std::fs::write(&path, "not json").unwrap();
        assert!(read_template(&path).is_err());
    }
}
