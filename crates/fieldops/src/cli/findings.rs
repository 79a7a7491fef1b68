//! Findings, completed reports and missed audits.

use crate::cli::context::{read_media, Context};
use crate::cli::output::{
    format_date, format_datetime, print_json, print_table, print_table_colored, priority_color,
    status_color, truncate,
};
use anyhow::Result;
use fieldops_core::queries::{
    completed_reports, list_findings, missed_checklists, my_findings, resolve_finding,
    FindingFilter,
};
use fieldops_ids::TaskId;
use fieldops_protocol::{Checklist, Task, TaskPriority, TaskStatus, User};
use std::path::Path;

#[derive(Debug, clap::Args)]
pub struct FindingsArgs {
    /// Only findings with this status (open, in-progress, resolved)
    #[arg(long)]
    pub status: Option<TaskStatus>,

    /// Only findings with this priority (Low, Medium, High)
    #[arg(long)]
    pub priority: Option<TaskPriority>,

    /// Only findings assigned to you (always on for auditors)
    #[arg(long)]
    pub mine: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn list(ctx: &Context, args: FindingsArgs) -> Result<()> {
    let user = ctx.current_user().await?;
    let filter = FindingFilter {
        status: args.status,
        priority: args.priority,
    };

    if args.mine || !user.role.is_admin() {
        let tasks: Vec<Task> = my_findings(&ctx.services, &user.id)
            .await?
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        if args.json {
            return print_json(&tasks);
        }
        print_my_findings(&tasks);
        return Ok(());
    }

    let views = list_findings(&ctx.services, &filter).await?;
    if args.json {
        let tasks: Vec<&Task> = views.iter().map(|v| &v.task).collect();
        return print_json(&tasks);
    }
    if views.is_empty() {
        println!("No findings.");
        return Ok(());
    }

    let rows = views
        .iter()
        .map(|v| {
            vec![
                (v.task.id.to_string(), None),
                (v.location.clone().unwrap_or_else(|| "-".into()), None),
                (
                    truncate(v.question.as_deref().unwrap_or(&v.task.title), 40),
                    None,
                ),
                (
                    v.task.priority.map(|p| p.to_string()).unwrap_or_default(),
                    priority_color(v.task.priority),
                ),
                (v.task.status.to_string(), status_color(v.task.status)),
                (format_date(v.task.due_date), None),
                (v.auditor.clone().unwrap_or_else(|| "-".into()), None),
                (v.assignee.clone().unwrap_or_else(|| "-".into()), None),
            ]
        })
        .collect();
    print_table_colored(
        &[
            "Id", "Location", "Question", "Priority", "Status", "Due", "Auditor", "Assignee",
        ],
        rows,
    );
    Ok(())
}

fn print_my_findings(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No findings assigned to you.");
        return;
    }
    let rows = tasks
        .iter()
        .map(|t| {
            vec![
                (t.id.to_string(), None),
                (truncate(&t.title, 48), None),
                (
                    t.priority.map(|p| p.to_string()).unwrap_or_default(),
                    priority_color(t.priority),
                ),
                (t.status.to_string(), status_color(t.status)),
                (format_date(t.due_date), None),
            ]
        })
        .collect();
    print_table_colored(&["Id", "Title", "Priority", "Status", "Due"], rows);
}

pub async fn resolve(ctx: &Context, task: &TaskId, proof: &Path) -> Result<()> {
    let user = ctx.current_user().await?;
    let proof = read_media(proof)?;
    let resolved = resolve_finding(&ctx.services, &user, task, &proof).await?;
    println!("Resolved: {}", resolved.title);
    if let Some(url) = &resolved.proof_of_fix {
        println!("Proof: {}", url);
    }
    Ok(())
}

/// Checklists the user may see: everything for admins, their own otherwise.
async fn visible_checklists(ctx: &Context, user: &User) -> Result<Vec<Checklist>> {
    let db = &ctx.services.db;
    Ok(if user.role.is_admin() {
        db.list_checklists().await?
    } else {
        db.checklists_for_auditor(&user.id).await?
    })
}

pub async fn reports(ctx: &Context, json: bool) -> Result<()> {
    let user = ctx.current_user().await?;
    let checklists = visible_checklists(ctx, &user).await?;
    let reports = completed_reports(&checklists);

    if json {
        return print_json(&reports);
    }
    if reports.is_empty() {
        println!("No completed audits yet.");
        return Ok(());
    }
    let rows = reports
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                truncate(&c.title, 32),
                c.location.clone().unwrap_or_else(|| "-".into()),
                format_datetime(c.check_out_time),
                c.report_url.clone().unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    print_table(&["Id", "Title", "Location", "Completed", "Report"], rows);
    Ok(())
}

pub async fn missed(ctx: &Context, json: bool) -> Result<()> {
    let user = ctx.current_user().await?;
    let checklists = visible_checklists(ctx, &user).await?;
    let missed = missed_checklists(&checklists, ctx.services.clock.today());

    if json {
        return print_json(&missed);
    }
    if missed.is_empty() {
        println!("No missed audits.");
        return Ok(());
    }
    let rows = missed
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                truncate(&c.title, 32),
                c.location.clone().unwrap_or_else(|| "-".into()),
                format_date(c.due_date),
                c.status.to_string(),
            ]
        })
        .collect();
    print_table(&["Id", "Title", "Location", "Due", "Status"], rows);
    Ok(())
}
