//! `fieldops audit`: answer an assigned checklist and submit it.
//!
//! The open checklist is remembered in the navigation state, and every edit
//! goes through [`AuditFlow`], which snapshots the draft after each change.
//! Commands can therefore be run one at a time, across restarts.

use crate::cli::context::{read_media, Context};
use crate::cli::error::HelpfulError;
use crate::cli::output::{
    checklist_status_color, format_date, format_datetime, print_json, print_table,
    print_table_colored, truncate,
};
use anyhow::{Context as _, Result};
use clap::Subcommand;
use fieldops_core::{
    notify::send_report_notification, validate_item, AuditError, AuditFlow, ItemUpdate, Progress,
    ProgressSink, SubmissionPipeline,
};
use fieldops_ids::ChecklistId;
use fieldops_protocol::{paths, Answer, Checklist, ChecklistItem, QuestionType, User};
use fieldops_session::{AuditPhase, KeyValueStore, NavState, SessionStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand, Debug, Clone)]
pub enum AuditAction {
    /// List checklists assigned to you
    List {
        /// Include completed checklists
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open a checklist and check in (resumes a saved draft)
    Start {
        /// Checklist id
        checklist: ChecklistId,
    },

    /// Show the open checklist
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer an item, add a note or attach evidence
    Answer(AnswerArgs),

    /// Move to the next item (from the last item, to checkout)
    Next,

    /// Move to the previous item
    Prev,

    /// Leave the open checklist and discard its draft
    Back,

    /// Sign and submit the open checklist
    Submit(SubmitArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct AnswerArgs {
    /// Item number (1-based); defaults to the current item
    #[arg(long)]
    pub item: Option<usize>,

    /// Answer text: yes/no/red-flag, an option, a number, a date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "clear")]
    pub value: Option<String>,

    /// Clear the answer
    #[arg(long)]
    pub clear: bool,

    /// Note for the item (empty string clears it)
    #[arg(long)]
    pub note: Option<String>,

    /// Attach a photo or video file (repeatable)
    #[arg(long = "photo")]
    pub photos: Vec<PathBuf>,

    /// Remove an attached photo by number (1-based)
    #[arg(long)]
    pub remove: Option<usize>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SubmitArgs {
    /// Signature image
    #[arg(long)]
    pub signature: Option<PathBuf>,

    /// Selfie taken at the outlet
    #[arg(long)]
    pub selfie: Option<PathBuf>,

    /// Mail the report to the configured recipients afterwards
    #[arg(long)]
    pub notify: bool,
}

pub async fn run(ctx: &Context, action: AuditAction) -> Result<()> {
    let user = ctx.current_user().await?;
    match action {
        AuditAction::List { all, json } => list(ctx, &user, all, json).await,
        AuditAction::Start { checklist } => start(ctx, &user, checklist).await,
        AuditAction::Show { json } => {
            let flow = open_current(ctx, &user).await?;
            if json {
                print_json(flow.checklist())
            } else {
                show(&flow);
                Ok(())
            }
        }
        AuditAction::Answer(args) => answer(ctx, &user, args).await,
        AuditAction::Next => {
            let mut flow = open_current(ctx, &user).await?;
            flow.next().map_err(|e| incomplete_or(e, &flow))?;
            show(&flow);
            Ok(())
        }
        AuditAction::Prev => {
            let mut flow = open_current(ctx, &user).await?;
            flow.previous()?;
            show(&flow);
            Ok(())
        }
        AuditAction::Back => back(ctx, &user).await,
        AuditAction::Submit(args) => submit(ctx, &user, args).await,
    }
}

async fn list(ctx: &Context, user: &User, all: bool, json: bool) -> Result<()> {
    let db = &ctx.services.db;
    let checklists = if user.role.is_admin() {
        db.list_checklists().await?
    } else {
        db.checklists_for_auditor(&user.id).await?
    };
    let checklists: Vec<Checklist> = checklists
        .into_iter()
        .filter(|c| all || !c.is_completed() || c.report_url.is_none())
        .collect();

    if json {
        return print_json(&checklists);
    }
    if checklists.is_empty() {
        println!("No checklists assigned.");
        return Ok(());
    }

    let today = ctx.services.clock.today();
    let rows = checklists
        .iter()
        .map(|c| {
            let missed = c.is_missed(today);
            let status = if missed {
                "missed".to_string()
            } else {
                c.status.to_string()
            };
            vec![
                (c.id.to_string(), None),
                (truncate(&c.title, 40), None),
                (c.location.clone().unwrap_or_else(|| "-".into()), None),
                (format_date(c.due_date), None),
                (status, checklist_status_color(c.status, missed)),
            ]
        })
        .collect();
    print_table_colored(&["Id", "Title", "Location", "Due", "Status"], rows);
    Ok(())
}

async fn start(ctx: &Context, user: &User, id: ChecklistId) -> Result<()> {
    let kv = ctx.kv()?;
    let mut nav = NavState::load(kv.as_ref(), user.role)?;
    if let Some(current) = &nav.selected_checklist {
        if *current != id {
            return Err(HelpfulError::new(format!("Audit {} is still open", current))
                .with_context("Only one audit can be open at a time")
                .with_suggestions([
                    "TRY: fieldops audit submit   # finish it",
                    "TRY: fieldops audit back     # leave it and discard the draft",
                ])
                .into());
        }
    }

    let checklist = ctx.services.db.get_checklist(&id).await?;
    if !user.role.is_admin() && checklist.assigned_to.as_ref() != Some(&user.id) {
        return Err(HelpfulError::new("This checklist is assigned to someone else")
            .with_suggestion("TRY: fieldops audit list")
            .into());
    }

    let mut flow = open_flow(ctx, checklist, kv.clone())?;
    if flow.is_restored() {
        println!("Resuming saved draft.");
    }
    if flow.phase() == AuditPhase::PreCheckIn {
        flow.check_in()?;
        println!(
            "Checked in at {}.",
            format_datetime(flow.checklist().check_in_time)
        );
    }
    nav.select_checklist(id);
    nav.save(kv.as_ref())?;
    show(&flow);
    Ok(())
}

async fn answer(ctx: &Context, user: &User, args: AnswerArgs) -> Result<()> {
    let mut flow = open_current(ctx, user).await?;
    let index = match args.item {
        Some(0) => anyhow::bail!("Item numbers start at 1"),
        Some(n) => n - 1,
        None => flow.current_index(),
    };
    let item = flow
        .checklist()
        .items
        .get(index)
        .with_context(|| format!("There is no item {}", index + 1))?
        .clone();

    let mut updates = Vec::new();
    if let Some(position) = args.remove {
        if position == 0 {
            anyhow::bail!("Evidence numbers start at 1");
        }
        updates.push(ItemUpdate::RemoveEvidence(position - 1));
    }
    for path in &args.photos {
        updates.push(ItemUpdate::AddEvidence(read_media(path)?));
    }
    if args.clear {
        updates.push(ItemUpdate::SetValue(None));
    } else if let Some(raw) = &args.value {
        updates.push(ItemUpdate::SetValue(Some(parse_answer(&item, raw)?)));
    }
    if let Some(note) = args.note {
        updates.push(ItemUpdate::SetNote(Some(note)));
    }
    if updates.is_empty() {
        anyhow::bail!("Nothing to change: pass --value, --clear, --note, --photo or --remove");
    }

    let mut finding_changed = false;
    for update in updates {
        finding_changed |= flow.update_item(index, update)?;
    }
    if index != flow.current_index() {
        flow.go_to(index)?;
    }

    if finding_changed {
        let updated = &flow.checklist().items[index];
        match &updated.finding {
            Some(finding) => println!(
                "Finding raised: {} priority, due {}",
                finding.priority, finding.due_date
            ),
            None => println!("Finding withdrawn."),
        }
    }
    show(&flow);
    Ok(())
}

async fn back(ctx: &Context, user: &User) -> Result<()> {
    let kv = ctx.kv()?;
    let mut nav = NavState::load(kv.as_ref(), user.role)?;
    if nav.selected_checklist.is_none() {
        println!("No audit is open.");
        return Ok(());
    }
    let flow = open_current(ctx, user).await?;
    let checklist = flow.back()?;
    nav.back_to_list(user.role);
    nav.save(kv.as_ref())?;
    println!("Left {} and discarded the draft.", checklist.title);
    Ok(())
}

/// Prints submission progress on stderr.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, progress: Progress) {
        eprintln!("[{:>3.0}%] {}", progress.percent, progress.message);
    }
}

async fn submit(ctx: &Context, user: &User, args: SubmitArgs) -> Result<()> {
    let mut flow = open_current(ctx, user).await?;
    if let Some(path) = &args.signature {
        flow.set_signature(Some(read_media(path)?))?;
    }
    if let Some(path) = &args.selfie {
        flow.set_selfie(Some(read_media(path)?))?;
    }

    let request = match flow.checkout() {
        Ok(request) => request,
        Err(AuditError::MissingSignature) => return Err(HelpfulError::missing_signature().into()),
        Err(e) => return Err(incomplete_or(e, &flow)),
    };

    let outcome = match SubmissionPipeline::new(&ctx.services)
        .submit(request, &ConsoleProgress)
        .await
    {
        Ok(outcome) => outcome,
        Err(failure) => {
            flow.adopt_checkpoint(&failure)?;
            tracing::error!(stage = %failure.stage, error = %failure.error, "Submission failed");
            return Err(HelpfulError::submission_failed(&failure, &ctx.config.backend).into());
        }
    };
    flow.finish()?;

    let kv = ctx.kv()?;
    let mut nav = NavState::load(kv.as_ref(), user.role)?;
    nav.back_to_list(user.role);
    nav.save(kv.as_ref())?;

    let local_copy = save_report_copy(&outcome.report_path, &outcome.report);
    println!("Audit submitted.");
    println!("Report: {}", outcome.report_url);
    if let Some(path) = local_copy {
        println!("Saved a copy to {}", path.display());
    }

    if args.notify {
        match send_report_notification(&ctx.services, &outcome.checklist, Some(user)).await {
            Ok(sent) => println!("Report mailed to {} recipient(s).", sent),
            // The audit is already saved; a mail failure only needs a retry hint.
            Err(e) => eprintln!(
                "Warning: report mail not sent: {}\n  TRY: fieldops notify {}",
                e.user_message(),
                outcome.checklist.id
            ),
        }
    }
    Ok(())
}

/// Write the PDF under the reports directory. Failure only costs the copy.
fn save_report_copy(report_path: &str, bytes: &[u8]) -> Option<PathBuf> {
    let dir = paths::reports_dir();
    let path = dir.join(report_path);
    let written = std::fs::create_dir_all(&dir).and_then(|_| std::fs::write(&path, bytes));
    match written {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not save report copy");
            None
        }
    }
}

fn open_flow(ctx: &Context, checklist: Checklist, kv: Arc<dyn KeyValueStore>) -> Result<AuditFlow> {
    Ok(AuditFlow::open(
        checklist,
        SessionStore::new(kv),
        ctx.config.findings,
        ctx.services.clock.clone(),
    )?)
}

/// Reopen the checklist recorded in the navigation state.
async fn open_current(ctx: &Context, user: &User) -> Result<AuditFlow> {
    let kv = ctx.kv()?;
    let nav = NavState::load(kv.as_ref(), user.role)?;
    let Some(id) = nav.selected_checklist else {
        return Err(HelpfulError::no_open_audit().into());
    };
    let checklist = ctx.services.db.get_checklist(&id).await?;
    open_flow(ctx, checklist, kv)
}

fn incomplete_or(err: AuditError, flow: &AuditFlow) -> anyhow::Error {
    match err {
        AuditError::Incomplete { index, issues } => {
            let question = flow
                .checklist()
                .items
                .get(index)
                .map(|i| i.definition.question.as_str())
                .unwrap_or_default();
            HelpfulError::incomplete(index, question, &issues).into()
        }
        other => other.into(),
    }
}

/// Parse command-line text into the answer type the item expects.
fn parse_answer(item: &ChecklistItem, raw: &str) -> Result<Answer> {
    let question_type = item.question_type();
    match question_type {
        QuestionType::Photo => Err(HelpfulError::new(format!(
            "'{}' is answered with photos",
            item.definition.question
        ))
        .with_suggestion("TRY: fieldops audit answer --photo picture.jpg")
        .into()),
        _ => {
            let parsed = Answer::from_json(question_type, &Value::String(raw.to_string()))
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            parsed.with_context(|| format!("'{}' needs a value", item.definition.question))
        }
    }
}

fn show(flow: &AuditFlow) {
    let checklist = flow.checklist();
    println!(
        "{} @ {}  [{}]",
        checklist.title,
        checklist.location.as_deref().unwrap_or("-"),
        flow.phase().as_str()
    );

    let current = flow.current_index();
    let rows = checklist
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = if i == current { ">" } else { "" };
            let state = if validate_item(item).is_empty() {
                "ok"
            } else {
                "todo"
            };
            vec![
                format!("{}{}", marker, i + 1),
                truncate(&item.definition.question, 48),
                item.value
                    .as_ref()
                    .map(Answer::display)
                    .map(|v| truncate(&v, 20))
                    .unwrap_or_else(|| "-".into()),
                item.evidence.len().to_string(),
                item.finding
                    .as_ref()
                    .map(|f| f.priority.to_string())
                    .unwrap_or_default(),
                state.to_string(),
            ]
        })
        .collect();
    print_table(&["#", "Question", "Answer", "Photos", "Finding", "State"], rows);

    if let Some(item) = flow.current_item() {
        let issues = validate_item(item);
        if !issues.is_empty() {
            let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
            println!("Item {}: {}", current + 1, details.join("; "));
        }
    }
    let open = flow.open_findings();
    if open > 0 {
        println!("{} finding(s) will be raised on submit.", open);
    }
    println!(
        "Signature: {}",
        if flow.signature().is_some() { "attached" } else { "missing" }
    );
}
