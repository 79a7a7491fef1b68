//! Field Ops - Outlet audits from the command line
//!
//! Auditors work through their assigned checklists, attach evidence and
//! submit signed reports. Admins assign audits, track findings and manage
//! who gets the report mail.

mod cli;

use clap::{Parser, Subcommand};
use fieldops_ids::{ChecklistId, TaskId};
use fieldops_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "fieldops")]
#[command(author, version, about = "Field audits for outlets: checklists, findings, reports")]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show or initialise the configuration
    Config(cli::config::ConfigArgs),

    /// Sign in with e-mail and password
    Login(cli::account::LoginArgs),

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Work through an assigned checklist
    Audit {
        #[command(subcommand)]
        action: cli::audit::AuditAction,
    },

    /// List findings (corrective tasks)
    Findings(cli::findings::FindingsArgs),

    /// Resolve a finding with a proof-of-fix photo
    Resolve {
        /// Finding (task) id
        task: TaskId,

        /// Photo showing the fix
        #[arg(long)]
        proof: PathBuf,
    },

    /// List completed audits with their report links
    Reports {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List audits that are past due and not completed
    Missed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assign audits to an auditor (admin)
    Assign(cli::admin::AssignArgs),

    /// Cancel (delete) an assigned checklist (admin)
    Cancel {
        /// Checklist id
        checklist: ChecklistId,
    },

    /// Manage outlets (admin)
    Outlets {
        #[command(subcommand)]
        action: cli::admin::OutletAction,
    },

    /// Manage checklist templates (admin)
    Templates {
        #[command(subcommand)]
        action: cli::admin::TemplateAction,
    },

    /// Manage users (admin)
    Users {
        #[command(subcommand)]
        action: cli::admin::UserAction,
    },

    /// Show dashboard figures (admin)
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage report e-mail recipients (admin)
    Recipients {
        #[command(subcommand)]
        action: cli::admin::RecipientAction,
    },

    /// Send the report mail for a completed audit
    Notify {
        /// Completed checklist id
        #[arg(required_unless_present = "test")]
        checklist: Option<ChecklistId>,

        /// Send a sample mail to the recipients and yourself (admin)
        #[arg(long, conflicts_with = "checklist")]
        test: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "fieldops",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialise logging: {}", e);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config(args) = &cli.command {
        return cli::config::run(args);
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(cli.command))
}

async fn run_async(command: Commands) -> anyhow::Result<()> {
    let ctx = cli::context::Context::load()?;

    match command {
        Commands::Config(_) => Ok(()),
        Commands::Login(args) => cli::account::login(&ctx, args).await,
        Commands::Logout => cli::account::logout(&ctx).await,
        Commands::Whoami { json } => cli::account::whoami(&ctx, json).await,
        Commands::Audit { action } => cli::audit::run(&ctx, action).await,
        Commands::Findings(args) => cli::findings::list(&ctx, args).await,
        Commands::Resolve { task, proof } => cli::findings::resolve(&ctx, &task, &proof).await,
        Commands::Reports { json } => cli::findings::reports(&ctx, json).await,
        Commands::Missed { json } => cli::findings::missed(&ctx, json).await,
        Commands::Assign(args) => cli::admin::assign(&ctx, args).await,
        Commands::Cancel { checklist } => cli::admin::cancel(&ctx, &checklist).await,
        Commands::Outlets { action } => cli::admin::outlets(&ctx, action).await,
        Commands::Templates { action } => cli::admin::templates(&ctx, action).await,
        Commands::Users { action } => cli::admin::users(&ctx, action).await,
        Commands::Dashboard { json } => cli::admin::dashboard(&ctx, json).await,
        Commands::Recipients { action } => cli::admin::recipients(&ctx, action).await,
        Commands::Notify { checklist, test } => {
            cli::admin::notify(&ctx, checklist.as_ref(), test).await
        }
    }
}
