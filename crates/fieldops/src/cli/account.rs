//! Sign-in, sign-out and profile display.

use crate::cli::context::Context;
use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table};
use anyhow::Result;
use fieldops_backend::{AuthProvider, BackendError};
use fieldops_core::{sign_in, AuditError};
use fieldops_protocol::Role;
use fieldops_session::NavState;

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Account e-mail
    #[arg(long, env = "FIELDOPS_EMAIL")]
    pub email: String,

    /// Account password
    #[arg(long, env = "FIELDOPS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn login(ctx: &Context, args: LoginArgs) -> Result<()> {
    let user = match sign_in(&ctx.services, args.email.trim(), &args.password).await {
        Ok(user) => user,
        Err(AuditError::Backend(BackendError::Unauthorized(reason))) => {
            return Err(HelpfulError::login_failed(&args.email, &reason).into());
        }
        Err(e) => return Err(e.into()),
    };

    ctx.save_token(ctx.rest.access_token().await)?;
    NavState::landing(user.role).save(ctx.kv()?.as_ref())?;
    tracing::info!(user_id = %user.id, role = %user.role, "Signed in");

    println!("Signed in as {} ({})", user.display_name(), user.role);
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    if let Err(e) = ctx.rest.sign_out_local().await {
        tracing::warn!(error = %e, "Sign-out request failed, clearing local session anyway");
    }
    ctx.save_token(None)?;
    NavState::landing(Role::Auditor).save(ctx.kv()?.as_ref())?;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(ctx: &Context, json: bool) -> Result<()> {
    let user = ctx.current_user().await?;
    if json {
        return print_json(&user);
    }
    print_table(
        &["Field", "Value"],
        vec![
            vec!["Name".into(), user.display_name().to_string()],
            vec!["E-mail".into(), user.email.clone()],
            vec!["Role".into(), user.role.to_string()],
            vec![
                "Location".into(),
                user.location.clone().unwrap_or_else(|| "-".into()),
            ],
            vec!["Id".into(), user.id.to_string()],
        ],
    );
    Ok(())
}
