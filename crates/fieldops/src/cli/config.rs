//! `fieldops config`: where things live and how the backend is set up.

use crate::cli::output::print_table;
use anyhow::Result;
use fieldops_protocol::{paths, AppConfig};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Write a config file with default values if none exists
    #[arg(long)]
    pub init: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    home: PathBuf,
    config_file: PathBuf,
    config_exists: bool,
    session_dir: PathBuf,
    logs_dir: PathBuf,
    reports_dir: PathBuf,
    backend_url: String,
    configured: bool,
    signed_in: bool,
    access_token: Option<String>,
    photos_bucket: String,
    reports_bucket: String,
}

pub fn run(args: &ConfigArgs) -> Result<()> {
    let config_path = paths::config_path();

    if args.init {
        if config_path.exists() {
            println!("Config already exists: {}", config_path.display());
        } else {
            AppConfig::default().save(&config_path)?;
            println!("Wrote default config: {}", config_path.display());
            println!("Set backend.url and backend.anon_key, then run 'fieldops login'.");
        }
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&config_path)?;
    config.apply_env();
    let report = ConfigReport {
        home: paths::fieldops_home(),
        config_exists: config_path.exists(),
        config_file: config_path,
        session_dir: config.session.resolved_dir(),
        logs_dir: fieldops_logging::logs_dir(),
        reports_dir: paths::reports_dir(),
        backend_url: config.backend.url.clone(),
        configured: config.backend.is_configured(),
        signed_in: config.backend.access_token.is_some(),
        access_token: config.backend.access_token.as_deref().map(mask_token),
        photos_bucket: config.backend.photos_bucket.clone(),
        reports_bucket: config.backend.reports_bucket.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
    let rows = vec![
        vec!["Home".into(), report.home.display().to_string()],
        vec![
            "Config file".into(),
            format!(
                "{}{}",
                report.config_file.display(),
                if report.config_exists { "" } else { " (missing)" }
            ),
        ],
        vec!["Session dir".into(), report.session_dir.display().to_string()],
        vec!["Logs dir".into(), report.logs_dir.display().to_string()],
        vec!["Reports dir".into(), report.reports_dir.display().to_string()],
        vec!["Backend URL".into(), non_empty(&report.backend_url)],
        vec!["Configured".into(), yes_no(report.configured)],
        vec![
            "Signed in".into(),
            match &report.access_token {
                Some(masked) => format!("yes ({})", masked),
                None => "no".into(),
            },
        ],
        vec!["Photos bucket".into(), report.photos_bucket.clone()],
        vec!["Reports bucket".into(), report.reports_bucket.clone()],
    ];
    print_table(&["Setting", "Value"], rows);
    Ok(())
}

fn non_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "(not set)".to_string()
    } else {
        value.to_string()
    }
}

/// Keep only enough of a token to tell two apart.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("short"), "****");
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload.sig"), "eyJh....sig");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), "(not set)");
        assert_eq!(non_empty("https://x.supabase.co"), "https://x.supabase.co");
    }
}
