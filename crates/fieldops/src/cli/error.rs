//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use fieldops_core::{ItemIssue, SubmissionFailure};
use fieldops_protocol::{BackendConfig, User};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Backend URL or anon key missing
    pub fn not_configured(config_path: &Path) -> Self {
        Self::new("Backend is not configured")
            .with_context(format!(
                "No project URL and anon key found in {} or the environment",
                config_path.display()
            ))
            .with_suggestions([
                "TRY: fieldops config --init   # write a config file with defaults".to_string(),
                format!("TRY: Set backend.url and backend.anon_key in {}", config_path.display()),
                "TRY: export FIELDOPS_URL=... FIELDOPS_ANON_KEY=...".to_string(),
            ])
    }

    /// No session, or the stored token was rejected
    pub fn not_signed_in() -> Self {
        Self::new("Not signed in")
            .with_context("No valid session token was found")
            .with_suggestion("TRY: fieldops login --email you@example.com")
    }

    pub fn login_failed(email: &str, reason: &str) -> Self {
        Self::new(format!("Sign-in failed for {}", email))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Check the e-mail address and password",
                "TRY: Pass the password through FIELDOPS_PASSWORD instead of the command line",
            ])
    }

    pub fn not_admin(user: &User) -> Self {
        Self::new("This command is for admins")
            .with_context(format!(
                "Signed in as {} with role {}",
                user.display_name(),
                user.role
            ))
            .with_suggestion("TRY: Ask an admin to run it, or sign in with an admin account")
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestion(format!("TRY: Check if the file exists: ls -la {}", path.display()))
    }

    /// An audit command ran with no checklist open
    pub fn no_open_audit() -> Self {
        Self::new("No audit is open")
            .with_context("Audit commands work on the checklist opened with 'audit start'")
            .with_suggestions([
                "TRY: fieldops audit list   # see your checklists",
                "TRY: fieldops audit start <CHECKLIST_ID>",
            ])
    }

    pub fn missing_signature() -> Self {
        Self::new("A signature is required before submitting")
            .with_suggestion("TRY: fieldops audit submit --signature signature.png")
    }

    /// `index` is zero-based.
    pub fn incomplete(index: usize, question: &str, issues: &[ItemIssue]) -> Self {
        let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
        Self::new(format!("Item {} is incomplete: {}", index + 1, question))
            .with_context(details.join("; "))
            .with_suggestions([
                "TRY: fieldops audit show   # the flow has moved to this item".to_string(),
                format!("TRY: fieldops audit answer --item {} --value ...", index + 1),
            ])
    }

    pub fn submission_failed(failure: &SubmissionFailure, backend: &BackendConfig) -> Self {
        Self::new(failure.user_message(backend))
            .with_context("Everything uploaded so far is kept in the local draft")
            .with_suggestion("TRY: fieldops audit submit   # resumes without uploading twice")
    }

    /// A name or id on the command line matched nothing
    pub fn unknown_reference(kind: &str, value: &str, known: &[String]) -> Self {
        let err = Self::new(format!("Unknown {}: '{}'", kind, value));
        if known.is_empty() {
            err.with_context(format!("There are no {}s yet", kind))
        } else {
            err.with_context(format!("Known {}s: {}", kind, known.join(", ")))
                .with_suggestion("TRY: Use the id or the exact name")
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
