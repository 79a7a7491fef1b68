//! Report e-mail recipients and the notification function.

use crate::admin::require_admin;
use crate::{AuditError, Result, Services};
use chrono::NaiveDate;
use fieldops_ids::RecipientId;
use fieldops_protocol::{Checklist, EmailRecipient, User};
use serde::Serialize;

/// Body of the report notification function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportNotification {
    pub email: Vec<String>,
    pub auditor_name: String,
    pub location: String,
    pub date: String,
    pub report_url: String,
}

impl ReportNotification {
    pub fn for_checklist(
        checklist: &Checklist,
        auditor: Option<&User>,
        recipients: Vec<String>,
    ) -> Result<Self> {
        let report_url = checklist
            .report_url
            .clone()
            .ok_or_else(|| AuditError::invalid_state("checklist has no report yet"))?;
        let date = checklist
            .check_out_time
            .map(|t| t.date_naive())
            .or(checklist.due_date)
            .map(format_date)
            .unwrap_or_default();
        Ok(Self {
            email: recipients,
            auditor_name: auditor
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            location: checklist.location.clone().unwrap_or_default(),
            date,
            report_url,
        })
    }
}

/// `local@domain.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub async fn list_recipients(services: &Services, actor: &User) -> Result<Vec<EmailRecipient>> {
    require_admin(actor)?;
    Ok(services.db.list_recipients().await?)
}

/// Add a recipient. The name defaults to the part of the address before `@`.
pub async fn add_recipient(
    services: &Services,
    actor: &User,
    email: &str,
    name: Option<&str>,
) -> Result<()> {
    require_admin(actor)?;
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(AuditError::invalid(format!("'{}' is not a valid e-mail address", email)));
    }
    let name = match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => email.split('@').next().unwrap_or(email).to_string(),
    };
    services.db.add_recipient(email, &name).await?;
    Ok(())
}

pub async fn remove_recipient(services: &Services, actor: &User, id: &RecipientId) -> Result<()> {
    require_admin(actor)?;
    Ok(services.db.remove_recipient(id).await?)
}

/// Mail a finished report to every configured recipient.
///
/// Returns the number of addresses the function was asked to reach.
pub async fn send_report_notification(
    services: &Services,
    checklist: &Checklist,
    auditor: Option<&User>,
) -> Result<usize> {
    let recipients: Vec<String> = services
        .db
        .list_recipients()
        .await?
        .into_iter()
        .map(|r| r.email)
        .collect();
    if recipients.is_empty() {
        return Err(AuditError::invalid("no e-mail recipients are configured"));
    }
    let body = ReportNotification::for_checklist(checklist, auditor, recipients)?;
    invoke(services, &body).await
}

/// Send a sample notification to the recipients and the acting admin.
pub async fn send_test_notification(services: &Services, actor: &User) -> Result<usize> {
    let mut email: Vec<String> = list_recipients(services, actor)
        .await?
        .into_iter()
        .map(|r| r.email)
        .collect();
    if !email.contains(&actor.email) {
        email.push(actor.email.clone());
    }
    let body = ReportNotification {
        email,
        auditor_name: "Test User".to_string(),
        location: "Test Location".to_string(),
        date: format_date(services.clock.today()),
        report_url: "https://example.com/test-report.pdf".to_string(),
    };
    invoke(services, &body).await
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

async fn invoke(services: &Services, body: &ReportNotification) -> Result<usize> {
    let function = &services.config.backend.report_function;
    let payload =
        serde_json::to_value(body).map_err(|e| AuditError::invalid(e.to_string()))?;
    services.functions.invoke(function, payload).await?;
    tracing::info!(
        function = %function,
        recipients = body.email.len(),
        location = %body.location,
        "Report notification sent"
    );
    Ok(body.email.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("ops@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.co"));
        assert!(!is_valid_email("ops@example"));
        assert!(!is_valid_email("ops example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a@.com"));
    }

    #[test]
    fn test_notification_body_uses_camel_case() {
        let body = ReportNotification {
            email: vec!["ops@example.com".into()],
            auditor_name: "Dewi".into(),
            location: "Jakarta-1".into(),
            date: "2024-03-01".into(),
            report_url: "https://cdn/report.pdf".into(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["auditorName"], "Dewi");
        assert_eq!(value["reportUrl"], "https://cdn/report.pdf");
        assert_eq!(value["email"][0], "ops@example.com");
    }
}
