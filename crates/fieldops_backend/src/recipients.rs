use crate::{FieldOpsDb, Query, Result, Table};
use fieldops_ids::RecipientId;
use fieldops_protocol::EmailRecipient;
use serde_json::json;

const ADD_RECIPIENT_RPC: &str = "add_email_recipient";

impl FieldOpsDb {
    pub async fn list_recipients(&self) -> Result<Vec<EmailRecipient>> {
        self.select_as(
            Table::EmailRecipients,
            &Query::new().order_by("created_at", false),
        )
        .await
    }

    /// Add through the server procedure, which owns duplicate handling.
    pub async fn add_recipient(&self, email: &str, name: &str) -> Result<()> {
        self.rows
            .rpc(ADD_RECIPIENT_RPC, json!({ "p_email": email, "p_name": name }))
            .await?;
        tracing::info!(email, "Email recipient added");
        Ok(())
    }

    pub async fn remove_recipient(&self, id: &RecipientId) -> Result<()> {
        self.delete_by_id(Table::EmailRecipients, id.as_str()).await
    }
}
