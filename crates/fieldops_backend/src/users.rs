//! User profile operations.

use crate::{FieldOpsDb, Query, Result, Table};
use fieldops_ids::UserId;
use fieldops_protocol::{User, UserPatch};

impl FieldOpsDb {
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.select_as(Table::Users, &Query::new().order_by("name", true))
            .await
    }

    /// Profile row for a user. `NotFound` when none exists yet.
    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        self.select_one(Table::Users, &Query::new().eq("id", id)).await
    }

    /// Create a profile row, used when provisioning a first login.
    pub async fn insert_user(&self, user: &User) -> Result<User> {
        let mut rows = self.insert_as(Table::Users, std::slice::from_ref(user)).await?;
        if rows.is_empty() {
            return Err(crate::BackendError::not_found(format!(
                "insert into users returned no row for {}",
                user.id
            )));
        }
        Ok(rows.remove(0))
    }

    pub async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        self.update_by_id(Table::Users, id.as_str(), serde_json::to_value(patch)?)
            .await
    }

    /// Deletes the profile only; login credentials stay with the auth service.
    pub async fn delete_user(&self, id: &UserId) -> Result<()> {
        self.delete_by_id(Table::Users, id.as_str()).await
    }
}
