//! Backing-service access for Field Ops.
//!
//! Every client (CLI, tests, future UIs) goes through this crate for rows,
//! objects, auth and server functions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fieldops_backend::{FieldOpsDb, RestBackend};
//!
//! let backend = Arc::new(RestBackend::new(&config.backend)?);
//! let db = FieldOpsDb::new(backend.clone());
//!
//! let tasks = db.list_tasks().await?;
//! let checklist = db.get_checklist(&id).await?;
//! ```

mod error;
mod rest;
mod traits;

// Typed row access organized by table
mod checklists;
mod outlets;
mod recipients;
mod tasks;
mod templates;
mod users;

pub use error::{BackendError, Result, NOT_FOUND_CODE};
pub use rest::RestBackend;
pub use traits::{
    AuthProvider, AuthSession, FunctionInvoker, ObjectStore, Query, RowStore, Table,
    UploadOptions,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Typed access to the row store.
#[derive(Clone)]
pub struct FieldOpsDb {
    rows: Arc<dyn RowStore>,
}

impl FieldOpsDb {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &Arc<dyn RowStore> {
        &self.rows
    }

    async fn select_as<T: DeserializeOwned>(&self, table: Table, query: &Query) -> Result<Vec<T>> {
        self.rows
            .select(table, query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(BackendError::from))
            .collect()
    }

    /// Exactly one row, or `NotFound` carrying the PostgREST code.
    async fn select_one<T: DeserializeOwned>(&self, table: Table, query: &Query) -> Result<T> {
        let mut rows = self.select_as::<T>(table, &query.clone().limit(1)).await?;
        if rows.is_empty() {
            return Err(BackendError::not_found(format!(
                "{}: no {} row matches {:?}",
                NOT_FOUND_CODE, table, query.filters
            )));
        }
        Ok(rows.remove(0))
    }

    async fn insert_as<P: Serialize, T: DeserializeOwned>(
        &self,
        table: Table,
        payload: &[P],
    ) -> Result<Vec<T>> {
        let rows = payload
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.rows
            .insert(table, rows)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(BackendError::from))
            .collect()
    }

    async fn update_by_id<T: DeserializeOwned>(
        &self,
        table: Table,
        id: &str,
        patch: Value,
    ) -> Result<T> {
        let row = self
            .rows
            .update(table, &Query::new().eq("id", id), patch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                BackendError::not_found(format!("{}: no {} row with id {}", NOT_FOUND_CODE, table, id))
            })?;
        Ok(serde_json::from_value(row)?)
    }

    async fn delete_by_id(&self, table: Table, id: &str) -> Result<()> {
        self.rows.delete(table, &Query::new().eq("id", id)).await
    }
}
