//! Backing-service abstraction traits.
//!
//! The four seams a Field Ops client talks through: rows, objects, auth and
//! server functions. Rows travel as `serde_json::Value` so one
//! implementation serves every table; typed access lives in [`crate::FieldOpsDb`].

use crate::Result;
use async_trait::async_trait;
use fieldops_ids::UserId;
use serde_json::Value;
use std::fmt;

/// Tables of the row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Outlets,
    Checklists,
    Tasks,
    ChecklistTemplates,
    EmailRecipients,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Outlets => "outlets",
            Table::Checklists => "checklists",
            Table::Tasks => "tasks",
            Table::ChecklistTemplates => "checklist_templates",
            Table::EmailRecipients => "email_recipients",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Equality filters plus optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, String)>,
    /// Column and ascending flag.
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `?{column}=eq.{value}`
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a row satisfies every filter. Values compare as strings.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(column, expected)| match row.get(column) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }

    /// PostgREST query-string pairs.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
            .collect();
        if let Some((column, ascending)) = &self.order {
            let dir = if *ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Row store reached over REST.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>>;

    /// Insert a batch and return the stored rows in input order.
    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>>;

    /// Patch every matching row and return them.
    async fn update(&self, table: Table, query: &Query, patch: Value) -> Result<Vec<Value>>;

    /// Insert or merge on primary key.
    async fn upsert(&self, table: Table, row: Value) -> Result<Value>;

    async fn delete(&self, table: Table, query: &Query) -> Result<()>;

    /// Call a remote procedure.
    async fn rpc(&self, function: &str, args: Value) -> Result<Value>;
}

/// Upload settings for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub upsert: bool,
    /// Seconds, sent as `max-age`.
    pub cache_control: Option<u32>,
}

impl UploadOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            upsert: false,
            cache_control: None,
        }
    }

    pub fn with_upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    pub fn with_cache_control(mut self, seconds: u32) -> Self {
        self.cache_control = Some(seconds);
        self
    }
}

/// Object storage buckets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<()>;

    /// Public URL of an object. Does not check that it exists.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Fetch an object by its public URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: UserId,
    pub email: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session, or `None` when signed out or the token is rejected.
    async fn current_session(&self) -> Result<Option<AuthSession>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Drop the local session without contacting the service.
    async fn sign_out_local(&self) -> Result<()>;
}

/// Server-side functions.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value>;
}
