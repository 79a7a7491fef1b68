//! In-memory implementation of every backing-service seam.

use async_trait::async_trait;
use fieldops_backend::{
    AuthProvider, AuthSession, BackendError, FieldOpsDb, FunctionInvoker, ObjectStore, Query,
    Result, RowStore, Table, UploadOptions,
};
use fieldops_ids::UserId;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const PUBLIC_URL_PREFIX: &str = "https://storage.test";

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
    Rpc,
    Upload,
    Download,
    Invoke,
    CurrentSession,
}

/// Failure to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Status(u16),
    Unauthorized,
}

impl FailureKind {
    fn into_error(self, op: Operation) -> BackendError {
        match self {
            FailureKind::Unavailable => BackendError::Unavailable(format!("injected {:?} failure", op)),
            FailureKind::Status(status) => BackendError::Status {
                status,
                code: None,
                message: format!("injected {:?} failure", op),
            },
            FailureKind::Unauthorized => BackendError::unauthorized("injected"),
        }
    }
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub options: UploadOptions,
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Value>>,
    objects: HashMap<(String, String), StoredObject>,
    buckets: HashSet<String>,
    failures: HashMap<Operation, VecDeque<FailureKind>>,
    session: Option<AuthSession>,
    credentials: HashMap<String, (String, UserId)>,
    invocations: Vec<(String, Value)>,
}

/// Rows, buckets, auth and functions held in memory.
///
/// Cloning shares the same state, so a test can keep a handle while the
/// code under test owns another.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    uploads: Arc<AtomicUsize>,
    inserted_rows: Arc<AtomicUsize>,
    insert_calls: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    selects: Arc<AtomicUsize>,
    session_delay: Arc<Mutex<Option<Duration>>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty store with the default photo and report buckets.
    pub fn new() -> Self {
        let backend = Self {
            state: Arc::new(Mutex::new(State::default())),
            uploads: Arc::new(AtomicUsize::new(0)),
            inserted_rows: Arc::new(AtomicUsize::new(0)),
            insert_calls: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(AtomicUsize::new(0)),
            selects: Arc::new(AtomicUsize::new(0)),
            session_delay: Arc::new(Mutex::new(None)),
        };
        backend.add_bucket("field-ops-photos");
        backend.add_bucket("field-ops-reports");
        backend
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn db(&self) -> FieldOpsDb {
        FieldOpsDb::new(Arc::new(self.clone()))
    }

    pub fn add_bucket(&self, bucket: &str) {
        self.state().buckets.insert(bucket.to_string());
    }

    pub fn remove_bucket(&self, bucket: &str) {
        self.state().buckets.remove(bucket);
    }

    /// Fail the next `times` calls of `op` with `kind`.
    pub fn fail_next(&self, op: Operation, times: usize, kind: FailureKind) {
        let mut state = self.state();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(kind.clone());
        }
    }

    fn take_failure(&self, op: Operation) -> Result<()> {
        let failure = self
            .state()
            .failures
            .get_mut(&op)
            .and_then(|queue| queue.pop_front());
        match failure {
            Some(kind) => Err(kind.into_error(op)),
            None => Ok(()),
        }
    }

    /// Put raw rows into a table, filling `id` and `created_at` like the store does.
    pub fn seed(&self, table: Table, rows: Vec<Value>) -> Vec<Value> {
        let mut state = self.state();
        let stored: Vec<Value> = rows.into_iter().map(with_defaults).collect();
        state
            .tables
            .entry(table)
            .or_default()
            .extend(stored.iter().cloned());
        stored
    }

    pub fn rows_in(&self, table: Table) -> Vec<Value> {
        self.state().tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Paths stored in a bucket, sorted.
    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn inserted_row_count(&self) -> usize {
        self.inserted_rows.load(Ordering::SeqCst)
    }

    pub fn insert_call_count(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn select_count(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.state().invocations.clone()
    }

    /// Register a password login.
    pub fn add_login(&self, email: &str, password: &str, user_id: UserId) {
        self.state()
            .credentials
            .insert(email.to_string(), (password.to_string(), user_id));
    }

    /// Start signed in as `user_id`.
    pub fn sign_in_as(&self, user_id: UserId, email: &str) {
        self.state().session = Some(AuthSession {
            access_token: format!("token-{}", user_id.short()),
            user_id,
            email: Some(email.to_string()),
        });
    }

    pub fn is_signed_in(&self) -> bool {
        self.state().session.is_some()
    }

    /// Make `current_session` slow, for grace-period tests.
    pub fn delay_session_check(&self, delay: Duration) {
        *self.session_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }
}

fn with_defaults(mut row: Value) -> Value {
    if let Value::Object(map) = &mut row {
        let missing_id = map.get("id").map(Value::is_null).unwrap_or(true);
        if missing_id {
            map.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        if !map.contains_key("created_at") {
            map.insert("created_at".into(), Value::String(chrono::Utc::now().to_rfc3339()));
        }
    }
    row
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(dst), Value::Object(src)) = (target, patch) {
        for (key, value) in src {
            dst.insert(key.clone(), value.clone());
        }
    }
}

fn sort_key(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl RowStore for MemoryBackend {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        self.take_failure(Operation::Select)?;
        self.selects.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<Value> = self
            .rows_in(table)
            .into_iter()
            .filter(|row| query.matches(row))
            .collect();
        if let Some((column, ascending)) = &query.order {
            rows.sort_by(|a, b| sort_key(a, column).cmp(&sort_key(b, column)));
            if !ascending {
                rows.reverse();
            }
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        self.take_failure(Operation::Insert)?;
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inserted_rows.fetch_add(rows.len(), Ordering::SeqCst);
        Ok(self.seed(table, rows))
    }

    async fn update(&self, table: Table, query: &Query, patch: Value) -> Result<Vec<Value>> {
        self.take_failure(Operation::Update)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        let rows = state.tables.entry(table).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            merge(row, &patch);
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn upsert(&self, table: Table, row: Value) -> Result<Value> {
        self.take_failure(Operation::Upsert)?;
        let id = row.get("id").and_then(Value::as_str).map(str::to_string);
        let mut state = self.state();
        let rows = state.tables.entry(table).or_default();
        if let Some(id) = id {
            if let Some(existing) = rows
                .iter_mut()
                .find(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
            {
                merge(existing, &row);
                return Ok(existing.clone());
            }
        }
        let stored = with_defaults(row);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, table: Table, query: &Query) -> Result<()> {
        self.take_failure(Operation::Delete)?;
        let mut state = self.state();
        if let Some(rows) = state.tables.get_mut(&table) {
            rows.retain(|row| !query.matches(row));
        }
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        self.take_failure(Operation::Rpc)?;
        match function {
            "add_email_recipient" => {
                let email = args.get("p_email").cloned().unwrap_or(Value::Null);
                let name = args.get("p_name").cloned().unwrap_or(Value::Null);
                let exists = self
                    .rows_in(Table::EmailRecipients)
                    .iter()
                    .any(|r| r.get("email") == Some(&email));
                if exists {
                    return Err(BackendError::Status {
                        status: 409,
                        code: Some("23505".into()),
                        message: "duplicate key value violates unique constraint".into(),
                    });
                }
                let mut row = Map::new();
                row.insert("email".into(), email);
                row.insert("name".into(), name);
                let stored = self.seed(Table::EmailRecipients, vec![Value::Object(row)]);
                Ok(stored.into_iter().next().unwrap_or(Value::Null))
            }
            other => Err(BackendError::Status {
                status: 404,
                code: Some("PGRST202".into()),
                message: format!("Could not find the function public.{}", other),
            }),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<()> {
        self.take_failure(Operation::Upload)?;
        let mut state = self.state();
        if !state.buckets.contains(bucket) {
            return Err(BackendError::BucketNotFound(format!("Bucket not found: {}", bucket)));
        }
        let key = (bucket.to_string(), path.to_string());
        if state.objects.contains_key(&key) && !options.upsert {
            return Err(BackendError::Status {
                status: 409,
                code: Some("Duplicate".into()),
                message: "The resource already exists".into(),
            });
        }
        state.objects.insert(
            key,
            StoredObject {
                bytes,
                options: options.clone(),
            },
        );
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_URL_PREFIX, bucket, path)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.take_failure(Operation::Download)?;
        let rest = url
            .strip_prefix(PUBLIC_URL_PREFIX)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| BackendError::not_found(format!("not a stored object: {}", url)))?;
        let (bucket, path) = rest
            .split_once('/')
            .ok_or_else(|| BackendError::not_found(format!("not a stored object: {}", url)))?;
        self.object(bucket, path)
            .map(|o| o.bytes)
            .ok_or_else(|| BackendError::Status {
                status: 404,
                code: None,
                message: format!("Object not found: {}", url),
            })
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn current_session(&self) -> Result<Option<AuthSession>> {
        let delay = *self.session_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.take_failure(Operation::CurrentSession)?;
        Ok(self.state().session.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut state = self.state();
        let user_id = match state.credentials.get(email) {
            Some((expected, user_id)) if expected == password => user_id.clone(),
            _ => return Err(BackendError::unauthorized("Invalid login credentials")),
        };
        let session = AuthSession {
            access_token: format!("token-{}", user_id.short()),
            user_id,
            email: Some(email.to_string()),
        };
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out_local(&self) -> Result<()> {
        self.state().session = None;
        Ok(())
    }
}

#[async_trait]
impl FunctionInvoker for MemoryBackend {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        self.take_failure(Operation::Invoke)?;
        self.state().invocations.push((name.to_string(), body));
        Ok(json!({ "ok": true }))
    }
}
