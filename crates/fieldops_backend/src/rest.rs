//! REST client for a Supabase-style backing service.
//!
//! Raw HTTP over `reqwest`: PostgREST for rows, the storage API for
//! objects, GoTrue for auth and the functions gateway.

use crate::traits::{
    AuthProvider, AuthSession, FunctionInvoker, ObjectStore, Query, RowStore, Table,
    UploadOptions,
};
use crate::{BackendError, Result};
use async_trait::async_trait;
use fieldops_ids::UserId;
use fieldops_protocol::BackendConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// Error body shapes returned by the various services.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// One client for all four service seams.
pub struct RestBackend {
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
    http_client: reqwest::Client,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(BackendError::config(
                "backend url and anon key must be set (config.toml or FIELDOPS_URL/FIELDOPS_ANON_KEY)",
            ));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|e| BackendError::config(format!("anon key is not a valid header: {}", e)))?;
        headers.insert("apikey", key);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: RwLock::new(config.access_token.clone()),
            http_client,
        })
    }

    /// Current bearer token, if signed in.
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        self.http_client
            .request(method, self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
    }

    fn rest_path(table: Table) -> String {
        format!("/rest/v1/{}", table.as_str())
    }

    async fn rows(response: Response) -> Result<Vec<Value>> {
        let response = check_status(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }
}

/// Map a non-success response onto [`BackendError`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .or(body.error_description)
        .or(body.msg)
        .or(body.error.clone())
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.to_string()
            } else {
                text.clone()
            }
        });
    let code = match body.code {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    tracing::debug!(status = %status, code = ?code, message = %message, "Request rejected");

    if message.contains("Bucket not found") {
        return Err(BackendError::BucketNotFound(message));
    }
    if status.as_u16() == 401 {
        return Err(BackendError::unauthorized(message));
    }
    Err(BackendError::Status {
        status: status.as_u16(),
        code,
        message,
    })
}

#[async_trait]
impl RowStore for RestBackend {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        let response = self
            .request(Method::GET, &Self::rest_path(table))
            .await
            .query(&[("select", "*")])
            .query(&query.to_params())
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(table = %table, count = rows.len(), "Inserting rows");
        let response = self
            .request(Method::POST, &Self::rest_path(table))
            .await
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&Value::Array(rows))
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn update(&self, table: Table, query: &Query, patch: Value) -> Result<Vec<Value>> {
        if query.filters.is_empty() {
            return Err(BackendError::config("refusing to update without a filter"));
        }
        let response = self
            .request(Method::PATCH, &Self::rest_path(table))
            .await
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&query.to_params())
            .json(&patch)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn upsert(&self, table: Table, row: Value) -> Result<Value> {
        let response = self
            .request(Method::POST, &Self::rest_path(table))
            .await
            .header("Prefer", MERGE_DUPLICATES)
            .json(&row)
            .send()
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("upsert into {} returned no row", table)))
    }

    async fn delete(&self, table: Table, query: &Query) -> Result<()> {
        if query.filters.is_empty() {
            return Err(BackendError::config("refusing to delete without a filter"));
        }
        let response = self
            .request(Method::DELETE, &Self::rest_path(table))
            .await
            .query(&query.to_params())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        let response = self
            .request(Method::POST, &format!("/rest/v1/rpc/{}", function))
            .await
            .json(&args)
            .send()
            .await?;
        let text = check_status(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ObjectStore for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<()> {
        tracing::debug!(bucket, path, size = bytes.len(), "Uploading object");
        let mut request = self
            .request(Method::POST, &format!("/storage/v1/object/{}/{}", bucket, path))
            .await
            .header(CONTENT_TYPE, options.content_type.as_str())
            .header("x-upsert", if options.upsert { "true" } else { "false" });
        if let Some(seconds) = options.cache_control {
            request = request.header(CACHE_CONTROL, format!("max-age={}", seconds));
        }
        let response = request.body(bytes).send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{}/{}", bucket, path))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http_client.get(url).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn current_session(&self) -> Result<Option<AuthSession>> {
        let Some(token) = self.access_token().await else {
            return Ok(None);
        };
        let response = self.request(Method::GET, "/auth/v1/user").await.send().await?;
        match check_status(response).await {
            Ok(response) => {
                let user: AuthUser = response.json().await?;
                Ok(Some(AuthSession {
                    access_token: token,
                    user_id: user.id,
                    email: user.email,
                }))
            }
            Err(BackendError::Unauthorized(reason)) => {
                tracing::info!(reason = %reason, "Stored session token rejected");
                Ok(None)
            }
            Err(BackendError::Status { status: 403, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .http_client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = match check_status(response).await {
            Err(BackendError::Status { status: 400, message, .. }) => {
                return Err(BackendError::unauthorized(message))
            }
            other => other?,
        };
        let token: TokenResponse = response.json().await?;
        self.set_access_token(Some(token.access_token.clone())).await;
        tracing::info!(user_id = %token.user.id, "Signed in");
        Ok(AuthSession {
            access_token: token.access_token,
            user_id: token.user.id,
            email: token.user.email,
        })
    }

    async fn sign_out_local(&self) -> Result<()> {
        self.set_access_token(None).await;
        Ok(())
    }
}

#[async_trait]
impl FunctionInvoker for RestBackend {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        let response = self
            .request(Method::POST, &format!("/functions/v1/{}", name))
            .await
            .json(&body)
            .send()
            .await?;
        let text = check_status(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        // Functions may answer with plain text.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
