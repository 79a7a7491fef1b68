//! Shared state for commands that talk to the backend.

use crate::cli::error::HelpfulError;
use anyhow::Result;
use fieldops_backend::{FieldOpsDb, RestBackend};
use fieldops_core::{bootstrap_profile, check_session, require_admin, Services};
use fieldops_protocol::{paths, AppConfig, MediaRef, User};
use fieldops_session::FileKeyStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Context {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub rest: Arc<RestBackend>,
    pub services: Services,
}

impl Context {
    /// Read `config.toml` plus environment overrides and connect.
    pub fn load() -> Result<Self> {
        let config_path = paths::config_path();
        let mut config = AppConfig::load_or_default(&config_path)?;
        config.apply_env();
        if !config.backend.is_configured() {
            return Err(HelpfulError::not_configured(&config_path).into());
        }

        let rest = Arc::new(RestBackend::new(&config.backend)?);
        let services = Services::new(
            FieldOpsDb::new(rest.clone()),
            rest.clone(),
            rest.clone(),
            rest.clone(),
            config.clone(),
        );
        tracing::debug!(url = %config.backend.url, "Backend context ready");

        Ok(Self {
            config,
            config_path,
            rest,
            services,
        })
    }

    /// The signed-in user's profile, provisioned on first use.
    pub async fn current_user(&self) -> Result<User> {
        let Some(session) = check_session(&self.services).await else {
            return Err(HelpfulError::not_signed_in().into());
        };
        match bootstrap_profile(&self.services, &session).await {
            Ok(user) => Ok(user),
            Err(e) => {
                // Setup failures sign out; keep the stored token in step.
                self.save_token(None)?;
                Err(e.into())
            }
        }
    }

    pub async fn require_admin(&self) -> Result<User> {
        let user = self.current_user().await?;
        if require_admin(&user).is_err() {
            return Err(HelpfulError::not_admin(&user).into());
        }
        Ok(user)
    }

    /// Key store holding navigation state and audit snapshots.
    pub fn kv(&self) -> Result<Arc<FileKeyStore>> {
        let session = &self.config.session;
        Ok(Arc::new(FileKeyStore::open(
            session.resolved_dir(),
            session.max_value_bytes,
        )?))
    }

    /// Persist the access token to the config file.
    ///
    /// Re-reads the file so environment overrides are never written back.
    pub fn save_token(&self, token: Option<String>) -> Result<()> {
        let mut on_disk = AppConfig::load_or_default(&self.config_path)?;
        on_disk.backend.access_token = token;
        on_disk.save(&self.config_path)?;
        Ok(())
    }
}

/// Load a photo, video or signature image from disk.
pub fn read_media(path: &Path) -> Result<MediaRef> {
    if !path.is_file() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let bytes = std::fs::read(path)?;
    Ok(MediaRef::from_bytes(&bytes, content_type_for(path)))
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
