//! In-progress audit snapshots.
//!
//! A snapshot is written after every change to the checklist being audited,
//! the current item index or the flow phase. When the store refuses the
//! value for size, a degraded snapshot without local media payloads is
//! written instead so answers and notes still survive a restart.

use crate::{KeyValueStore, Result};
use chrono::{DateTime, Utc};
use fieldops_ids::ChecklistId;
use fieldops_protocol::{Checklist, MediaRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const AUDIT_KEY_PREFIX: &str = "fieldops.audit.";

/// Key of the snapshot for one checklist.
pub fn audit_key(checklist_id: &ChecklistId) -> String {
    format!("{}{}", AUDIT_KEY_PREFIX, checklist_id)
}

/// Stage of an audit on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    #[default]
    PreCheckIn,
    InProgress,
    Checkout,
}

impl AuditPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditPhase::PreCheckIn => "pre_check_in",
            AuditPhase::InProgress => "in_progress",
            AuditPhase::Checkout => "checkout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub checklist: Checklist,
    pub current_index: usize,
    #[serde(default)]
    pub phase: AuditPhase,
    /// Signature drawn at checkout, kept until submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfie: Option<MediaRef>,
    pub saved_at: DateTime<Utc>,
}

/// How a snapshot ended up stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Full,
    /// Local media was dropped to fit the quota.
    Degraded { elided: usize },
}

fn elide(slot: &mut Option<MediaRef>) -> usize {
    match slot {
        Some(media) if media.is_local() => {
            *media = MediaRef::Elided;
            1
        }
        _ => 0,
    }
}

/// Replace every local media payload with [`MediaRef::Elided`].
///
/// Returns the number of payloads dropped.
pub fn degrade(snapshot: &mut AuditSnapshot) -> usize {
    let mut elided = elide(&mut snapshot.signature) + elide(&mut snapshot.selfie);
    let checklist = &mut snapshot.checklist;
    elided += elide(&mut checklist.auditor_signature) + elide(&mut checklist.selfie);
    for item in &mut checklist.items {
        for media in item.evidence.iter_mut().filter(|m| m.is_local()) {
            *media = MediaRef::Elided;
            elided += 1;
        }
        if let Some(finding) = item.finding.as_mut() {
            elided += elide(&mut finding.photo);
        }
    }
    elided
}

/// Snapshot persistence on top of a key/value store.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Write a snapshot, degrading it when the full value does not fit.
    pub fn persist(&self, snapshot: &AuditSnapshot) -> Result<PersistOutcome> {
        let key = audit_key(&snapshot.checklist.id);
        let full = serde_json::to_string(snapshot)?;
        match self.store.set(&key, &full) {
            Ok(()) => return Ok(PersistOutcome::Full),
            Err(e) if e.is_quota() => {
                tracing::warn!(key = %key, error = %e, "Snapshot over quota, dropping local media");
            }
            Err(e) => return Err(e),
        }

        let mut degraded = snapshot.clone();
        let elided = degrade(&mut degraded);
        let value = serde_json::to_string(&degraded)?;
        self.store.set(&key, &value)?;
        Ok(PersistOutcome::Degraded { elided })
    }

    /// The stored snapshot for a checklist.
    ///
    /// An unreadable snapshot, or one saved for a different checklist, is
    /// removed and reported as absent.
    pub fn restore(&self, checklist_id: &ChecklistId) -> Result<Option<AuditSnapshot>> {
        let key = audit_key(checklist_id);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<AuditSnapshot>(&raw) {
            Ok(snapshot) if snapshot.checklist.id == *checklist_id => {
                tracing::debug!(key = %key, index = snapshot.current_index, "Snapshot restored");
                Ok(Some(snapshot))
            }
            Ok(snapshot) => {
                tracing::warn!(
                    key = %key,
                    found = %snapshot.checklist.id,
                    "Snapshot belongs to another checklist, discarding"
                );
                self.discard(&key);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unreadable snapshot, discarding");
                self.discard(&key);
                Ok(None)
            }
        }
    }

    pub fn clear(&self, checklist_id: &ChecklistId) -> Result<()> {
        self.store.remove(&audit_key(checklist_id))
    }

    // Cleanup is best effort.
    fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "Failed to remove snapshot");
        }
    }
}
