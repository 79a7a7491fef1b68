//! Which screen the client is on, persisted across restarts.

use crate::{KeyValueStore, Result};
use fieldops_ids::ChecklistId;
use fieldops_protocol::{Role, View};
use serde::{Deserialize, Serialize};

pub const NAV_KEY: &str = "fieldops.nav";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavState {
    pub view: View,
    #[serde(default)]
    pub selected_checklist: Option<ChecklistId>,
    /// An audit is open and its snapshot should be restored on reload.
    #[serde(default)]
    pub draft_active: bool,
}

impl NavState {
    /// Fresh state after sign-in.
    pub fn landing(role: Role) -> Self {
        Self {
            view: View::landing(role),
            selected_checklist: None,
            draft_active: false,
        }
    }

    /// Open a checklist for auditing.
    pub fn select_checklist(&mut self, id: ChecklistId) {
        self.view = View::Checklists;
        self.selected_checklist = Some(id);
        self.draft_active = true;
    }

    /// Leave the open checklist and return to the role's landing view.
    pub fn back_to_list(&mut self, role: Role) {
        *self = Self::landing(role);
    }

    /// Switch view. Admin-only views are refused for auditors.
    pub fn set_view(&mut self, view: View, role: Role) -> bool {
        if view.requires_admin() && !role.is_admin() {
            tracing::warn!(view = ?view, role = %role, "View not permitted");
            return false;
        }
        self.view = view;
        self.selected_checklist = None;
        self.draft_active = false;
        true
    }

    /// Stored state, or the landing view when nothing usable is stored.
    pub fn load(store: &dyn KeyValueStore, role: Role) -> Result<Self> {
        let Some(raw) = store.get(NAV_KEY)? else {
            return Ok(Self::landing(role));
        };
        match serde_json::from_str::<NavState>(&raw) {
            Ok(state) if !state.view.requires_admin() || role.is_admin() => Ok(state),
            Ok(_) => Ok(Self::landing(role)),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable navigation state, resetting");
                Ok(Self::landing(role))
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(NAV_KEY, &serde_json::to_string(self)?)
    }
}
