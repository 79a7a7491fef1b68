//! Shared row types, wire formats and configuration for Field Ops.
//!
//! Everything here mirrors what the backing store holds: enum columns,
//! JSON item arrays and media strings. No I/O beyond config files.

pub mod config;
pub mod item;
pub mod media;
pub mod model;
pub mod naming;
pub mod paths;
pub mod types;

pub use config::{
    AppConfig, BackendConfig, BootstrapConfig, ConfigError, FindingPolicy, MediaConfig,
    SessionConfig,
};
pub use item::{Answer, ChecklistItem, Finding, ItemDefinition};
pub use media::{MediaError, MediaPayload, MediaRef, ELIDED_TOKEN};
pub use model::{
    Checklist, ChecklistTemplate, EmailRecipient, NewChecklist, NewTask, Outlet, OutletDraft,
    Task, TemplateDraft, User, UserPatch,
};
pub use naming::{media_object_path, report_file_name, sanitize_component, MediaSlot};
pub use types::{
    ChecklistStatus, EvidenceSource, EvidenceType, QuestionType, Role, TaskPriority, TaskStatus,
    View, YesNo,
};

pub use fieldops_ids::{
    ChecklistId, IdParseError, ItemId, OutletId, RecipientId, TaskId, TemplateId, UserId,
};

use serde::{Deserialize, Deserializer};

/// Deserialize a field whose `null` means "default".
pub fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
