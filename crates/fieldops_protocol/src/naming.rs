//! Deterministic object names in the storage buckets.

use chrono::NaiveDate;
use fieldops_ids::{ChecklistId, ItemId};
use std::fmt;

/// Which field of a checklist a media object belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaSlot {
    Signature,
    Selfie,
    Item(ItemId),
    /// Proof photo attached when resolving a finding.
    Proof,
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSlot::Signature => write!(f, "signature"),
            MediaSlot::Selfie => write!(f, "selfie"),
            MediaSlot::Item(id) => write!(f, "{}", id),
            MediaSlot::Proof => write!(f, "proof"),
        }
    }
}

/// `{checklist_id}/{slot}/{timestamp_ms}-{index}.{ext}`
pub fn media_object_path(
    checklist_id: &ChecklistId,
    slot: &MediaSlot,
    timestamp_ms: i64,
    index: usize,
    extension: &str,
) -> String {
    format!(
        "{}/{}/{}-{}.{}",
        checklist_id,
        sanitize_component(&slot.to_string()),
        timestamp_ms,
        index,
        extension
    )
}

/// `audit-report_{auditor}_{location}_{date}_{id8}.pdf`
pub fn report_file_name(
    auditor: Option<&str>,
    location: Option<&str>,
    date: NaiveDate,
    checklist_id: &ChecklistId,
) -> String {
    format!(
        "audit-report_{}_{}_{}_{}.pdf",
        sanitize_component(auditor.unwrap_or("")),
        sanitize_component(location.unwrap_or("")),
        date.format("%Y-%m-%d"),
        checklist_id.short()
    )
}

/// Reduce free text to `[A-Za-z0-9-]`, collapsing runs of anything else.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_object_path_layout() {
        let id = ChecklistId::parse("0b6a4f1e-2d55-4f53-9d0e-5f7f9b2b8a11").unwrap();
        let slot = MediaSlot::Item(ItemId::parse("q 1").unwrap());
        assert_eq!(
            media_object_path(&id, &slot, 1_700_000_000_000, 2, "jpg"),
            "0b6a4f1e-2d55-4f53-9d0e-5f7f9b2b8a11/q-1/1700000000000-2.jpg"
        );
        assert_eq!(
            media_object_path(&id, &MediaSlot::Signature, 5, 0, "png"),
            "0b6a4f1e-2d55-4f53-9d0e-5f7f9b2b8a11/signature/5-0.png"
        );
    }

    #[test]
    fn test_report_file_name_is_sanitized() {
        let id = ChecklistId::parse("0b6a4f1e-2d55-4f53-9d0e-5f7f9b2b8a11").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            report_file_name(Some("Siti Rahma"), Some("Jakarta-1 / Mall"), date, &id),
            "audit-report_Siti-Rahma_Jakarta-1-Mall_2024-03-01_0b6a4f1e.pdf"
        );
        assert_eq!(
            report_file_name(None, None, date, &id),
            "audit-report_unknown_unknown_2024-03-01_0b6a4f1e.pdf"
        );
    }
}
