//! Answer completeness.

use fieldops_protocol::{ChecklistItem, MediaRef, QuestionType};
use std::fmt;

/// Why an item is not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemIssue {
    MissingValue,
    MissingNote,
    NotEnoughEvidence { required: u32, found: usize },
}

impl fmt::Display for ItemIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemIssue::MissingValue => write!(f, "an answer is required"),
            ItemIssue::MissingNote => write!(f, "a note is required"),
            ItemIssue::NotEnoughEvidence { required, found } => {
                write!(f, "needs {} photo(s), has {}", required, found)
            }
        }
    }
}

/// Every reason an item is incomplete. Empty means complete.
pub fn validate_item(item: &ChecklistItem) -> Vec<ItemIssue> {
    let mut issues = Vec::new();
    let def = &item.definition;

    // Photo items are answered by their evidence alone.
    if def.required && def.question_type != QuestionType::Photo && !item.has_value() {
        issues.push(ItemIssue::MissingValue);
    }

    if def.require_note && item.note_text().trim().is_empty() {
        issues.push(ItemIssue::MissingNote);
    }

    // Payloads dropped by degraded persistence must be captured again.
    let required = def.min_evidence();
    let found = item
        .evidence
        .iter()
        .filter(|m| !matches!(m, MediaRef::Elided))
        .count();
    if required > 0 && found < required as usize {
        issues.push(ItemIssue::NotEnoughEvidence { required, found });
    }

    issues
}

pub fn is_complete(item: &ChecklistItem) -> bool {
    validate_item(item).is_empty()
}

/// Index and issues of the first incomplete item.
pub fn first_incomplete(items: &[ChecklistItem]) -> Option<(usize, Vec<ItemIssue>)> {
    items.iter().enumerate().find_map(|(index, item)| {
        let issues = validate_item(item);
        (!issues.is_empty()).then_some((index, issues))
    })
}

/// Issues for every incomplete item, in order.
pub fn validate_all(items: &[ChecklistItem]) -> Vec<(usize, Vec<ItemIssue>)> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let issues = validate_item(item);
            (!issues.is_empty()).then_some((index, issues))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_ids::ItemId;
    use fieldops_protocol::{Answer, ItemDefinition, YesNo};

    fn item(question_type: QuestionType) -> ChecklistItem {
        ChecklistItem::from_definition(ItemDefinition::new(
            ItemId::parse("i").unwrap(),
            "Question",
            question_type,
        ))
    }

    #[test]
    fn test_optional_item_is_complete_when_empty() {
        assert!(is_complete(&item(QuestionType::Text)));
    }

    #[test]
    fn test_required_value_must_not_be_blank() {
        let mut it = item(QuestionType::Text);
        it.definition.required = true;
        it.value = Some(Answer::Text("   ".into()));
        assert_eq!(validate_item(&it), vec![ItemIssue::MissingValue]);

        it.value = Some(Answer::Text("ok".into()));
        assert!(is_complete(&it));
    }

    #[test]
    fn test_note_and_evidence_rules_stack() {
        let mut it = item(QuestionType::YesNo);
        it.definition.required = true;
        it.definition.require_note = true;
        it.definition.min_photos = Some(2);
        it.value = Some(Answer::YesNo(YesNo::No));
        it.evidence = vec![MediaRef::Local("x".into())];

        assert_eq!(
            validate_item(&it),
            vec![
                ItemIssue::MissingNote,
                ItemIssue::NotEnoughEvidence { required: 2, found: 1 }
            ]
        );
    }

    #[test]
    fn test_required_photo_item_needs_evidence_not_value() {
        let mut it = item(QuestionType::Photo);
        it.definition.required = true;
        assert_eq!(
            validate_item(&it),
            vec![ItemIssue::NotEnoughEvidence { required: 1, found: 0 }]
        );
        it.evidence.push(MediaRef::Url("https://cdn/x.jpg".into()));
        assert!(is_complete(&it));
    }

    #[test]
    fn test_elided_evidence_does_not_count() {
        let mut it = item(QuestionType::Photo);
        it.definition.required = true;
        it.evidence.push(MediaRef::Elided);
        assert_eq!(
            validate_item(&it),
            vec![ItemIssue::NotEnoughEvidence { required: 1, found: 0 }]
        );
    }

    #[test]
    fn test_first_incomplete_skips_complete_items() {
        let mut done = item(QuestionType::Text);
        done.definition.required = true;
        done.value = Some(Answer::Text("fine".into()));
        let mut missing = item(QuestionType::Number);
        missing.definition.required = true;

        let items = vec![done, missing];
        let (index, issues) = first_incomplete(&items).unwrap();
        assert_eq!(index, 1);
        assert_eq!(issues, vec![ItemIssue::MissingValue]);
        assert_eq!(validate_all(&items).len(), 1);
    }
}
