//! Finding derivation.
//!
//! A negative yes/no answer carries a finding; anything else carries none.
//! The rule runs after every edit of an item so the two never disagree.

use chrono::{DateTime, Days, NaiveDate, Utc};
use fieldops_ids::{ChecklistId, UserId};
use fieldops_protocol::{
    ChecklistItem, EvidenceType, Finding, FindingPolicy, QuestionType, TaskPriority, TaskStatus,
    YesNo,
};

/// Checklist-level context the rule needs.
#[derive(Debug, Clone, Copy)]
pub struct FindingContext<'a> {
    pub checklist_id: &'a ChecklistId,
    /// Default assignee for new findings.
    pub assignee: Option<&'a UserId>,
    pub policy: &'a FindingPolicy,
    pub now: DateTime<Utc>,
}

pub fn priority_for(answer: YesNo) -> Option<TaskPriority> {
    match answer {
        YesNo::RedFlag => Some(TaskPriority::High),
        YesNo::No => Some(TaskPriority::Medium),
        YesNo::Yes => None,
    }
}

pub fn due_date_for(priority: TaskPriority, policy: &FindingPolicy, from: NaiveDate) -> NaiveDate {
    let days = match priority {
        TaskPriority::High => policy.red_flag_due_days,
        _ => policy.no_due_days,
    };
    from.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(from)
}

/// Bring `item.finding` in line with its current value.
///
/// Returns true when the finding was created, changed or removed.
pub fn apply_finding_rule(item: &mut ChecklistItem, ctx: &FindingContext<'_>) -> bool {
    if item.question_type() != QuestionType::YesNo {
        return false;
    }

    let priority = item
        .value
        .as_ref()
        .and_then(|v| v.yes_no())
        .and_then(priority_for);

    let Some(priority) = priority else {
        let changed = item.finding.is_some() || item.finding_id.is_some();
        item.finding = None;
        item.finding_id = None;
        return changed;
    };

    let description = item.note_text().to_string();
    let photo = match item.definition.evidence_type {
        EvidenceType::Photo => item.evidence.first().cloned(),
        EvidenceType::Video => None,
    };

    let next = match item.finding.as_ref() {
        Some(existing) => {
            let mut updated = existing.clone();
            if existing.priority != priority && ctx.policy.recompute_due_on_severity_change {
                updated.due_date = due_date_for(priority, ctx.policy, ctx.now.date_naive());
            }
            updated.priority = priority;
            updated.description = description;
            updated.photo = photo;
            updated
        }
        None => Finding {
            id: None,
            title: format!("Issue with: {}", item.definition.question),
            checklist_item_id: item.id().clone(),
            checklist_id: ctx.checklist_id.clone(),
            priority,
            assigned_to: ctx.assignee.cloned(),
            due_date: due_date_for(priority, ctx.policy, ctx.now.date_naive()),
            status: TaskStatus::Open,
            description,
            photo,
            proof_of_fix: None,
            created_at: ctx.now,
        },
    };

    let changed = item.finding.as_ref() != Some(&next);
    item.finding = Some(next);
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fieldops_ids::{ItemId, TaskId};
    use fieldops_protocol::{Answer, ItemDefinition, MediaRef};

    fn yes_no_item() -> ChecklistItem {
        ChecklistItem::from_definition(ItemDefinition::new(
            ItemId::parse("q1").unwrap(),
            "Is the floor clean?",
            QuestionType::YesNo,
        ))
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
    }

    fn ctx<'a>(id: &'a ChecklistId, policy: &'a FindingPolicy, now: DateTime<Utc>) -> FindingContext<'a> {
        FindingContext {
            checklist_id: id,
            assignee: None,
            policy,
            now,
        }
    }

    #[test]
    fn test_no_gives_medium_finding_due_in_seven_days() {
        let id = ChecklistId::new();
        let policy = FindingPolicy::default();
        let mut item = yes_no_item();
        item.value = Some(Answer::YesNo(YesNo::No));

        assert!(apply_finding_rule(&mut item, &ctx(&id, &policy, at(1))));
        let finding = item.finding.unwrap();
        assert_eq!(finding.priority, TaskPriority::Medium);
        assert_eq!(finding.due_date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(finding.title, "Issue with: Is the floor clean?");
        assert_eq!(finding.status, TaskStatus::Open);
        assert!(finding.id.is_none());
    }

    #[test]
    fn test_red_flag_gives_high_finding_due_in_three_days() {
        let id = ChecklistId::new();
        let policy = FindingPolicy::default();
        let mut item = yes_no_item();
        item.value = Some(Answer::YesNo(YesNo::RedFlag));

        apply_finding_rule(&mut item, &ctx(&id, &policy, at(1)));
        let finding = item.finding.unwrap();
        assert_eq!(finding.priority, TaskPriority::High);
        assert_eq!(finding.due_date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn test_yes_clears_finding_and_finding_id() {
        let id = ChecklistId::new();
        let policy = FindingPolicy::default();
        let mut item = yes_no_item();
        item.value = Some(Answer::YesNo(YesNo::No));
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(1)));
        item.finding_id = Some(TaskId::new());

        item.value = Some(Answer::YesNo(YesNo::Yes));
        assert!(apply_finding_rule(&mut item, &ctx(&id, &policy, at(2))));
        assert!(item.finding.is_none());
        assert!(item.finding_id.is_none());

        item.value = None;
        assert!(!apply_finding_rule(&mut item, &ctx(&id, &policy, at(2))));
    }

    #[test]
    fn test_note_edit_only_touches_description() {
        let id = ChecklistId::new();
        let policy = FindingPolicy::default();
        let assignee = UserId::new();
        let mut item = yes_no_item();
        item.value = Some(Answer::YesNo(YesNo::No));
        let context = FindingContext {
            assignee: Some(&assignee),
            ..ctx(&id, &policy, at(1))
        };
        apply_finding_rule(&mut item, &context);
        let before = item.finding.clone().unwrap();

        item.note = Some("sticky near the entrance".into());
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(5)));
        let after = item.finding.clone().unwrap();

        assert_eq!(after.description, "sticky near the entrance");
        assert_eq!(after.due_date, before.due_date);
        assert_eq!(after.assigned_to, Some(assignee));
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.title, before.title);
    }

    #[test]
    fn test_severity_change_keeps_due_date_unless_configured() {
        let id = ChecklistId::new();
        let mut policy = FindingPolicy::default();
        let mut item = yes_no_item();
        item.value = Some(Answer::YesNo(YesNo::No));
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(1)));

        item.value = Some(Answer::YesNo(YesNo::RedFlag));
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(2)));
        let kept = item.finding.clone().unwrap();
        assert_eq!(kept.priority, TaskPriority::High);
        assert_eq!(kept.due_date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());

        policy.recompute_due_on_severity_change = true;
        item.value = Some(Answer::YesNo(YesNo::No));
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(2)));
        assert_eq!(
            item.finding.unwrap().due_date,
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_photo_follows_first_evidence_for_photo_items_only() {
        let id = ChecklistId::new();
        let policy = FindingPolicy::default();
        let mut item = yes_no_item();
        item.value = Some(Answer::YesNo(YesNo::No));
        item.evidence = vec![MediaRef::Url("https://cdn/1.jpg".into())];
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(1)));
        assert_eq!(
            item.finding.as_ref().unwrap().photo,
            Some(MediaRef::Url("https://cdn/1.jpg".into()))
        );

        item.definition.evidence_type = EvidenceType::Video;
        apply_finding_rule(&mut item, &ctx(&id, &policy, at(1)));
        assert_eq!(item.finding.unwrap().photo, None);
    }

    #[test]
    fn test_non_yes_no_items_are_ignored() {
        let id = ChecklistId::new();
        let policy = FindingPolicy::default();
        let mut item = ChecklistItem::from_definition(ItemDefinition::new(
            ItemId::parse("t").unwrap(),
            "Remarks",
            QuestionType::Text,
        ));
        item.value = Some(Answer::Text("no".into()));
        assert!(!apply_finding_rule(&mut item, &ctx(&id, &policy, at(1))));
        assert!(item.finding.is_none());
    }
}
