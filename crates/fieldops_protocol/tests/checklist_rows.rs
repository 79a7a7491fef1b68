//! Decoding real-shaped checklist rows as the row store returns them.

use fieldops_protocol::{
    Answer, Checklist, ChecklistStatus, EvidenceType, MediaRef, QuestionType, TaskPriority, YesNo,
};
use serde_json::json;

fn stored_row() -> serde_json::Value {
    json!({
        "id": "7d0b0c5e-8a57-4c53-9a3b-0c9a2b1f4e21",
        "title": "Opening Checklist",
        "location": "Jakarta-1",
        "assigned_to": "f3a1c2d4-1111-4a2b-8c3d-9e8f7a6b5c4d",
        "due_date": "2024-03-01",
        "status": "in-progress",
        "check_in_time": "2024-02-29T01:02:03.000Z",
        "check_out_time": null,
        "auditor_signature": null,
        "selfie": null,
        "report_url": null,
        "created_at": "2024-02-20T08:00:00.000000+00:00",
        "items": [
            {
                "id": "q1",
                "question": "Is the floor clean?",
                "type": "yes-no",
                "required": true,
                "minPhotos": 1,
                "value": "no",
                "photoEvidence": ["https://cdn.example/p/1.jpg"],
                "note": "sticky near entrance",
                "finding": {
                    "id": "2c1f3a9b-6d2e-4c1a-9f2b-3e4d5c6b7a80",
                    "title": "Is the floor clean?",
                    "checklist_item_id": "q1",
                    "checklist_id": "7d0b0c5e-8a57-4c53-9a3b-0c9a2b1f4e21",
                    "priority": "Medium",
                    "assigned_to": null,
                    "due_date": "2024-03-07",
                    "status": "open",
                    "description": "sticky near entrance",
                    "photo": "https://cdn.example/p/1.jpg",
                    "created_at": "2024-02-29T01:10:00Z"
                },
                "finding_id": "2c1f3a9b-6d2e-4c1a-9f2b-3e4d5c6b7a80"
            },
            {
                "id": "q2",
                "question": "Fridge temperature",
                "type": "number",
                "value": "4",
                "photoEvidence": null
            },
            {
                "id": "q3",
                "question": "Walkthrough",
                "type": "photo",
                "evidenceType": "video",
                "value": [],
                "photoEvidence": ["skipped_too_large"]
            }
        ]
    })
}

#[test]
fn test_stored_row_decodes_into_typed_items() {
    let checklist: Checklist = serde_json::from_value(stored_row()).unwrap();

    assert_eq!(checklist.status, ChecklistStatus::InProgress);
    assert_eq!(checklist.items.len(), 3);

    let q1 = &checklist.items[0];
    assert_eq!(q1.value, Some(Answer::YesNo(YesNo::No)));
    let finding = q1.finding.as_ref().unwrap();
    assert_eq!(finding.priority, TaskPriority::Medium);
    assert_eq!(finding.photo, Some(MediaRef::Url("https://cdn.example/p/1.jpg".into())));
    assert_eq!(q1.finding_id.as_ref(), finding.id.as_ref());

    let q2 = &checklist.items[1];
    assert_eq!(q2.value, Some(Answer::Number(4.0)));
    assert!(q2.evidence.is_empty());

    let q3 = &checklist.items[2];
    assert_eq!(q3.question_type(), QuestionType::Photo);
    assert_eq!(q3.definition.evidence_type, EvidenceType::Video);
    assert_eq!(q3.evidence, vec![MediaRef::Elided]);
}

#[test]
fn test_row_survives_reencoding() {
    let checklist: Checklist = serde_json::from_value(stored_row()).unwrap();
    let encoded = serde_json::to_value(&checklist).unwrap();

    assert_eq!(encoded["items"][0]["value"], json!("no"));
    assert_eq!(encoded["items"][1]["value"], json!(4.0));
    assert_eq!(encoded["items"][2]["photoEvidence"], json!(["skipped_too_large"]));

    let again: Checklist = serde_json::from_value(encoded).unwrap();
    assert_eq!(again, checklist);
}
