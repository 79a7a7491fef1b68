//! Checklist items: definitions, typed answers and findings.

use crate::media::{deserialize_optional_media, MediaRef};
use crate::types::{
    EvidenceSource, EvidenceType, QuestionType, TaskPriority, TaskStatus, YesNo,
};
use crate::deserialize_null_default;
use chrono::{DateTime, NaiveDate, Utc};
use fieldops_ids::{ChecklistId, ItemId, TaskId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One question of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, deserialize_with = "deserialize_null_default", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub required: bool,
    #[serde(rename = "requireNote", default, deserialize_with = "deserialize_null_default")]
    pub require_note: bool,
    #[serde(rename = "minPhotos", default, skip_serializing_if = "Option::is_none")]
    pub min_photos: Option<u32>,
    #[serde(rename = "evidenceSource", default, deserialize_with = "deserialize_null_default")]
    pub evidence_source: EvidenceSource,
    #[serde(rename = "evidenceType", default, deserialize_with = "deserialize_null_default")]
    pub evidence_type: EvidenceType,
}

impl ItemDefinition {
    pub fn new(id: ItemId, question: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            id,
            question: question.into(),
            question_type,
            options: Vec::new(),
            required: false,
            require_note: false,
            min_photos: None,
            evidence_source: EvidenceSource::default(),
            evidence_type: EvidenceType::default(),
        }
    }

    /// Minimum number of evidence entries this item needs.
    pub fn min_evidence(&self) -> u32 {
        let explicit = self.min_photos.unwrap_or(0);
        if explicit == 0 && self.question_type == QuestionType::Photo && self.required {
            1
        } else {
            explicit
        }
    }

    /// Whether the item collects evidence at all.
    pub fn collects_evidence(&self) -> bool {
        self.question_type == QuestionType::Photo || self.min_photos.unwrap_or(0) > 0
    }
}

/// Typed answer. The variant always matches the item's question type.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    YesNo(YesNo),
    Choice(String),
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Signature(String),
}

impl Answer {
    /// Parse the raw row value for a question type.
    ///
    /// `null` and blank strings are "unanswered". Photo items carry no
    /// answer of their own; their evidence list is the answer.
    pub fn from_json(question_type: QuestionType, value: &Value) -> Result<Option<Answer>, String> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        };

        let answer = match question_type {
            QuestionType::Photo => return Ok(None),
            QuestionType::YesNo => {
                let raw = text.ok_or_else(|| format!("yes-no value must be a string, got {}", value))?;
                Answer::YesNo(raw.parse()?)
            }
            QuestionType::MultipleChoice => Answer::Choice(expect_string(text, value)?),
            QuestionType::Text => Answer::Text(expect_string(text, value)?),
            QuestionType::Signature => Answer::Signature(expect_string(text, value)?),
            QuestionType::Number => match value {
                Value::Number(n) => Answer::Number(
                    n.as_f64().ok_or_else(|| format!("number out of range: {}", n))?,
                ),
                _ => {
                    let raw = expect_string(text, value)?;
                    Answer::Number(
                        raw.trim()
                            .parse::<f64>()
                            .map_err(|e| format!("invalid number '{}': {}", raw, e))?,
                    )
                }
            },
            QuestionType::Date => {
                let raw = expect_string(text, value)?;
                Answer::Date(
                    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                        .map_err(|e| format!("invalid date '{}': {}", raw, e))?,
                )
            }
        };
        Ok(Some(answer))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Answer::YesNo(v) => Value::String(v.as_str().to_string()),
            Answer::Choice(s) | Answer::Text(s) | Answer::Signature(s) => Value::String(s.clone()),
            Answer::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Answer::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Question type this answer belongs to.
    pub fn question_type(&self) -> QuestionType {
        match self {
            Answer::YesNo(_) => QuestionType::YesNo,
            Answer::Choice(_) => QuestionType::MultipleChoice,
            Answer::Text(_) => QuestionType::Text,
            Answer::Number(_) => QuestionType::Number,
            Answer::Date(_) => QuestionType::Date,
            Answer::Signature(_) => QuestionType::Signature,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Choice(s) | Answer::Text(s) | Answer::Signature(s) => s.trim().is_empty(),
            Answer::Number(n) => n.is_nan(),
            Answer::YesNo(_) | Answer::Date(_) => false,
        }
    }

    /// Human-readable rendering used in reports.
    pub fn display(&self) -> String {
        match self {
            Answer::YesNo(v) => v.label().to_string(),
            Answer::Choice(s) | Answer::Text(s) | Answer::Signature(s) => s.clone(),
            Answer::Number(n) => format!("{}", n),
            Answer::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn yes_no(&self) -> Option<YesNo> {
        match self {
            Answer::YesNo(v) => Some(*v),
            _ => None,
        }
    }
}

fn expect_string(text: Option<&str>, value: &Value) -> Result<String, String> {
    match (text, value) {
        (Some(s), _) => Ok(s.to_string()),
        (None, Value::Number(n)) => Ok(n.to_string()),
        (None, other) => Err(format!("expected a string value, got {}", other)),
    }
}

/// A defect spawned from a negative answer, before or after it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Task row id once persisted.
    #[serde(default)]
    pub id: Option<TaskId>,
    pub title: String,
    pub checklist_item_id: ItemId,
    pub checklist_id: ChecklistId,
    pub priority: TaskPriority,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    pub due_date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_optional_media")]
    pub photo: Option<MediaRef>,
    #[serde(default)]
    pub proof_of_fix: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One instantiated question inside a checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChecklistItem", into = "RawChecklistItem")]
pub struct ChecklistItem {
    pub definition: ItemDefinition,
    pub value: Option<Answer>,
    pub evidence: Vec<MediaRef>,
    pub note: Option<String>,
    pub finding: Option<Finding>,
    pub finding_id: Option<TaskId>,
}

impl ChecklistItem {
    /// Fresh, unanswered item copied from a template definition.
    pub fn from_definition(definition: ItemDefinition) -> Self {
        Self {
            definition,
            value: None,
            evidence: Vec::new(),
            note: None,
            finding: None,
            finding_id: None,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.definition.id
    }

    pub fn question_type(&self) -> QuestionType {
        self.definition.question_type
    }

    pub fn note_text(&self) -> &str {
        self.note.as_deref().unwrap_or("")
    }

    pub fn has_value(&self) -> bool {
        self.value.as_ref().map(|v| !v.is_blank()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChecklistItem {
    #[serde(flatten)]
    definition: ItemDefinition,
    #[serde(default)]
    value: Value,
    #[serde(rename = "photoEvidence", default, deserialize_with = "deserialize_null_default")]
    photo_evidence: Vec<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(default)]
    finding: Option<Finding>,
    #[serde(default)]
    finding_id: Option<TaskId>,
}

impl TryFrom<RawChecklistItem> for ChecklistItem {
    type Error = String;

    fn try_from(raw: RawChecklistItem) -> Result<Self, Self::Error> {
        let value = Answer::from_json(raw.definition.question_type, &raw.value)
            .map_err(|e| format!("item '{}': {}", raw.definition.id, e))?;
        Ok(Self {
            definition: raw.definition,
            value,
            evidence: raw.photo_evidence,
            note: raw.note,
            finding: raw.finding,
            finding_id: raw.finding_id,
        })
    }
}

impl From<ChecklistItem> for RawChecklistItem {
    fn from(item: ChecklistItem) -> Self {
        // Photo items mirror their evidence into `value` for older readers.
        let value = match (&item.value, item.definition.question_type) {
            (_, QuestionType::Photo) => Value::Array(
                item.evidence
                    .iter()
                    .map(|m| Value::String(m.as_wire().to_string()))
                    .collect(),
            ),
            (Some(answer), _) => answer.to_json(),
            (None, _) => Value::Null,
        };
        Self {
            definition: item.definition,
            value,
            photo_evidence: item.evidence,
            note: item.note,
            finding: item.finding,
            finding_id: item.finding_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn yes_no_row(value: Value) -> Value {
        json!({
            "id": "q1",
            "question": "Is the floor clean?",
            "type": "yes-no",
            "required": true,
            "minPhotos": 1,
            "value": value,
            "photoEvidence": [],
            "aiAnalysisStatus": "idle"
        })
    }

    #[test]
    fn test_item_parses_typed_value_and_ignores_unknown_fields() {
        let item: ChecklistItem = serde_json::from_value(yes_no_row(json!("red-flag"))).unwrap();
        assert_eq!(item.value, Some(Answer::YesNo(YesNo::RedFlag)));
        assert_eq!(item.definition.min_evidence(), 1);
        assert!(item.finding.is_none());
    }

    #[test]
    fn test_item_rejects_value_of_wrong_shape() {
        let err = serde_json::from_value::<ChecklistItem>(yes_no_row(json!("perhaps")))
            .unwrap_err()
            .to_string();
        assert!(err.contains("q1"), "{}", err);
    }

    #[test]
    fn test_blank_string_is_unanswered() {
        let item: ChecklistItem = serde_json::from_value(yes_no_row(json!("  "))).unwrap();
        assert!(item.value.is_none());
        assert!(!item.has_value());
    }

    #[test]
    fn test_number_accepts_string_input() {
        let answer = Answer::from_json(QuestionType::Number, &json!("12.5")).unwrap();
        assert_eq!(answer, Some(Answer::Number(12.5)));
        assert!(Answer::from_json(QuestionType::Number, &json!("twelve")).is_err());
    }

    #[test]
    fn test_photo_item_writes_evidence_as_value() {
        let mut item = ChecklistItem::from_definition(ItemDefinition::new(
            ItemId::parse("p1").unwrap(),
            "Shelf photo",
            QuestionType::Photo,
        ));
        item.evidence.push(MediaRef::Url("https://cdn/a.jpg".into()));

        let row = serde_json::to_value(&item).unwrap();
        assert_eq!(row["value"], json!(["https://cdn/a.jpg"]));
        assert_eq!(row["photoEvidence"], json!(["https://cdn/a.jpg"]));
        assert_eq!(row["finding"], Value::Null);

        let back: ChecklistItem = serde_json::from_value(row).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_required_photo_item_needs_one_evidence() {
        let mut def = ItemDefinition::new(ItemId::parse("p").unwrap(), "Photo", QuestionType::Photo);
        assert_eq!(def.min_evidence(), 0);
        def.required = true;
        assert_eq!(def.min_evidence(), 1);
        def.min_photos = Some(3);
        assert_eq!(def.min_evidence(), 3);
    }
}
