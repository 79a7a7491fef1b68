//! Canonical enums shared by every crate.
//!
//! Wire strings match the row store's enum columns exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role. Gates which views and actions are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Auditor => "Auditor",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "auditor" => Ok(Role::Auditor),
            _ => Err(format!("Invalid role: '{}'. Expected: Admin or Auditor", s)),
        }
    }
}

/// Question type of a checklist item. Determines the shape of its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    YesNo,
    MultipleChoice,
    Text,
    Number,
    Date,
    Photo,
    Signature,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::YesNo => "yes-no",
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::Text => "text",
            QuestionType::Number => "number",
            QuestionType::Date => "date",
            QuestionType::Photo => "photo",
            QuestionType::Signature => "signature",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checklist lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChecklistStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl ChecklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistStatus::Pending => "pending",
            ChecklistStatus::InProgress => "in-progress",
            ChecklistStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(format!("Invalid priority: '{}'. Expected: Low, Medium or High", s)),
        }
    }
}

/// Finding status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Resolved => "resolved",
        }
    }

    /// Sort rank used by findings lists: open first, resolved last.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Open => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Resolved => 3,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TaskStatus::Open),
            "in-progress" | "in_progress" => Ok(TaskStatus::InProgress),
            "resolved" => Ok(TaskStatus::Resolved),
            _ => Err(format!(
                "Invalid task status: '{}'. Expected: open, in-progress or resolved",
                s
            )),
        }
    }
}

/// Kind of evidence an item collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    #[default]
    Photo,
    Video,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::Photo => "photo",
            EvidenceType::Video => "video",
        }
    }

    /// Extension used for uploaded objects.
    pub fn extension(&self) -> &'static str {
        match self {
            EvidenceType::Photo => "jpg",
            EvidenceType::Video => "webm",
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            EvidenceType::Photo => "image/jpeg",
            EvidenceType::Video => "video/webm",
        }
    }
}

/// Where evidence may be captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Camera,
    Gallery,
    #[default]
    Any,
}

/// Answer of a yes/no/flag question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YesNo {
    Yes,
    No,
    RedFlag,
}

impl YesNo {
    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Yes => "yes",
            YesNo::No => "no",
            YesNo::RedFlag => "red-flag",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
            YesNo::RedFlag => "Red Flag",
        }
    }

    /// Negative answers imply a finding.
    pub fn requires_finding(&self) -> bool {
        matches!(self, YesNo::No | YesNo::RedFlag)
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for YesNo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(YesNo::Yes),
            "no" => Ok(YesNo::No),
            "red-flag" | "red_flag" | "redflag" => Ok(YesNo::RedFlag),
            _ => Err(format!("Invalid answer: '{}'. Expected: yes, no or red-flag", s)),
        }
    }
}

/// Top-level screen the client is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Checklists,
    Findings,
    Reports,
    AdminDashboard,
    AuditorDashboard,
    UserManagement,
    Templates,
    OutletManagement,
    Assignments,
}

impl View {
    /// Landing view for a role.
    pub fn landing(role: Role) -> Self {
        match role {
            Role::Admin => View::AdminDashboard,
            Role::Auditor => View::AuditorDashboard,
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            View::AdminDashboard
                | View::UserManagement
                | View::Templates
                | View::OutletManagement
                | View::Assignments
        )
    }
}
