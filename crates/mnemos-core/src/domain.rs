//! Read models of the business records that ingestion turns into documents.
//!
//! These are snapshots loaded through [`crate::DomainRepository`]; mnemos
//! never writes them back. Statuses are kept as the upper-case strings the
//! source system uses ("TODO", "IN_PROGRESS", "DONE", ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status value marking a finished task.
pub const TASK_STATUS_DONE: &str = "DONE";

/// Priority scale shared by tasks, projects and communications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" | "NORMAL" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" | "CRITICAL" => Ok(Self::Urgent),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Subtask summary embedded in a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskSummary {
    pub title: String,
    pub status: String,
}

/// Task summary embedded in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTaskSummary {
    pub id: String,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<Priority>,
    /// Free-form context label ("@office", "@phone", ...).
    pub context: Option<String>,
    pub project_name: Option<String>,
    pub assignee_name: Option<String>,
    pub assigned_to_id: Option<String>,
    pub created_by_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Task with the given title and status "TODO"; remaining fields empty.
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            title: title.into(),
            description: None,
            status: "TODO".to_string(),
            priority: None,
            context: None,
            project_name: None,
            assignee_name: None,
            assigned_to_id: None,
            created_by_id: None,
            due_date: None,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TASK_STATUS_DONE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<Priority>,
    pub methodology: Option<String>,
    pub creator_name: Option<String>,
    pub created_by_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: Vec<ProjectTaskSummary>,
    #[serde(default)]
    pub collaborators: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            name: name.into(),
            description: None,
            status: "ACTIVE".to_string(),
            priority: None,
            methodology: None,
            creator_name: None,
            created_by_id: None,
            due_date: None,
            tasks: Vec::new(),
            collaborators: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Tasks that are not done.
    pub fn active_tasks(&self) -> impl Iterator<Item = &ProjectTaskSummary> {
        self.tasks.iter().filter(|t| t.status != TASK_STATUS_DONE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    pub organization_id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
    pub created_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactRecord {
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, first_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            first_name: first_name.into(),
            last_name: None,
            email: None,
            phone: None,
            position: None,
            company_name: None,
            notes: None,
            created_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// "First Last", or just the first name.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().filter(|l| !l.is_empty()) {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub size: Option<String>,
    pub description: Option<String>,
    pub created_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyRecord {
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            name: name.into(),
            industry: None,
            website: None,
            size: None,
            description: None,
            created_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub value: Option<f64>,
    /// ISO currency code; "PLN" when absent.
    pub currency: Option<String>,
    pub stage: String,
    /// Win probability in percent.
    pub probability: Option<u8>,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub company_name: Option<String>,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DealRecord {
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            name: name.into(),
            value: None,
            currency: None,
            stage: "LEAD".to_string(),
            probability: None,
            description: None,
            contact_name: None,
            company_name: None,
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationRecord {
    pub id: String,
    pub organization_id: String,
    pub subject: Option<String>,
    pub channel_name: String,
    /// Channel kind ("email", "slack", "sms", ...), used as the document source.
    pub channel_type: String,
    pub message_type: Option<String>,
    pub from_name: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_id: Option<String>,
    pub company_name: Option<String>,
    pub company_id: Option<String>,
    pub content: Option<String>,
    /// 0 to 10.
    pub urgency_score: Option<u8>,
    pub action_needed: bool,
    pub priority: Option<Priority>,
    pub user_id: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunicationRecord {
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, channel_name: impl Into<String>, channel_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            subject: None,
            channel_name: channel_name.into(),
            channel_type: channel_type.into(),
            message_type: None,
            from_name: None,
            from_address: None,
            to_address: None,
            contact_name: None,
            contact_email: None,
            contact_id: None,
            company_name: None,
            company_id: None,
            content: None,
            urgency_score: None,
            action_needed: false,
            priority: None,
            user_id: None,
            received_at: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// When the message happened: received, else sent, else record creation.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.received_at.or(self.sent_at).unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub category: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeRecord {
    pub fn new(id: impl Into<String>, organization_id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            title: title.into(),
            category: None,
            content: content.into(),
            tags: Vec::new(),
            author_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `{id, name}` reference attached to enriched entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}
