//! Action — the effect performed when an automation fires.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// The closed set of action kinds, one per integration capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendEmail,
    CreateTask,
    UpdateCrm,
    GenerateReport,
}

impl ActionKind {
    pub const ALL: [Self; 4] = [
        Self::SendEmail,
        Self::CreateTask,
        Self::UpdateCrm,
        Self::GenerateReport,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendEmail => "send_email",
            Self::CreateTask => "create_task",
            Self::UpdateCrm => "update_crm",
            Self::GenerateReport => "generate_report",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmRecordType {
    Contact,
    Deal,
    Company,
}

impl CrmRecordType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Deal => "deal",
            Self::Company => "company",
        }
    }
}

/// The side effect to perform, with the configuration its capability needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Send a templated email to one or more recipients.
    SendEmail {
        template_id: String,
        recipients: Vec<String>,
        subject: String,
        /// Values substituted into the template.
        #[serde(default)]
        variables: Map<String, Value>,
    },
    /// Create a task in the task tracker.
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        assignee_id: Option<String>,
        #[serde(default)]
        priority: TaskPriority,
        #[serde(default)]
        due_date: Option<NaiveDate>,
    },
    /// Update fields on a CRM record.
    UpdateCrm {
        record_type: CrmRecordType,
        record_id: String,
        fields: Map<String, Value>,
    },
    /// Generate a report and mail it to recipients.
    GenerateReport {
        report_type: String,
        #[serde(default)]
        parameters: Map<String, Value>,
        recipients: Vec<String>,
    },
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SendEmail { .. } => ActionKind::SendEmail,
            Self::CreateTask { .. } => ActionKind::CreateTask,
            Self::UpdateCrm { .. } => ActionKind::UpdateCrm,
            Self::GenerateReport { .. } => ActionKind::GenerateReport,
        }
    }

    /// Check that the configuration is complete enough to call the capability.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidActionConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = self.kind();
        match self {
            Self::SendEmail {
                template_id,
                recipients,
                subject,
                ..
            } => {
                require_text(kind, "template_id", template_id)?;
                require_text(kind, "subject", subject)?;
                require_recipients(kind, recipients)
            }
            Self::CreateTask { title, .. } => require_text(kind, "title", title),
            Self::UpdateCrm {
                record_id, fields, ..
            } => {
                require_text(kind, "record_id", record_id)?;
                if fields.is_empty() {
                    return Err(invalid(kind, "`fields` must not be empty"));
                }
                Ok(())
            }
            Self::GenerateReport {
                report_type,
                recipients,
                ..
            } => {
                require_text(kind, "report_type", report_type)?;
                require_recipients(kind, recipients)
            }
        }
    }
}

fn invalid(action: ActionKind, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidActionConfig {
        action,
        reason: reason.into(),
    }
}

fn require_text(action: ActionKind, field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid(action, format!("`{field}` must not be empty")))
    } else {
        Ok(())
    }
}

fn require_recipients(action: ActionKind, recipients: &[String]) -> Result<(), ValidationError> {
    if recipients.is_empty() {
        return Err(invalid(action, "at least one recipient is required"));
    }
    if let Some(bad) = recipients.iter().find(|r| !looks_like_email(r)) {
        return Err(invalid(action, format!("`{bad}` is not an email address")));
    }
    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendEmail { template_id, .. } => write!(f, "send_email({template_id})"),
            Self::CreateTask { title, .. } => write!(f, "create_task({title})"),
            Self::UpdateCrm { record_id, .. } => write!(f, "update_crm({record_id})"),
            Self::GenerateReport { report_type, .. } => write!(f, "generate_report({report_type})"),
        }
    }
}
