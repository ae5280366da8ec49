use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, DomainResult, ProjectId, TaskId, TenantId, UserId};

use crate::project::{MAX_NAME_LEN, normalize_description};
use crate::Project;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl core::str::FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(DomainError::validation(format!("unknown task status '{other}'"))),
        }
    }
}

/// A unit of work inside a project.
///
/// `tenant_id` always equals the owning project's tenant. An assignee, when
/// set, must be a user of that same tenant; that check needs the user store
/// and is performed by the caller before the task is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub assignee: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<Option<UserId>>,
}

impl Task {
    pub fn create(
        project: &Project,
        title: &str,
        description: Option<String>,
        status: Option<TaskStatus>,
        assignee: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: TaskId::new(),
            tenant_id: project.tenant_id,
            project_id: project.id,
            title: validate_title(title)?,
            description: normalize_description(description),
            status: status.unwrap_or_default(),
            assignee,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, changes: TaskChanges, now: DateTime<Utc>) -> DomainResult<()> {
        let title = changes.title.as_deref().map(validate_title).transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = normalize_description(description);
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(assignee) = changes.assignee {
            self.assignee = assignee;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("task title is required"));
    }
    if title.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "task title must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(title.to_string())
}
