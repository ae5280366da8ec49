use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, DomainResult, ProjectId, TenantId, UserId};

pub(crate) const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl core::str::FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "archived" => Ok(ProjectStatus::Archived),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(DomainError::validation(format!("unknown project status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves a field untouched.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

impl ProjectChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }
}

impl Project {
    pub fn create(
        tenant_id: TenantId,
        name: &str,
        description: Option<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: ProjectId::new(),
            tenant_id,
            name: validate_name(name)?,
            description: normalize_description(description),
            status: ProjectStatus::Active,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply `changes`. Validation happens before anything is written, so a
    /// rejected patch leaves the project untouched.
    pub fn apply(&mut self, changes: ProjectChanges, now: DateTime<Utc>) -> DomainResult<()> {
        let name = changes.name.as_deref().map(validate_name).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = changes.description {
            self.description = normalize_description(description);
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("project name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "project name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn project() -> Project {
        Project::create(TenantId::new(), " Roadmap ", Some("  ".into()), UserId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn create_trims_and_defaults() {
        let p = project();
        assert_eq!(p.name, "Roadmap");
        assert_eq!(p.description, None);
        assert_eq!(p.status, ProjectStatus::Active);
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn blank_or_oversized_name_is_rejected() {
        let now = Utc::now();
        assert!(Project::create(TenantId::new(), "   ", None, UserId::new(), now).is_err());
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(Project::create(TenantId::new(), &long, None, UserId::new(), now).is_err());
    }

    #[test]
    fn patch_updates_only_named_fields() {
        let mut p = project();
        let later = p.created_at + Duration::seconds(5);
        p.apply(
            ProjectChanges {
                status: Some(ProjectStatus::Completed),
                description: Some(Some("Q3 plan".into())),
                ..Default::default()
            },
            later,
        )
        .unwrap();
        assert_eq!(p.name, "Roadmap");
        assert_eq!(p.description.as_deref(), Some("Q3 plan"));
        assert_eq!(p.status, ProjectStatus::Completed);
        assert_eq!(p.updated_at, later);

        p.apply(ProjectChanges { description: Some(None), ..Default::default() }, later)
            .unwrap();
        assert_eq!(p.description, None);
    }

    #[test]
    fn rejected_patch_leaves_project_untouched() {
        let mut p = project();
        let before = p.clone();
        let result = p.apply(
            ProjectChanges {
                name: Some("".into()),
                status: Some(ProjectStatus::Archived),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(result.is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn status_parses_from_wire_names() {
        for s in [ProjectStatus::Active, ProjectStatus::Archived, ProjectStatus::Completed] {
            assert_eq!(s.as_str().parse::<ProjectStatus>().unwrap(), s);
        }
        assert!("deleted".parse::<ProjectStatus>().is_err());
    }
}
