//! Project registry model.
//!
//! A project is the world a set of pages belongs to. Pages only reference a
//! project by id, so pages may exist for a project that was never
//! registered; the registry adds a title, description and display color.
//!
//! # Invariants
//! - `id` is immutable once registered.
//! - `updated_at` never moves backwards for one project.

use crate::model::address::ProjectId;
use crate::model::page::normalize_optional;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROJECT_ID_MAX_CHARS: usize = 50;
pub const PROJECT_TITLE_MAX_CHARS: usize = 200;
pub const PROJECT_COLOR_MAX_CHARS: usize = 50;
pub const DEFAULT_PROJECT_COLOR: &str = "bg-blue-500";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectValidationError {
    #[error("project id exceeds {max} characters")]
    IdTooLong { max: usize },
    #[error("project title must not be empty")]
    EmptyTitle,
    #[error("project title exceeds {max} characters")]
    TitleTooLong { max: usize },
    #[error("project color must be 1..={max} characters")]
    InvalidColor { max: usize },
}

/// Registered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    /// UI color class, e.g. `bg-blue-500`.
    pub color: String,
    /// Active pages under this project; computed on read.
    pub page_count: u64,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Input for registering a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
    pub title: String,
    pub description: Option<String>,
    /// `None` picks [`DEFAULT_PROJECT_COLOR`].
    pub color: Option<String>,
}

impl ProjectFields {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            color: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Partial project update. An empty `description` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl Project {
    pub fn new(id: ProjectId, fields: ProjectFields, now_ms: i64) -> Result<Self, ProjectValidationError> {
        if id.as_str().chars().count() > PROJECT_ID_MAX_CHARS {
            return Err(ProjectValidationError::IdTooLong {
                max: PROJECT_ID_MAX_CHARS,
            });
        }
        Ok(Self {
            id,
            title: normalize_project_title(&fields.title)?,
            description: normalize_optional(fields.description),
            color: match fields.color {
                Some(color) => normalize_color(&color)?,
                None => DEFAULT_PROJECT_COLOR.to_string(),
            },
            page_count: 0,
            created_at: now_ms,
            updated_at: now_ms,
        })
    }

    /// Applies `changes`; absent fields keep their value.
    pub fn with_changes(
        &self,
        changes: &ProjectChanges,
        now_ms: i64,
    ) -> Result<Self, ProjectValidationError> {
        let mut next = self.clone();
        if let Some(title) = changes.title.as_deref() {
            next.title = normalize_project_title(title)?;
        }
        if let Some(description) = changes.description.as_ref() {
            next.description = normalize_optional(Some(description.clone()));
        }
        if let Some(color) = changes.color.as_deref() {
            next.color = normalize_color(color)?;
        }
        next.updated_at = now_ms.max(self.updated_at);
        Ok(next)
    }
}

fn normalize_project_title(title: &str) -> Result<String, ProjectValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ProjectValidationError::EmptyTitle);
    }
    if trimmed.chars().count() > PROJECT_TITLE_MAX_CHARS {
        return Err(ProjectValidationError::TitleTooLong {
            max: PROJECT_TITLE_MAX_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

fn normalize_color(color: &str) -> Result<String, ProjectValidationError> {
    let trimmed = color.trim();
    if trimmed.is_empty() || trimmed.chars().count() > PROJECT_COLOR_MAX_CHARS {
        return Err(ProjectValidationError::InvalidColor {
            max: PROJECT_COLOR_MAX_CHARS,
        });
    }
    Ok(trimmed.to_string())
}
