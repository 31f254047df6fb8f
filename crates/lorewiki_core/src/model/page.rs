//! Page domain model.
//!
//! # Responsibility
//! - Define the canonical page record and its caller-facing input shapes.
//! - Normalize titles, tags and optional metadata before persistence.
//!
//! # Invariants
//! - `version_token` is never taken from callers; only the store assigns it.
//! - `updated_at` never moves backwards for one page.
//! - `revision` grows by exactly one on every successful write.

use crate::model::address::{Category, PageAddress, ProjectId, Slug};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier assigned on create; survives renames of nothing else.
pub type PageId = Uuid;

pub const TITLE_MAX_CHARS: usize = 500;

/// Publication state of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "draft" => Some(Self::Draft),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl Display for PageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque marker of one persisted page version. Compared for equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page field validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title exceeds {max} characters")]
    TitleTooLong { max: usize },
    #[error("invalid tag: `{0}`")]
    InvalidTag(String),
}

/// Canonical stored page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub project_id: ProjectId,
    pub category: Category,
    pub slug: Slug,
    pub title: String,
    /// Markdown body, opaque to the core.
    pub content: String,
    pub summary: Option<String>,
    pub status: PageStatus,
    /// Ordered, de-duplicated, lowercase.
    pub tags: Vec<String>,
    /// Last writer.
    pub author: Option<String>,
    pub version_token: VersionToken,
    pub revision: u32,
    pub view_count: u64,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,
}

impl Page {
    /// Builds an unsealed first revision at `address`.
    ///
    /// The version token stays empty until the store seals the page.
    pub fn new_at(
        address: &PageAddress,
        fields: PageFields,
        now_ms: i64,
    ) -> Result<Self, PageValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            project_id: address.project_id.clone(),
            category: address.category.clone(),
            slug: address.slug.clone(),
            title: normalize_title(&fields.title)?,
            content: fields.content,
            summary: normalize_optional(fields.summary),
            status: fields.status,
            tags: normalize_tags(&fields.tags)?,
            author: normalize_optional(fields.author),
            version_token: VersionToken::new(String::new()),
            revision: 1,
            view_count: 0,
            created_at: now_ms,
            updated_at: now_ms,
            is_deleted: false,
            deleted_at: None,
        })
    }

    /// Produces the next unsealed revision with `changes` applied.
    ///
    /// Absent fields keep their stored value. `updated_at` is clamped so it
    /// never precedes the previous write.
    pub fn with_changes(
        &self,
        changes: &PageChanges,
        now_ms: i64,
    ) -> Result<Self, PageValidationError> {
        let mut next = self.clone();
        if let Some(title) = changes.title.as_deref() {
            next.title = normalize_title(title)?;
        }
        if let Some(content) = changes.content.as_ref() {
            next.content = content.clone();
        }
        if let Some(summary) = changes.summary.as_ref() {
            next.summary = normalize_optional(Some(summary.clone()));
        }
        if let Some(status) = changes.status {
            next.status = status;
        }
        if let Some(tags) = changes.tags.as_ref() {
            next.tags = normalize_tags(tags)?;
        }
        if let Some(author) = changes.author.as_ref() {
            next.author = normalize_optional(Some(author.clone()));
        }
        next.revision = self.revision.saturating_add(1);
        next.updated_at = now_ms.max(self.updated_at);
        next.version_token = VersionToken::new(String::new());
        Ok(next)
    }

    pub fn address(&self) -> PageAddress {
        PageAddress::new(
            self.project_id.clone(),
            self.category.clone(),
            self.slug.clone(),
        )
    }

    /// External `category/slug` key.
    pub fn path(&self) -> String {
        format!("{}/{}", self.category, self.slug)
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Caller-supplied fields for creating a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFields {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub status: PageStatus,
    pub tags: Vec<String>,
    pub author: Option<String>,
}

impl PageFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: PageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Partial update request; `None` keeps the stored value.
///
/// An empty `summary` or `author` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub status: Option<PageStatus>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
}

/// Trims a title and enforces presence and length limits.
pub fn normalize_title(title: &str) -> Result<String, PageValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PageValidationError::EmptyTitle);
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(PageValidationError::TitleTooLong {
            max: TITLE_MAX_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Trims, lowercases and de-duplicates tags, keeping first-seen order.
///
/// # Errors
/// - `InvalidTag` for blank entries.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, PageValidationError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(PageValidationError::InvalidTag(tag.clone()));
        }
        let lowered = trimmed.to_lowercase();
        if !normalized.contains(&lowered) {
            normalized.push(lowered);
        }
    }
    Ok(normalized)
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
