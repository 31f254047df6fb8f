//! Canonical frontmatter document for a page.
//!
//! # Responsibility
//! - Serialize a page into `---\n<yaml>---\n\n<markdown>` form.
//! - Derive the page version token from that serialized form.
//!
//! # Invariants
//! - The token is the hex SHA-256 of the rendered document, so it changes
//!   whenever any persisted field or the revision changes.
//! - View counts and soft-delete markers are not part of the document.

use crate::model::page::{Page, PageStatus, VersionToken};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const FENCE: &str = "---\n";
const CLOSING_FENCE: &str = "\n---\n";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("page frontmatter is not valid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("document does not start with a `---` frontmatter block")]
    MissingFrontMatter,
}

/// Frontmatter metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    pub project: String,
    pub category: String,
    pub slug: String,
    pub status: PageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created: i64,
    pub updated: i64,
    pub revision: u32,
}

/// Frontmatter plus markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub meta: DocumentMeta,
    pub body: String,
}

impl DocumentMeta {
    fn of(page: &Page) -> Self {
        Self {
            title: page.title.clone(),
            project: page.project_id.to_string(),
            category: page.category.to_string(),
            slug: page.slug.to_string(),
            status: page.status,
            author: page.author.clone(),
            summary: page.summary.clone(),
            tags: page.tags.clone(),
            created: page.created_at,
            updated: page.updated_at,
            revision: page.revision,
        }
    }
}

/// Renders the canonical markdown document for `page`.
pub fn render_document(page: &Page) -> Result<String, DocumentError> {
    let yaml = serde_yaml::to_string(&DocumentMeta::of(page))?;
    Ok(format!("{FENCE}{yaml}---\n\n{}", page.content))
}

/// Splits a rendered document back into metadata and body.
pub fn parse_document(text: &str) -> Result<ParsedDocument, DocumentError> {
    let rest = text
        .strip_prefix(FENCE)
        .ok_or(DocumentError::MissingFrontMatter)?;
    let closing = rest
        .find(CLOSING_FENCE)
        .ok_or(DocumentError::MissingFrontMatter)?;

    let meta: DocumentMeta = serde_yaml::from_str(&rest[..=closing])?;
    let after = &rest[closing + CLOSING_FENCE.len()..];
    let body = after.strip_prefix('\n').unwrap_or(after).to_string();
    Ok(ParsedDocument { meta, body })
}

impl VersionToken {
    /// Hex SHA-256 of a rendered document.
    pub fn of_document(document: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(document.as_bytes());
        Self::new(hex::encode(hasher.finalize()))
    }
}

/// Assigns `page.version_token` from its current field values.
pub fn seal(page: &mut Page) -> Result<(), DocumentError> {
    let document = render_document(page)?;
    page.version_token = VersionToken::of_document(&document);
    Ok(())
}
