//! Caller-facing error taxonomy.
//!
//! # Invariants
//! - Address errors are raised before any storage access.
//! - `NotFound` carries the address exactly as the caller supplied it.
//! - Version conflicts carry the current stored page for re-merging.
//! - Nothing here is retried by the core.

use crate::model::address::AddressError;
use crate::model::document::DocumentError;
use crate::model::page::{Page, PageValidationError, VersionToken};
use crate::model::project::ProjectValidationError;
use crate::repo::page_repo::RepoError;
use thiserror::Error;

pub type WikiResult<T> = Result<T, WikiError>;

/// Write rejected because it would break address uniqueness or lose an update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("page already exists: {address}")]
    AddressTaken { address: String },
    #[error("project already exists: {project_id}")]
    ProjectTaken { project_id: String },
    #[error(
        "page `{address}` changed since version {expected}; current version is {}",
        .current.version_token
    )]
    VersionMismatch {
        address: String,
        expected: VersionToken,
        current: Box<Page>,
    },
}

#[derive(Debug, Error)]
pub enum WikiError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Validation(#[from] PageValidationError),
    #[error(transparent)]
    ProjectValidation(#[from] ProjectValidationError),
    #[error("page not found: {address}")]
    NotFound { address: String },
    #[error("project not found: {project_id}")]
    ProjectNotFound { project_id: String },
    #[error(transparent)]
    Conflict(Conflict),
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Storage(RepoError),
}

/// Stable classification for transports (exit codes, HTTP statuses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAddress,
    EmptySlug,
    Invalid,
    NotFound,
    ProjectNotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::EmptySlug => "EMPTY_SLUG",
            Self::Invalid => "INVALID_INPUT",
            Self::NotFound => "PAGE_NOT_FOUND",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl WikiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Address(AddressError::InvalidAddress { .. }) => ErrorKind::InvalidAddress,
            Self::Address(AddressError::EmptySlug { .. }) => ErrorKind::EmptySlug,
            Self::Validation(_) | Self::ProjectValidation(_) => ErrorKind::Invalid,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ProjectNotFound { .. } => ErrorKind::ProjectNotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Document(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Current stored page attached to a version conflict.
    pub fn current_page(&self) -> Option<&Page> {
        match self {
            Self::Conflict(Conflict::VersionMismatch { current, .. }) => Some(current.as_ref()),
            _ => None,
        }
    }

    /// Maps a repository failure, reporting `address` as the caller wrote it.
    pub(crate) fn from_repo(err: RepoError, address: &str) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound {
                address: address.to_string(),
            },
            RepoError::AddressTaken => Self::Conflict(Conflict::AddressTaken {
                address: address.to_string(),
            }),
            RepoError::VersionConflict { expected, current } => {
                Self::Conflict(Conflict::VersionMismatch {
                    address: address.to_string(),
                    expected,
                    current,
                })
            }
            RepoError::Unavailable(source) => Self::Unavailable {
                message: source.to_string(),
            },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::ProjectValidation(err) => Self::ProjectValidation(err),
            RepoError::Document(err) => Self::Document(err),
            other => Self::Storage(other),
        }
    }

    /// Maps a project registry failure for `project_id`.
    pub(crate) fn from_project_repo(err: RepoError, project_id: &str) -> Self {
        match err {
            RepoError::NotFound => Self::ProjectNotFound {
                project_id: project_id.to_string(),
            },
            RepoError::ProjectTaken => Self::Conflict(Conflict::ProjectTaken {
                project_id: project_id.to_string(),
            }),
            other => Self::from_repo(other, project_id),
        }
    }
}

impl From<RepoError> for WikiError {
    fn from(value: RepoError) -> Self {
        Self::from_repo(value, "")
    }
}
