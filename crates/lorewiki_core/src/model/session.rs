//! Per-edit session state machine.
//!
//! `Viewing → Editing → Saving → {Viewing | Editing(with error)}`
//!
//! # Invariants
//! - `Saving` refuses every transition except `finish_save`.
//! - A new document starts in `Editing` with no base page, so its first
//!   save carries no expected version.
//! - A failed save keeps the draft; a version conflict also keeps the
//!   current stored page so the caller can re-merge.

use crate::error::{Conflict, WikiError};
use crate::model::page::{Page, PageChanges, PageFields, PageStatus, VersionToken};
use thiserror::Error;

/// Coarse session state, for callers that only need to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Viewing,
    Editing,
    Saving,
}

/// Pending, unsaved page content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub status: PageStatus,
    pub tags: Vec<String>,
}

impl Draft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    fn of(page: &Page) -> Self {
        Self {
            title: page.title.clone(),
            content: page.content.clone(),
            summary: page.summary.clone(),
            status: page.status,
            tags: page.tags.clone(),
        }
    }
}

/// Why the last save did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub message: String,
    /// Stored page at conflict time, present only for version conflicts.
    pub current: Option<Box<Page>>,
}

impl From<&WikiError> for SaveFailure {
    fn from(err: &WikiError) -> Self {
        let current = match err {
            WikiError::Conflict(Conflict::VersionMismatch { current, .. }) => Some(current.clone()),
            _ => None,
        };
        Self {
            message: err.to_string(),
            current,
        }
    }
}

/// Everything the store needs to persist a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub draft: Draft,
    /// `None` for a new document.
    pub base: Option<Box<Page>>,
}

impl SaveRequest {
    pub fn expected_version(&self) -> Option<&VersionToken> {
        self.base.as_ref().map(|page| &page.version_token)
    }

    pub fn to_fields(&self, author: Option<&str>) -> PageFields {
        PageFields {
            title: self.draft.title.clone(),
            content: self.draft.content.clone(),
            summary: self.draft.summary.clone(),
            status: self.draft.status,
            tags: self.draft.tags.clone(),
            author: author.map(str::to_string),
        }
    }

    pub fn to_changes(&self, author: Option<&str>) -> PageChanges {
        PageChanges {
            title: Some(self.draft.title.clone()),
            content: Some(self.draft.content.clone()),
            summary: Some(self.draft.summary.clone().unwrap_or_default()),
            status: Some(self.draft.status),
            tags: Some(self.draft.tags.clone()),
            author: author.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a save is in progress")]
    SaveInProgress,
    #[error("session is not editing")]
    NotEditing,
    #[error("session is not saving")]
    NotSaving,
    #[error("new document has no stored page to return to")]
    NoStoredPage,
    #[error("no conflicting page to rebase on")]
    NoConflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSession {
    Viewing {
        page: Box<Page>,
    },
    Editing {
        base: Option<Box<Page>>,
        draft: Draft,
        error: Option<SaveFailure>,
    },
    Saving {
        base: Option<Box<Page>>,
        draft: Draft,
    },
}

impl EditSession {
    pub fn view(page: Page) -> Self {
        Self::Viewing {
            page: Box::new(page),
        }
    }

    pub fn new_document(draft: Draft) -> Self {
        Self::Editing {
            base: None,
            draft,
            error: None,
        }
    }

    pub fn state(&self) -> EditState {
        match self {
            Self::Viewing { .. } => EditState::Viewing,
            Self::Editing { .. } => EditState::Editing,
            Self::Saving { .. } => EditState::Saving,
        }
    }

    pub fn last_error(&self) -> Option<&SaveFailure> {
        match self {
            Self::Editing { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    /// Enters `Editing` from `Viewing`; no-op when already editing.
    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Viewing { page } => {
                let draft = Draft::of(page);
                *self = Self::Editing {
                    base: Some(page.clone()),
                    draft,
                    error: None,
                };
                Ok(())
            }
            Self::Editing { .. } => Ok(()),
            Self::Saving { .. } => Err(SessionError::SaveInProgress),
        }
    }

    pub fn draft_mut(&mut self) -> Result<&mut Draft, SessionError> {
        match self {
            Self::Editing { draft, .. } => Ok(draft),
            Self::Saving { .. } => Err(SessionError::SaveInProgress),
            Self::Viewing { .. } => Err(SessionError::NotEditing),
        }
    }

    /// Drops the draft and returns to the stored page.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Editing { base: Some(page), .. } => {
                *self = Self::Viewing { page: page.clone() };
                Ok(())
            }
            Self::Editing { base: None, .. } => Err(SessionError::NoStoredPage),
            Self::Saving { .. } => Err(SessionError::SaveInProgress),
            Self::Viewing { .. } => Err(SessionError::NotEditing),
        }
    }

    /// Moves to `Saving` and hands out what must be persisted.
    pub fn begin_save(&mut self) -> Result<SaveRequest, SessionError> {
        match self {
            Self::Editing { base, draft, .. } => {
                let request = SaveRequest {
                    draft: std::mem::take(draft),
                    base: base.take(),
                };
                *self = Self::Saving {
                    base: request.base.clone(),
                    draft: request.draft.clone(),
                };
                Ok(request)
            }
            Self::Saving { .. } => Err(SessionError::SaveInProgress),
            Self::Viewing { .. } => Err(SessionError::NotEditing),
        }
    }

    /// Leaves `Saving`: success shows the stored page, failure goes back to
    /// editing with the draft intact.
    pub fn finish_save(&mut self, outcome: Result<Page, SaveFailure>) -> Result<(), SessionError> {
        let Self::Saving { base, draft } = self else {
            return Err(SessionError::NotSaving);
        };

        *self = match outcome {
            Ok(page) => Self::Viewing {
                page: Box::new(page),
            },
            Err(failure) => Self::Editing {
                base: base.take(),
                draft: std::mem::take(draft),
                error: Some(failure),
            },
        };
        Ok(())
    }

    /// Adopts the conflicting stored page as the new base, keeping the draft.
    ///
    /// The next save then expects the current version instead of the stale
    /// one; the caller is responsible for merging the draft first.
    pub fn rebase_on_conflict(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Editing { base, error, .. } => {
                let current = error
                    .as_mut()
                    .and_then(|failure| failure.current.take())
                    .ok_or(SessionError::NoConflict)?;
                *base = Some(current);
                *error = None;
                Ok(())
            }
            Self::Saving { .. } => Err(SessionError::SaveInProgress),
            Self::Viewing { .. } => Err(SessionError::NotEditing),
        }
    }
}
