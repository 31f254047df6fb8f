//! Page repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist pages by `(project_id, category, slug)` address.
//! - Provide the conditional write the save protocol relies on.
//! - Own tag-link replacement so tags always commit with their page.
//!
//! # Invariants
//! - Every write runs in one IMMEDIATE transaction; a dropped transaction
//!   rolls back, so a page never commits without its token and tags.
//! - Updates are conditioned on the version token read in the same
//!   transaction (compare-and-swap).
//! - Soft-deleted rows keep their address; only `purge_page` frees it.
//! - Lock waits past the connection busy timeout surface as `Unavailable`.

use crate::db::{is_busy_error, is_unique_violation, DbError};
use crate::model::address::{Category, PageAddress, ProjectId, Slug};
use crate::model::document::DocumentError;
use crate::model::page::{Page, PageStatus, PageValidationError, VersionToken};
use crate::model::project::ProjectValidationError;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

const PAGE_SELECT_SQL: &str = "SELECT
    uuid,
    project_id,
    category,
    slug,
    title,
    content,
    summary,
    status,
    author,
    version_token,
    revision,
    view_count,
    is_deleted,
    created_at,
    updated_at,
    deleted_at
FROM pages";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for page persistence and queries.
///
/// Address-level variants carry no address text; the service attaches the
/// caller's own spelling.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("page not found")]
    NotFound,
    #[error("page address already taken")]
    AddressTaken,
    #[error("project id already registered")]
    ProjectTaken,
    #[error("stored version {} does not match expected {expected}", .current.version_token)]
    VersionConflict {
        expected: VersionToken,
        current: Box<Page>,
    },
    #[error("storage busy past timeout: {0}")]
    Unavailable(#[source] rusqlite::Error),
    #[error(transparent)]
    Db(DbError),
    #[error("invalid persisted page data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Validation(#[from] PageValidationError),
    #[error(transparent)]
    ProjectValidation(#[from] ProjectValidationError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_busy_error(&value) {
            Self::Unavailable(value)
        } else {
            Self::Db(DbError::Sqlite(value))
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

/// Which rows `list_pages` returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScope {
    /// `None` spans every project.
    pub project_id: Option<ProjectId>,
    pub include_deleted: bool,
}

impl PageScope {
    pub fn project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            include_deleted: false,
        }
    }
}

/// Tag with the number of active pages carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    /// Full hierarchical name, e.g. `race/elf`.
    pub name: String,
    /// Last path segment, e.g. `elf`.
    pub display_name: String,
    pub usage_count: u64,
}

/// Per-project page counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub page_count: u64,
    pub last_updated_at: Option<i64>,
}

/// Persistence backend for pages.
pub trait PageRepository {
    /// Inserts a sealed page; fails with `AddressTaken` if any row (active
    /// or soft-deleted) already holds the address.
    fn insert_page(&mut self, page: &Page) -> RepoResult<()>;
    /// Loads one page by address.
    fn find_page(&self, address: &PageAddress, include_deleted: bool) -> RepoResult<Option<Page>>;
    /// Reads the active page and writes `mutate`'s result in one transaction.
    ///
    /// `mutate` receives the current stored page and returns the sealed next
    /// revision, or an error (e.g. `VersionConflict`) to abort the write.
    fn update_page<F>(&mut self, address: &PageAddress, mutate: F) -> RepoResult<Page>
    where
        F: FnOnce(&Page) -> RepoResult<Page>;
    /// Marks the active page deleted while keeping its address reserved.
    fn soft_delete_page(&mut self, address: &PageAddress, now_ms: i64) -> RepoResult<()>;
    /// Clears the soft-delete mark.
    fn restore_page(&mut self, address: &PageAddress) -> RepoResult<Page>;
    /// Removes the row (active or soft-deleted) and frees the address.
    fn purge_page(&mut self, address: &PageAddress) -> RepoResult<()>;
    /// Increments the view counter of an active page.
    fn record_view(&mut self, address: &PageAddress) -> RepoResult<u64>;
    /// Returns the raw page set for `scope`, unordered by contract.
    fn list_pages(&self, scope: &PageScope) -> RepoResult<Vec<Page>>;
    /// Tag usage over active pages, most used first.
    fn tag_usage(&self, project_id: Option<&ProjectId>) -> RepoResult<Vec<TagUsage>>;
    /// Active page counts grouped by project.
    fn project_summaries(&self) -> RepoResult<Vec<ProjectSummary>>;
}

/// SQLite-backed page repository.
///
/// Also holds the project registry (see `project_repo`), so a project and
/// its pages are removed in one transaction.
pub struct SqlitePageRepository<'conn> {
    pub(super) conn: &'conn mut Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        for table in ["pages", "page_tags", "projects"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::InvalidData(format!(
                    "required table `{table}` is missing; open the database with open_db"
                )));
            }
        }
        Ok(Self { conn })
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn insert_page(&mut self, page: &Page) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if load_page(&tx, &page.address(), true)?.is_some() {
            return Err(RepoError::AddressTaken);
        }

        let inserted = tx.execute(
            "INSERT INTO pages (
                uuid,
                project_id,
                category,
                slug,
                title,
                content,
                summary,
                status,
                author,
                version_token,
                revision,
                view_count,
                is_deleted,
                created_at,
                updated_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                page.id.to_string(),
                page.project_id.as_str(),
                page.category.as_str(),
                page.slug.as_str(),
                page.title.as_str(),
                page.content.as_str(),
                page.summary.as_deref(),
                page.status.as_str(),
                page.author.as_deref(),
                page.version_token.as_str(),
                i64::from(page.revision),
                count_to_db(page.view_count)?,
                bool_to_int(page.is_deleted),
                page.created_at,
                page.updated_at,
                page.deleted_at,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(RepoError::AddressTaken),
            Err(err) => return Err(err.into()),
        }

        replace_tags(&tx, page)?;
        tx.commit()?;
        Ok(())
    }

    fn find_page(&self, address: &PageAddress, include_deleted: bool) -> RepoResult<Option<Page>> {
        load_page(self.conn, address, include_deleted)
    }

    fn update_page<F>(&mut self, address: &PageAddress, mutate: F) -> RepoResult<Page>
    where
        F: FnOnce(&Page) -> RepoResult<Page>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_page(&tx, address, false)?.ok_or(RepoError::NotFound)?;
        let next = mutate(&current)?;

        if next.id != current.id || next.address() != current.address() {
            return Err(RepoError::InvalidData(
                "update must not change page identity or address".to_string(),
            ));
        }
        if next.version_token.is_empty() {
            return Err(RepoError::InvalidData(
                "update must carry a sealed version token".to_string(),
            ));
        }

        let changed = tx.execute(
            "UPDATE pages
             SET
                title = ?1,
                content = ?2,
                summary = ?3,
                status = ?4,
                author = ?5,
                version_token = ?6,
                revision = ?7,
                updated_at = ?8
             WHERE uuid = ?9
               AND version_token = ?10
               AND is_deleted = 0;",
            params![
                next.title.as_str(),
                next.content.as_str(),
                next.summary.as_deref(),
                next.status.as_str(),
                next.author.as_deref(),
                next.version_token.as_str(),
                i64::from(next.revision),
                next.updated_at,
                next.id.to_string(),
                current.version_token.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::VersionConflict {
                expected: current.version_token.clone(),
                current: Box::new(current),
            });
        }

        replace_tags(&tx, &next)?;
        tx.commit()?;
        Ok(next)
    }

    fn soft_delete_page(&mut self, address: &PageAddress, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE pages
             SET
                is_deleted = 1,
                deleted_at = ?4
             WHERE project_id = ?1
               AND category = ?2
               AND slug = ?3
               AND is_deleted = 0;",
            params![
                address.project_id.as_str(),
                address.category.as_str(),
                address.slug.as_str(),
                now_ms,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn restore_page(&mut self, address: &PageAddress) -> RepoResult<Page> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE pages
             SET
                is_deleted = 0,
                deleted_at = NULL
             WHERE project_id = ?1
               AND category = ?2
               AND slug = ?3
               AND is_deleted = 1;",
            params![
                address.project_id.as_str(),
                address.category.as_str(),
                address.slug.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound);
        }

        let restored = load_page(&tx, address, false)?.ok_or(RepoError::NotFound)?;
        tx.commit()?;
        Ok(restored)
    }

    fn purge_page(&mut self, address: &PageAddress) -> RepoResult<()> {
        // page_tags rows go with the page via ON DELETE CASCADE.
        let changed = self.conn.execute(
            "DELETE FROM pages
             WHERE project_id = ?1
               AND category = ?2
               AND slug = ?3;",
            params![
                address.project_id.as_str(),
                address.category.as_str(),
                address.slug.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn record_view(&mut self, address: &PageAddress) -> RepoResult<u64> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "UPDATE pages
                 SET view_count = view_count + 1
                 WHERE project_id = ?1
                   AND category = ?2
                   AND slug = ?3
                   AND is_deleted = 0
                 RETURNING view_count;",
                params![
                    address.project_id.as_str(),
                    address.category.as_str(),
                    address.slug.as_str(),
                ],
                |row| row.get(0),
            )
            .optional()?;

        let count = count.ok_or(RepoError::NotFound)?;
        count_from_db(count)
    }

    fn list_pages(&self, scope: &PageScope) -> RepoResult<Vec<Page>> {
        let mut sql = format!("{PAGE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !scope.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        if let Some(project_id) = scope.project_id.as_ref() {
            sql.push_str(" AND project_id = ?");
            bind_values.push(Value::Text(project_id.to_string()));
        }
        sql.push_str(" ORDER BY project_id ASC, category ASC, slug ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            let mut page = parse_page_row(row)?;
            page.tags = load_tags(self.conn, &page.id)?;
            pages.push(page);
        }
        Ok(pages)
    }

    fn tag_usage(&self, project_id: Option<&ProjectId>) -> RepoResult<Vec<TagUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.tag AS tag, COUNT(*) AS usage_count
             FROM page_tags t
             INNER JOIN pages p ON p.uuid = t.page_uuid
             WHERE p.is_deleted = 0
               AND (?1 IS NULL OR p.project_id = ?1)
             GROUP BY t.tag
             ORDER BY usage_count DESC, t.tag ASC;",
        )?;
        let mut rows = stmt.query([project_id.map(ProjectId::as_str)])?;
        let mut usage = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("tag")?;
            let count: i64 = row.get("usage_count")?;
            usage.push(TagUsage {
                display_name: tag_display_name(&name).to_string(),
                name,
                usage_count: count_from_db(count)?,
            });
        }
        Ok(usage)
    }

    fn project_summaries(&self) -> RepoResult<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, COUNT(*) AS page_count, MAX(updated_at) AS last_updated_at
             FROM pages
             WHERE is_deleted = 0
             GROUP BY project_id
             ORDER BY project_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let project_text: String = row.get("project_id")?;
            let project_id = ProjectId::parse(&project_text).map_err(|_| {
                RepoError::InvalidData(format!("invalid project id `{project_text}`"))
            })?;
            let count: i64 = row.get("page_count")?;
            summaries.push(ProjectSummary {
                project_id,
                page_count: count_from_db(count)?,
                last_updated_at: row.get("last_updated_at")?,
            });
        }
        Ok(summaries)
    }
}

/// Last `/` segment of a hierarchical tag.
pub fn tag_display_name(tag: &str) -> &str {
    tag.rsplit('/').next().unwrap_or(tag)
}

fn load_page(
    conn: &Connection,
    address: &PageAddress,
    include_deleted: bool,
) -> RepoResult<Option<Page>> {
    let mut stmt = conn.prepare(&format!(
        "{PAGE_SELECT_SQL}
         WHERE project_id = ?1
           AND category = ?2
           AND slug = ?3
           AND (?4 = 1 OR is_deleted = 0);"
    ))?;
    let mut rows = stmt.query(params![
        address.project_id.as_str(),
        address.category.as_str(),
        address.slug.as_str(),
        bool_to_int(include_deleted),
    ])?;

    if let Some(row) = rows.next()? {
        let mut page = parse_page_row(row)?;
        page.tags = load_tags(conn, &page.id)?;
        return Ok(Some(page));
    }
    Ok(None)
}

fn load_tags(conn: &Connection, page_id: &Uuid) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tag
         FROM page_tags
         WHERE page_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([page_id.to_string()])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(row.get(0)?);
    }
    Ok(tags)
}

fn replace_tags(conn: &Connection, page: &Page) -> RepoResult<()> {
    let page_id = page.id.to_string();
    conn.execute("DELETE FROM page_tags WHERE page_uuid = ?1;", [page_id.as_str()])?;
    for (position, tag) in page.tags.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| RepoError::InvalidData("too many tags".to_string()))?;
        conn.execute(
            "INSERT INTO page_tags (page_uuid, position, tag) VALUES (?1, ?2, ?3);",
            params![page_id.as_str(), position, tag.as_str()],
        )?;
    }
    Ok(())
}

fn parse_page_row(row: &Row<'_>) -> RepoResult<Page> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in pages.uuid"))
    })?;

    let project_text: String = row.get("project_id")?;
    let project_id = ProjectId::parse(&project_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid project `{project_text}` in pages.project_id"))
    })?;

    let category_text: String = row.get("category")?;
    let category = if category_text.trim().is_empty() {
        Category::uncategorized()
    } else {
        Category::parse(&category_text).map_err(|_| {
            RepoError::InvalidData(format!("invalid category `{category_text}` in pages.category"))
        })?
    };

    let slug_text: String = row.get("slug")?;
    let slug = Slug::parse(&slug_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid slug `{slug_text}` in pages.slug"))
    })?;

    let status_text: String = row.get("status")?;
    let status = PageStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in pages.status"))
    })?;

    let revision: i64 = row.get("revision")?;
    let revision = u32::try_from(revision).map_err(|_| {
        RepoError::InvalidData(format!("invalid revision `{revision}` in pages.revision"))
    })?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in pages.is_deleted"
            )));
        }
    };

    Ok(Page {
        id,
        project_id,
        category,
        slug,
        title: row.get("title")?,
        content: row.get("content")?,
        summary: row.get("summary")?,
        status,
        tags: Vec::new(),
        author: row.get("author")?,
        version_token: VersionToken::new(row.get::<_, String>("version_token")?),
        revision,
        view_count: count_from_db(row.get("view_count")?)?,
        is_deleted,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

pub(super) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn count_to_db(value: u64) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| RepoError::InvalidData(format!("count `{value}` overflows")))
}

pub(super) fn count_from_db(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative count `{value}`")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
