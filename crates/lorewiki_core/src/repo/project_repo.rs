//! Project registry persistence.
//!
//! # Invariants
//! - `page_count` is computed from active pages on every read, never stored.
//! - Deleting a project removes every page row of that project, active or
//!   soft-deleted, in the same transaction as the registry row.

use crate::db::is_unique_violation;
use crate::model::address::ProjectId;
use crate::model::project::Project;
use crate::repo::page_repo::{count_from_db, RepoError, RepoResult, SqlitePageRepository};
use rusqlite::{params, Connection, Row, TransactionBehavior};

const PROJECT_SELECT_SQL: &str = "SELECT
    p.id,
    p.title,
    p.description,
    p.color,
    p.created_at,
    p.updated_at,
    (
        SELECT COUNT(*)
        FROM pages
        WHERE pages.project_id = p.id
          AND pages.is_deleted = 0
    ) AS page_count
FROM projects p";

/// Persistence backend for the project registry.
pub trait ProjectRepository {
    /// Registers a project; fails with `ProjectTaken` for a known id.
    fn insert_project(&mut self, project: &Project) -> RepoResult<()>;
    fn find_project(&self, id: &ProjectId) -> RepoResult<Option<Project>>;
    /// Reads the project and writes `mutate`'s result in one transaction.
    fn update_project<F>(&mut self, id: &ProjectId, mutate: F) -> RepoResult<Project>
    where
        F: FnOnce(&Project) -> RepoResult<Project>;
    /// Removes the project and all of its pages; returns the page rows removed.
    fn delete_project(&mut self, id: &ProjectId) -> RepoResult<u64>;
    /// Registered projects, oldest first.
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
}

impl ProjectRepository for SqlitePageRepository<'_> {
    fn insert_project(&mut self, project: &Project) -> RepoResult<()> {
        let inserted = self.conn.execute(
            "INSERT INTO projects (
                id,
                title,
                description,
                color,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                project.id.as_str(),
                project.title.as_str(),
                project.description.as_deref(),
                project.color.as_str(),
                project.created_at,
                project.updated_at,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::ProjectTaken),
            Err(err) => Err(err.into()),
        }
    }

    fn find_project(&self, id: &ProjectId) -> RepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn update_project<F>(&mut self, id: &ProjectId, mutate: F) -> RepoResult<Project>
    where
        F: FnOnce(&Project) -> RepoResult<Project>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_project(&tx, id)?.ok_or(RepoError::NotFound)?;
        let next = mutate(&current)?;
        if next.id != current.id {
            return Err(RepoError::InvalidData(
                "update must not change the project id".to_string(),
            ));
        }

        tx.execute(
            "UPDATE projects
             SET
                title = ?1,
                description = ?2,
                color = ?3,
                updated_at = ?4
             WHERE id = ?5;",
            params![
                next.title.as_str(),
                next.description.as_deref(),
                next.color.as_str(),
                next.updated_at,
                next.id.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(next)
    }

    fn delete_project(&mut self, id: &ProjectId) -> RepoResult<u64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM projects WHERE id = ?1;", [id.as_str()])?;
        if removed == 0 {
            return Err(RepoError::NotFound);
        }
        // page_tags rows go with their pages via ON DELETE CASCADE.
        let pages = tx.execute("DELETE FROM pages WHERE project_id = ?1;", [id.as_str()])?;
        tx.commit()?;
        Ok(pages as u64)
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY p.created_at ASC, p.id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }
}

fn load_project(conn: &Connection, id: &ProjectId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE p.id = ?1;"))?;
    let mut rows = stmt.query([id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_project_row(row)?)),
        None => Ok(None),
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    let id = ProjectId::parse(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid project id `{id_text}` in projects.id"))
    })?;

    Ok(Project {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        color: row.get("color")?,
        page_count: count_from_db(row.get("page_count")?)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
