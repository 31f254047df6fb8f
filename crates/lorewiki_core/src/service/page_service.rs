//! Page use-case service.
//!
//! # Responsibility
//! - Resolve caller addresses, run the save protocol and serve read views.
//! - Map repository failures into the caller-facing `WikiError` taxonomy.
//!
//! # Invariants
//! - Every address is parsed before the repository is touched.
//! - The concurrency decision runs inside the repository write transaction.
//! - Log lines carry addresses and outcomes only, never page content.

use crate::error::{WikiError, WikiResult};
use crate::guard::{self, GuardDecision};
use crate::model::address::{Category, PageAddress, ProjectId, SlugPolicy};
use crate::model::document::{render_document, seal};
use crate::model::page::{now_epoch_ms, Page, PageChanges, PageFields, PageStatus, VersionToken};
use crate::model::project::{Project, ProjectChanges, ProjectFields};
use crate::model::session::SaveRequest;
use crate::query::engine::{
    filter_pages, group_by_category, normalize_list_limit, recent_pages, related_pages,
    run_list_query, sort_pages, CategoryGroup, ListLimits, ListQuery, PageFilter, PageList,
    RelatedPage, SortField, SortOrder, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, RELATED_PAGES_LIMIT,
};
use crate::render::{derive_excerpt, first_image, Renderer, DEFAULT_EXCERPT_CHARS};
use crate::repo::page_repo::{PageRepository, PageScope, ProjectSummary, RepoError, TagUsage};
use crate::repo::project_repo::ProjectRepository;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Store behavior knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub busy_timeout: Duration,
    pub list_default_limit: u32,
    pub list_max_limit: u32,
    /// Category for `create_from_title` when the caller gives none.
    pub default_category: Category,
    pub slug_policy: SlugPolicy,
}

impl StoreSettings {
    pub fn list_limits(&self) -> ListLimits {
        ListLimits {
            default_limit: self.list_default_limit,
            max_limit: self.list_max_limit,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            busy_timeout: crate::db::DEFAULT_BUSY_TIMEOUT,
            list_default_limit: DEFAULT_LIST_LIMIT,
            list_max_limit: MAX_LIST_LIMIT,
            default_category: Category::general(),
            slug_policy: SlugPolicy::default(),
        }
    }
}

/// Acknowledgement of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteAck {
    pub address: String,
    /// `true` when the row was purged and the address freed.
    pub hard: bool,
}

/// A page with its related pages, as shown on the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDetail {
    pub page: Page,
    /// Stored summary, or a plain-text excerpt of the body.
    pub excerpt: Option<String>,
    /// First image referenced by the body.
    pub cover_image: Option<String>,
    pub related: Vec<RelatedPage>,
}

/// Project landing view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub project_id: ProjectId,
    pub total_pages: usize,
    pub recent: Vec<Page>,
    pub groups: Vec<CategoryGroup>,
}

/// Acknowledgement of a project delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDeleteAck {
    pub project_id: ProjectId,
    /// Page rows removed with the project, soft-deleted ones included.
    pub pages_removed: u64,
}

/// Page rendered by a caller-supplied renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage<T> {
    pub page: Page,
    pub body: T,
}

/// Use-case service over any page repository.
pub struct PageService<R: PageRepository> {
    repo: R,
    settings: StoreSettings,
}

impl<R: PageRepository> PageService<R> {
    /// Creates a service with default settings.
    pub fn new(repo: R) -> Self {
        Self::with_settings(repo, StoreSettings::default())
    }

    pub fn with_settings(repo: R, settings: StoreSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Creates a page at `category/slug`.
    ///
    /// The slug half is normalized, so `lore/First Age` is stored as
    /// `lore/first-age`.
    ///
    /// # Errors
    /// - `Address` before any storage access.
    /// - `Conflict(AddressTaken)` when any row, active or soft-deleted,
    ///   already holds the address.
    pub fn create(&mut self, project_id: &str, address: &str, fields: PageFields) -> WikiResult<Page> {
        let resolved = PageAddress::for_create(project_id, address, &self.settings.slug_policy)?;
        self.insert_at(&resolved, fields)
    }

    /// Creates a page addressed by its title.
    pub fn create_from_title(
        &mut self,
        project_id: &str,
        category: Option<&str>,
        fields: PageFields,
    ) -> WikiResult<Page> {
        let category = match category.map(str::trim) {
            Some(value) if !value.is_empty() => Some(value),
            _ => Some(self.settings.default_category.as_str()),
        };
        let resolved = PageAddress::from_title(
            project_id,
            category,
            &fields.title,
            &self.settings.slug_policy,
        )?;
        self.insert_at(&resolved, fields)
    }

    /// Loads an active page.
    pub fn get(&self, project_id: &str, address: &str) -> WikiResult<Page> {
        let resolved = PageAddress::parse(project_id, address)?;
        self.repo
            .find_page(&resolved, false)
            .map_err(|err| WikiError::from_repo(err, address))?
            .ok_or_else(|| WikiError::NotFound {
                address: address.to_string(),
            })
    }

    /// Loads a page for display: bumps its view count, derives its excerpt
    /// and cover image, and attaches up to five related pages.
    pub fn view(&mut self, project_id: &str, address: &str) -> WikiResult<PageDetail> {
        let resolved = PageAddress::parse(project_id, address)?;
        let view_count = self
            .repo
            .record_view(&resolved)
            .map_err(|err| WikiError::from_repo(err, address))?;
        let page = self
            .repo
            .find_page(&resolved, false)
            .map_err(|err| WikiError::from_repo(err, address))?
            .ok_or_else(|| WikiError::NotFound {
                address: address.to_string(),
            })?;

        let candidates = self
            .repo
            .list_pages(&PageScope::project(resolved.project_id.clone()))
            .map_err(|err| WikiError::from_repo(err, address))?;
        let related = related_pages(&page, candidates, RELATED_PAGES_LIMIT);
        debug!(
            "event=page_view module=service status=ok project={} address={} view_count={} related={}",
            resolved.project_id,
            resolved.path(),
            view_count,
            related.len()
        );
        let excerpt = page
            .summary
            .clone()
            .or_else(|| derive_excerpt(&page.content, DEFAULT_EXCERPT_CHARS));
        let cover_image = first_image(&page.content);
        Ok(PageDetail {
            page,
            excerpt,
            cover_image,
            related,
        })
    }

    /// Applies `changes` under the optimistic concurrency protocol.
    ///
    /// With `expected` present and different from the stored token, the write
    /// is rejected unless `force` is set. Absent fields keep their value.
    ///
    /// # Errors
    /// - `NotFound` when no active page holds the address.
    /// - `Conflict(VersionMismatch)` with the current stored page.
    /// - `Unavailable` when the write lock could not be taken in time.
    pub fn update(
        &mut self,
        project_id: &str,
        address: &str,
        changes: &PageChanges,
        expected: Option<&VersionToken>,
        force: bool,
    ) -> WikiResult<Page> {
        let resolved = PageAddress::parse(project_id, address)?;
        let started_at = Instant::now();
        let now = now_epoch_ms();
        let mut decision = None;

        let outcome = self.repo.update_page(&resolved, |current| {
            let verdict = guard::decide(expected, &current.version_token, force);
            decision = Some(verdict);
            if !verdict.allows_write() {
                return Err(RepoError::VersionConflict {
                    expected: expected.cloned().unwrap_or_else(|| current.version_token.clone()),
                    current: Box::new(current.clone()),
                });
            }
            let mut next = current.with_changes(changes, now)?;
            seal(&mut next)?;
            Ok(next)
        });

        let decision = decision.map_or("none", GuardDecision::as_str);
        match outcome {
            Ok(page) => {
                info!(
                    "event=page_update module=service status=ok project={} address={} decision={} revision={} duration_ms={}",
                    resolved.project_id,
                    resolved.path(),
                    decision,
                    page.revision,
                    started_at.elapsed().as_millis()
                );
                Ok(page)
            }
            Err(err) => {
                let err = WikiError::from_repo(err, address);
                warn!(
                    "event=page_update module=service status=error project={} address={} decision={} error_code={} duration_ms={}",
                    resolved.project_id,
                    resolved.path(),
                    decision,
                    err.kind().code(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    /// Soft-deletes (address stays reserved) or hard-deletes (row purged).
    ///
    /// A hard delete also purges rows that are already soft-deleted.
    pub fn delete(&mut self, project_id: &str, address: &str, hard: bool) -> WikiResult<DeleteAck> {
        let resolved = PageAddress::parse(project_id, address)?;
        let result = if hard {
            self.repo.purge_page(&resolved)
        } else {
            self.repo.soft_delete_page(&resolved, now_epoch_ms())
        };
        result.map_err(|err| WikiError::from_repo(err, address))?;

        info!(
            "event=page_delete module=service status=ok project={} address={} hard={}",
            resolved.project_id,
            resolved.path(),
            hard
        );
        Ok(DeleteAck {
            address: resolved.path(),
            hard,
        })
    }

    /// Brings a soft-deleted page back.
    pub fn restore(&mut self, project_id: &str, address: &str) -> WikiResult<Page> {
        let resolved = PageAddress::parse(project_id, address)?;
        let page = self
            .repo
            .restore_page(&resolved)
            .map_err(|err| WikiError::from_repo(err, address))?;
        info!(
            "event=page_restore module=service status=ok project={} address={}",
            resolved.project_id,
            resolved.path()
        );
        Ok(page)
    }

    /// Filtered, sorted, paginated list of active pages.
    pub fn list(&self, query: &ListQuery) -> WikiResult<PageList> {
        let scope = PageScope {
            project_id: query.filter.project_id.clone(),
            include_deleted: false,
        };
        let pages = self.repo.list_pages(&scope)?;
        Ok(run_list_query(pages, query, self.settings.list_limits()))
    }

    /// Recent pages plus all `active`-status pages grouped by category.
    ///
    /// Pages are ordered most recently updated first, and groups keep the
    /// order in which their first page appears.
    pub fn dashboard(&self, project_id: &str, recent_limit: Option<u32>) -> WikiResult<Dashboard> {
        let project_id = ProjectId::parse(project_id)?;
        let recent_limit = normalize_list_limit(recent_limit, self.settings.list_limits());
        let filter = PageFilter {
            project_id: Some(project_id.clone()),
            status: Some(PageStatus::Active),
            ..PageFilter::default()
        };
        let mut pages = filter_pages(
            self.repo
                .list_pages(&PageScope::project(project_id.clone()))?,
            &filter,
        );
        sort_pages(&mut pages, SortField::UpdatedAt, SortOrder::Desc);

        let total_pages = pages.len();
        let recent = recent_pages(pages.clone(), recent_limit as usize);
        let groups = group_by_category(pages);
        Ok(Dashboard {
            project_id,
            total_pages,
            recent,
            groups,
        })
    }

    /// Tag usage counts over active pages, most used first.
    pub fn tags(&self, project_id: Option<&str>) -> WikiResult<Vec<TagUsage>> {
        let project_id = project_id.map(ProjectId::parse).transpose()?;
        Ok(self.repo.tag_usage(project_id.as_ref())?)
    }

    /// Active page counts per project.
    pub fn projects(&self) -> WikiResult<Vec<ProjectSummary>> {
        Ok(self.repo.project_summaries()?)
    }

    /// Canonical frontmatter markdown of an active page.
    pub fn export_document(&self, project_id: &str, address: &str) -> WikiResult<String> {
        let page = self.get(project_id, address)?;
        Ok(render_document(&page)?)
    }

    /// Hands the page body to `renderer`.
    pub fn render<T: Renderer>(
        &self,
        project_id: &str,
        address: &str,
        renderer: &T,
    ) -> WikiResult<RenderedPage<T::Output>> {
        let page = self.get(project_id, address)?;
        let body = renderer.render(&page.content);
        Ok(RenderedPage { page, body })
    }

    /// Persists an edit-session save request.
    ///
    /// A request without a base creates a page from the draft title under
    /// `category`; otherwise it updates the base page expecting its token.
    pub fn save_draft(
        &mut self,
        project_id: &str,
        category: Option<&str>,
        request: &SaveRequest,
        author: Option<&str>,
    ) -> WikiResult<Page> {
        match request.base.as_deref() {
            None => self.create_from_title(project_id, category, request.to_fields(author)),
            Some(base) => {
                let address = base.path();
                self.update(
                    project_id,
                    &address,
                    &request.to_changes(author),
                    request.expected_version(),
                    false,
                )
            }
        }
    }

    fn insert_at(&mut self, address: &PageAddress, fields: PageFields) -> WikiResult<Page> {
        let path = address.path();
        let mut page = Page::new_at(address, fields, now_epoch_ms())?;
        seal(&mut page)?;

        match self.repo.insert_page(&page) {
            Ok(()) => {
                info!(
                    "event=page_create module=service status=ok project={} address={} id={}",
                    address.project_id, path, page.id
                );
                Ok(page)
            }
            Err(err) => {
                let err = WikiError::from_repo(err, &path);
                warn!(
                    "event=page_create module=service status=error project={} address={} error_code={}",
                    address.project_id,
                    path,
                    err.kind().code()
                );
                Err(err)
            }
        }
    }
}

impl<R: PageRepository + ProjectRepository> PageService<R> {
    /// Registers a project.
    ///
    /// # Errors
    /// - `Conflict(ProjectTaken)` when the id is already registered.
    pub fn create_project(&mut self, project_id: &str, fields: ProjectFields) -> WikiResult<Project> {
        let id = ProjectId::parse(project_id)?;
        let project = Project::new(id, fields, now_epoch_ms())?;
        self.repo
            .insert_project(&project)
            .map_err(|err| WikiError::from_project_repo(err, project_id))?;
        info!(
            "event=project_create module=service status=ok project={}",
            project.id
        );
        // Pages may already exist for an id registered after the fact.
        self.get_project(project_id)
    }

    pub fn get_project(&self, project_id: &str) -> WikiResult<Project> {
        let id = ProjectId::parse(project_id)?;
        self.repo
            .find_project(&id)
            .map_err(|err| WikiError::from_project_repo(err, project_id))?
            .ok_or_else(|| WikiError::ProjectNotFound {
                project_id: project_id.to_string(),
            })
    }

    /// Applies `changes` to a registered project; absent fields keep their value.
    pub fn update_project(&mut self, project_id: &str, changes: &ProjectChanges) -> WikiResult<Project> {
        let id = ProjectId::parse(project_id)?;
        let now = now_epoch_ms();
        let project = self
            .repo
            .update_project(&id, |current| Ok(current.with_changes(changes, now)?))
            .map_err(|err| WikiError::from_project_repo(err, project_id))?;
        info!(
            "event=project_update module=service status=ok project={}",
            project.id
        );
        Ok(project)
    }

    /// Removes a registered project together with all of its pages.
    pub fn delete_project(&mut self, project_id: &str) -> WikiResult<ProjectDeleteAck> {
        let id = ProjectId::parse(project_id)?;
        let pages_removed = self
            .repo
            .delete_project(&id)
            .map_err(|err| WikiError::from_project_repo(err, project_id))?;
        info!(
            "event=project_delete module=service status=ok project={} pages_removed={}",
            id, pages_removed
        );
        Ok(ProjectDeleteAck {
            project_id: id,
            pages_removed,
        })
    }

    /// Registered projects with their active page counts, oldest first.
    pub fn list_projects(&self) -> WikiResult<Vec<Project>> {
        Ok(self.repo.list_projects()?)
    }
}
