//! `lorewiki` command-line entry point.
//!
//! # Responsibility
//! - Map subcommands onto `PageService` operations.
//! - Print results as JSON on stdout and failures as JSON on stderr.
//!
//! # Invariants
//! - The exit code depends only on the error kind.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use lorewiki_core::{
    init_from_config, open_db_with_timeout, ErrorKind, ListQuery, PageChanges, PageFields,
    PageFilter, PageService, PageStatus, ProjectChanges, ProjectFields, SortField, SortOrder,
    SqlitePageRepository, VersionToken, WikiConfig, WikiError,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "lorewiki", version, about = "Wiki page store with optimistic concurrency")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "LOREWIKI_CONFIG")]
    config: Option<PathBuf>,

    /// Database file, overriding configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Project the command operates on
    #[arg(short, long, global = true, default_value = "default")]
    project: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a page from a title, or at an explicit `--slug`
    Create(CreateArgs),
    /// Show one page
    Get {
        /// `category/slug`
        address: String,
        /// Count a view and include related pages
        #[arg(long)]
        view: bool,
    },
    /// Update a page, optionally checking its version token
    Update(UpdateArgs),
    /// Soft-delete a page, or purge it with `--hard`
    Delete {
        address: String,
        #[arg(long)]
        hard: bool,
    },
    /// Undo a soft delete
    Restore { address: String },
    /// List pages
    List(ListArgs),
    /// Recent pages and category groups
    Dashboard {
        #[arg(long)]
        recent: Option<u32>,
    },
    /// Tag usage counts
    Tags {
        /// Count across every project
        #[arg(long)]
        all_projects: bool,
    },
    /// Page counts per project, registered or not
    Projects,
    /// Manage the project registry
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    /// Print the frontmatter markdown document of a page
    Export { address: String },
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Register a project
    Create {
        id: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// UI color class, e.g. `bg-blue-500`
        #[arg(long)]
        color: Option<String>,
    },
    /// Show one registered project
    Get { id: String },
    /// Change title, description or color
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Empty clears the description
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Remove a project and all of its pages
    Delete { id: String },
    /// Registered projects, oldest first
    List,
}

#[derive(Args, Debug)]
struct BodyArgs {
    /// Page body; `-` reads stdin
    #[arg(long)]
    content: Option<String>,
    /// Read the page body from a file
    #[arg(long, conflicts_with = "content")]
    content_file: Option<PathBuf>,
    #[arg(long)]
    summary: Option<String>,
    #[arg(long, value_parser = parse_status)]
    status: Option<PageStatus>,
    /// Repeat for several tags
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    author: Option<String>,
}

#[derive(Args, Debug)]
struct CreateArgs {
    title: String,
    #[arg(long)]
    category: Option<String>,
    /// Explicit slug; normalized like a title
    #[arg(long)]
    slug: Option<String>,
    #[command(flatten)]
    body: BodyArgs,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    address: String,
    #[arg(long)]
    title: Option<String>,
    /// Replace all tags with none
    #[arg(long, conflicts_with = "tags")]
    clear_tags: bool,
    /// Version token the edit was based on
    #[arg(long)]
    expected: Option<String>,
    /// Overwrite even when the expected token is stale
    #[arg(long)]
    force: bool,
    #[command(flatten)]
    body: BodyArgs,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long, value_parser = parse_status)]
    status: Option<PageStatus>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long, value_parser = parse_sort_field, default_value = "updated_at")]
    sort: SortField,
    #[arg(long, value_parser = parse_sort_order, default_value = "desc")]
    order: SortOrder,
    /// 1-based page number
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
    /// Ignore `--project` and list every project
    #[arg(long)]
    all_projects: bool,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<&'a str>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = WikiConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_from_config(&config).context("starting logging")?;
    let settings = config.store_settings()?;

    let mut conn = open_db_with_timeout(&config.database_path, settings.busy_timeout)
        .with_context(|| format!("opening `{}`", config.database_path.display()))?;
    let repo = SqlitePageRepository::try_new(&mut conn)?;
    let mut service = PageService::with_settings(repo, settings);
    let project = cli.project.as_str();

    match cli.command {
        Command::Create(args) => {
            let fields = page_fields(args.title, args.body)?;
            let page = match args.slug {
                Some(slug) => {
                    let category = args
                        .category
                        .unwrap_or_else(|| service.settings().default_category.to_string());
                    service.create(project, &format!("{category}/{slug}"), fields)?
                }
                None => service.create_from_title(project, args.category.as_deref(), fields)?,
            };
            print_json(&page)
        }
        Command::Get { address, view } => {
            if view {
                print_json(&service.view(project, &address)?)
            } else {
                print_json(&service.get(project, &address)?)
            }
        }
        Command::Update(args) => {
            let changes = page_changes(&args)?;
            let expected = args.expected.map(VersionToken::new);
            let page = service.update(project, &args.address, &changes, expected.as_ref(), args.force)?;
            print_json(&page)
        }
        Command::Delete { address, hard } => print_json(&service.delete(project, &address, hard)?),
        Command::Restore { address } => print_json(&service.restore(project, &address)?),
        Command::List(args) => {
            let filter = PageFilter {
                project_id: if args.all_projects {
                    None
                } else {
                    Some(lorewiki_core::ProjectId::parse(project).map_err(WikiError::from)?)
                },
                category: args
                    .category
                    .as_deref()
                    .map(lorewiki_core::Category::normalize)
                    .transpose()
                    .map_err(WikiError::from)?,
                status: args.status,
                tag: args.tag,
            };
            let query = ListQuery {
                filter,
                sort: args.sort,
                order: args.order,
                page: args.page,
                limit: args.limit,
            };
            print_json(&service.list(&query)?)
        }
        Command::Dashboard { recent } => print_json(&service.dashboard(project, recent)?),
        Command::Tags { all_projects } => {
            let scope = (!all_projects).then_some(project);
            print_json(&service.tags(scope)?)
        }
        Command::Projects => print_json(&service.projects()?),
        Command::Project { action } => run_project(&mut service, action),
        Command::Export { address } => {
            print!("{}", service.export_document(project, &address)?);
            info!("event=cli_export module=cli status=ok address={address}");
            Ok(())
        }
    }
}

fn run_project(
    service: &mut PageService<SqlitePageRepository<'_>>,
    action: ProjectCommand,
) -> Result<()> {
    match action {
        ProjectCommand::Create {
            id,
            title,
            description,
            color,
        } => {
            let fields = ProjectFields {
                title,
                description,
                color,
            };
            print_json(&service.create_project(&id, fields)?)
        }
        ProjectCommand::Get { id } => print_json(&service.get_project(&id)?),
        ProjectCommand::Update {
            id,
            title,
            description,
            color,
        } => {
            let changes = ProjectChanges {
                title,
                description,
                color,
            };
            print_json(&service.update_project(&id, &changes)?)
        }
        ProjectCommand::Delete { id } => print_json(&service.delete_project(&id)?),
        ProjectCommand::List => print_json(&service.list_projects()?),
    }
}

fn page_fields(title: String, body: BodyArgs) -> Result<PageFields> {
    let content = read_content(body.content, body.content_file.as_ref())?.unwrap_or_default();
    Ok(PageFields {
        title,
        content,
        summary: body.summary,
        status: body.status.unwrap_or_default(),
        tags: body.tags,
        author: body.author,
    })
}

fn page_changes(args: &UpdateArgs) -> Result<PageChanges> {
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if args.body.tags.is_empty() {
        None
    } else {
        Some(args.body.tags.clone())
    };
    Ok(PageChanges {
        title: args.title.clone(),
        content: read_content(args.body.content.clone(), args.body.content_file.as_ref())?,
        summary: args.body.summary.clone(),
        status: args.body.status,
        tags,
        author: args.body.author.clone(),
    })
}

fn read_content(inline: Option<String>, file: Option<&PathBuf>) -> Result<Option<String>> {
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading `{}`", path.display()))?;
        return Ok(Some(text));
    }
    match inline.as_deref() {
        Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading page body from stdin")?;
            Ok(Some(text))
        }
        _ => Ok(inline),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(err: &anyhow::Error) -> ExitCode {
    let wiki = err.downcast_ref::<WikiError>();
    let kind = wiki.map_or(ErrorKind::Internal, WikiError::kind);
    let body = ErrorBody {
        code: kind.code(),
        message: format!("{err:#}"),
        current_version: wiki
            .and_then(WikiError::current_page)
            .map(|page| page.version_token.as_str()),
    };
    match serde_json::to_string(&body) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{err:#}"),
    }
    ExitCode::from(exit_code(kind))
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::InvalidAddress | ErrorKind::EmptySlug | ErrorKind::Invalid => 2,
        ErrorKind::NotFound | ErrorKind::ProjectNotFound => 3,
        ErrorKind::Conflict => 4,
        ErrorKind::Unavailable => 5,
    }
}

fn parse_status(value: &str) -> Result<PageStatus, String> {
    PageStatus::parse(value).ok_or_else(|| format!("expected active|draft|archived, got `{value}`"))
}

fn parse_sort_field(value: &str) -> Result<SortField, String> {
    SortField::parse(value)
        .ok_or_else(|| format!("expected created_at|updated_at|title|view_count, got `{value}`"))
}

fn parse_sort_order(value: &str) -> Result<SortOrder, String> {
    SortOrder::parse(value).ok_or_else(|| format!("expected asc|desc, got `{value}`"))
}
