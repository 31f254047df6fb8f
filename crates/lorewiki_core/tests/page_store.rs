use lorewiki_core::{
    open_db_in_memory, parse_document, render_document, Category, Conflict, ErrorKind, ListQuery,
    PageChanges, PageFields, PageFilter, PageService, PageStatus, ProjectId, Renderer, SortField,
    SortOrder, SqlitePageRepository, VersionToken, WikiError,
};
use rusqlite::Connection;
use std::thread;
use std::time::Duration;

fn service(conn: &mut Connection) -> PageService<SqlitePageRepository<'_>> {
    PageService::new(SqlitePageRepository::try_new(conn).unwrap())
}

#[test]
fn create_from_title_then_get_returns_stored_page() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let created = wiki
        .create_from_title(
            "proj1",
            Some("characters"),
            PageFields::new("Gabriel", "# Gabriel\n\nA paladin.").with_tags(["Race/Elf"]),
        )
        .unwrap();
    assert_eq!(created.path(), "characters/gabriel");
    assert_eq!(created.revision, 1);
    assert!(!created.version_token.is_empty());

    let loaded = wiki.get("proj1", "characters/gabriel").unwrap();
    assert_eq!(loaded.title, "Gabriel");
    assert_eq!(loaded.content, "# Gabriel\n\nA paladin.");
    assert_eq!(loaded.tags, vec!["race/elf"]);
    assert_eq!(loaded.version_token, created.version_token);
    assert_eq!(loaded.id, created.id);
}

#[test]
fn create_from_title_without_category_uses_general() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let page = wiki
        .create_from_title("proj1", None, PageFields::new("The Sundering", ""))
        .unwrap();
    assert_eq!(page.path(), "general/the-sundering");
    assert_eq!(page.content, "");
}

#[test]
fn create_at_taken_address_conflicts() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    wiki.create("proj1", "lore/sun", PageFields::new("Sun", "one"))
        .unwrap();
    let err = wiki
        .create("proj1", "lore/Sun", PageFields::new("Sun again", "two"))
        .unwrap_err();
    assert!(matches!(
        err,
        WikiError::Conflict(Conflict::AddressTaken { .. })
    ));
    assert_eq!(wiki.get("proj1", "lore/sun").unwrap().content, "one");

    // Same address in another project is a different page.
    wiki.create("proj2", "lore/sun", PageFields::new("Sun", "three"))
        .unwrap();
}

#[test]
fn address_errors_are_reported_before_lookup() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let err = wiki.get("proj1", "gabriel").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);

    let err = wiki
        .create_from_title("proj1", Some("lore"), PageFields::new("!!!", ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptySlug);

    let err = wiki
        .create("proj1", "lore/x", PageFields::new("   ", ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn not_found_carries_the_address_as_given() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    match wiki.get("proj1", "characters/nobody").unwrap_err() {
        WikiError::NotFound { address } => assert_eq!(address, "characters/nobody"),
        other => panic!("unexpected error: {other}"),
    }
    let err = wiki.delete("proj1", "characters/nobody", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = wiki
        .update("proj1", "characters/nobody", &PageChanges::default(), None, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn update_applies_supplied_fields_and_rotates_token() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let created = wiki
        .create(
            "proj1",
            "characters/gabriel",
            PageFields::new("Gabriel", "v1").with_summary("paladin"),
        )
        .unwrap();

    let changes = PageChanges {
        content: Some("v2".to_string()),
        status: Some(PageStatus::Draft),
        ..PageChanges::default()
    };
    let updated = wiki
        .update(
            "proj1",
            "characters/gabriel",
            &changes,
            Some(&created.version_token),
            false,
        )
        .unwrap();

    assert_eq!(updated.content, "v2");
    assert_eq!(updated.status, PageStatus::Draft);
    assert_eq!(updated.summary.as_deref(), Some("paladin"));
    assert_eq!(updated.revision, 2);
    assert_ne!(updated.version_token, created.version_token);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(wiki.get("proj1", "characters/gabriel").unwrap(), updated);
}

#[test]
fn empty_update_still_produces_a_new_revision() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let created = wiki
        .create("proj1", "lore/moon", PageFields::new("Moon", ""))
        .unwrap();
    let updated = wiki
        .update("proj1", "lore/moon", &PageChanges::default(), None, false)
        .unwrap();
    assert_eq!(updated.revision, 2);
    assert_ne!(updated.version_token, created.version_token);
}

#[test]
fn soft_delete_hides_page_but_reserves_address_until_hard_delete() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    wiki.create("proj1", "lore/sun", PageFields::new("Sun", "old"))
        .unwrap();
    let ack = wiki.delete("proj1", "lore/sun", false).unwrap();
    assert!(!ack.hard);

    assert_eq!(
        wiki.get("proj1", "lore/sun").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    let listed = wiki
        .list(&ListQuery {
            filter: PageFilter::project(ProjectId::parse("proj1").unwrap()),
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(listed.total, 0);

    let err = wiki
        .create("proj1", "lore/sun", PageFields::new("Sun", "new"))
        .unwrap_err();
    assert!(matches!(
        err,
        WikiError::Conflict(Conflict::AddressTaken { .. })
    ));

    let ack = wiki.delete("proj1", "lore/sun", true).unwrap();
    assert!(ack.hard);
    let recreated = wiki
        .create("proj1", "lore/sun", PageFields::new("Sun", "new"))
        .unwrap();
    assert_eq!(recreated.revision, 1);
}

#[test]
fn restore_brings_soft_deleted_page_back_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let created = wiki
        .create("proj1", "lore/sun", PageFields::new("Sun", "body"))
        .unwrap();
    wiki.delete("proj1", "lore/sun", false).unwrap();

    let restored = wiki.restore("proj1", "lore/sun").unwrap();
    assert!(restored.is_active());
    assert_eq!(restored.deleted_at, None);
    assert_eq!(restored.version_token, created.version_token);

    let err = wiki.restore("proj1", "lore/sun").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn view_counts_and_ranks_related_pages() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    wiki.create(
        "proj1",
        "characters/gabriel",
        PageFields::new(
            "Gabriel",
            "# Gabriel\n![portrait](gabriel.png) A **paladin** of [Elvenmoor](lore/elvenmoor).",
        )
        .with_tags(["race/elf", "paladin"]),
    )
    .unwrap();
    wiki.create(
        "proj1",
        "characters/ariel",
        PageFields::new("Ariel", "Long body.")
            .with_summary("Knight of the order")
            .with_tags(["paladin", "race/elf"]),
    )
    .unwrap();
    wiki.create(
        "proj1",
        "races/elf",
        PageFields::new("Elf", "").with_tags(["race/elf"]),
    )
    .unwrap();
    wiki.create(
        "proj2",
        "characters/other",
        PageFields::new("Other", "").with_tags(["paladin"]),
    )
    .unwrap();

    let before = wiki.get("proj1", "characters/gabriel").unwrap();
    wiki.view("proj1", "characters/gabriel").unwrap();
    let detail = wiki.view("proj1", "characters/gabriel").unwrap();

    assert_eq!(detail.page.view_count, 2);
    assert_eq!(detail.page.version_token, before.version_token);
    assert_eq!(detail.page.updated_at, before.updated_at);
    let related: Vec<String> = detail.related.iter().map(|item| item.page.path()).collect();
    assert_eq!(related, vec!["characters/ariel", "races/elf"]);
    assert_eq!(detail.excerpt.as_deref(), Some("Gabriel A paladin of Elvenmoor."));
    assert_eq!(detail.cover_image.as_deref(), Some("gabriel.png"));

    let ariel = wiki.view("proj1", "characters/ariel").unwrap();
    assert_eq!(ariel.excerpt.as_deref(), Some("Knight of the order"));
    assert_eq!(ariel.cover_image, None);
}

#[test]
fn list_sorts_by_updated_at_desc_with_limit() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    for index in 0..12 {
        wiki.create(
            "proj1",
            &format!("lore/entry-{index:02}"),
            PageFields::new(format!("Entry {index}"), ""),
        )
        .unwrap();
    }
    wiki.update(
        "proj1",
        "lore/entry-03",
        &PageChanges::default(),
        None,
        false,
    )
    .unwrap();

    let result = wiki
        .list(&ListQuery {
            filter: PageFilter::project(ProjectId::parse("proj1").unwrap()),
            sort: SortField::UpdatedAt,
            order: SortOrder::Desc,
            page: None,
            limit: Some(10),
        })
        .unwrap();

    assert_eq!(result.total, 12);
    assert_eq!(result.limit, 10);
    assert!(result.items.len() <= 10);
    for pair in result.items.windows(2) {
        assert!(pair[0].updated_at >= pair[1].updated_at);
        if pair[0].updated_at == pair[1].updated_at {
            assert!(pair[0].path() < pair[1].path());
        }
    }

    let second = wiki
        .list(&ListQuery {
            filter: PageFilter::project(ProjectId::parse("proj1").unwrap()),
            page: Some(2),
            limit: Some(10),
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(second.items.len(), 2);
}

#[test]
fn list_filters_by_category_status_and_tag() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    wiki.create(
        "proj1",
        "characters/gabriel",
        PageFields::new("Gabriel", "").with_tags(["paladin"]),
    )
    .unwrap();
    wiki.create(
        "proj1",
        "characters/bram",
        PageFields::new("Bram", "").with_status(PageStatus::Draft),
    )
    .unwrap();
    wiki.create("proj1", "lore/sun", PageFields::new("Sun", ""))
        .unwrap();

    let base = PageFilter::project(ProjectId::parse("proj1").unwrap());
    let by_category = wiki
        .list(&ListQuery {
            filter: PageFilter {
                category: Some(Category::parse("characters").unwrap()),
                ..base.clone()
            },
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(by_category.total, 2);

    let drafts = wiki
        .list(&ListQuery {
            filter: PageFilter {
                status: Some(PageStatus::Draft),
                ..base.clone()
            },
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(drafts.items[0].title, "Bram");

    let tagged = wiki
        .list(&ListQuery {
            filter: PageFilter {
                tag: Some("Paladin".to_string()),
                ..base
            },
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(tagged.total, 1);
    assert_eq!(tagged.items[0].title, "Gabriel");
}

#[test]
fn dashboard_tags_and_projects_summarize_active_pages() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    wiki.create(
        "proj1",
        "characters/gabriel",
        PageFields::new("Gabriel", "").with_tags(["race/elf", "paladin"]),
    )
    .unwrap();
    wiki.create(
        "proj1",
        "races/elf",
        PageFields::new("Elf", "").with_tags(["race/elf"]),
    )
    .unwrap();
    wiki.create("proj1", "lore/gone", PageFields::new("Gone", "").with_tags(["paladin"]))
        .unwrap();
    wiki.delete("proj1", "lore/gone", false).unwrap();
    wiki.create("proj2", "lore/sun", PageFields::new("Sun", ""))
        .unwrap();

    let dashboard = wiki.dashboard("proj1", Some(1)).unwrap();
    assert_eq!(dashboard.total_pages, 2);
    assert_eq!(dashboard.recent.len(), 1);
    assert_eq!(dashboard.groups.len(), 2);

    let tags = wiki.tags(Some("proj1")).unwrap();
    assert_eq!(tags[0].name, "race/elf");
    assert_eq!(tags[0].display_name, "elf");
    assert_eq!(tags[0].usage_count, 2);
    assert_eq!(tags[1].name, "paladin");
    assert_eq!(tags[1].usage_count, 1);

    let projects = wiki.projects().unwrap();
    let counts: Vec<(&str, u64)> = projects
        .iter()
        .map(|summary| (summary.project_id.as_str(), summary.page_count))
        .collect();
    assert_eq!(counts, vec![("proj1", 2), ("proj2", 1)]);
}

#[test]
fn dashboard_groups_follow_recency_not_category_name() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    for address in ["lore/sun", "characters/gabriel", "zeta/most-recent"] {
        wiki.create("proj1", address, PageFields::new(address, ""))
            .unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    let mut draft = PageFields::new("Draft", "");
    draft.status = PageStatus::Draft;
    wiki.create("proj1", "alpha/draft", draft).unwrap();

    let dashboard = wiki.dashboard("proj1", None).unwrap();
    let categories: Vec<&str> = dashboard
        .groups
        .iter()
        .map(|group| group.category.as_str())
        .collect();
    assert_eq!(categories, vec!["zeta", "characters", "lore"]);
    assert_eq!(dashboard.groups[1].label, "Characters");
    assert_eq!(dashboard.total_pages, 3);

    let recent: Vec<String> = dashboard.recent.iter().map(|page| page.path()).collect();
    assert_eq!(
        recent,
        vec!["zeta/most-recent", "characters/gabriel", "lore/sun"]
    );
}

#[test]
fn exported_document_hashes_to_the_version_token() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    let page = wiki
        .create(
            "proj1",
            "lore/first-age",
            PageFields::new("First Age", "# First Age").with_author("mira"),
        )
        .unwrap();

    let document = wiki.export_document("proj1", "lore/first-age").unwrap();
    assert_eq!(document, render_document(&page).unwrap());
    assert_eq!(VersionToken::of_document(&document), page.version_token);

    let parsed = parse_document(&document).unwrap();
    assert_eq!(parsed.meta.category, "lore");
    assert_eq!(parsed.body, "# First Age");
}

struct ShoutRenderer;

impl Renderer for ShoutRenderer {
    type Output = String;

    fn render(&self, markdown: &str) -> String {
        markdown.to_uppercase()
    }
}

#[test]
fn render_hands_content_to_the_renderer() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = service(&mut conn);

    wiki.create("proj1", "lore/sun", PageFields::new("Sun", "bright"))
        .unwrap();
    let rendered = wiki.render("proj1", "lore/sun", &ShoutRenderer).unwrap();
    assert_eq!(rendered.body, "BRIGHT");
    assert_eq!(rendered.page.content, "bright");
}
