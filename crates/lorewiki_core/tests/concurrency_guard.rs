use lorewiki_core::{
    open_db, open_db_in_memory, open_db_with_timeout, Conflict, ErrorKind, PageChanges,
    PageFields, PageService, SqlitePageRepository, VersionToken, WikiError,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn content(text: &str) -> PageChanges {
    PageChanges {
        content: Some(text.to_string()),
        ..PageChanges::default()
    }
}

#[test]
fn stale_token_without_force_is_rejected_and_page_is_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());

    let original = wiki
        .create("proj1", "characters/gabriel", PageFields::new("Gabriel", "v1"))
        .unwrap();
    let current = wiki
        .update("proj1", "characters/gabriel", &content("v2"), Some(&original.version_token), false)
        .unwrap();

    let err = wiki
        .update("proj1", "characters/gabriel", &content("v3"), Some(&original.version_token), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    match &err {
        WikiError::Conflict(Conflict::VersionMismatch {
            address,
            expected,
            current: stored,
        }) => {
            assert_eq!(address, "characters/gabriel");
            assert_eq!(expected, &original.version_token);
            assert_eq!(stored.as_ref(), &current);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.current_page().map(|page| page.content.as_str()), Some("v2"));

    let stored = wiki.get("proj1", "characters/gabriel").unwrap();
    assert_eq!(stored, current);
}

#[test]
fn stale_token_with_force_overwrites() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());

    wiki.create("proj1", "lore/sun", PageFields::new("Sun", "v1"))
        .unwrap();
    let stale = VersionToken::new("not-the-current-token");

    let forced = wiki
        .update("proj1", "lore/sun", &content("forced"), Some(&stale), true)
        .unwrap();
    assert_eq!(forced.content, "forced");
    assert_eq!(forced.revision, 2);
}

#[test]
fn missing_expected_version_always_writes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());

    wiki.create("proj1", "lore/sun", PageFields::new("Sun", "v1"))
        .unwrap();
    wiki.update("proj1", "lore/sun", &content("v2"), None, false)
        .unwrap();
    let page = wiki
        .update("proj1", "lore/sun", &content("v3"), None, false)
        .unwrap();
    assert_eq!(page.content, "v3");
    assert_eq!(page.revision, 3);
}

#[test]
fn concurrent_updates_with_same_token_let_exactly_one_win() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");

    let base = {
        let mut conn = open_db(&path).unwrap();
        let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());
        wiki.create("proj1", "characters/gabriel", PageFields::new("Gabriel", "v1"))
            .unwrap()
            .version_token
    };

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|body| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            let base = base.clone();
            thread::spawn(move || {
                let mut conn = open_db(&path).unwrap();
                let mut wiki =
                    PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());
                barrier.wait();
                wiki.update("proj1", "characters/gabriel", &content(body), Some(&base), false)
                    .map(|page| page.content)
                    .map_err(|err| err.kind())
            })
        })
        .collect();

    let outcomes: Vec<Result<String, ErrorKind>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let winners: Vec<&String> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(ErrorKind::Conflict)))
        .count();
    assert_eq!(winners.len(), 1, "outcomes: {outcomes:?}");
    assert_eq!(conflicts, 1, "outcomes: {outcomes:?}");

    let mut conn = open_db(&path).unwrap();
    let wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());
    let stored = wiki.get("proj1", "characters/gabriel").unwrap();
    assert_eq!(&stored.content, winners[0]);
    assert_eq!(stored.revision, 2);
}

#[test]
fn held_write_lock_surfaces_as_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");

    {
        let mut conn = open_db(&path).unwrap();
        let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());
        wiki.create("proj1", "lore/sun", PageFields::new("Sun", "v1"))
            .unwrap();
    }

    let holder = open_db(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let mut conn = open_short_timeout(&path);
    let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());
    let err = wiki
        .update("proj1", "lore/sun", &content("v2"), None, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    // Readers still proceed under WAL while the writer holds its lock.
    assert_eq!(wiki.get("proj1", "lore/sun").unwrap().content, "v1");

    holder.execute_batch("ROLLBACK;").unwrap();
    wiki.update("proj1", "lore/sun", &content("v2"), None, false)
        .unwrap();
}

fn open_short_timeout(path: &Path) -> rusqlite::Connection {
    open_db_with_timeout(path, Duration::from_millis(50)).unwrap()
}
