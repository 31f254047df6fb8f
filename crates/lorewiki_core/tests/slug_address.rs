use lorewiki_core::{
    compose, decompose, derive_slug, open_db_in_memory, AddressError, AddressIssue, Category,
    ErrorKind, PageAddress, PageFields, PageService, Script, SlugPolicy, SqlitePageRepository,
};
use proptest::prelude::*;

const TITLES: &[&str] = &[
    "Gabriel",
    "  Gabriel   Vance  ",
    "The Fall of Dagos (Part II)",
    "엘프 종족의 기원",
    "東京 タワー ひらがな",
    "Ἀθήνα",
    "Тёмный лес",
    "مدينة النحاس",
    "ירושלים",
    "กรุงเทพ",
    "हिमालय",
    "--leading and trailing--",
    "tabs\tand\nnewlines",
    "emoji 🐉 dragon",
];

#[test]
fn derived_slugs_are_non_empty_whitespace_free_and_idempotent() {
    for title in TITLES {
        let slug = derive_slug(title).unwrap();
        assert!(!slug.as_str().is_empty(), "{title}");
        assert!(
            !slug.as_str().chars().any(char::is_whitespace),
            "{title} -> {slug}"
        );
        assert!(!slug.as_str().starts_with('-') && !slug.as_str().ends_with('-'));
        assert_eq!(derive_slug(slug.as_str()).unwrap(), slug, "{title}");
    }
}

#[test]
fn compose_then_decompose_round_trips() {
    for title in TITLES {
        let slug = derive_slug(title).unwrap();
        for category in ["characters", "lore", "general"] {
            let category = Category::parse(category).unwrap();
            let composed = compose(Some(&category), &slug);
            assert_eq!(decompose(&composed).unwrap(), (category, slug.clone()));
        }
    }
}

#[test]
fn gabriel_resolves_to_characters_gabriel() {
    let policy = SlugPolicy::default();
    let address = PageAddress::from_title("proj1", Some("characters"), "Gabriel", &policy).unwrap();
    assert_eq!(address.path(), "characters/gabriel");
    assert_eq!(address.project_id.as_str(), "proj1");

    let parsed = PageAddress::parse("proj1", "characters/gabriel").unwrap();
    assert_eq!(parsed, address);
}

#[test]
fn parse_rejects_missing_or_malformed_halves() {
    let cases = [
        ("gabriel", AddressIssue::MissingCategory),
        ("/gabriel", AddressIssue::EmptyCategory),
        ("characters/", AddressIssue::EmptySlug),
        ("characters/Gabriel", AddressIssue::InvalidSlug),
        ("characters/player/elon", AddressIssue::InvalidSlug),
    ];
    for (input, expected) in cases {
        match PageAddress::parse("proj1", input).unwrap_err() {
            AddressError::InvalidAddress { address, issue } => {
                assert_eq!(address, input);
                assert_eq!(issue, expected, "{input}");
            }
            other => panic!("unexpected error for {input}: {other}"),
        }
    }

    assert!(PageAddress::parse(" ", "characters/gabriel").is_err());
}

#[test]
fn restricted_policy_drops_unlisted_scripts() {
    let policy = SlugPolicy::new(&[Script::Latin, Script::Hangul]);
    assert_eq!(policy.derive("엘프 Москва elf").unwrap().as_str(), "엘프-elf");
}

#[test]
fn lookups_require_canonical_halves_that_create_produces() {
    let mut conn = open_db_in_memory().unwrap();
    let mut wiki = PageService::new(SqlitePageRepository::try_new(&mut conn).unwrap());

    let page = wiki
        .create("proj1", "Characters/Gabriel", PageFields::new("Gabriel", ""))
        .unwrap();
    assert_eq!(page.path(), "characters/gabriel");
    assert!(wiki.get("proj1", "characters/gabriel").is_ok());

    for address in ["Characters/gabriel", "characters/Gabriel", "characters/gab!riel"] {
        let err = wiki.get("proj1", address).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress, "{address}");
    }
}

/// Titles mixing the supported scripts with punctuation and odd whitespace.
fn mixed_title() -> impl Strategy<Value = String> {
    "[ a-zA-Z0-9!?.,_/\\-\t\nÉéßİΣσςἈθήνα엘프종족東京タワーひらがなТёмныйمدينةירושליםกรุงเทพहिमालय🐉]{0,80}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn derived_slug_is_never_empty(title in any::<String>()) {
        if let Ok(slug) = derive_slug(&title) {
            prop_assert!(!slug.as_str().is_empty());
        }
    }

    #[test]
    fn derived_slug_is_whitespace_free_and_idempotent(
        title in prop_oneof![any::<String>(), mixed_title()]
    ) {
        if let Ok(slug) = derive_slug(&title) {
            prop_assert!(!slug.as_str().chars().any(char::is_whitespace), "{:?}", slug);
            prop_assert_eq!(derive_slug(slug.as_str()).unwrap(), slug);
        }
    }

    #[test]
    fn compose_decompose_round_trips_for_valid_pairs(
        category in "[a-z][a-z0-9_]{0,15}",
        title in prop_oneof![any::<String>(), mixed_title()]
    ) {
        let category = Category::parse(&category).unwrap();
        let slug = match derive_slug(&title) {
            Ok(slug) => slug,
            Err(_) => return Ok(()),
        };
        let composed = compose(Some(&category), &slug);
        prop_assert_eq!(decompose(&composed).unwrap(), (category, slug));
    }
}
