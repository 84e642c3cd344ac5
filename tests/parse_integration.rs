use photo_uploader::naming::{parse_year, resolve_collection_name, title_case};
use photo_uploader::parse::{SubstitutionTable, parse_substitutions};
use photo_uploader::util::chunked;

fn table(spec: &str) -> SubstitutionTable {
    parse_substitutions(spec).unwrap()
}

#[test]
fn test_collection_name_without_capitalize() {
    assert_eq!(resolve_collection_name("Foo_Bar-2010", &table("_, "), false), "Foo Bar-2010");
    assert_eq!(resolve_collection_name("plain", &SubstitutionTable::default(), false), "plain");
}

#[test]
fn test_collection_name_with_capitalize() {
    assert_eq!(resolve_collection_name("foo bar_baz_-_2010", &table("_, "), true), "Foo Bar Baz - 2010");
    // capitalize runs after substitutions
    assert_eq!(resolve_collection_name("a-b", &table("-, "), true), "A B");
}

#[test]
fn test_collection_name_is_trimmed() {
    assert_eq!(resolve_collection_name("  spaced  ", &SubstitutionTable::default(), true), "Spaced");
}

#[test]
fn test_parse_year() {
    assert_eq!(parse_year("Foo bar - 2008"), Some(2008));
    assert_eq!(parse_year("ThisAlsoMatches 2001"), Some(2001));
    assert_eq!(parse_year("Does Not Match2011"), None);
    assert_eq!(parse_year("Not a valid year - 211"), None);
    assert_eq!(parse_year("Trip_2010"), Some(2010));
    assert_eq!(parse_year("Trip 1999"), Some(1999));
    assert_eq!(parse_year("Trip-2010"), Some(2010));
    assert_eq!(parse_year("Trip2010"), None);
    assert_eq!(parse_year("Trip_3010"), None);
    assert_eq!(parse_year("Trip_20101"), None);
    assert_eq!(parse_year("_2010"), None);
    assert_eq!(parse_year(""), None);
}

#[test]
fn test_title_case_only_splits_on_whitespace() {
    assert_eq!(title_case("hello-world again"), "Hello-world Again");
}

#[test]
fn test_substitutions_replace_every_occurrence() {
    let t = table("_, ");
    assert_eq!(t.apply("a_b_c"), "a b c");
}

#[test]
fn test_empty_search_string_is_rejected() {
    assert!(parse_substitutions("\"\",x").is_err());
}

#[test]
fn test_chunked() {
    let items: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
    let chunks = chunked(&items, 2);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0], vec!["t0", "t1"]);
    assert_eq!(chunks[2], vec!["t4"]);
    assert!(chunked(&Vec::<String>::new(), 50).is_empty());
}
