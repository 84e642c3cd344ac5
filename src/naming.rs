//! Album title and year derived from a directory name. Pure functions.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use regex::Regex;

use crate::parse::SubstitutionTable;

static ALBUM_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+[-_ ]([12][0-9]{3})$").expect("valid album year regex"));

/// Substitutions, then optional title case, then trim.
pub fn resolve_collection_name(dir_base_name: &str, table: &SubstitutionTable, capitalize: bool) -> String {
    let replaced = table.apply(dir_base_name);
    let cased = if capitalize { title_case(&replaced) } else { replaced };
    cased.trim().to_string()
}

/// Upper-case the first character of every whitespace-separated word.
/// Whitespace itself is left untouched.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            at_word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Trailing four-digit year (1000-2999) after a `-`, `_` or space.
/// Works on the raw directory name, before substitutions.
pub fn parse_year(dir_base_name: &str) -> Option<i32> {
    ALBUM_YEAR
        .captures(dir_base_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Date written into an uploaded image.
///
/// The file's own modification time is kept when no album year is known or
/// when it already falls in that year; otherwise 10 January of the album year
/// at 10:10:10 UTC.
pub fn capture_date(album_year: Option<i32>, modified: DateTime<Utc>) -> DateTime<Utc> {
    match album_year {
        Some(year) if year != modified.year() => {
            Utc.with_ymd_and_hms(year, 1, 10, 10, 10, 10).single().unwrap_or(modified)
        }
        _ => modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_substitutions;

    #[test]
    fn title_case_keeps_inner_punctuation() {
        assert_eq!(title_case("foo_bar_baz"), "Foo_bar_baz");
        assert_eq!(title_case("foo bar baz - 2011"), "Foo Bar Baz - 2011");
        assert_eq!(title_case("  öne  möre"), "  Öne  Möre");
    }

    #[test]
    fn name_is_trimmed_after_substitution() {
        let t = parse_substitutions("_, ").unwrap();
        assert_eq!(resolve_collection_name("_Trip_", &t, false), "Trip");
    }

    #[test]
    fn capture_date_rules() {
        let mtime = Utc.with_ymd_and_hms(2015, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(capture_date(None, mtime), mtime);
        assert_eq!(capture_date(Some(2015), mtime), mtime);
        assert_eq!(
            capture_date(Some(2008), mtime),
            Utc.with_ymd_and_hms(2008, 1, 10, 10, 10, 10).unwrap()
        );
    }

    #[test]
    fn year_needs_separator_and_four_digits() {
        assert_eq!(parse_year("This Does Match-2004"), Some(2004));
        assert_eq!(parse_year("öne_möre_match_2020"), Some(2020));
        assert_eq!(parse_year("Not a valid year either - 0211"), None);
        assert_eq!(parse_year("2010"), None);
    }
}
