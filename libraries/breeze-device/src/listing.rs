//! Parsing of the device's HTML directory listing pages.
//!
//! The card serves one HTML page per directory. Each entry is a single line
//! holding a timestamp column, an optional size column and an anchor whose
//! `href` is either `dir?dir=...` (subdirectory) or `download?file=...`
//! (file). The exact markup varies between firmware revisions, so parsing is
//! line-oriented and tolerant: a row that cannot be fully understood still
//! yields an entry with whatever columns did parse.

use breeze_core::DateBucket;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// One row of a directory listing page.
#[derive(Debug, Clone)]
pub struct ListingRow {
    /// Entry name with surrounding whitespace stripped.
    pub name: String,
    /// True for `dir?` anchors, false for `download?` anchors.
    pub is_directory: bool,
    /// The anchor's href, relative to the page it appeared on.
    pub href: String,
    /// Size column, 0 when absent (directories never carry one).
    pub size: u64,
    /// Timestamp column, when present and valid.
    pub modified: Option<NaiveDateTime>,
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a\s+href="(?P<href>[^"]+)"[^>]*>(?P<label>[^<]*)</a>"#)
            .expect("listing anchor pattern")
    })
}

fn stamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // The firmware pads single-digit fields with spaces: "2024- 1- 1  12: 0: 3"
        Regex::new(r"(\d{4})-\s*(\d{1,2})-\s*(\d{1,2})\s+(\d{1,2}):\s*(\d{1,2}):\s*(\d{1,2})")
            .expect("listing timestamp pattern")
    })
}

/// Parse a listing page into rows.
///
/// Returns `None` when the page contains no listing anchors at all, which is
/// how a non-listing response (captive portal page, firmware error page) shows
/// up. An empty directory still carries its parent-directory anchor, so a
/// well-formed page is never anchor-free.
pub fn parse_listing(html: &str) -> Option<Vec<ListingRow>> {
    let mut rows = Vec::new();
    let mut saw_anchor = false;

    for line in html.lines() {
        let Some(caps) = anchor_re().captures(line) else {
            continue;
        };
        saw_anchor = true;

        let href = caps["href"].to_string();
        let name = caps["label"].trim().to_string();

        let is_directory = if href.starts_with("dir?") {
            true
        } else if href.starts_with("download?") {
            false
        } else {
            // Photo-frame navigation links and similar noise.
            continue;
        };

        // Parent/self navigation rows.
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }

        let anchor_start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let prefix = &line[..anchor_start];

        let modified = stamp_re().captures(prefix).and_then(parse_stamp);
        let size = if is_directory {
            0
        } else {
            prefix
                .split_whitespace()
                .last()
                .and_then(|tok| tok.parse::<u64>().ok())
                .unwrap_or(0)
        };

        rows.push(ListingRow {
            name,
            is_directory,
            href,
            size,
            modified,
        });
    }

    saw_anchor.then_some(rows)
}

fn parse_stamp(caps: regex::Captures<'_>) -> Option<NaiveDateTime> {
    let field = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
    date.and_hms_opt(field(4)?, field(5)?, field(6)?)
}

/// Classify a folder name (or file stem) as a day bucket.
///
/// Eight ASCII digits are a day marker: `Day` when they parse as `%Y%m%d`,
/// `Unknown` otherwise. Any other name is not a bucket; a directory then
/// inherits its parent's bucket and a file keeps its folder's. Some device
/// generations bucket by folder (`DATALOG/20240101/x.edf`), older ones encode
/// the day in the file name (`20240101.edf`), so both are checked.
pub fn parse_day_bucket(name: &str) -> Option<DateBucket> {
    if name.len() != 8 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match NaiveDate::parse_from_str(name, "%Y%m%d") {
        Ok(date) => Some(DateBucket::Day(date)),
        Err(_) => Some(DateBucket::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        "<html><body><pre>\n",
        "2024- 1- 1   12: 0: 0       <a href=\"dir?dir=A:%5C..\"> ..</a>\n",
        "2024- 1- 1   12: 0: 0       <a href=\"dir?dir=A:%5CDATALOG\"> DATALOG</a>\n",
        "2024- 1- 2    8:30:15          512  <a href=\"download?file=STR.edf\"> STR.edf</a>\n",
        "2024- 1- 2    8:30:15         1024  <a href=\"download?file=ezshare.cfg\"> ezshare.cfg</a>\n",
        "</pre></body></html>\n",
    );

    #[test]
    fn test_parse_listing_rows() {
        let rows = parse_listing(PAGE).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].name, "DATALOG");
        assert!(rows[0].is_directory);
        assert_eq!(rows[0].size, 0);

        assert_eq!(rows[1].name, "STR.edf");
        assert!(!rows[1].is_directory);
        assert_eq!(rows[1].size, 512);
        assert_eq!(rows[1].href, "download?file=STR.edf");

        assert_eq!(rows[2].name, "ezshare.cfg");
        assert_eq!(rows[2].size, 1024);
    }

    #[test]
    fn test_parse_listing_timestamps() {
        let rows = parse_listing(PAGE).unwrap();
        let modified = rows[1].modified.unwrap();
        assert_eq!(
            modified,
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(8, 30, 15)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_listing_skips_parent_rows() {
        let rows = parse_listing(PAGE).unwrap();
        assert!(rows.iter().all(|r| r.name != ".."));
    }

    #[test]
    fn test_parse_listing_missing_columns() {
        let page = "<pre><a href=\"download?file=x.edf\">x.edf</a></pre>";
        let rows = parse_listing(page).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].size, 0);
        assert!(rows[0].modified.is_none());
    }

    #[test]
    fn test_parse_listing_rejects_non_listing() {
        assert!(parse_listing("<html><body>Firmware error</body></html>").is_none());
        assert!(parse_listing("").is_none());
    }

    #[test]
    fn test_parse_day_bucket_values() {
        assert_eq!(
            parse_day_bucket("20240101"),
            Some(DateBucket::Day(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            ))
        );
        // Looks like a bucket but is not a calendar date
        assert_eq!(parse_day_bucket("20241345"), Some(DateBucket::Unknown));
        // Not buckets at all
        assert_eq!(parse_day_bucket("DATALOG"), None);
        assert_eq!(parse_day_bucket("2024010"), None);
        assert_eq!(parse_day_bucket("202401011"), None);
    }
}
