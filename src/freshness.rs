//! The "data last fetched" timestamp published next to the datasets.
//!
//! Two sources are understood: a GitHub gist whose `lastFetched.json` file
//! holds a bare timestamp, and a `last_modified.txt` file whose second line
//! ends with the newest month (`YYYY-MM`) and whose third line ends with an
//! RFC 2822 timestamp. Nothing in the comparison engine depends on this.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use chrono_tz::America::Chicago;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fetch::{HttpClient, fetch_text};
use crate::period::YearMonth;

const GIST_FILE: &str = "lastFetched.json";

/// When the upstream datasets were last refreshed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Freshness {
    pub last_fetched: DateTime<Utc>,
    pub last_month: Option<YearMonth>,
}

impl Freshness {
    /// Formats the timestamp in Chicago local time, e.g.
    /// `Oct 05, 2023, 07:34:56 AM`.
    pub fn chicago_display(&self) -> String {
        self.last_fetched
            .with_timezone(&Chicago)
            .format("%b %d, %Y, %I:%M:%S %p")
            .to_string()
    }
}

#[derive(Deserialize)]
struct Gist {
    files: HashMap<String, GistFile>,
}

#[derive(Deserialize)]
struct GistFile {
    content: String,
}

pub async fn fetch_freshness<C: HttpClient>(client: &C, url: &str) -> Result<Freshness> {
    let body = fetch_text(client, url).await?;
    parse_freshness(&body)
}

/// Parses either source format, telling them apart by the leading brace of
/// the gist's JSON.
pub fn parse_freshness(body: &str) -> Result<Freshness> {
    if body.trim_start().starts_with('{') {
        parse_gist(body)
    } else {
        parse_last_modified(body)
    }
}

pub fn parse_gist(body: &str) -> Result<Freshness> {
    let gist: Gist = serde_json::from_str(body).context("invalid gist response")?;
    let file = gist
        .files
        .get(GIST_FILE)
        .ok_or_else(|| anyhow!("gist has no {GIST_FILE}"))?;

    Ok(Freshness {
        last_fetched: parse_timestamp(&file.content)?,
        last_month: None,
    })
}

pub fn parse_last_modified(text: &str) -> Result<Freshness> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    if lines.len() < 3 {
        bail!("expected at least 3 lines, got {}", lines.len());
    }

    let last_month = tail(lines[1], 7)
        .parse()
        .with_context(|| format!("no month at end of '{}'", lines[1]))?;
    let last_fetched = parse_timestamp(tail(lines[2], 29))?;

    Ok(Freshness {
        last_fetched,
        last_month: Some(last_month),
    })
}

/// Accepts RFC 3339 and RFC 2822 timestamps, optionally JSON-quoted.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim().trim_matches('"');
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("unrecognised timestamp '{s}'"))
}

fn tail(s: &str, chars: usize) -> &str {
    match s.char_indices().rev().nth(chars - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 10, 5, 12, 34, 56).unwrap();

        assert_eq!(parse_timestamp("2023-10-05T12:34:56Z").unwrap(), expected);
        assert_eq!(parse_timestamp("\"2023-10-05T12:34:56.000Z\"").unwrap(), expected);
        assert_eq!(parse_timestamp("Thu, 05 Oct 2023 12:34:56 GMT").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_gist() {
        let body = r#"{"id": "abc", "files": {"lastFetched.json": {"filename": "lastFetched.json", "content": "2023-10-05T12:34:56Z"}}}"#;
        let freshness = parse_freshness(body).unwrap();

        assert_eq!(freshness.last_fetched, Utc.with_ymd_and_hms(2023, 10, 5, 12, 34, 56).unwrap());
        assert_eq!(freshness.last_month, None);
    }

    #[test]
    fn test_parse_gist_without_file() {
        let body = r#"{"files": {}}"#;
        assert!(parse_gist(body).is_err());
    }

    #[test]
    fn test_parse_last_modified() {
        let text = "Bus ridership\r\nLast month: 2023-08\r\nLast fetched: Thu, 05 Oct 2023 12:34:56 GMT\r\n";
        let freshness = parse_freshness(text).unwrap();

        assert_eq!(freshness.last_month, Some("2023-08".parse().unwrap()));
        assert_eq!(freshness.last_fetched, Utc.with_ymd_and_hms(2023, 10, 5, 12, 34, 56).unwrap());
    }

    #[test]
    fn test_parse_last_modified_too_short() {
        assert!(parse_last_modified("only one line").is_err());
    }

    #[test]
    fn test_chicago_display_follows_daylight_saving() {
        let summer = Freshness {
            last_fetched: Utc.with_ymd_and_hms(2023, 10, 5, 12, 34, 56).unwrap(),
            last_month: None,
        };
        let winter = Freshness {
            last_fetched: Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap(),
            last_month: None,
        };

        assert_eq!(summer.chicago_display(), "Oct 05, 2023, 07:34:56 AM");
        assert_eq!(winter.chicago_display(), "Jan 15, 2024, 12:00:00 PM");
    }

    #[test]
    fn test_tail_shorter_than_requested() {
        assert_eq!(tail("abc", 7), "abc");
        assert_eq!(tail("2023-08", 7), "2023-08");
    }
}
