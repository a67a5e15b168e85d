//! Calendar-month buckets and per-month ridership sums.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::boarding::Boarding;

static MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub(crate) const fn from_parts(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("month {month} is out of range 1-12");
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Extracts the month from a record date.
    ///
    /// Accepts `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.fff]` and
    /// `MM/DD/YYYY`. The day of month is discarded.
    pub fn from_date_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(year_month) = s.parse::<YearMonth>() {
            return Ok(year_month);
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
            .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
            .map(Self::from)
            .with_context(|| format!("unrecognised date '{s}'"))
    }

    /// Short label for table headings, e.g. `Jan 2023`.
    pub fn label(&self) -> String {
        format!(
            "{} {}",
            MONTH_ABBREVIATIONS[(self.month - 1) as usize],
            self.year
        )
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    /// Parses strictly `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("expected YYYY-MM, got '{s}'"))?;

        if year.len() != 4 || month.len() != 2 {
            bail!("expected YYYY-MM, got '{s}'");
        }

        let year: i32 = year
            .parse()
            .with_context(|| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("invalid month in '{s}'"))?;

        Self::new(year, month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Summed ridership for one entity within one month, with the descriptive
/// fields its boardings carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTotal {
    pub name: Option<String>,
    pub entity_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rides: u64,
}

/// Sums rides per entity over the boardings that fall in `year_month`.
///
/// Entities without a matching record are absent from the result. Records
/// whose date cannot be parsed are skipped and logged; they never abort the
/// aggregation.
#[tracing::instrument(skip(boardings), fields(records = boardings.len(), year_month = %year_month))]
pub fn sum_for_month(boardings: &[Boarding], year_month: YearMonth) -> BTreeMap<String, EntityTotal> {
    let mut totals: BTreeMap<String, EntityTotal> = BTreeMap::new();
    let mut skipped = 0usize;

    for boarding in boardings {
        let month = match YearMonth::from_date_str(&boarding.date) {
            Ok(month) => month,
            Err(e) => {
                skipped += 1;
                debug!(entity_id = %boarding.entity_id, error = %e, "Skipping record");
                continue;
            }
        };

        if month != year_month {
            continue;
        }

        let total = totals.entry(boarding.entity_id.clone()).or_default();
        total.rides = total.rides.saturating_add(boarding.rides);

        if total.name.is_none() {
            total.name = boarding.name.clone();
            total.entity_name = boarding.entity_name.clone();
        }
        if total.latitude.is_none() || total.longitude.is_none() {
            total.latitude = boarding.latitude;
            total.longitude = boarding.longitude;
        }
    }

    if skipped > 0 {
        warn!(skipped, "Records with unparseable dates were left out of the month total");
    }

    totals
}

/// Returns the most recent month among the given record dates, ignoring
/// dates that cannot be parsed.
pub fn latest_month<'a>(dates: impl IntoIterator<Item = &'a str>) -> Option<YearMonth> {
    dates
        .into_iter()
        .filter_map(|d| YearMonth::from_date_str(d).ok())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boarding(id: &str, date: &str, rides: u64) -> Boarding {
        Boarding {
            entity_id: id.to_string(),
            name: None,
            entity_name: None,
            latitude: None,
            longitude: None,
            date: date.to_string(),
            rides,
        }
    }

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_year_month() {
        let parsed = ym("2023-02");
        assert_eq!(parsed.year(), 2023);
        assert_eq!(parsed.month(), 2);
        assert_eq!(parsed.to_string(), "2023-02");
    }

    #[test]
    fn test_parse_year_month_rejects_bad_input() {
        assert!("2023-13".parse::<YearMonth>().is_err());
        assert!("2023-00".parse::<YearMonth>().is_err());
        assert!("2023".parse::<YearMonth>().is_err());
        assert!("23-01".parse::<YearMonth>().is_err());
        assert!("2023-01-15".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_from_date_str_forms() {
        let jan = ym("2023-01");
        assert_eq!(YearMonth::from_date_str("2023-01").unwrap(), jan);
        assert_eq!(YearMonth::from_date_str("2023-01-31").unwrap(), jan);
        assert_eq!(YearMonth::from_date_str("2023-01-15T00:00:00.000").unwrap(), jan);
        assert_eq!(YearMonth::from_date_str("2023-01-15T00:00:00").unwrap(), jan);
        assert_eq!(YearMonth::from_date_str("01/15/2023").unwrap(), jan);
        assert!(YearMonth::from_date_str("last tuesday").is_err());
    }

    #[test]
    fn test_ordering_and_label() {
        assert!(ym("2022-12") < ym("2023-01"));
        assert_eq!(ym("2023-01").label(), "Jan 2023");
        assert_eq!(ym("2001-12").label(), "Dec 2001");
    }

    #[test]
    fn test_sum_for_month_adds_daily_records() {
        let boardings = vec![
            boarding("1", "2023-01-01", 100),
            boarding("1", "2023-01-02", 50),
            boarding("1", "2023-02-01", 999),
            boarding("2", "2023-01-09", 7),
        ];

        let totals = sum_for_month(&boardings, ym("2023-01"));

        assert_eq!(totals.len(), 2);
        assert_eq!(totals["1"].rides, 150);
        assert_eq!(totals["2"].rides, 7);
    }

    #[test]
    fn test_sum_for_month_saturates_on_overflow() {
        let boardings = vec![
            boarding("1", "2023-01-01", u64::MAX),
            boarding("1", "2023-01-02", 1),
        ];

        let totals = sum_for_month(&boardings, ym("2023-01"));

        assert_eq!(totals["1"].rides, u64::MAX);
    }

    #[test]
    fn test_sum_for_month_is_order_independent() {
        let mut boardings = vec![
            boarding("1", "2023-01-01", 3),
            boarding("1", "2023-01-02", 11),
            boarding("1", "2023-01-03", 29),
        ];
        let forward = sum_for_month(&boardings, ym("2023-01"));
        boardings.reverse();
        let backward = sum_for_month(&boardings, ym("2023-01"));

        assert_eq!(forward, backward);
        assert_eq!(forward["1"].rides, 43);
    }

    #[test]
    fn test_sum_for_month_omits_inactive_entities() {
        let boardings = vec![boarding("1", "2023-03-01", 5)];
        let totals = sum_for_month(&boardings, ym("2023-01"));
        assert!(totals.is_empty());
    }

    #[test]
    fn test_sum_for_month_skips_bad_dates_and_continues() {
        let boardings = vec![
            boarding("1", "not-a-date", 1000),
            boarding("1", "2023-01-05", 20),
            boarding("2", "", 5),
        ];

        let totals = sum_for_month(&boardings, ym("2023-01"));

        assert_eq!(totals.len(), 1);
        assert_eq!(totals["1"].rides, 20);
    }

    #[test]
    fn test_sum_for_month_keeps_metadata() {
        let mut first = boarding("1", "2023-01-01", 1);
        first.name = Some("Route 1".to_string());
        first.latitude = Some(41.8);
        first.longitude = Some(-87.6);

        let totals = sum_for_month(&[first, boarding("1", "2023-01-02", 2)], ym("2023-01"));

        assert_eq!(totals["1"].name.as_deref(), Some("Route 1"));
        assert_eq!(totals["1"].latitude, Some(41.8));
        assert_eq!(totals["1"].rides, 3);
    }

    #[test]
    fn test_latest_month() {
        let dates = ["2023-01-01", "2024-03-15", "garbage", "2023-12"];
        assert_eq!(latest_month(dates), Some(ym("2024-03")));
        assert_eq!(latest_month(Vec::<&str>::new()), None);
    }
}
