//! Loading the static ridership and metadata datasets.
//!
//! Files ending in `.json` are read as a JSON array; anything else is read as
//! CSV with a header row. Unknown columns are ignored.
//!
//! Entity ids are identifiers, not numbers: CSV cells are taken as written
//! (`040` stays `040`), and a JSON number id is rendered with its integer
//! digits.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::boarding::{EntityMetadata, RawBoardingRecord};
use crate::period::{YearMonth, latest_month};

/// Earliest month the upstream ridership datasets cover.
pub const EARLIEST_MONTH: YearMonth = YearMonth::from_parts(2001, 1);

pub fn load_ridership(path: impl AsRef<Path>) -> Result<Vec<RawBoardingRecord>> {
    let path = path.as_ref();
    let records = load_rows(path).with_context(|| format!("loading ridership from {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Ridership loaded");
    Ok(records)
}

pub fn load_metadata(path: impl AsRef<Path>) -> Result<Vec<EntityMetadata>> {
    let path = path.as_ref();
    let records = load_rows(path).with_context(|| format!("loading metadata from {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Entity metadata loaded");
    Ok(records)
}

fn load_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;

    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        return load_json_rows(file);
    }

    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut rows = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        // +2: one for the header, one for 1-based numbering
        let row: T = result.with_context(|| format!("malformed row at line {}", line + 2))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Columns that may carry an entity id, under any accepted header name.
const ID_COLUMNS: [&str; 3] = ["entity_id", "route", "station_id"];

fn load_json_rows<T: DeserializeOwned>(file: File) -> Result<Vec<T>> {
    let objects: Vec<Map<String, Value>> = serde_json::from_reader(BufReader::new(file))?;

    objects
        .into_iter()
        .enumerate()
        .map(|(i, mut object)| {
            for column in ID_COLUMNS {
                if let Some(Value::Number(n)) = object.get(column) {
                    let id = n.to_string();
                    object.insert(column.to_string(), Value::String(id));
                }
            }
            serde_json::from_value(Value::Object(object))
                .with_context(|| format!("malformed element at index {i}"))
        })
        .collect()
}

/// The range of months a caller should offer for selection.
///
/// The engine itself accepts any month; months outside the bounds simply
/// have no ridership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthBounds {
    pub earliest: YearMonth,
    pub latest: YearMonth,
}

impl MonthBounds {
    /// Bounds from a fixed earliest month up to the newest month in `records`.
    ///
    /// Returns `None` when no record carries a parseable date.
    pub fn from_records(earliest: YearMonth, records: &[RawBoardingRecord]) -> Option<Self> {
        let latest = latest_month(records.iter().map(|r| r.date.as_str()))?;
        Some(Self { earliest, latest })
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.earliest <= month && month <= self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_load_bus_ridership_csv() {
        let path = temp_path("ridership_changes_test_bus.csv");
        fs::write(
            &path,
            "route,date,daytype,rides\n1,2023-01-01,U,120\n1,2023-01-02,W,300\nX9,2023-01-02,W,45\n",
        )
        .unwrap();

        let records = load_ridership(&path).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[2].entity_id, "X9");
        assert_eq!(records[1].rides, 300);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_train_ridership_csv() {
        let path = temp_path("ridership_changes_test_train.csv");
        fs::write(
            &path,
            "station_id,stationname,date,daytype,rides\n40380,Clark/Lake,01/03/2023,W,9120\n",
        )
        .unwrap();

        let records = load_ridership(&path).unwrap();

        assert_eq!(records[0].entity_id, "40380");
        assert_eq!(records[0].date, "01/03/2023");
        assert_eq!(records[0].rides, 9120);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_metadata_json() {
        let path = temp_path("ridership_changes_test_meta.json");
        fs::write(
            &path,
            r#"[{"route": "1", "routename": "Bronzeville/Union Station", "lat": 41.83, "lon": -87.62}]"#,
        )
        .unwrap();

        let records = load_metadata(&path).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Bronzeville/Union Station");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_csv_ids_are_kept_as_written() {
        let path = temp_path("ridership_changes_test_ids.csv");
        fs::write(
            &path,
            "station_id,date,rides
040,2023-01-01,5
1.50,2023-01-01,6
99999999999999999999999,2023-01-01,7
",
        )
        .unwrap();

        let records = load_ridership(&path).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.entity_id.as_str()).collect();

        assert_eq!(ids, vec!["040", "1.50", "99999999999999999999999"]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_leading_zero_ids_match_metadata() {
        let ridership = temp_path("ridership_changes_test_zero_rides.csv");
        let stations = temp_path("ridership_changes_test_zero_meta.csv");
        fs::write(&ridership, "station_id,date,rides
040,2023-01-01,5
40,2023-01-01,9
").unwrap();
        fs::write(&stations, "station_id,stationname,lat,lon
040,Zero Forty,41.0,-87.0
").unwrap();

        let records = load_ridership(&ridership).unwrap();
        let metadata = load_metadata(&stations).unwrap();

        assert_eq!(records[0].entity_id, "040");
        assert_eq!(records[1].entity_id, "40");
        assert_eq!(metadata[0].entity_id, "040");

        fs::remove_file(&ridership).unwrap();
        fs::remove_file(&stations).unwrap();
    }

    #[test]
    fn test_json_ids_accept_numbers_and_text() {
        let path = temp_path("ridership_changes_test_ids.json");
        fs::write(
            &path,
            r#"[
                {"route": 7, "date": "2023-01-01", "rides": 120},
                {"route": "007", "date": "2023-01-02", "rides": "45"}
            ]"#,
        )
        .unwrap();

        let records = load_ridership(&path).unwrap();

        assert_eq!(records[0].entity_id, "7");
        assert_eq!(records[0].rides, 120);
        assert_eq!(records[1].entity_id, "007");
        assert_eq!(records[1].rides, 45);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let path = temp_path("ridership_changes_test_bad.csv");
        fs::write(&path, "route,date,rides\n1,2023-01-01,10\n1,2023-01-02,lots\n").unwrap();

        let err = load_ridership(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_ridership(temp_path("ridership_changes_does_not_exist.csv")).is_err());
    }

    #[test]
    fn test_month_bounds() {
        let records = vec![
            RawBoardingRecord {
                entity_id: "1".to_string(),
                date: "2023-05-31".to_string(),
                rides: 1,
            },
            RawBoardingRecord {
                entity_id: "1".to_string(),
                date: "2024-02-01".to_string(),
                rides: 1,
            },
        ];

        let bounds = MonthBounds::from_records(EARLIEST_MONTH, &records).unwrap();

        assert_eq!(bounds.earliest.to_string(), "2001-01");
        assert_eq!(bounds.latest.to_string(), "2024-02");
        assert!(bounds.contains("2010-06".parse().unwrap()));
        assert!(!bounds.contains("2024-03".parse().unwrap()));
        assert!(!bounds.contains("2000-12".parse().unwrap()));
        assert!(MonthBounds::from_records(EARLIEST_MONTH, &[]).is_none());
    }
}
