//! Output formatting for comparison results.
//!
//! Supports a plain-text table, JSON, CSV and GeoJSON for map plotting.
//! Sorting and map filtering happen here, after the engine has run.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::{Value, json};
use std::cmp::Ordering;
use tracing::debug;

use crate::assign::TransitMode;
use crate::compare::{CombinedBoardings, ComparisonSummary, PercentChange};
use crate::period::YearMonth;

/// Row orderings offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    /// Route or station id, numeric ids in numeric order.
    #[default]
    Entity,
    Name,
    /// Largest change first, new entities on top, no-data rows last.
    Change,
    /// Busiest in the second month first.
    Ridership,
}

pub fn sort_rows(rows: &mut [CombinedBoardings], order: SortOrder) {
    match order {
        SortOrder::Entity => rows.sort_by(|a, b| entity_order(&a.entity_id, &b.entity_id)),
        SortOrder::Name => rows.sort_by(|a, b| {
            a.name
                .as_deref()
                .unwrap_or("")
                .cmp(b.name.as_deref().unwrap_or(""))
                .then_with(|| entity_order(&a.entity_id, &b.entity_id))
        }),
        SortOrder::Change => rows.sort_by(|a, b| {
            change_rank(b.percent_change)
                .total_cmp(&change_rank(a.percent_change))
                .then_with(|| entity_order(&a.entity_id, &b.entity_id))
        }),
        SortOrder::Ridership => rows.sort_by(|a, b| {
            b.total_month2
                .cmp(&a.total_month2)
                .then_with(|| entity_order(&a.entity_id, &b.entity_id))
        }),
    }
}

fn entity_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn change_rank(change: PercentChange) -> f64 {
    match change {
        PercentChange::New => f64::INFINITY,
        PercentChange::Change(pct) => pct.abs(),
        PercentChange::NoData => f64::NEG_INFINITY,
    }
}

/// Rows that can be drawn on a map: they have a change to show and known
/// coordinates.
pub fn mappable(rows: &[CombinedBoardings]) -> impl Iterator<Item = &CombinedBoardings> {
    rows.iter()
        .filter(|r| r.percent_change.has_data() && r.coordinates().is_some())
}

/// Builds a GeoJSON `FeatureCollection` of [`mappable`] rows.
pub fn to_geojson(rows: &[CombinedBoardings]) -> Value {
    let features: Vec<Value> = mappable(rows)
        .filter_map(|row| {
            let (lat, lon) = row.coordinates()?;
            Some(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [lon, lat] },
                "properties": {
                    "entity_id": row.entity_id,
                    "name": row.name,
                    "total_month1": row.total_month1,
                    "total_month2": row.total_month2,
                    "percent_change": row.percent_change.to_string(),
                    "percent_change_value": row.percent_change.value(),
                },
            }))
        })
        .collect();

    debug!(features = features.len(), rows = rows.len(), "GeoJSON built");

    json!({ "type": "FeatureCollection", "features": features })
}

#[derive(Serialize)]
struct Report<'a> {
    mode: TransitMode,
    month1: YearMonth,
    month2: YearMonth,
    summary: &'a ComparisonSummary,
    rows: &'a [CombinedBoardings],
}

/// Serializes a comparison and its summary as pretty-printed JSON.
pub fn to_json(
    mode: TransitMode,
    month1: YearMonth,
    month2: YearMonth,
    rows: &[CombinedBoardings],
) -> Result<String> {
    let summary = ComparisonSummary::from_rows(rows);
    let report = Report {
        mode,
        month1,
        month2,
        summary: &summary,
        rows,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// CSV columns, in [`CombinedBoardings`] field order.
const CSV_HEADER: [&str; 8] = [
    "entity_id",
    "name",
    "entity_name",
    "latitude",
    "longitude",
    "total_month1",
    "total_month2",
    "percent_change",
];

/// Writes the rows as CSV with a header line, even when there are no rows.
pub fn write_csv<W: std::io::Write>(writer: W, rows: &[CombinedBoardings]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Renders the rows as an aligned text table with month headings.
///
/// The id and the published entity name get their own columns, so bus rows
/// show `1  Bronzeville/Union Station` rather than repeating the route.
pub fn render_table(
    mode: TransitMode,
    month1: YearMonth,
    month2: YearMonth,
    rows: &[CombinedBoardings],
) -> String {
    let (id_heading, name_heading) = mode.column_headings();
    let header = [
        id_heading.to_string(),
        name_heading.to_string(),
        month1.label(),
        month2.label(),
        "Change".to_string(),
    ];

    let body: Vec<[String; 5]> = rows
        .iter()
        .map(|r| {
            [
                r.entity_id.clone(),
                r.entity_name.clone().unwrap_or_default(),
                r.total_month1.to_string(),
                r.total_month2.to_string(),
                r.percent_change.to_string(),
            ]
        })
        .collect();

    let mut widths = header.each_ref().map(|h| h.chars().count());
    for line in &body {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(rule.join("  ").trim_end());
    out.push('\n');
    for line in &body {
        push_line(&mut out, line, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let width = *width;
        if i > 0 {
            line.push_str("  ");
        }
        // text columns left-aligned, numbers and change right-aligned
        if i < 2 {
            line.push_str(&format!("{cell:<width$}"));
        } else {
            line.push_str(&format!("{cell:>width$}"));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
