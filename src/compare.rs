//! Month-over-month ridership comparison.
//!
//! [`compare`] aggregates the same boardings for two months, merges the
//! per-entity sums and tags each entity with a [`PercentChange`].
//! [`ComparisonSummary`] rolls a comparison up to system-wide figures.

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::boarding::Boarding;
use crate::period::{EntityTotal, YearMonth, sum_for_month};

/// Outcome of comparing two monthly totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PercentChange {
    /// No rides in either month.
    NoData,
    /// Rides in the second month only; the ratio is undefined.
    New,
    /// `((t2 - t1) / t1) * 100`, unrounded.
    Change(f64),
}

impl PercentChange {
    pub fn between(total_month1: u64, total_month2: u64) -> Self {
        match (total_month1, total_month2) {
            (0, 0) => PercentChange::NoData,
            (0, _) => PercentChange::New,
            (t1, t2) => {
                let t1 = t1 as f64;
                PercentChange::Change((t2 as f64 - t1) / t1 * 100.0)
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PercentChange::Change(pct) => Some(*pct),
            _ => None,
        }
    }

    pub fn has_data(&self) -> bool {
        !matches!(self, PercentChange::NoData)
    }
}

/// Displays as `""`, `"New"`, or the change rounded to one decimal with a
/// `%` suffix (`"50%"`, `"-33.3%"`).
impl fmt::Display for PercentChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentChange::NoData => Ok(()),
            PercentChange::New => write!(f, "New"),
            PercentChange::Change(pct) => {
                // + 0.0 turns a rounded -0.0 into 0.0
                let rounded = (pct * 10.0).round() / 10.0 + 0.0;
                if rounded.fract() == 0.0 {
                    write!(f, "{rounded:.0}%")
                } else {
                    write!(f, "{rounded:.1}%")
                }
            }
        }
    }
}

impl Serialize for PercentChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One entity's totals for both months and the change between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedBoardings {
    pub entity_id: String,
    pub name: Option<String>,
    pub entity_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_month1: u64,
    pub total_month2: u64,
    pub percent_change: PercentChange,
}

impl CombinedBoardings {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Compares ridership between `month1` ("from") and `month2` ("to").
///
/// Returns one row per entity active in either month, in ascending entity id
/// order. Months may be given in either order. Rows with no rides in either
/// month are included with [`PercentChange::NoData`].
#[tracing::instrument(skip(boardings), fields(records = boardings.len(), month1 = %month1, month2 = %month2))]
pub fn compare(boardings: &[Boarding], month1: YearMonth, month2: YearMonth) -> Vec<CombinedBoardings> {
    let first = sum_for_month(boardings, month1);
    let second = sum_for_month(boardings, month2);

    let entity_ids: BTreeSet<&String> = first.keys().chain(second.keys()).collect();

    let rows: Vec<CombinedBoardings> = entity_ids
        .into_iter()
        .map(|entity_id| {
            let from = first.get(entity_id);
            let to = second.get(entity_id);

            if let (Some(EntityTotal { name: Some(a), .. }), Some(EntityTotal { name: Some(b), .. })) = (from, to) {
                if a != b {
                    debug!(entity_id = %entity_id, month1_name = %a, month2_name = %b, "Entity name differs between months");
                }
            }

            let total_month1 = from.map_or(0, |t| t.rides);
            let total_month2 = to.map_or(0, |t| t.rides);

            let name = to.and_then(|t| t.name.clone()).or_else(|| from.and_then(|t| t.name.clone()));
            let entity_name = to
                .and_then(|t| t.entity_name.clone())
                .or_else(|| from.and_then(|t| t.entity_name.clone()));
            let (latitude, longitude) = to
                .and_then(located)
                .or_else(|| from.and_then(located))
                .map_or((None, None), |(lat, lon)| (Some(lat), Some(lon)));

            CombinedBoardings {
                entity_id: entity_id.clone(),
                name,
                entity_name,
                latitude,
                longitude,
                total_month1,
                total_month2,
                percent_change: PercentChange::between(total_month1, total_month2),
            }
        })
        .collect();

    debug!(entities = rows.len(), "Comparison complete");
    rows
}

fn located(total: &EntityTotal) -> Option<(f64, f64)> {
    total.latitude.zip(total.longitude)
}

/// System-wide roll-up of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub entities: usize,
    pub total_month1: u64,
    pub total_month2: u64,
    pub percent_change: PercentChange,
    pub grew: usize,
    pub declined: usize,
    pub unchanged: usize,
    pub new: usize,
    pub no_data: usize,
}

impl ComparisonSummary {
    pub fn from_rows(rows: &[CombinedBoardings]) -> Self {
        let mut s = ComparisonSummary {
            entities: rows.len(),
            total_month1: 0,
            total_month2: 0,
            percent_change: PercentChange::NoData,
            grew: 0,
            declined: 0,
            unchanged: 0,
            new: 0,
            no_data: 0,
        };

        for row in rows {
            s.total_month1 = s.total_month1.saturating_add(row.total_month1);
            s.total_month2 = s.total_month2.saturating_add(row.total_month2);

            match (row.total_month1, row.total_month2) {
                (0, 0) => s.no_data += 1,
                (0, _) => s.new += 1,
                (t1, t2) if t2 > t1 => s.grew += 1,
                (t1, t2) if t2 < t1 => s.declined += 1,
                _ => s.unchanged += 1,
            }
        }

        s.percent_change = PercentChange::between(s.total_month1, s.total_month2);
        s
    }
}
