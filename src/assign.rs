//! Joining raw ridership records with entity metadata.
//!
//! [`assign`] is the mode-agnostic join. [`EntityAssigner`] is the capability
//! the comparison pipeline depends on; [`BusRoutes`] and [`TrainStations`]
//! implement it with their own naming conventions. Callers pick one through
//! [`TransitMode::assigner`] before running a comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::boarding::{Boarding, EntityMetadata, RawBoardingRecord};
use crate::metadata::MetadataIndex;

/// Enriches every raw record with the metadata found in `index`.
///
/// Records whose entity is missing from the index are kept with empty
/// metadata so their rides still count.
pub fn assign(raw: &[RawBoardingRecord], index: &MetadataIndex) -> Vec<Boarding> {
    assign_named(raw, index, |meta| meta.name.clone())
}

fn assign_named(
    raw: &[RawBoardingRecord],
    index: &MetadataIndex,
    display_name: impl Fn(&EntityMetadata) -> String,
) -> Vec<Boarding> {
    let mut unmatched = 0usize;

    let boardings = raw
        .iter()
        .map(|record| {
            let boarding = Boarding::unassigned(record);
            match index.get(&record.entity_id) {
                Some(meta) => boarding.with_metadata(meta, display_name(meta)),
                None => {
                    unmatched += 1;
                    boarding
                }
            }
        })
        .collect();

    if unmatched > 0 {
        debug!(unmatched, total = raw.len(), "Records without entity metadata");
    }

    boardings
}

/// Produces enriched [`Boarding`]s from raw ridership and entity metadata.
pub trait EntityAssigner: Send + Sync {
    fn mode(&self) -> TransitMode;

    fn assign(&self, raw: &[RawBoardingRecord]) -> Vec<Boarding>;
}

/// Bus routes: named `"<route number> <route name>"`.
pub struct BusRoutes {
    index: MetadataIndex,
}

impl BusRoutes {
    pub fn new(index: MetadataIndex) -> Self {
        Self { index }
    }
}

impl EntityAssigner for BusRoutes {
    fn mode(&self) -> TransitMode {
        TransitMode::Bus
    }

    fn assign(&self, raw: &[RawBoardingRecord]) -> Vec<Boarding> {
        assign_named(raw, &self.index, |meta| {
            if meta.name.is_empty() {
                meta.entity_id.clone()
            } else {
                format!("{} {}", meta.entity_id, meta.name)
            }
        })
    }
}

/// Train stations: named by station name alone.
pub struct TrainStations {
    index: MetadataIndex,
}

impl TrainStations {
    pub fn new(index: MetadataIndex) -> Self {
        Self { index }
    }
}

impl EntityAssigner for TrainStations {
    fn mode(&self) -> TransitMode {
        TransitMode::Train
    }

    fn assign(&self, raw: &[RawBoardingRecord]) -> Vec<Boarding> {
        assign(raw, &self.index)
    }
}

/// Which ridership dataset a comparison runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransitMode {
    Bus,
    Train,
}

impl TransitMode {
    /// Wraps `index` in the assigner for this mode.
    pub fn assigner(self, index: MetadataIndex) -> Box<dyn EntityAssigner> {
        match self {
            TransitMode::Bus => Box::new(BusRoutes::new(index)),
            TransitMode::Train => Box::new(TrainStations::new(index)),
        }
    }

    /// Table headings for the id and name columns.
    pub fn column_headings(self) -> (&'static str, &'static str) {
        match self {
            TransitMode::Bus => ("Route", "Route Name"),
            TransitMode::Train => ("Station", "Station Name"),
        }
    }
}

impl fmt::Display for TransitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitMode::Bus => write!(f, "bus"),
            TransitMode::Train => write!(f, "train"),
        }
    }
}
