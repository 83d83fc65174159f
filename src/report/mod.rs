//! Per-map results and their serialized forms.
//!
//! This module provides:
//! - [`build_report`] to assemble symbols, pressures and links into systems
//! - The system table (CSV) and track table writers/readers
//! - JSON export
//! - The debug overlay

pub mod export;
pub mod overlay;
pub mod table;
pub mod timestamp;

pub use export::export_to_json;
pub use overlay::render_overlay;
pub use table::{
    parse_table, read_table, to_table_string, track_rows, write_table, write_track_table, TableRow,
};
pub use timestamp::MapTimestamp;

use serde::{Deserialize, Serialize};

use crate::connector::{Links, UnlinkReason};
use crate::records::{MarkerRecord, PressureValue, SymbolRecord, SystemRecord};

/// A marker no system claimed, with the reason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnlinkedMarker {
    pub marker: MarkerRecord,
    pub reason: UnlinkReason,
}

/// Everything found on one map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapReport {
    /// Map name (file stem)
    pub map: String,
    /// Source image size
    pub width: u32,
    pub height: u32,
    /// Systems ordered by symbol id
    pub systems: Vec<SystemRecord>,
    /// Unlinked markers ordered by marker id
    pub unlinked_markers: Vec<UnlinkedMarker>,
}

impl MapReport {
    pub fn timestamp(&self) -> Option<MapTimestamp> {
        MapTimestamp::parse(&self.map)
    }

    /// Total number of markers, linked or not.
    pub fn marker_count(&self) -> usize {
        self.systems.iter().map(|s| s.markers.len()).sum::<usize>() + self.unlinked_markers.len()
    }
}

/// Assembles the per-map report.
///
/// `pressures` is aligned with `symbols`; pass an empty slice when value
/// extraction did not run, which leaves every system without a pressure.
pub fn build_report(
    map: &str,
    (width, height): (u32, u32),
    symbols: &[SymbolRecord],
    pressures: &[PressureValue],
    markers: &[MarkerRecord],
    links: &Links,
) -> MapReport {
    let marker_by_id = |id: u32| markers.iter().find(|m| m.id == id).cloned();

    let mut systems: Vec<SystemRecord> = symbols
        .iter()
        .enumerate()
        .map(|(index, symbol)| {
            let mut linked: Vec<MarkerRecord> = links
                .markers_of(symbol.id)
                .into_iter()
                .filter_map(marker_by_id)
                .collect();
            linked.sort_by_key(|m| m.id);
            SystemRecord {
                symbol: symbol.clone(),
                pressure: pressures.get(index).cloned(),
                markers: linked,
            }
        })
        .collect();
    systems.sort_by_key(|s| s.symbol.id);

    let mut unlinked_markers: Vec<UnlinkedMarker> = links
        .unlinked
        .iter()
        .filter_map(|u| {
            marker_by_id(u.marker_id).map(|marker| UnlinkedMarker {
                marker,
                reason: u.reason,
            })
        })
        .collect();
    unlinked_markers.sort_by_key(|u| u.marker.id);

    MapReport {
        map: map.to_string(),
        width,
        height,
        systems,
        unlinked_markers,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::connector::{Link, Unlinked};
    use crate::records::{PixelPoint, Region, SymbolKind};

    pub fn symbol(id: u32, kind: SymbolKind, x: u32, y: u32) -> SymbolRecord {
        SymbolRecord {
            id,
            kind,
            anchor: PixelPoint::new(x, y),
            region: Region::new(x - 6, y - 8, 12, 16),
            confidence: 0.93,
        }
    }

    pub fn marker(id: u32, x: u32, y: u32) -> MarkerRecord {
        MarkerRecord {
            id,
            anchor: PixelPoint::new(x, y),
            region: Region::new(x - 4, y - 4, 9, 9),
            confidence: 0.81,
        }
    }

    pub fn pressure(value: Option<u32>, confidence: f32) -> PressureValue {
        PressureValue {
            raw_text: value.map(|v| v.to_string()).unwrap_or_default(),
            value,
            confidence,
            text_region: None,
        }
    }

    /// Two systems, three markers (two linked to the Low, one out of range).
    pub fn sample_report() -> MapReport {
        let symbols = [
            symbol(1, SymbolKind::Low, 100, 100),
            symbol(2, SymbolKind::High, 400, 300),
        ];
        let pressures = [pressure(Some(1004), 0.876), pressure(None, 0.0)];
        let markers = [marker(1, 90, 120), marker(2, 130, 95), marker(3, 700, 50)];
        let links = Links {
            links: vec![
                Link {
                    marker_id: 2,
                    symbol_id: 1,
                    distance: 30.4,
                },
                Link {
                    marker_id: 1,
                    symbol_id: 1,
                    distance: 22.4,
                },
            ],
            unlinked: vec![Unlinked {
                marker_id: 3,
                reason: UnlinkReason::OutOfRange,
            }],
        };
        build_report(
            "0600_UTC_Wed_03_JAN",
            (800, 600),
            &symbols,
            &pressures,
            &markers,
            &links,
        )
    }
}
