//! Marker-to-system association.
//!
//! Distances are Euclidean in source pixel space. In greedy mode each marker
//! picks its nearest eligible symbol on its own, so one system may collect
//! several markers. One-to-one mode pairs the closest marker/system couples
//! first and lets each system keep a single marker.

use serde::{Deserialize, Serialize};

use crate::config::{AssociationMode, ConnectorConfig};
use crate::records::{MarkerRecord, SymbolRecord};

/// A marker attached to a system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub marker_id: u32,
    pub symbol_id: u32,
    pub distance: f32,
}

/// Why a marker was left unattached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlinkReason {
    /// No eligible symbol within the association radius
    OutOfRange,
    /// Two or more symbols are equally near
    Ambiguous,
    /// Every eligible system already holds a marker (one-to-one mode)
    SystemTaken,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unlinked {
    pub marker_id: u32,
    pub reason: UnlinkReason,
}

/// Association result, both lists ordered by marker id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub links: Vec<Link>,
    pub unlinked: Vec<Unlinked>,
}

impl Links {
    /// System a marker belongs to.
    pub fn symbol_of(&self, marker_id: u32) -> Option<u32> {
        self.links
            .iter()
            .find(|l| l.marker_id == marker_id)
            .map(|l| l.symbol_id)
    }

    /// Markers attached to a system, ascending.
    pub fn markers_of(&self, symbol_id: u32) -> Vec<u32> {
        self.links
            .iter()
            .filter(|l| l.symbol_id == symbol_id)
            .map(|l| l.marker_id)
            .collect()
    }

    pub fn reason_for(&self, marker_id: u32) -> Option<UnlinkReason> {
        self.unlinked
            .iter()
            .find(|u| u.marker_id == marker_id)
            .map(|u| u.reason)
    }
}

/// Eligible symbols for one marker, nearest first (ties by symbol id).
fn candidates(
    marker: &MarkerRecord,
    symbols: &[SymbolRecord],
    config: &ConnectorConfig,
) -> Vec<(u32, f32)> {
    let mut near: Vec<(u32, f32)> = symbols
        .iter()
        .filter(|s| config.allowed_kinds.contains(&s.kind))
        .map(|s| (s.id, marker.anchor.distance_to(&s.anchor)))
        .filter(|&(_, d)| d <= config.max_radius)
        .collect();
    near.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    near
}

/// The unique nearest symbol, or why there is none.
fn nearest(near: &[(u32, f32)], tie_tolerance: f32) -> Result<(u32, f32), UnlinkReason> {
    match near {
        [] => Err(UnlinkReason::OutOfRange),
        [first, second, ..] if second.1 - first.1 <= tie_tolerance => {
            Err(UnlinkReason::Ambiguous)
        }
        [first, ..] => Ok(*first),
    }
}

/// Links markers to symbols.
pub fn connect(
    symbols: &[SymbolRecord],
    markers: &[MarkerRecord],
    config: &ConnectorConfig,
) -> Links {
    let mut result = match config.mode {
        AssociationMode::Greedy => connect_greedy(symbols, markers, config),
        AssociationMode::OneToOne => connect_one_to_one(symbols, markers, config),
    };
    result.links.sort_by_key(|l| l.marker_id);
    result.unlinked.sort_by_key(|u| u.marker_id);

    log::debug!(
        "Connected {} markers, {} unlinked",
        result.links.len(),
        result.unlinked.len()
    );
    result
}

fn connect_greedy(
    symbols: &[SymbolRecord],
    markers: &[MarkerRecord],
    config: &ConnectorConfig,
) -> Links {
    let mut result = Links::default();
    for marker in markers {
        let near = candidates(marker, symbols, config);
        match nearest(&near, config.tie_tolerance) {
            Ok((symbol_id, distance)) => result.links.push(Link {
                marker_id: marker.id,
                symbol_id,
                distance,
            }),
            Err(reason) => result.unlinked.push(Unlinked {
                marker_id: marker.id,
                reason,
            }),
        }
    }
    result
}

fn connect_one_to_one(
    symbols: &[SymbolRecord],
    markers: &[MarkerRecord],
    config: &ConnectorConfig,
) -> Links {
    let mut result = Links::default();

    // (distance, marker id, symbol id) for markers with an unambiguous nearest symbol
    let mut pairs: Vec<(f32, u32, u32)> = Vec::new();
    for marker in markers {
        let near = candidates(marker, symbols, config);
        match nearest(&near, config.tie_tolerance) {
            Ok(_) => pairs.extend(near.iter().map(|&(symbol_id, d)| (d, marker.id, symbol_id))),
            Err(reason) => result.unlinked.push(Unlinked {
                marker_id: marker.id,
                reason,
            }),
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut used_markers: Vec<u32> = Vec::new();
    let mut used_symbols: Vec<u32> = Vec::new();
    for (distance, marker_id, symbol_id) in pairs {
        if used_markers.contains(&marker_id) || used_symbols.contains(&symbol_id) {
            continue;
        }
        used_markers.push(marker_id);
        used_symbols.push(symbol_id);
        result.links.push(Link {
            marker_id,
            symbol_id,
            distance,
        });
    }

    for marker in markers {
        let handled = used_markers.contains(&marker.id)
            || result.unlinked.iter().any(|u| u.marker_id == marker.id);
        if !handled {
            result.unlinked.push(Unlinked {
                marker_id: marker.id,
                reason: UnlinkReason::SystemTaken,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PixelPoint, Region, SymbolKind};

    fn symbol(id: u32, kind: SymbolKind, x: u32, y: u32) -> SymbolRecord {
        SymbolRecord {
            id,
            kind,
            anchor: PixelPoint::new(x, y),
            region: Region::new(x - 5, y - 7, 10, 14),
            confidence: 0.9,
        }
    }

    fn marker(id: u32, x: u32, y: u32) -> MarkerRecord {
        MarkerRecord {
            id,
            anchor: PixelPoint::new(x, y),
            region: Region::new(x - 3, y - 3, 7, 7),
            confidence: 0.8,
        }
    }

    fn radius(max_radius: f32) -> ConnectorConfig {
        ConnectorConfig {
            max_radius,
            ..ConnectorConfig::default()
        }
    }

    #[test]
    fn test_marker_links_to_nearby_low_only() {
        let symbols = [
            symbol(1, SymbolKind::Low, 100, 100),
            symbol(2, SymbolKind::High, 500, 500),
        ];
        let markers = [marker(1, 110, 105)];

        let links = connect(&symbols, &markers, &radius(50.0));

        assert_eq!(links.symbol_of(1), Some(1));
        assert_eq!(links.markers_of(1), vec![1]);
        assert!(links.markers_of(2).is_empty());
        assert!(links.unlinked.is_empty());
    }

    #[test]
    fn test_out_of_range_marker_reported() {
        let symbols = [symbol(1, SymbolKind::Low, 100, 100)];
        let markers = [marker(1, 300, 300)];

        let links = connect(&symbols, &markers, &radius(50.0));

        assert!(links.links.is_empty());
        assert_eq!(links.reason_for(1), Some(UnlinkReason::OutOfRange));
    }

    #[test]
    fn test_equidistant_marker_is_ambiguous() {
        let symbols = [
            symbol(1, SymbolKind::Low, 100, 100),
            symbol(2, SymbolKind::High, 120, 100),
        ];
        let markers = [marker(1, 110, 130)];

        let links = connect(&symbols, &markers, &ConnectorConfig::default());

        assert_eq!(links.symbol_of(1), None);
        assert_eq!(links.reason_for(1), Some(UnlinkReason::Ambiguous));
    }

    #[test]
    fn test_radius_is_inclusive() {
        let symbols = [symbol(1, SymbolKind::Low, 100, 100)];
        let markers = [marker(1, 130, 140)];

        // Exactly 50px away
        assert_eq!(connect(&symbols, &markers, &radius(50.0)).symbol_of(1), Some(1));
        assert_eq!(connect(&symbols, &markers, &radius(49.0)).symbol_of(1), None);
    }

    #[test]
    fn test_greedy_allows_several_markers_per_system() {
        let symbols = [symbol(1, SymbolKind::Low, 100, 100)];
        let markers = [marker(1, 90, 90), marker(2, 120, 110), marker(3, 100, 150)];

        let links = connect(&symbols, &markers, &ConnectorConfig::default());

        assert_eq!(links.markers_of(1), vec![1, 2, 3]);
    }

    #[test]
    fn test_allowed_kinds_filter() {
        let symbols = [
            symbol(1, SymbolKind::Low, 100, 100),
            symbol(2, SymbolKind::High, 110, 100),
        ];
        let markers = [marker(1, 112, 104)];
        let config = ConnectorConfig {
            allowed_kinds: vec![SymbolKind::Low],
            ..ConnectorConfig::default()
        };

        assert_eq!(connect(&symbols, &markers, &config).symbol_of(1), Some(1));
    }

    #[test]
    fn test_one_to_one_closest_pair_wins() {
        let symbols = [symbol(1, SymbolKind::Low, 100, 100)];
        let markers = [marker(1, 140, 100), marker(2, 110, 100)];
        let config = ConnectorConfig {
            mode: AssociationMode::OneToOne,
            ..ConnectorConfig::default()
        };

        let links = connect(&symbols, &markers, &config);

        assert_eq!(links.markers_of(1), vec![2]);
        assert_eq!(links.reason_for(1), Some(UnlinkReason::SystemTaken));
    }

    #[test]
    fn test_one_to_one_falls_back_to_next_system() {
        let symbols = [
            symbol(1, SymbolKind::Low, 100, 100),
            symbol(2, SymbolKind::High, 200, 100),
        ];
        // Marker 1 prefers system 1 but loses it to marker 2
        let markers = [marker(1, 130, 100), marker(2, 105, 100)];
        let config = ConnectorConfig {
            mode: AssociationMode::OneToOne,
            ..ConnectorConfig::default()
        };

        let links = connect(&symbols, &markers, &config);

        assert_eq!(links.symbol_of(2), Some(1));
        assert_eq!(links.symbol_of(1), Some(2));
        assert!(links.unlinked.is_empty());
    }

    #[test]
    fn test_every_marker_accounted_for() {
        let symbols = [
            symbol(1, SymbolKind::Low, 100, 100),
            symbol(2, SymbolKind::High, 120, 100),
        ];
        let markers = [
            marker(1, 95, 95),
            marker(2, 110, 130),
            marker(3, 400, 400),
            marker(4, 125, 95),
        ];

        for mode in [AssociationMode::Greedy, AssociationMode::OneToOne] {
            let config = ConnectorConfig {
                mode,
                ..ConnectorConfig::default()
            };
            let links = connect(&symbols, &markers, &config);
            assert_eq!(links.links.len() + links.unlinked.len(), markers.len());
        }
    }
}
