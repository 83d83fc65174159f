//! CSV tables.
//!
//! The system table has one row per system:
//! `system_id,kind,anchor_x,anchor_y,pressure,ocr_confidence,marker_count,marker_ids`.
//! The track table has one row per linked marker, across maps:
//! `day,month,hour,x,y,type,pressure`.

use anyhow::{anyhow, Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::MapReport;
use crate::records::{PixelPoint, SymbolKind, SystemRecord};

/// System table header row. Column order is fixed.
pub const TABLE_HEADER: &str =
    "system_id,kind,anchor_x,anchor_y,pressure,ocr_confidence,marker_count,marker_ids";

/// Track table header row.
pub const TRACK_HEADER: &str = "day,month,hour,x,y,type,pressure";

/// One parsed system table row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub system_id: u32,
    pub kind: SymbolKind,
    pub anchor: PixelPoint,
    pub pressure: Option<u32>,
    /// Empty when no OCR ran for the system
    pub ocr_confidence: Option<f32>,
    pub marker_ids: Vec<u32>,
}

fn format_row(system: &SystemRecord) -> String {
    let pressure = system
        .pressure
        .as_ref()
        .and_then(|p| p.value)
        .map(|v| v.to_string())
        .unwrap_or_default();
    let confidence = system
        .pressure
        .as_ref()
        .map(|p| format!("{:.2}", p.confidence))
        .unwrap_or_default();
    let marker_ids: Vec<String> = system.markers.iter().map(|m| m.id.to_string()).collect();

    // Format: system_id,kind,anchor_x,anchor_y,pressure,ocr_confidence,marker_count,marker_ids
    format!(
        "{},{},{},{},{},{},{},{}",
        system.symbol.id,
        system.symbol.kind,
        system.symbol.anchor.x,
        system.symbol.anchor.y,
        pressure,
        confidence,
        system.markers.len(),
        marker_ids.join(";"),
    )
}

/// Renders the system table. Identical reports give identical text.
pub fn to_table_string(report: &MapReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TABLE_HEADER);
    for system in &report.systems {
        let _ = writeln!(out, "{}", format_row(system));
    }
    out
}

/// Writes the system table, replacing any existing file.
pub fn write_table(report: &MapReport, path: &Path) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    file.write_all(to_table_string(report).as_bytes())
        .context("Failed to write CSV rows")?;
    Ok(())
}

/// Parses a system table.
///
/// The header must match exactly. Malformed rows are skipped with a warning.
pub fn parse_table(contents: &str) -> Result<Vec<TableRow>> {
    let mut lines = contents.lines();
    match lines.next() {
        Some(header) if header.trim() == TABLE_HEADER => {}
        Some(header) => return Err(anyhow!("Unexpected table header: {}", header)),
        None => return Err(anyhow!("Table is empty")),
    }

    let mut rows = Vec::new();
    for (index, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                log::warn!("Skipping malformed table row {}: {:#}", index + 2, e);
            }
        }
    }
    Ok(rows)
}

/// Reads a system table from disk.
pub fn read_table(path: &Path) -> Result<Vec<TableRow>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    parse_table(&contents)
}

fn parse_line(line: &str) -> Result<TableRow> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 8 {
        return Err(anyhow!("Expected 8 columns, got {}", parts.len()));
    }

    let system_id = parts[0].parse::<u32>().context("Invalid system id")?;
    let kind: SymbolKind = parts[1].parse()?;
    let x = parts[2].parse::<u32>().context("Invalid anchor_x")?;
    let y = parts[3].parse::<u32>().context("Invalid anchor_y")?;
    let pressure = optional(parts[4])
        .map(|p| p.parse::<u32>().context("Invalid pressure"))
        .transpose()?;
    let ocr_confidence = optional(parts[5])
        .map(|c| c.parse::<f32>().context("Invalid ocr_confidence"))
        .transpose()?;
    let marker_count = parts[6].parse::<usize>().context("Invalid marker_count")?;
    let marker_ids = optional(parts[7])
        .map(|ids| {
            ids.split(';')
                .map(|id| id.parse::<u32>().context("Invalid marker id"))
                .collect::<Result<Vec<u32>>>()
        })
        .transpose()?
        .unwrap_or_default();

    if marker_ids.len() != marker_count {
        return Err(anyhow!(
            "marker_count {} does not match {} marker ids",
            marker_count,
            marker_ids.len()
        ));
    }

    Ok(TableRow {
        system_id,
        kind,
        anchor: PixelPoint::new(x, y),
        pressure,
        ocr_confidence,
        marker_ids,
    })
}

fn optional(field: &str) -> Option<&str> {
    let field = field.trim();
    (!field.is_empty()).then_some(field)
}

/// Track rows for one map: one per linked marker, in system then marker order.
///
/// Date columns are empty when the map name carries no timestamp.
pub fn track_rows(report: &MapReport) -> Vec<String> {
    let timestamp = report.timestamp();
    let (day, month, hour) = match &timestamp {
        Some(ts) => (ts.day_label(), ts.month_label(), ts.time_label()),
        None => Default::default(),
    };

    let mut rows = Vec::new();
    for system in &report.systems {
        let pressure = system
            .pressure
            .as_ref()
            .and_then(|p| p.value)
            .map(|v| v.to_string())
            .unwrap_or_default();
        for marker in &system.markers {
            rows.push(format!(
                "{},{},{},{},{},{},{}",
                day,
                month,
                hour,
                marker.anchor.x,
                marker.anchor.y,
                system.symbol.kind.letter(),
                pressure,
            ));
        }
    }
    rows
}

/// Writes the combined track table for a batch of maps.
pub fn write_track_table(path: &Path, reports: &[MapReport]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    writeln!(file, "{}", TRACK_HEADER).context("Failed to write CSV header")?;
    for report in reports {
        for row in track_rows(report) {
            writeln!(file, "{}", row).context("Failed to write CSV row")?;
        }
    }
    Ok(())
}
