//! Carrier directory parser.

use tracing::warn;

use crate::models::CarrierDirectoryEntry;

/// Parse the carrier directory sheet (header row skipped).
///
/// Each row needs at least 5 fields: name, dataset ref, color hint, icon
/// hint, active flag, then optionally a description and an advertised
/// version. Short rows are logged and skipped so one malformed entry does
/// not abort the whole directory.
pub fn parse_directory(rows: &[Vec<String>]) -> Vec<CarrierDirectoryEntry> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter_map(|(line, row)| parse_row(line + 1, row))
        .collect()
}

fn parse_row(line: usize, row: &[String]) -> Option<CarrierDirectoryEntry> {
    if row.len() < 5 {
        warn!(line, fields = row.len(), "carrier directory row too short, skipping");
        return None;
    }
    if row[0].is_empty() {
        warn!(line, "carrier directory row has no name, skipping");
        return None;
    }
    Some(CarrierDirectoryEntry {
        name: row[0].clone(),
        dataset_ref: row[1].clone(),
        color_hint: non_empty(&row[2]),
        icon_hint: non_empty(&row[3]),
        active: parse_active_flag(&row[4]),
        description: row.get(5).and_then(|s| non_empty(s)),
        remote_version: row.get(6).and_then(|s| s.parse::<i64>().ok()),
    })
}

/// Fixed truthy vocabulary, case-insensitive; anything else is false.
fn parse_active_flag(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "ja")
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
