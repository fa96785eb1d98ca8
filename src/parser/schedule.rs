//! Per-carrier schedule parser and stop-sequence synthesizer.
//!
//! The source sheets are sparse: a row names the origin implicitly, lists
//! intermediate stops without timings and abbreviates operating days. The
//! synthesizer expands each valid row into a full ordered stop sequence with
//! estimated arrival times on a fixed 5-minute cadence.

use std::collections::BTreeSet;

use tracing::warn;
use uuid::Uuid;

use crate::models::{BusSchedule, ScheduleStop, Weekday};

/// Estimated minutes between consecutive synthesized stops.
const STOP_CADENCE_MINUTES: u32 = 5;
/// Total trip minutes assumed when no intermediate stops are listed.
const DEFAULT_TRIP_MINUTES: u32 = 20;

/// Parse one carrier's schedule sheet (header row skipped) into records.
///
/// Each row needs at least 7 fields: line designation, designation
/// description, bus line, departure time, origin (may be empty), direction,
/// day spec, then optionally an intermediate-stops spec. Malformed rows are
/// logged and dropped; they never abort the carrier-level parse.
pub fn parse_schedules(
    carrier_id: &str,
    carrier_name: &str,
    rows: &[Vec<String>],
) -> Vec<BusSchedule> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter_map(|(line, row)| parse_row(carrier_id, carrier_name, line + 1, row))
        .collect()
}

fn parse_row(
    carrier_id: &str,
    carrier_name: &str,
    line: usize,
    row: &[String],
) -> Option<BusSchedule> {
    if row.len() < 7 {
        warn!(line, fields = row.len(), "schedule row too short, skipping");
        return None;
    }

    let Some(departure) = parse_hhmm(&row[3]) else {
        warn!(line, time = %row[3], "schedule row has malformed departure time, skipping");
        return None;
    };
    let departure_time = format_hhmm(departure);

    let bus_line = row[2].clone();
    let direction = row[5].clone();
    let origin = if row[4].is_empty() {
        derive_origin(&bus_line, &direction)
    } else {
        row[4].clone()
    };

    let operating_days = parse_days(&row[6]);
    let stops = synthesize_stops(&origin, departure, &direction, row.get(7).map(String::as_str));

    Some(BusSchedule {
        id: Uuid::new_v4().to_string(),
        carrier_id: carrier_id.to_string(),
        carrier_name: carrier_name.to_string(),
        departure_time,
        direction,
        line_designation: non_empty(&row[0]),
        designation_description: non_empty(&row[1]),
        stop_name: origin,
        bus_line,
        operating_days,
        stops,
    })
}

/// Derive the origin stop from the bus line name when the explicit field is
/// empty: split on `-`, and with exactly two tokens pick the one that is not
/// the destination; otherwise fall back to the first token, or the whole
/// line name when there is nothing to split.
fn derive_origin(bus_line: &str, direction: &str) -> String {
    let tokens: Vec<&str> = bus_line
        .split('-')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    match tokens.as_slice() {
        [a, b] => {
            if *a == direction {
                (*b).to_string()
            } else {
                (*a).to_string()
            }
        }
        [first, ..] => (*first).to_string(),
        [] => bus_line.trim().to_string(),
    }
}

/// Parse a comma-separated list of bilingual day abbreviations.
///
/// Unrecognized tokens are dropped; an entirely blank spec defaults to the
/// Monday-to-Friday workweek (a content-authoring convenience, not an
/// error).
fn parse_days(spec: &str) -> Vec<Weekday> {
    if spec.trim().is_empty() {
        return Weekday::workweek();
    }
    let mut days = BTreeSet::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match Weekday::from_token(token) {
            Some(day) => {
                days.insert(day);
            }
            None => warn!(token, "unrecognized day abbreviation, dropping"),
        }
    }
    days.into_iter().collect()
}

/// Expand a sparse row into a full ordered stop sequence.
///
/// Intermediate stop `n` (1-based) is estimated at departure + 5n minutes.
/// The final stop lands at 5 x (intermediate count + 1) minutes after
/// departure, or at a fixed 20 minutes when no intermediates are listed.
/// Arithmetic wraps over midnight.
fn synthesize_stops(
    origin: &str,
    departure: (u32, u32),
    destination: &str,
    stops_spec: Option<&str>,
) -> Vec<ScheduleStop> {
    let intermediates: Vec<&str> = stops_spec
        .map(|spec| {
            spec.split([',', ';'])
                .map(str::trim)
                .filter(|s| !s.is_empty() && *s != origin && *s != destination)
                .collect()
        })
        .unwrap_or_default();

    let mut stops = Vec::with_capacity(intermediates.len() + 2);
    stops.push(ScheduleStop {
        stop_name: origin.to_string(),
        arrival_time: format_hhmm(departure),
        delay_minutes: 0,
    });
    for (index, name) in intermediates.iter().enumerate() {
        stops.push(ScheduleStop {
            stop_name: (*name).to_string(),
            arrival_time: format_hhmm(add_minutes(
                departure,
                STOP_CADENCE_MINUTES * (index as u32 + 1),
            )),
            delay_minutes: 0,
        });
    }
    let total_minutes = if intermediates.is_empty() {
        DEFAULT_TRIP_MINUTES
    } else {
        STOP_CADENCE_MINUTES * (intermediates.len() as u32 + 1)
    };
    stops.push(ScheduleStop {
        stop_name: destination.to_string(),
        arrival_time: format_hhmm(add_minutes(departure, total_minutes)),
        delay_minutes: 0,
    });
    stops
}

fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute: u32 = m.trim().parse().ok()?;
    if hour >= 24 || minute >= 60 {
        return None;
    }
    Some((hour, minute))
}

fn add_minutes((hour, minute): (u32, u32), minutes: u32) -> (u32, u32) {
    let total = minute + minutes;
    ((hour + total / 60) % 24, total % 60)
}

fn format_hhmm((hour, minute): (u32, u32)) -> String {
    format!("{:02}:{:02}", hour, minute)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
