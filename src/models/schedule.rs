//! Schedule records and their operating-day vocabulary.

use serde::{Deserialize, Serialize};

/// Day of the week a trip operates on.
///
/// Declaration order is week order, so the derived `Ord` sorts day sets
/// Monday-first.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }

    /// Parse a bilingual day abbreviation (English or Swedish short code).
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "mon" | "mån" | "man" => Some(Weekday::Mon),
            "tue" | "tis" => Some(Weekday::Tue),
            "wed" | "ons" => Some(Weekday::Wed),
            "thu" | "tor" | "tors" => Some(Weekday::Thu),
            "fri" | "fre" => Some(Weekday::Fri),
            "sat" | "lör" | "lor" => Some(Weekday::Sat),
            "sun" | "sön" | "son" => Some(Weekday::Sun),
            _ => None,
        }
    }

    /// The canonical Monday-to-Friday set, the default for blank day specs.
    pub fn workweek() -> Vec<Weekday> {
        vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
    }
}

/// One stop in a synthesized stop sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStop {
    pub stop_name: String,
    /// "HH:MM", estimated for intermediate and final stops
    pub arrival_time: String,
    pub delay_minutes: i32,
}

/// One scheduled trip, owned exclusively by the carrier in `carrier_id`.
///
/// The set of rows for a carrier is replaced as a unit by the orchestrator;
/// individual rows are never partially updated by sync. After synthesis
/// `stops` is non-empty and its first entry's time equals `departure_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BusSchedule {
    pub id: String,
    pub carrier_id: String,
    pub carrier_name: String,
    /// "HH:MM"
    pub departure_time: String,
    /// Destination stop name
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation_description: Option<String>,
    /// Origin stop name
    pub stop_name: String,
    pub bus_line: String,
    pub operating_days: Vec<Weekday>,
    pub stops: Vec<ScheduleStop>,
}
