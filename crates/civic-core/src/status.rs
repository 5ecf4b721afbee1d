// LegiScan status codes and state abbreviations.
//
// Both tables are closed: every lookup has a defined fallback so an unmapped
// upstream value never leaks through as an empty label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Level;

/// Progress of a bill through the legislature, as coded by LegiScan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillStatus {
    Introduced,
    Engrossed,
    Enrolled,
    Passed,
    Vetoed,
    Failed,
    Override,
    Chaptered,
    Refer,
    ReportPass,
    ReportDnp,
    Draft,
    Unknown,
}

impl BillStatus {
    /// Map a numeric status code. Codes outside 1..=12 resolve to `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => BillStatus::Introduced,
            2 => BillStatus::Engrossed,
            3 => BillStatus::Enrolled,
            4 => BillStatus::Passed,
            5 => BillStatus::Vetoed,
            6 => BillStatus::Failed,
            7 => BillStatus::Override,
            8 => BillStatus::Chaptered,
            9 => BillStatus::Refer,
            10 => BillStatus::ReportPass,
            11 => BillStatus::ReportDnp,
            12 => BillStatus::Draft,
            _ => BillStatus::Unknown,
        }
    }

    /// Map a status that may arrive as a number or a numeric string.
    /// Anything unparseable resolves to `Unknown`.
    pub fn from_raw(raw: Option<&serde_json::Value>) -> Self {
        match raw {
            Some(serde_json::Value::Number(n)) => n.as_i64().map_or(BillStatus::Unknown, Self::from_code),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_or(BillStatus::Unknown, Self::from_code),
            _ => BillStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BillStatus::Introduced => "Introduced",
            BillStatus::Engrossed => "Engrossed",
            BillStatus::Enrolled => "Enrolled",
            BillStatus::Passed => "Passed",
            BillStatus::Vetoed => "Vetoed",
            BillStatus::Failed => "Failed",
            BillStatus::Override => "Veto Override",
            BillStatus::Chaptered => "Chaptered",
            BillStatus::Refer => "Referred to Committee",
            BillStatus::ReportPass => "Reported Favorably",
            BillStatus::ReportDnp => "Reported Unfavorably",
            BillStatus::Draft => "Draft",
            BillStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Two-letter code used by LegiScan for the U.S. Congress.
pub const FEDERAL_CODE: &str = "US";

const STATE_NAMES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Full name for a two-letter state code, case-insensitive.
pub fn state_name(code: &str) -> Option<&'static str> {
    let upper = code.trim().to_uppercase();
    STATE_NAMES
        .iter()
        .find(|(abbr, _)| *abbr == upper)
        .map(|(_, name)| *name)
}

/// Resolve a LegiScan state code into a level and a display jurisdiction.
///
/// `US` (or a missing code) is federal. Known state codes map to the state's
/// name; an unknown code is still treated as a state and shown verbatim.
pub fn jurisdiction_for(state_code: Option<&str>) -> (Level, String) {
    match state_code.map(str::trim).filter(|c| !c.is_empty()) {
        None => (Level::Federal, "United States".to_string()),
        Some(code) if code.eq_ignore_ascii_case(FEDERAL_CODE) => {
            (Level::Federal, "United States".to_string())
        }
        Some(code) => {
            let name = state_name(code).map_or_else(|| code.to_uppercase(), str::to_string);
            (Level::State, name)
        }
    }
}
