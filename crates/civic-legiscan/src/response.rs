// Schema validation for LegiScan JSON responses.
//
// Every response is an envelope `{"status": "OK", "<payload key>": ...}` or
// `{"status": "ERROR", "alert": {"message": ...}}`. Payloads are deserialized
// into raw structs that mirror the wire format, then converted into domain
// records. Anything that does not fit is reported as `Malformed`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use civic_core::model::{Bill, SponsorRole};
use civic_core::status::{jurisdiction_for, BillStatus};

use crate::client::LegiScanError;

// ---------------------------------------------------------------------------
// Domain-facing records
// ---------------------------------------------------------------------------

/// A bill plus the detail fields only `getBill` returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillDetail {
    pub bill: Bill,
    pub status_code: BillStatus,
    pub session_id: Option<i64>,
    /// First published text document, if any.
    pub full_text_url: Option<String>,
    pub state_link: Option<String>,
    pub sponsors: Vec<SponsorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SponsorRecord {
    pub people_id: i64,
    pub name: String,
    pub role: SponsorRole,
    pub party: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: i64,
    pub name: String,
    pub year_start: i32,
    pub year_end: i32,
    pub special: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Masterlist {
    pub session: Option<SessionInfo>,
    /// In LegiScan's listing order.
    pub bills: Vec<Bill>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub bill_id: String,
    pub number: String,
    pub state: String,
    pub title: String,
    pub relevance: u32,
    pub last_action: Option<String>,
    pub last_action_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Wire structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    alert: Option<Alert>,
    #[serde(flatten)]
    payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Alert {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawBill {
    bill_id: i64,
    #[serde(alias = "number")]
    bill_number: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    status_date: Option<String>,
    #[serde(default)]
    session_id: Option<i64>,
    #[serde(default)]
    state_link: Option<String>,
    #[serde(default)]
    subjects: Vec<RawSubject>,
    #[serde(default)]
    texts: Vec<RawText>,
    #[serde(default)]
    sponsors: Vec<RawSponsor>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    subject_name: String,
}

#[derive(Debug, Deserialize)]
struct RawText {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    state_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSponsor {
    people_id: i64,
    name: String,
    #[serde(default)]
    party: Option<String>,
    /// 1 = primary sponsor, 2 = cosponsor, 3 = joint sponsor.
    #[serde(default)]
    sponsor_type_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawMasterlistEntry {
    bill_id: i64,
    #[serde(alias = "bill_number")]
    number: String,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    status_date: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    session_id: i64,
    #[serde(default)]
    session_name: String,
    #[serde(default)]
    year_start: i32,
    #[serde(default)]
    year_end: i32,
    #[serde(default)]
    special: i64,
}

#[derive(Debug, Deserialize)]
struct RawSearchHit {
    bill_id: i64,
    bill_number: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    relevance: u32,
    #[serde(default)]
    last_action: Option<String>,
    #[serde(default)]
    last_action_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Envelope handling
// ---------------------------------------------------------------------------

/// Parse the envelope and pull out the payload stored under `key`.
fn payload(body: &str, key: &str) -> Result<Value, LegiScanError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| LegiScanError::Malformed(format!("invalid envelope: {e}")))?;

    if !envelope.status.eq_ignore_ascii_case("OK") {
        let message = envelope
            .alert
            .map(|a| a.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("status {}", envelope.status));
        return Err(LegiScanError::Api(message));
    }

    let mut payload = envelope.payload;
    payload
        .remove(key)
        .ok_or_else(|| LegiScanError::Malformed(format!("missing `{key}` payload")))
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, LegiScanError> {
    serde_json::from_value(value).map_err(|e| LegiScanError::Malformed(format!("{what}: {e}")))
}

/// LegiScan keys list entries "0", "1", ... alongside named metadata keys.
/// Returns the numbered entries in numeric order plus the remaining keys.
fn split_numbered(value: Value, what: &str) -> Result<(Vec<Value>, serde_json::Map<String, Value>), LegiScanError> {
    let Value::Object(map) = value else {
        return Err(LegiScanError::Malformed(format!("{what} is not an object")));
    };
    let mut numbered = BTreeMap::new();
    let mut named = serde_json::Map::new();
    for (key, entry) in map {
        match key.parse::<u64>() {
            Ok(index) => {
                numbered.insert(index, entry);
            }
            Err(_) => {
                named.insert(key, entry);
            }
        }
    }
    Ok((numbered.into_values().collect(), named))
}

// ---------------------------------------------------------------------------
// Public parsers
// ---------------------------------------------------------------------------

/// Parse a `getBill` response.
pub fn parse_bill(body: &str) -> Result<BillDetail, LegiScanError> {
    let raw: RawBill = decode(payload(body, "bill")?, "bill")?;

    let status_code = BillStatus::from_raw(raw.status.as_ref());
    let (level, jurisdiction) = jurisdiction_for(raw.state.as_deref());
    let policy_area = raw
        .subjects
        .first()
        .map(|s| s.subject_name.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let full_text_url = raw
        .texts
        .iter()
        .find_map(|t| t.url.clone().or_else(|| t.state_link.clone()));
    let sponsors = raw
        .sponsors
        .into_iter()
        .map(|s| SponsorRecord {
            people_id: s.people_id,
            name: s.name,
            role: if s.sponsor_type_id == Some(1) {
                SponsorRole::Sponsor
            } else {
                SponsorRole::Cosponsor
            },
            party: s.party.filter(|p| !p.is_empty()),
        })
        .collect();

    Ok(BillDetail {
        bill: Bill {
            id: raw.bill_id.to_string(),
            number: raw.bill_number,
            title: raw.title,
            summary: raw.description,
            level,
            jurisdiction,
            status: status_code.label().to_string(),
            policy_area,
            introduced_date: parse_date(raw.status_date.as_deref()),
        },
        status_code,
        session_id: raw.session_id,
        full_text_url,
        state_link: raw.state_link,
        sponsors,
    })
}

/// Parse a `getMasterList` response. Masterlist entries carry no state, so
/// the caller supplies the state code the list was requested for.
pub fn parse_masterlist(body: &str, state_code: Option<&str>) -> Result<Masterlist, LegiScanError> {
    let (entries, mut named) = split_numbered(payload(body, "masterlist")?, "masterlist")?;

    let session = match named.remove("session") {
        Some(value) => Some(session_from_raw(decode(value, "masterlist session")?)),
        None => None,
    };

    let (level, jurisdiction) = jurisdiction_for(state_code);
    let bills = entries
        .into_iter()
        .map(|entry| {
            let raw: RawMasterlistEntry = decode(entry, "masterlist entry")?;
            Ok(Bill {
                id: raw.bill_id.to_string(),
                number: raw.number,
                title: raw.title,
                summary: raw.description,
                level,
                jurisdiction: jurisdiction.clone(),
                status: BillStatus::from_raw(raw.status.as_ref()).label().to_string(),
                policy_area: "Unknown".to_string(),
                introduced_date: parse_date(raw.status_date.as_deref()),
            })
        })
        .collect::<Result<Vec<_>, LegiScanError>>()?;

    Ok(Masterlist { session, bills })
}

/// Parse a `getSessionList` response.
pub fn parse_sessions(body: &str) -> Result<Vec<SessionInfo>, LegiScanError> {
    let raw: Vec<RawSession> = decode(payload(body, "sessions")?, "sessions")?;
    Ok(raw.into_iter().map(session_from_raw).collect())
}

/// Parse a `search` response, dropping the `summary` block.
pub fn parse_search(body: &str) -> Result<Vec<SearchHit>, LegiScanError> {
    let (entries, _summary) = split_numbered(payload(body, "searchresult")?, "searchresult")?;
    entries
        .into_iter()
        .map(|entry| {
            let raw: RawSearchHit = decode(entry, "search hit")?;
            Ok(SearchHit {
                bill_id: raw.bill_id.to_string(),
                number: raw.bill_number,
                state: raw.state,
                title: raw.title,
                relevance: raw.relevance,
                last_action: raw.last_action,
                last_action_date: parse_date(raw.last_action_date.as_deref()),
            })
        })
        .collect()
}

fn session_from_raw(raw: RawSession) -> SessionInfo {
    SessionInfo {
        session_id: raw.session_id,
        name: raw.session_name,
        year_start: raw.year_start,
        year_end: raw.year_end,
        special: raw.special != 0,
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part. LegiScan uses
/// `0000-00-00` and empty strings for unknown dates; both become `None`.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
