// Domain records shared by the scorer, the repository and the feed.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Jurisdiction tier of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Federal,
    State,
    Municipal,
}

impl Level {
    /// Parse a level string, case-insensitively. Returns `None` for anything
    /// other than federal/state/municipal.
    pub fn from_str_level(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "federal" => Some(Level::Federal),
            "state" => Some(Level::State),
            "municipal" => Some(Level::Municipal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Federal => "federal",
            Level::State => "state",
            Level::Municipal => "municipal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a user's vote on a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    /// Accepts `upvote`/`downvote` as well as the short `up`/`down` forms.
    pub fn from_str_vote(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "upvote" | "up" => Some(VoteType::Upvote),
            "downvote" | "down" => Some(VoteType::Downvote),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a vote request did to the stored vote for a (user, bill) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Created,
    Updated,
    Removed,
    /// The stored vote already matched the request.
    Unchanged,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A piece of legislation as presented to users. Sourced externally and never
/// mutated by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub number: String,
    pub title: String,
    pub summary: String,
    pub level: Level,
    pub jurisdiction: String,
    /// Display label, already mapped from the upstream status code.
    pub status: String,
    pub policy_area: String,
    /// `None` when the upstream record carries no usable date.
    pub introduced_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub user_id: String,
    pub bill_id: String,
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_id: String,
    pub bill_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBill {
    pub user_id: String,
    pub bill_id: String,
    pub saved_at: DateTime<Utc>,
}

/// Aggregate engagement for one bill. Derived on demand, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub upvotes: u32,
    pub downvotes: u32,
    pub comments: u32,
}

impl EngagementSnapshot {
    /// Tally the votes and comments that reference `bill_id`. Records for
    /// other bills are ignored, so callers may pass unfiltered slices.
    pub fn from_records(bill_id: &str, votes: &[Vote], comments: &[Comment]) -> Self {
        let mut snapshot = EngagementSnapshot::default();
        for vote in votes.iter().filter(|v| v.bill_id == bill_id) {
            match vote.vote_type {
                VoteType::Upvote => snapshot.upvotes += 1,
                VoteType::Downvote => snapshot.downvotes += 1,
            }
        }
        snapshot.comments = comments.iter().filter(|c| c.bill_id == bill_id).count() as u32;
        snapshot
    }

    pub fn vote_count(&self) -> u32 {
        self.upvotes + self.downvotes
    }
}

/// Role a legislator plays on a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorRole {
    Sponsor,
    Cosponsor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislator {
    pub id: String,
    pub name: String,
    pub title: String,
    pub level: Level,
    pub jurisdiction: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub office_address: Option<String>,
    pub website_url: Option<String>,
}

/// A legislator together with their role on a particular bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSponsor {
    pub legislator: Legislator,
    pub role: SponsorRole,
}
