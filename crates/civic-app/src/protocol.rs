// Messages exchanged between callers, the event loop and mutation tasks.

use std::fmt;

use serde::Serialize;

use civic_core::model::VoteType;

use crate::remote::RemoteError;

// ---------------------------------------------------------------------------
// Entities and displayed values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Vote,
    Save,
}

/// One optimistic entity: the viewer's vote on a bill, or its saved flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityKey {
    pub bill_id: String,
    pub kind: EntityKind,
}

impl EntityKey {
    pub fn vote(bill_id: impl Into<String>) -> Self {
        Self {
            bill_id: bill_id.into(),
            kind: EntityKind::Vote,
        }
    }

    pub fn save(bill_id: impl Into<String>) -> Self {
        Self {
            bill_id: bill_id.into(),
            kind: EntityKind::Save,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EntityKind::Vote => "vote",
            EntityKind::Save => "save",
        };
        write!(f, "{kind}:{}", self.bill_id)
    }
}

/// Vote selection plus both counters, as shown next to a bill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteState {
    pub user_vote: Option<VoteType>,
    pub upvotes: u32,
    pub downvotes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayValue {
    Vote(VoteState),
    Saved(bool),
}

impl DisplayValue {
    pub fn kind(&self) -> EntityKind {
        match self {
            DisplayValue::Vote(_) => EntityKind::Vote,
            DisplayValue::Saved(_) => EntityKind::Save,
        }
    }
}

/// The remote write for one toggle. Both variants carry the end state the
/// display shows, so applying the same write twice leaves the store unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mutation {
    /// `None` clears the user's vote.
    SetVote(Option<VoteType>),
    SetSaved(bool),
}

// ---------------------------------------------------------------------------
// Channel messages
// ---------------------------------------------------------------------------

/// Commands accepted by the event loop.
#[derive(Debug, Clone)]
pub enum UserCommand {
    /// Start tracking an entity with its server-confirmed value.
    Attach { bill_id: String, initial: DisplayValue },
    ToggleVote { bill_id: String, vote_type: VoteType },
    ToggleSave { bill_id: String },
    /// Stop tracking an entity; outstanding results are ignored.
    Detach(EntityKey),
    Quit,
}

/// Result of one dispatched mutation, reported by its task.
#[derive(Debug)]
pub struct Completion {
    pub key: EntityKey,
    pub generation: u64,
    pub result: Result<(), RemoteError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Updates pushed to whatever renders the displayed state.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Display { key: EntityKey, value: DisplayValue },
    /// The entity's status query is stale and should be refetched.
    Invalidate(EntityKey),
    Notify(Notification),
    /// The entity is no longer tracked.
    Detached(EntityKey),
}
