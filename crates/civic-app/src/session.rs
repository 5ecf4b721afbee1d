// Current-user lookup. The identity provider itself lives elsewhere; this
// module only needs to know who is signed in and whether the session holds.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    /// `None` means the session does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            expires_at: None,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.id.trim().is_empty() && self.expires_at.map_or(true, |exp| now < exp)
    }
}

pub trait Identity: Send + Sync {
    fn current_user(&self) -> Option<User>;
}

/// Identity fixed at construction, e.g. from a command-line flag.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<User>,
}

impl StaticIdentity {
    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// Blank ids are treated as anonymous.
    pub fn from_user_id(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Self::signed_in(User::new(id.trim())),
            _ => Self::anonymous(),
        }
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}

/// The signed-in user if the session is still valid at `now`.
pub fn signed_in_user(identity: &dyn Identity, now: DateTime<Utc>) -> Option<User> {
    identity.current_user().filter(|u| u.is_active(now))
}
