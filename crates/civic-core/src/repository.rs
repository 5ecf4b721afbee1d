// Storage seam for votes, comments, saved bills and bill sponsors.
//
// Implementors supply the per-entity create/find/delete primitives; the
// toggle, validation and ownership rules live in the provided methods. A
// backend that can make the vote read-then-write atomic overrides
// `cast_vote`/`set_vote` but still plans the write with `plan_vote_write`.

use thiserror::Error;

use crate::model::{BillSponsor, Comment, EngagementSnapshot, SavedBill, Vote, VoteAction, VoteType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sign-in required")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("not permitted: {0}")]
    Forbidden(String),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Backend(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait Repository: Send + Sync {
    // --- votes ---
    fn find_vote(&self, user_id: &str, bill_id: &str) -> StoreResult<Option<Vote>>;
    fn create_vote(&self, user_id: &str, bill_id: &str, vote_type: VoteType) -> StoreResult<Vote>;
    fn update_vote(&self, vote_id: i64, vote_type: VoteType) -> StoreResult<()>;
    fn delete_vote(&self, vote_id: i64) -> StoreResult<()>;
    fn votes_for_bill(&self, bill_id: &str) -> StoreResult<Vec<Vote>>;

    // --- comments ---
    fn create_comment(&self, user_id: &str, bill_id: &str, content: &str) -> StoreResult<Comment>;
    fn find_comment(&self, comment_id: i64) -> StoreResult<Option<Comment>>;
    fn delete_comment_row(&self, comment_id: i64) -> StoreResult<()>;
    /// Newest first.
    fn comments_for_bill(&self, bill_id: &str) -> StoreResult<Vec<Comment>>;

    // --- saved bills ---
    fn find_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<Option<SavedBill>>;
    fn create_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<SavedBill>;
    fn delete_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<()>;
    /// Most recently saved first.
    fn saved_for_user(&self, user_id: &str) -> StoreResult<Vec<SavedBill>>;

    // --- sponsors ---
    /// Sponsors first, then cosponsors.
    fn legislators_for_bill(&self, bill_id: &str) -> StoreResult<Vec<BillSponsor>>;

    /// Vote counts and comment count for one bill.
    fn engagement(&self, bill_id: &str) -> StoreResult<EngagementSnapshot> {
        let votes = self.votes_for_bill(bill_id)?;
        let comments = self.comments_for_bill(bill_id)?;
        Ok(EngagementSnapshot::from_records(bill_id, &votes, &comments))
    }

    /// Apply toggle semantics to the stored vote: the same type removes it,
    /// a different type switches it, no existing vote creates one.
    fn cast_vote(&self, user_id: &str, bill_id: &str, vote_type: VoteType) -> StoreResult<VoteAction> {
        ensure_user(user_id)?;
        let current = self.find_vote(user_id, bill_id)?;
        let target = toggled_vote(current.as_ref().map(|v| v.vote_type), vote_type);
        write_vote(self, user_id, bill_id, plan_vote_write(current.as_ref(), target))
    }

    /// Bring the stored vote to `target` (`None` clears it). Repeating the
    /// call with the same target is a no-op.
    fn set_vote(&self, user_id: &str, bill_id: &str, target: Option<VoteType>) -> StoreResult<VoteAction> {
        ensure_user(user_id)?;
        let current = self.find_vote(user_id, bill_id)?;
        write_vote(self, user_id, bill_id, plan_vote_write(current.as_ref(), target))
    }

    fn user_vote(&self, user_id: &str, bill_id: &str) -> StoreResult<Option<VoteType>> {
        Ok(self.find_vote(user_id, bill_id)?.map(|v| v.vote_type))
    }

    /// Reject blank content before anything is written.
    fn post_comment(&self, user_id: &str, bill_id: &str, content: &str) -> StoreResult<Comment> {
        ensure_user(user_id)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::InvalidInput("comment cannot be empty".into()));
        }
        self.create_comment(user_id, bill_id, content)
    }

    /// Only the author may delete a comment.
    fn delete_comment(&self, requester_id: &str, comment_id: i64) -> StoreResult<()> {
        ensure_user(requester_id)?;
        let comment = self
            .find_comment(comment_id)?
            .ok_or_else(|| StoreError::NotFound(format!("comment {comment_id}")))?;
        if comment.user_id != requester_id {
            return Err(StoreError::Forbidden(format!(
                "comment {comment_id} belongs to another user"
            )));
        }
        self.delete_comment_row(comment_id)
    }

    fn save_bill(&self, user_id: &str, bill_id: &str) -> StoreResult<SavedBill> {
        ensure_user(user_id)?;
        if self.find_saved(user_id, bill_id)?.is_some() {
            return Err(StoreError::Conflict(format!("saved bill {bill_id}")));
        }
        self.create_saved(user_id, bill_id)
    }

    fn unsave_bill(&self, user_id: &str, bill_id: &str) -> StoreResult<()> {
        ensure_user(user_id)?;
        if self.find_saved(user_id, bill_id)?.is_none() {
            return Err(StoreError::NotFound(format!("saved bill {bill_id}")));
        }
        self.delete_saved(user_id, bill_id)
    }

    fn is_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<bool> {
        Ok(self.find_saved(user_id, bill_id)?.is_some())
    }
}

/// The single row operation that takes a stored vote to a target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteWrite {
    Keep,
    Create(VoteType),
    Update(i64, VoteType),
    Delete(i64),
}

impl VoteWrite {
    pub fn action(self) -> VoteAction {
        match self {
            VoteWrite::Keep => VoteAction::Unchanged,
            VoteWrite::Create(_) => VoteAction::Created,
            VoteWrite::Update(..) => VoteAction::Updated,
            VoteWrite::Delete(_) => VoteAction::Removed,
        }
    }
}

/// The vote left after pressing `pressed` on top of `current`.
pub fn toggled_vote(current: Option<VoteType>, pressed: VoteType) -> Option<VoteType> {
    if current == Some(pressed) {
        None
    } else {
        Some(pressed)
    }
}

pub fn plan_vote_write(current: Option<&Vote>, target: Option<VoteType>) -> VoteWrite {
    match (current, target) {
        (None, None) => VoteWrite::Keep,
        (None, Some(vote_type)) => VoteWrite::Create(vote_type),
        (Some(existing), None) => VoteWrite::Delete(existing.id),
        (Some(existing), Some(vote_type)) if existing.vote_type == vote_type => VoteWrite::Keep,
        (Some(existing), Some(vote_type)) => VoteWrite::Update(existing.id, vote_type),
    }
}

fn write_vote<R: Repository + ?Sized>(
    repo: &R,
    user_id: &str,
    bill_id: &str,
    write: VoteWrite,
) -> StoreResult<VoteAction> {
    match write {
        VoteWrite::Keep => {}
        VoteWrite::Create(vote_type) => {
            repo.create_vote(user_id, bill_id, vote_type)?;
        }
        VoteWrite::Update(id, vote_type) => repo.update_vote(id, vote_type)?,
        VoteWrite::Delete(id) => repo.delete_vote(id)?,
    }
    Ok(write.action())
}

pub(crate) fn ensure_user(user_id: &str) -> StoreResult<()> {
    if user_id.trim().is_empty() {
        Err(StoreError::Unauthorized)
    } else {
        Ok(())
    }
}
