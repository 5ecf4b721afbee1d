// Optimistic mutation reconciler.
//
// Owns the displayed value of every tracked entity for one signed-in user.
// A toggle is applied to the displayed value immediately and produces a
// `Dispatch` for the remote write. Writes for the same entity run one at a
// time in issue order; further toggles queue behind the outstanding one,
// each layered on the already-optimistic value. When a write fails the
// display snaps back to that write's previous value and everything queued
// behind it is dropped.
//
// The reconciler does no I/O. It returns `Effect`s and the event loop in
// `app` performs them.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use civic_core::model::VoteType;

use crate::protocol::{
    DisplayValue, EntityKey, EntityKind, Mutation, Notification, UiUpdate, VoteState,
};
use crate::remote::RemoteError;
use crate::session::{signed_in_user, Identity, User};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("{0} is not attached")]
    NotAttached(EntityKey),
}

/// A remote write the caller must perform and report back via `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub key: EntityKey,
    pub generation: u64,
    pub user_id: String,
    pub mutation: Mutation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Ui(UiUpdate),
    Dispatch(Dispatch),
}

// ---------------------------------------------------------------------------
// Pure transitions
// ---------------------------------------------------------------------------

/// Next displayed vote state after the viewer presses `requested`.
///
/// Same type as the current vote removes it, a different type switches it,
/// and no current vote creates one. Counters never go below zero.
pub fn apply_vote_toggle(current: VoteState, requested: VoteType) -> VoteState {
    let mut next = current;
    match current.user_vote {
        Some(existing) if existing == requested => {
            decrement(&mut next, existing);
            next.user_vote = None;
        }
        Some(existing) => {
            decrement(&mut next, existing);
            increment(&mut next, requested);
            next.user_vote = Some(requested);
        }
        None => {
            increment(&mut next, requested);
            next.user_vote = Some(requested);
        }
    }
    next
}

fn increment(state: &mut VoteState, vote: VoteType) {
    match vote {
        VoteType::Upvote => state.upvotes += 1,
        VoteType::Downvote => state.downvotes += 1,
    }
}

fn decrement(state: &mut VoteState, vote: VoteType) {
    match vote {
        VoteType::Upvote => state.upvotes = state.upvotes.saturating_sub(1),
        VoteType::Downvote => state.downvotes = state.downvotes.saturating_sub(1),
    }
}

// ---------------------------------------------------------------------------
// Per-entity state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Pending {
    mutation: Mutation,
    /// Displayed value right before this toggle was applied.
    previous: DisplayValue,
}

#[derive(Debug)]
struct EntityState {
    displayed: DisplayValue,
    in_flight: Option<Pending>,
    queued: VecDeque<Pending>,
    generation: u64,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    user: User,
    entities: HashMap<EntityKey, EntityState>,
    /// Source of per-attachment generations. Never reused, so results from
    /// a detached entity can't match a later re-attachment.
    next_generation: u64,
}

impl Reconciler {
    pub fn new(user: User) -> Self {
        Self {
            user,
            entities: HashMap::new(),
            next_generation: 0,
        }
    }

    /// `None` when nobody is signed in: toggles are unavailable.
    pub fn for_identity(identity: &dyn Identity, now: DateTime<Utc>) -> Option<Self> {
        signed_in_user(identity, now).map(Self::new)
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn displayed(&self, key: &EntityKey) -> Option<DisplayValue> {
        self.entities.get(key).map(|e| e.displayed)
    }

    /// Number of writes for `key` not yet resolved, including the in-flight one.
    pub fn pending(&self, key: &EntityKey) -> usize {
        self.entities
            .get(key)
            .map_or(0, |e| e.queued.len() + usize::from(e.in_flight.is_some()))
    }

    /// Start tracking `bill_id` with a server-confirmed value. Attaching an
    /// entity that is already tracked keeps the current displayed value.
    pub fn attach(&mut self, bill_id: &str, initial: DisplayValue) -> Vec<Effect> {
        let key = EntityKey {
            bill_id: bill_id.to_string(),
            kind: initial.kind(),
        };
        if let Some(existing) = self.entities.get(&key) {
            debug!("{key} already attached");
            return vec![display(&key, existing.displayed)];
        }

        self.next_generation += 1;
        self.entities.insert(
            key.clone(),
            EntityState {
                displayed: initial,
                in_flight: None,
                queued: VecDeque::new(),
                generation: self.next_generation,
            },
        );
        vec![display(&key, initial)]
    }

    /// Drop displayed state and queued writes. An in-flight write is left to
    /// finish; its completion no longer matches any generation.
    pub fn detach(&mut self, key: &EntityKey) -> Vec<Effect> {
        match self.entities.remove(key) {
            Some(state) => {
                if state.in_flight.is_some() || !state.queued.is_empty() {
                    info!(
                        "Detached {key} with {} queued write(s) dropped",
                        state.queued.len()
                    );
                }
                vec![Effect::Ui(UiUpdate::Detached(key.clone()))]
            }
            None => Vec::new(),
        }
    }

    pub fn toggle_vote(&mut self, bill_id: &str, vote_type: VoteType) -> Result<Vec<Effect>, ReconcileError> {
        let key = EntityKey::vote(bill_id);
        self.toggle(key, |displayed| match displayed {
            DisplayValue::Vote(state) => {
                let next = apply_vote_toggle(state, vote_type);
                (DisplayValue::Vote(next), Mutation::SetVote(next.user_vote))
            }
            // Keys are derived from the value's kind, so this arm is unreachable
            // in practice.
            other => (other, Mutation::SetVote(Some(vote_type))),
        })
    }

    pub fn toggle_save(&mut self, bill_id: &str) -> Result<Vec<Effect>, ReconcileError> {
        let key = EntityKey::save(bill_id);
        self.toggle(key, |displayed| match displayed {
            DisplayValue::Saved(saved) => (DisplayValue::Saved(!saved), Mutation::SetSaved(!saved)),
            other => (other, Mutation::SetSaved(true)),
        })
    }

    fn toggle(
        &mut self,
        key: EntityKey,
        transition: impl FnOnce(DisplayValue) -> (DisplayValue, Mutation),
    ) -> Result<Vec<Effect>, ReconcileError> {
        let state = self
            .entities
            .get_mut(&key)
            .ok_or_else(|| ReconcileError::NotAttached(key.clone()))?;

        let previous = state.displayed;
        let (next, mutation) = transition(previous);
        state.displayed = next;

        let mut effects = vec![display(&key, next)];
        let pending = Pending { mutation, previous };

        if state.in_flight.is_none() {
            state.in_flight = Some(pending);
            effects.push(Effect::Dispatch(Dispatch {
                key: key.clone(),
                generation: state.generation,
                user_id: self.user.id.clone(),
                mutation,
            }));
        } else {
            state.queued.push_back(pending);
            debug!("{key}: queued write ({} waiting)", state.queued.len());
        }
        Ok(effects)
    }

    /// Apply the outcome of a dispatched write. Stale generations and
    /// unknown entities are ignored.
    pub fn complete(
        &mut self,
        key: &EntityKey,
        generation: u64,
        result: Result<(), RemoteError>,
    ) -> Vec<Effect> {
        let Some(state) = self.entities.get_mut(key) else {
            debug!("{key}: ignoring completion for detached entity");
            return Vec::new();
        };
        if state.generation != generation {
            debug!(
                "{key}: ignoring stale completion (gen {generation}, current {})",
                state.generation
            );
            return Vec::new();
        }
        let Some(finished) = state.in_flight.take() else {
            warn!("{key}: completion with nothing in flight");
            return Vec::new();
        };

        match result {
            Ok(()) => {
                let mut effects = vec![Effect::Ui(UiUpdate::Invalidate(key.clone()))];
                if let Some(next) = state.queued.pop_front() {
                    effects.push(Effect::Dispatch(Dispatch {
                        key: key.clone(),
                        generation: state.generation,
                        user_id: self.user.id.clone(),
                        mutation: next.mutation,
                    }));
                    state.in_flight = Some(next);
                }
                effects
            }
            Err(err) => {
                let dropped = state.queued.len();
                state.queued.clear();
                state.displayed = finished.previous;
                warn!("{key}: write failed ({err}); rolled back, {dropped} queued write(s) dropped");
                vec![
                    display(key, finished.previous),
                    Effect::Ui(UiUpdate::Notify(Notification::error(failure_message(
                        key.kind, &err,
                    )))),
                ]
            }
        }
    }
}

fn display(key: &EntityKey, value: DisplayValue) -> Effect {
    Effect::Ui(UiUpdate::Display {
        key: key.clone(),
        value,
    })
}

fn failure_message(kind: EntityKind, err: &RemoteError) -> String {
    match kind {
        EntityKind::Vote => format!("Failed to record vote: {err}"),
        EntityKind::Save => format!("Failed to update saved bill: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::model::VoteType::{Downvote, Upvote};

    fn vote(user_vote: Option<VoteType>, upvotes: u32, downvotes: u32) -> VoteState {
        VoteState {
            user_vote,
            upvotes,
            downvotes,
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(User::new("u1"))
    }

    fn dispatches(effects: &[Effect]) -> Vec<Dispatch> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Dispatch(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    fn failure() -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("offline".into()))
    }

    // -- pure vote transitions --

    #[test]
    fn vote_with_none_creates() {
        assert_eq!(apply_vote_toggle(vote(None, 4, 1), Upvote), vote(Some(Upvote), 5, 1));
        assert_eq!(apply_vote_toggle(vote(None, 4, 1), Downvote), vote(Some(Downvote), 4, 2));
    }

    #[test]
    fn same_vote_removes() {
        assert_eq!(apply_vote_toggle(vote(Some(Upvote), 5, 1), Upvote), vote(None, 4, 1));
        assert_eq!(apply_vote_toggle(vote(Some(Downvote), 5, 1), Downvote), vote(None, 5, 0));
    }

    #[test]
    fn different_vote_switches() {
        assert_eq!(apply_vote_toggle(vote(Some(Upvote), 5, 1), Downvote), vote(Some(Downvote), 4, 2));
        assert_eq!(apply_vote_toggle(vote(Some(Downvote), 5, 1), Upvote), vote(Some(Upvote), 6, 0));
    }

    #[test]
    fn counters_never_underflow() {
        assert_eq!(apply_vote_toggle(vote(Some(Upvote), 0, 0), Upvote), vote(None, 0, 0));
    }

    // -- reconciler --

    #[test]
    fn no_signed_in_user_means_no_reconciler() {
        let identity = crate::session::StaticIdentity::anonymous();
        assert!(Reconciler::for_identity(&identity, Utc::now()).is_none());
    }

    #[test]
    fn toggle_requires_attach() {
        let mut r = reconciler();
        assert_eq!(
            r.toggle_save("b1").unwrap_err(),
            ReconcileError::NotAttached(EntityKey::save("b1"))
        );
    }

    #[test]
    fn toggle_applies_optimistically_before_dispatch() {
        let mut r = reconciler();
        r.attach("b1", DisplayValue::Vote(vote(None, 2, 0)));
        let effects = r.toggle_vote("b1", Upvote).unwrap();

        assert_eq!(
            effects[0],
            Effect::Ui(UiUpdate::Display {
                key: EntityKey::vote("b1"),
                value: DisplayValue::Vote(vote(Some(Upvote), 3, 0)),
            })
        );
        let sent = dispatches(&effects);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].mutation, Mutation::SetVote(Some(Upvote)));
        assert_eq!(sent[0].user_id, "u1");
    }

    #[test]
    fn vote_writes_carry_the_displayed_end_state() {
        let mut r = reconciler();
        r.attach("b1", DisplayValue::Vote(vote(Some(Upvote), 4, 0)));

        let sent = dispatches(&r.toggle_vote("b1", Upvote).unwrap());
        assert_eq!(sent[0].mutation, Mutation::SetVote(None));
        assert_eq!(
            r.displayed(&EntityKey::vote("b1")),
            Some(DisplayValue::Vote(vote(None, 3, 0)))
        );
    }

    #[test]
    fn success_keeps_value_and_invalidates() {
        let mut r = reconciler();
        let key = EntityKey::save("b1");
        r.attach("b1", DisplayValue::Saved(false));
        let gen = dispatches(&r.toggle_save("b1").unwrap())[0].generation;

        let effects = r.complete(&key, gen, Ok(()));
        assert_eq!(effects, vec![Effect::Ui(UiUpdate::Invalidate(key.clone()))]);
        assert_eq!(r.displayed(&key), Some(DisplayValue::Saved(true)));
        assert_eq!(r.pending(&key), 0);
    }

    #[test]
    fn save_failure_reverts_and_notifies() {
        let mut r = reconciler();
        let key = EntityKey::save("b1");
        r.attach("b1", DisplayValue::Saved(false));
        let gen = dispatches(&r.toggle_save("b1").unwrap())[0].generation;
        assert_eq!(r.displayed(&key), Some(DisplayValue::Saved(true)));

        let effects = r.complete(&key, gen, failure());
        assert_eq!(r.displayed(&key), Some(DisplayValue::Saved(false)));
        assert_eq!(
            effects[0],
            Effect::Ui(UiUpdate::Display {
                key: key.clone(),
                value: DisplayValue::Saved(false)
            })
        );
        assert!(matches!(
            &effects[1],
            Effect::Ui(UiUpdate::Notify(n)) if n.message.contains("saved bill")
        ));
    }

    #[test]
    fn rapid_toggles_queue_and_dispatch_in_order() {
        let mut r = reconciler();
        let key = EntityKey::vote("b1");
        r.attach("b1", DisplayValue::Vote(vote(None, 0, 0)));

        let first = dispatches(&r.toggle_vote("b1", Upvote).unwrap());
        let second = r.toggle_vote("b1", Downvote).unwrap();
        assert_eq!(first.len(), 1);
        assert!(dispatches(&second).is_empty(), "second write must wait");
        assert_eq!(r.displayed(&key), Some(DisplayValue::Vote(vote(Some(Downvote), 0, 1))));
        assert_eq!(r.pending(&key), 2);

        let after_first = r.complete(&key, first[0].generation, Ok(()));
        let next = dispatches(&after_first);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].mutation, Mutation::SetVote(Some(Downvote)));

        r.complete(&key, next[0].generation, Ok(()));
        assert_eq!(r.displayed(&key), Some(DisplayValue::Vote(vote(Some(Downvote), 0, 1))));
        assert_eq!(r.pending(&key), 0);
    }

    #[test]
    fn failure_with_queued_writes_restores_failed_writes_previous_value() {
        let mut r = reconciler();
        let key = EntityKey::save("b1");
        r.attach("b1", DisplayValue::Saved(false));

        let first = dispatches(&r.toggle_save("b1").unwrap());
        r.toggle_save("b1").unwrap();
        r.toggle_save("b1").unwrap();
        assert_eq!(r.pending(&key), 3);

        let effects = r.complete(&key, first[0].generation, failure());
        assert_eq!(r.displayed(&key), Some(DisplayValue::Saved(false)));
        assert_eq!(r.pending(&key), 0);
        assert!(dispatches(&effects).is_empty());
        let notes = effects
            .iter()
            .filter(|e| matches!(e, Effect::Ui(UiUpdate::Notify(_))))
            .count();
        assert_eq!(notes, 1);
    }

    #[test]
    fn failure_of_second_write_keeps_first_result() {
        let mut r = reconciler();
        let key = EntityKey::vote("b1");
        r.attach("b1", DisplayValue::Vote(vote(None, 3, 3)));

        let first = dispatches(&r.toggle_vote("b1", Upvote).unwrap());
        r.toggle_vote("b1", Upvote).unwrap();
        let second = dispatches(&r.complete(&key, first[0].generation, Ok(())));

        r.complete(&key, second[0].generation, failure());
        assert_eq!(r.displayed(&key), Some(DisplayValue::Vote(vote(Some(Upvote), 4, 3))));
    }

    #[test]
    fn other_entities_are_never_blocked() {
        let mut r = reconciler();
        r.attach("b1", DisplayValue::Saved(false));
        r.attach("b2", DisplayValue::Saved(false));
        r.attach("b1", DisplayValue::Vote(vote(None, 0, 0)));

        assert_eq!(dispatches(&r.toggle_save("b1").unwrap()).len(), 1);
        assert_eq!(dispatches(&r.toggle_save("b2").unwrap()).len(), 1);
        assert_eq!(dispatches(&r.toggle_vote("b1", Upvote).unwrap()).len(), 1);
    }

    #[test]
    fn detach_ignores_late_results_even_after_reattach() {
        let mut r = reconciler();
        let key = EntityKey::save("b1");
        r.attach("b1", DisplayValue::Saved(false));
        let old = dispatches(&r.toggle_save("b1").unwrap());
        r.toggle_save("b1").unwrap();

        assert_eq!(r.detach(&key), vec![Effect::Ui(UiUpdate::Detached(key.clone()))]);
        assert_eq!(r.displayed(&key), None);
        assert!(r.complete(&key, old[0].generation, failure()).is_empty());

        r.attach("b1", DisplayValue::Saved(true));
        assert!(r.complete(&key, old[0].generation, failure()).is_empty());
        assert_eq!(r.displayed(&key), Some(DisplayValue::Saved(true)));
    }

    #[test]
    fn reattach_keeps_current_value() {
        let mut r = reconciler();
        let key = EntityKey::save("b1");
        r.attach("b1", DisplayValue::Saved(false));
        r.toggle_save("b1").unwrap();
        r.attach("b1", DisplayValue::Saved(false));
        assert_eq!(r.displayed(&key), Some(DisplayValue::Saved(true)));
        assert_eq!(r.pending(&key), 1);
    }
}
