// Remote side of optimistic mutations: the trait the event loop dispatches
// through, a repository-backed implementation, and bounded retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use civic_core::config::ReconcilerConfig;
use civic_core::repository::{Repository, StoreError};

use crate::protocol::Mutation;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("mutation task failed: {0}")]
    Task(String),
}

impl RemoteError {
    /// Input and permission errors will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Store(StoreError::Backend(_)) => true,
            RemoteError::Store(_) => false,
            RemoteError::Unavailable(_) => true,
            RemoteError::Task(_) => false,
        }
    }
}

#[async_trait]
pub trait MutationRemote: Send + Sync {
    async fn apply(&self, user_id: &str, bill_id: &str, mutation: Mutation) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// Repository-backed remote
// ---------------------------------------------------------------------------

/// Writes mutations straight to a `Repository`. SQLite calls block, so each
/// write runs on the blocking pool.
pub struct RepositoryRemote {
    repo: Arc<dyn Repository>,
}

impl RepositoryRemote {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl MutationRemote for RepositoryRemote {
    async fn apply(&self, user_id: &str, bill_id: &str, mutation: Mutation) -> Result<(), RemoteError> {
        let repo = Arc::clone(&self.repo);
        let user_id = user_id.to_string();
        let bill_id = bill_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            match mutation {
                Mutation::SetVote(target) => {
                    let action = repo.set_vote(&user_id, &bill_id, target)?;
                    debug!(?action, "vote on {bill_id} recorded");
                }
                // Idempotent: the target flag may already hold after a retry.
                Mutation::SetSaved(true) => match repo.save_bill(&user_id, &bill_id) {
                    Ok(_) | Err(StoreError::Conflict(_)) => {}
                    Err(e) => return Err(e),
                },
                Mutation::SetSaved(false) => match repo.unsave_bill(&user_id, &bill_id) {
                    Ok(()) | Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                },
            }
            Ok(())
        })
        .await
        .map_err(|e| RemoteError::Task(e.to_string()))??;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl From<&ReconcilerConfig> for RetryPolicy {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Apply `mutation`, retrying retryable failures with a fixed backoff.
/// Returns the last error once attempts run out.
pub async fn apply_with_retry(
    remote: &dyn MutationRemote,
    policy: RetryPolicy,
    user_id: &str,
    bill_id: &str,
    mutation: Mutation,
) -> Result<(), RemoteError> {
    let mut attempt = 1;
    loop {
        match remote.apply(user_id, bill_id, mutation).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    "{mutation:?} on {bill_id} failed (attempt {attempt}/{}): {err}",
                    policy.max_attempts
                );
                attempt += 1;
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use civic_core::db::Database;
    use civic_core::model::VoteType;

    /// Fails the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> RemoteError,
    }

    #[async_trait]
    impl MutationRemote for Flaky {
        async fn apply(&self, _: &str, _: &str, _: Mutation) -> Result<(), RemoteError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    fn unavailable() -> RemoteError {
        RemoteError::Unavailable("down".into())
    }

    fn unauthorized() -> RemoteError {
        RemoteError::Store(StoreError::Unauthorized)
    }

    fn repo_remote() -> (Arc<Database>, RepositoryRemote) {
        let db = Arc::new(Database::open(":memory:").unwrap());
        let remote = RepositoryRemote::new(db.clone());
        (db, remote)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_within_budget() {
        let remote = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            error: unavailable,
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        };
        let started = tokio::time::Instant::now();
        apply_with_retry(&remote, policy, "u1", "b1", Mutation::SetSaved(true))
            .await
            .unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let remote = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            error: unavailable,
        };
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(10),
        };
        let err = apply_with_retry(&remote, policy, "u1", "b1", Mutation::SetSaved(true))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let remote = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            error: unauthorized,
        };
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Duration::ZERO,
        };
        let err = apply_with_retry(&remote, policy, "u1", "b1", Mutation::SetVote(Some(VoteType::Upvote)))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn policy_from_config_clamps_attempts() {
        let policy = RetryPolicy::from(&ReconcilerConfig {
            max_attempts: 0,
            retry_backoff_ms: 100,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn repository_remote_sets_votes() {
        let (db, remote) = repo_remote();
        remote.apply("u1", "b1", Mutation::SetVote(Some(VoteType::Upvote))).await.unwrap();
        assert_eq!(db.user_vote("u1", "b1").unwrap(), Some(VoteType::Upvote));

        remote.apply("u1", "b1", Mutation::SetVote(Some(VoteType::Downvote))).await.unwrap();
        assert_eq!(db.user_vote("u1", "b1").unwrap(), Some(VoteType::Downvote));

        remote.apply("u1", "b1", Mutation::SetVote(None)).await.unwrap();
        assert_eq!(db.user_vote("u1", "b1").unwrap(), None);
    }

    /// Commits the first write, then reports it as failed.
    struct LostResponse {
        inner: RepositoryRemote,
        calls: AtomicU32,
    }

    #[async_trait]
    impl MutationRemote for LostResponse {
        async fn apply(&self, user_id: &str, bill_id: &str, mutation: Mutation) -> Result<(), RemoteError> {
            self.inner.apply(user_id, bill_id, mutation).await?;
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RemoteError::Unavailable("response lost".into()));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retried_vote_after_lost_response_keeps_target() {
        let (db, inner) = repo_remote();
        let remote = LostResponse {
            inner,
            calls: AtomicU32::new(0),
        };
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(10),
        };
        apply_with_retry(&remote, policy, "u1", "b1", Mutation::SetVote(Some(VoteType::Upvote)))
            .await
            .unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert_eq!(db.user_vote("u1", "b1").unwrap(), Some(VoteType::Upvote));
        assert_eq!(db.votes_for_bill("b1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repository_remote_sets_saved_flag_idempotently() {
        let (db, remote) = repo_remote();
        remote.apply("u1", "b1", Mutation::SetSaved(true)).await.unwrap();
        remote.apply("u1", "b1", Mutation::SetSaved(true)).await.unwrap();
        assert!(db.is_saved("u1", "b1").unwrap());

        remote.apply("u1", "b1", Mutation::SetSaved(false)).await.unwrap();
        remote.apply("u1", "b1", Mutation::SetSaved(false)).await.unwrap();
        assert!(!db.is_saved("u1", "b1").unwrap());
    }

    #[tokio::test]
    async fn repository_remote_rejects_anonymous_writes() {
        let (_db, remote) = repo_remote();
        let err = remote
            .apply("", "b1", Mutation::SetSaved(true))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Store(StoreError::Unauthorized)));
    }
}
