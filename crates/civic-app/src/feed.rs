// Feed assembly: bills from a source, engagement from the repository,
// ranked by the scorer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use civic_core::config::ScoringConfig;
use civic_core::model::{Bill, EngagementSnapshot, VoteType};
use civic_core::repository::{Repository, StoreError};
use civic_core::scoring::{rank_bills, score_bill, ScoreBreakdown};
use civic_legiscan::{LegiScan, LegiScanError};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Source(#[from] LegiScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("bill {0} not found")]
    UnknownBill(String),
}

// ---------------------------------------------------------------------------
// Bill sources
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BillSource: Send + Sync {
    /// Candidate bills for the feed, in source order.
    async fn bills(&self) -> Result<Vec<Bill>, FeedError>;
    async fn bill(&self, bill_id: &str) -> Result<Bill, FeedError>;
}

/// Current-session masterlists for a set of jurisdictions. The client is
/// shared with direct LegiScan lookups.
pub struct LegiScanSource {
    client: Arc<LegiScan>,
    states: Vec<String>,
}

impl LegiScanSource {
    pub fn new(client: Arc<LegiScan>, states: Vec<String>) -> Self {
        Self { client, states }
    }
}

#[async_trait]
impl BillSource for LegiScanSource {
    async fn bills(&self) -> Result<Vec<Bill>, FeedError> {
        let lists = join_all(self.states.iter().map(|s| self.client.master_list_for_state(s))).await;
        let mut bills = Vec::new();
        for list in lists {
            bills.extend(list?.bills);
        }
        Ok(bills)
    }

    async fn bill(&self, bill_id: &str) -> Result<Bill, FeedError> {
        Ok(self.client.get_bill(bill_id).await?.bill)
    }
}

/// Fixed bill list; used offline and in tests.
pub struct StaticSource {
    bills: Vec<Bill>,
}

impl StaticSource {
    pub fn new(bills: Vec<Bill>) -> Self {
        Self { bills }
    }
}

#[async_trait]
impl BillSource for StaticSource {
    async fn bills(&self) -> Result<Vec<Bill>, FeedError> {
        Ok(self.bills.clone())
    }

    async fn bill(&self, bill_id: &str) -> Result<Bill, FeedError> {
        self.bills
            .iter()
            .find(|b| b.id == bill_id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownBill(bill_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Feed items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub bill: Bill,
    pub score: ScoreBreakdown,
    pub upvotes: u32,
    pub downvotes: u32,
    /// The viewer's own vote; always `None` for anonymous viewers.
    pub user_vote: Option<VoteType>,
    pub comment_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedItem {
    pub bill: Bill,
    pub saved_at: DateTime<Utc>,
}

pub struct FeedService {
    source: Arc<dyn BillSource>,
    repo: Arc<dyn Repository>,
    weights: ScoringConfig,
}

impl FeedService {
    pub fn new(source: Arc<dyn BillSource>, repo: Arc<dyn Repository>, weights: ScoringConfig) -> Self {
        Self { source, repo, weights }
    }

    /// All source bills ranked best-first.
    pub async fn feed(&self, viewer: Option<&str>, today: NaiveDate) -> Result<Vec<FeedItem>, FeedError> {
        let bills = self.source.bills().await?;
        debug!("Ranking {} bills", bills.len());

        let with_engagement = bills
            .into_iter()
            .map(|bill| {
                let engagement = self.repo.engagement(&bill.id)?;
                Ok((bill, engagement))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        rank_bills(with_engagement, today, &self.weights)
            .into_iter()
            .map(|(bill, engagement, score)| self.item(bill, engagement, score, viewer))
            .collect()
    }

    /// One bill with its score and engagement.
    pub async fn bill(&self, bill_id: &str, viewer: Option<&str>, today: NaiveDate) -> Result<FeedItem, FeedError> {
        let bill = self.source.bill(bill_id).await?;
        let engagement = self.repo.engagement(&bill.id)?;
        let score = score_bill(&bill, &engagement, today, &self.weights);
        self.item(bill, engagement, score, viewer)
    }

    /// The user's saved bills, most recently saved first. Bill details are
    /// fetched concurrently; bills the source no longer knows are skipped.
    pub async fn saved(&self, user_id: &str) -> Result<Vec<SavedItem>, FeedError> {
        let saved = self.repo.saved_for_user(user_id)?;
        let details = join_all(saved.iter().map(|s| self.source.bill(&s.bill_id))).await;

        let mut items = Vec::with_capacity(saved.len());
        for (entry, detail) in saved.into_iter().zip(details) {
            match detail {
                Ok(bill) => items.push(SavedItem {
                    bill,
                    saved_at: entry.saved_at,
                }),
                Err(e) => warn!("Skipping saved bill {}: {e}", entry.bill_id),
            }
        }
        Ok(items)
    }

    /// Saved bills whose title or number contains `query`, ignoring case.
    /// A blank query matches everything.
    pub async fn search_saved(&self, user_id: &str, query: &str) -> Result<Vec<SavedItem>, FeedError> {
        let needle = query.trim().to_lowercase();
        let items = self.saved(user_id).await?;
        if needle.is_empty() {
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .filter(|item| {
                item.bill.title.to_lowercase().contains(&needle)
                    || item.bill.number.to_lowercase().contains(&needle)
            })
            .collect())
    }

    fn item(
        &self,
        bill: Bill,
        engagement: EngagementSnapshot,
        score: ScoreBreakdown,
        viewer: Option<&str>,
    ) -> Result<FeedItem, FeedError> {
        let user_vote = match viewer {
            Some(user_id) => self.repo.user_vote(user_id, &bill.id)?,
            None => None,
        };
        Ok(FeedItem {
            bill,
            score,
            upvotes: engagement.upvotes,
            downvotes: engagement.downvotes,
            user_vote,
            comment_count: engagement.comments,
        })
    }
}
