// LegiScan HTTP client.
//
// Every LegiScan operation is a GET against the same base URL with `key` and
// `op` query parameters. Response bodies are handed to the parsers in
// `response`, so this module only deals with transport and errors.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use civic_core::config::Config;

use crate::response::{self, BillDetail, Masterlist, SearchHit, SessionInfo};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LegiScanError {
    #[error("LegiScan API key not configured")]
    NotConfigured,

    #[error("LegiScan request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LegiScan returned HTTP {0}")]
    Status(u16),

    #[error("LegiScan error: {0}")]
    Api(String),

    #[error("malformed LegiScan response: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// LegiScanClient
// ---------------------------------------------------------------------------

/// Low-level client bound to one API key.
pub struct LegiScanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LegiScanClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, LegiScanError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Fetch the raw body for `op`. The API key is never logged.
    async fn call(&self, op: &str, params: &[(&str, String)]) -> Result<String, LegiScanError> {
        debug!(op, ?params, "LegiScan request");

        let mut query: Vec<(&str, &str)> = vec![("key", self.api_key.as_str()), ("op", op)];
        query.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self.http.get(&self.base_url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(op, status = status.as_u16(), "LegiScan request rejected");
            return Err(LegiScanError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    pub async fn get_bill(&self, bill_id: &str) -> Result<BillDetail, LegiScanError> {
        let body = self.call("getBill", &[("id", bill_id.to_string())]).await?;
        response::parse_bill(&body)
    }

    /// Current-session masterlist for a state (`US` for Congress).
    pub async fn master_list_for_state(&self, state: &str) -> Result<Masterlist, LegiScanError> {
        let state = state.to_ascii_uppercase();
        let body = self.call("getMasterList", &[("state", state.clone())]).await?;
        response::parse_masterlist(&body, Some(&state))
    }

    /// Masterlist for a specific session. Sessions carry no state in the
    /// masterlist payload, so `state` labels the returned bills.
    pub async fn master_list_for_session(
        &self,
        session_id: i64,
        state: Option<&str>,
    ) -> Result<Masterlist, LegiScanError> {
        let body = self
            .call("getMasterList", &[("id", session_id.to_string())])
            .await?;
        response::parse_masterlist(&body, state)
    }

    pub async fn session_list(&self, state: &str) -> Result<Vec<SessionInfo>, LegiScanError> {
        let body = self
            .call("getSessionList", &[("state", state.to_ascii_uppercase())])
            .await?;
        response::parse_sessions(&body)
    }

    pub async fn search(&self, state: &str, query: &str) -> Result<Vec<SearchHit>, LegiScanError> {
        let body = self
            .call(
                "search",
                &[("state", state.to_ascii_uppercase()), ("query", query.to_string())],
            )
            .await?;
        response::parse_search(&body)
    }
}

// ---------------------------------------------------------------------------
// LegiScan
// ---------------------------------------------------------------------------

/// Client wrapper that degrades to `NotConfigured` errors when no API key
/// is available, so callers don't have to branch on configuration.
pub enum LegiScan {
    Active(LegiScanClient),
    Disabled,
}

impl LegiScan {
    /// `Active` when an API key is present in credentials, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Result<Self, LegiScanError> {
        match &config.credentials.legiscan_api_key {
            Some(key) if !key.trim().is_empty() => {
                let client = LegiScanClient::new(
                    config.legiscan.base_url.clone(),
                    key.trim().to_string(),
                    Duration::from_secs(config.legiscan.timeout_secs),
                )?;
                Ok(LegiScan::Active(client))
            }
            _ => {
                warn!("no LegiScan API key configured; remote bill data disabled");
                Ok(LegiScan::Disabled)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LegiScan::Active(_))
    }

    fn active(&self) -> Result<&LegiScanClient, LegiScanError> {
        match self {
            LegiScan::Active(client) => Ok(client),
            LegiScan::Disabled => Err(LegiScanError::NotConfigured),
        }
    }

    pub async fn get_bill(&self, bill_id: &str) -> Result<BillDetail, LegiScanError> {
        self.active()?.get_bill(bill_id).await
    }

    pub async fn master_list_for_state(&self, state: &str) -> Result<Masterlist, LegiScanError> {
        self.active()?.master_list_for_state(state).await
    }

    pub async fn master_list_for_session(
        &self,
        session_id: i64,
        state: Option<&str>,
    ) -> Result<Masterlist, LegiScanError> {
        self.active()?.master_list_for_session(session_id, state).await
    }

    pub async fn session_list(&self, state: &str) -> Result<Vec<SessionInfo>, LegiScanError> {
        self.active()?.session_list(state).await
    }

    pub async fn search(&self, state: &str, query: &str) -> Result<Vec<SearchHit>, LegiScanError> {
        self.active()?.search(state, query).await
    }
}
