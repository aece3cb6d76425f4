use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::error::ClassifiedError;
use crate::pipeline::descriptor::{Outcome, RequestDescriptor};
use crate::pipeline::module::RequestModule;
use crate::security::token_store::TokenStorage;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
}

enum RefreshRole {
    Leader(broadcast::Sender<Option<String>>),
    Follower(broadcast::Receiver<Option<String>>),
}

/// Attaches the bearer credential and coordinates token refresh.
///
/// Per request the state is evaluated fresh: an access token is attached
/// directly; with only a refresh token the caller joins the single-flight
/// refresh; with neither the request is rejected without touching the
/// network.
///
/// Refresh coordination is a single-slot in-flight broadcast: the slot being
/// occupied *is* the "refresh in progress" state. The first caller installs
/// a sender and performs exactly one network call; everyone arriving while
/// the slot is occupied subscribes and waits for the broadcast result. The
/// slot is cleared on every exit path before the result is published.
pub struct AuthManager {
    storage: Arc<dyn TokenStorage>,
    http: reqwest::Client,
    refresh_url: String,
    refresh_slot: Mutex<Option<broadcast::Sender<Option<String>>>>,
}

impl AuthManager {
    pub fn new(
        storage: Arc<dyn TokenStorage>,
        http: reqwest::Client,
        refresh_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            http,
            refresh_url: refresh_url.into(),
            refresh_slot: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.storage
    }

    pub async fn is_refreshing(&self) -> bool {
        self.refresh_slot.lock().await.is_some()
    }

    /// Resolve a usable access token, refreshing if necessary.
    pub async fn ensure_access_token(&self) -> Result<String, ClassifiedError> {
        if let Some(token) = self.storage.access_token() {
            return Ok(token);
        }
        if self.storage.refresh_token().is_none() {
            self.storage.clear_tokens();
            return Err(ClassifiedError::auth("no refresh token"));
        }
        self.refresh_access_token().await
    }

    /// Entry point for 401 recovery: the stored access token was rejected by
    /// the server, so go through the shared refresh coordination once.
    pub async fn refresh_after_unauthorized(&self) -> Result<String, ClassifiedError> {
        if self.storage.refresh_token().is_none() {
            self.storage.clear_tokens();
            return Err(ClassifiedError::auth("no refresh token"));
        }
        self.refresh_access_token().await
    }

    async fn refresh_access_token(&self) -> Result<String, ClassifiedError> {
        let role = {
            let mut slot = self.refresh_slot.lock().await;
            match slot.as_ref() {
                Some(tx) => RefreshRole::Follower(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    *slot = Some(tx.clone());
                    RefreshRole::Leader(tx)
                }
            }
        };

        match role {
            RefreshRole::Leader(tx) => {
                let result = self.perform_refresh().await;
                // slot must be empty again before anyone observes the result
                {
                    let mut slot = self.refresh_slot.lock().await;
                    *slot = None;
                }
                match result {
                    Ok(token) => {
                        let _ = tx.send(Some(token.clone()));
                        Ok(token)
                    }
                    Err(error) => {
                        self.storage.clear_tokens();
                        let _ = tx.send(None);
                        Err(error)
                    }
                }
            }
            RefreshRole::Follower(mut rx) => {
                debug!("token refresh already in flight, waiting for result");
                match rx.recv().await {
                    Ok(Some(token)) => Ok(token),
                    _ => Err(ClassifiedError::auth("token refresh failed")),
                }
            }
        }
    }

    async fn perform_refresh(&self) -> Result<String, ClassifiedError> {
        let refresh_token = self
            .storage
            .refresh_token()
            .ok_or_else(|| ClassifiedError::auth("no refresh token"))?;

        info!(url = %self.refresh_url, "refreshing access token");
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| ClassifiedError::from_reqwest(&self.refresh_url, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "token refresh rejected");
            return Err(
                ClassifiedError::auth(format!("refresh rejected with status {}", status.as_u16()))
                    .with_status(status.as_u16())
                    .with_url(&self.refresh_url),
            );
        }

        let tokens: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ClassifiedError::auth(format!("malformed refresh response: {e}")))?;
        self.storage
            .set_tokens(tokens.access_token.clone(), tokens.refresh_token);
        info!("access token refreshed");
        Ok(tokens.access_token)
    }

    fn bearer(token: &str) -> Result<HeaderValue, ClassifiedError> {
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClassifiedError::auth("token contains invalid header characters"))
    }
}

#[async_trait]
impl RequestModule for AuthManager {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn on_request(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<Outcome, ClassifiedError> {
        let token = self.ensure_access_token().await?;
        descriptor.headers.insert(AUTHORIZATION, Self::bearer(&token)?);
        Ok(Outcome::Proceed)
    }
}
