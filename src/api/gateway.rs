//! Authenticated request gateway.
//!
//! Every outbound call goes through [`Gateway::send`], which attaches the
//! stored access credential and recovers from expiry on a 401:
//!
//! - the first caller to see a 401 drives a single refresh;
//! - callers that see a 401 while it is in flight queue behind it;
//! - everyone replays once with the refreshed credential;
//! - if the refresh fails, the session is torn down, every participant is
//!   rejected, and a [`SessionEvent::Expired`] is broadcast.
//!
//! Non-401 responses and transport errors pass through untouched.
//!
//! [`SessionEvent::Expired`]: crate::session::SessionEvent::Expired

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use super::coordinator::{RefreshCoordinator, Role, Settlement};
use super::refresh::{is_refresh_target, request_refresh, DEFAULT_REFRESH_PATH};
use super::request::{ApiResponse, Attempt, RequestDescriptor};
use super::transport::{HttpTransport, Transport};
use crate::auth::{
    default_credentials_path, CredentialKeys, CredentialPair, CredentialStore, Credentials,
    FileStore, MemoryStore, SessionHealth, StoreError,
};
use crate::config::{Config, StorageBackend};
use crate::error::{ConfigError, GatewayError, RefreshError};
use crate::session::{SessionEvent, SessionEvents};

/// Tunables for refresh handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Path of the refresh endpoint; a 401 from it is always fatal.
    pub refresh_path: String,
    /// Longest time a queued caller waits for the in-flight refresh.
    pub refresh_wait_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Sends requests with automatic bearer attachment and single-flight refresh.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    coordinator: RefreshCoordinator,
    events: SessionEvents,
    options: GatewayOptions,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        keys: CredentialKeys,
        options: GatewayOptions,
    ) -> Self {
        Self {
            transport,
            credentials: Credentials::new(store, keys),
            coordinator: RefreshCoordinator::new(),
            events: SessionEvents::new(),
            options,
        }
    }

    /// Build an HTTP-backed gateway from resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(&config.api.base_url, config.api.timeout());
        let store: Arc<dyn CredentialStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::File => {
                let path = config
                    .storage
                    .path
                    .as_deref()
                    .map(PathBuf::from)
                    .or_else(default_credentials_path)
                    .ok_or_else(|| {
                        ConfigError::Invalid(
                            "unable to resolve a credential file path; set storage.path"
                                .to_string(),
                        )
                    })?;
                Arc::new(FileStore::new(path))
            }
        };
        let options = GatewayOptions {
            refresh_path: config.api.refresh_path.clone(),
            refresh_wait_timeout: config.api.refresh_wait_timeout(),
        };
        Ok(Self::new(
            Arc::new(transport),
            store,
            config.storage.keys(),
            options,
        ))
    }

    /// Send one request, transparently recovering from access-credential expiry.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse, GatewayError> {
        let mut attempt = Attempt::Initial;
        let mut bearer = self.with_store(Credentials::access_token).await?;
        loop {
            let response = self.dispatch(request, bearer.as_deref(), attempt).await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }
            if attempt.is_replay() {
                tracing::warn!(request = %request.label(), "replay rejected again; giving up");
                return Err(GatewayError::Unauthorized(response));
            }
            bearer = Some(self.recover(request, bearer.as_deref(), response).await?);
            attempt = Attempt::Replay;
        }
    }

    /// Store credentials issued by a login flow.
    ///
    /// Like [`Gateway::logout`] and [`Gateway::session_health`], this touches
    /// the store synchronously.
    pub fn initialize_session(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.credentials.store_pair(pair)
    }

    /// Delete stored credentials. Does not broadcast [`SessionEvent::Expired`].
    pub fn logout(&self) -> Result<bool, StoreError> {
        self.credentials.clear()
    }

    pub fn session_health(&self) -> Result<SessionHealth, StoreError> {
        self.credentials.health()
    }

    /// Whether both credentials are stored.
    pub fn has_session(&self) -> Result<bool, StoreError> {
        Ok(self.credentials.health()?.is_logged_in())
    }

    /// Subscribe to session lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    /// Number of callers currently queued behind an in-flight refresh.
    pub fn pending_len(&self) -> usize {
        self.coordinator.pending_len()
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        bearer: Option<&str>,
        attempt: Attempt,
    ) -> Result<ApiResponse, GatewayError> {
        tracing::debug!(
            request = %request.label(),
            ?attempt,
            authenticated = bearer.is_some(),
            "dispatching"
        );
        let response = self.transport.dispatch(request, bearer).await?;
        tracing::debug!(request = %request.label(), status = response.status, "response");
        Ok(response)
    }

    /// Obtain a credential to replay a request that just received a 401.
    async fn recover(
        &self,
        request: &RequestDescriptor,
        sent_bearer: Option<&str>,
        response: ApiResponse,
    ) -> Result<String, GatewayError> {
        if is_refresh_target(&request.path, &self.options.refresh_path) {
            tracing::warn!(request = %request.label(), "refresh endpoint rejected the caller");
            self.expire_session(RefreshError::Rejected {
                status: response.status,
                body: response.text(),
            })
            .await;
            return Err(GatewayError::Unauthorized(response));
        }

        // Another cycle already replaced the credential this request carried.
        if let Some(current) = self.with_store(Credentials::access_token).await? {
            if Some(current.as_str()) != sent_bearer {
                tracing::debug!(
                    request = %request.label(),
                    "replaying with newer stored credential"
                );
                return Ok(current);
            }
        }

        let authenticated = sent_bearer.is_some();
        loop {
            let settlement = match self.coordinator.begin_or_enqueue(request.label()) {
                Role::Driver(guard) => guard.settle(self.refresh_credential(authenticated).await),
                Role::Follower(receiver) => self.await_settlement(receiver).await?,
            };
            match settlement {
                Ok(access) => return Ok(access),
                // The driver went away without an answer; coordinate again.
                Err(reason) if !reason.is_fatal() => continue,
                Err(reason) => return Err(GatewayError::SessionExpired(reason)),
            }
        }
    }

    async fn await_settlement(
        &self,
        receiver: oneshot::Receiver<Settlement>,
    ) -> Result<Settlement, GatewayError> {
        let wait = self.options.refresh_wait_timeout;
        match tokio::time::timeout(wait, receiver).await {
            Ok(Ok(settlement)) => Ok(settlement),
            Ok(Err(_closed)) => Ok(Err(RefreshError::Abandoned)),
            Err(_elapsed) => {
                tracing::warn!(?wait, "gave up waiting for in-flight refresh");
                Err(GatewayError::RefreshWaitTimeout(wait))
            }
        }
    }

    /// Exchange the stored refresh credential for a new access credential.
    ///
    /// Any failure tears the session down before the cycle settles.
    async fn refresh_credential(&self, authenticated: bool) -> Settlement {
        let stored = self
            .with_store(|credentials| {
                Ok((credentials.access_token()?, credentials.refresh_token()?))
            })
            .await;
        let refresh_token = match stored {
            Ok((_, Some(token))) => token,
            // An earlier fatal cycle or a logout already ended the session this
            // request was sent under; it was broadcast then.
            Ok((None, None)) if authenticated => {
                tracing::debug!("credentials cleared while request was in flight");
                return Err(RefreshError::MissingRefreshToken);
            }
            Ok((_, None)) => return self.fail_cycle(RefreshError::MissingRefreshToken).await,
            Err(err) => return self.fail_cycle(RefreshError::Storage(err.to_string())).await,
        };

        tracing::info!(endpoint = %self.options.refresh_path, "refreshing access credential");
        let refreshed = request_refresh(
            self.transport.as_ref(),
            &self.options.refresh_path,
            &refresh_token,
        )
        .await;
        let tokens = match refreshed {
            Ok(tokens) => tokens,
            Err(reason) => return self.fail_cycle(reason).await,
        };

        let access = tokens.access.clone();
        let rotated = tokens.refresh.clone();
        let stored = self
            .with_store(move |credentials| {
                credentials.store_refreshed(&access, rotated.as_deref())
            })
            .await;
        if let Err(err) = stored {
            return self.fail_cycle(RefreshError::Storage(err.to_string())).await;
        }
        tracing::info!(rotated = tokens.refresh.is_some(), "access credential refreshed");
        Ok(tokens.access)
    }

    async fn fail_cycle(&self, reason: RefreshError) -> Settlement {
        self.expire_session(reason.clone()).await;
        Err(reason)
    }

    async fn expire_session(&self, reason: RefreshError) {
        if let Err(err) = self.with_store(Credentials::clear).await {
            tracing::warn!(error = %err, "failed to clear credentials after session expiry");
        }
        self.events.publish_expired(reason);
    }

    /// Run a credential store operation on the blocking pool.
    ///
    /// File-backed stores decrypt on first read and re-encrypt on every write.
    async fn with_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Credentials) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || op(&credentials))
            .await
            .map_err(|err| StoreError::Background(err.to_string()))?
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("options", &self.options)
            .field("refreshing", &self.is_refreshing())
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}
