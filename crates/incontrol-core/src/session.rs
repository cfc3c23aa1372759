// ── Session ──
//
// Lifecycle of one authorized InControl2 account: token load and refresh,
// hierarchy discovery, periodic polling of every registered device and
// shutdown of the poll task.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use incontrol_api::{ApiConnection, OAuthClient, TokenRecord};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::SessionConfig;
use crate::device::Device;
use crate::discovery::Discovery;
use crate::error::CoreError;
use crate::model::Org;
use crate::registry::DeviceRegistry;
use crate::store::TokenStore;

/// Result of one `update_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Devices that performed a real update.
    pub updated: usize,
    /// Devices suppressed by their throttle window.
    pub skipped: usize,
}

/// A connected account. Cheaply cloneable.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    oauth: OAuthClient,
    store: Arc<dyn TokenStore>,
    connection: Arc<ApiConnection>,
    registry: DeviceRegistry,
    orgs: Vec<Org>,
    /// Serializes token refreshes so two passes never refresh twice.
    token_guard: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    // ── Authorization flow ───────────────────────────────────────────

    /// The consent page the user has to visit to obtain a code.
    pub fn authorize_url(config: &SessionConfig) -> Result<Url, CoreError> {
        Ok(config.oauth_client()?.build_authorization_url())
    }

    /// Exchange an authorization code and persist the resulting token.
    pub async fn complete_authorization(
        config: &SessionConfig,
        store: &dyn TokenStore,
        code: &str,
    ) -> Result<TokenRecord, CoreError> {
        let token = config.oauth_client()?.exchange_code(code.trim()).await?;
        store.save(&token)?;
        info!(expires_at = token.expires_at, "authorization complete, token stored");
        Ok(token)
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Load and refresh the stored token, then discover the account.
    ///
    /// Fails with `ReauthenticationRequired` when no usable token exists
    /// and with `NoOrganizations` when discovery finds nothing.
    pub async fn connect(
        config: SessionConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, CoreError> {
        let Some(stored) = store.load()? else {
            return Err(CoreError::ReauthenticationRequired {
                reason: "no token stored for this profile".into(),
            });
        };

        let oauth = config.oauth_client()?;
        let token = oauth
            .refresh(Some(stored.clone()))
            .await
            .map_err(reauthentication)?;
        if token != stored {
            store.save(&token)?;
        }

        let connection = Arc::new(config.connection(token)?);
        let registry = DeviceRegistry::new();
        let orgs = Discovery::new(&connection, &registry, config.min_update_interval)
            .discover_orgs()
            .await;
        if orgs.is_empty() {
            error!("no organizations found");
            return Err(CoreError::NoOrganizations);
        }
        info!(orgs = orgs.len(), devices = registry.len(), "connected to InControl2");

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                oauth,
                store,
                connection,
                registry,
                orgs,
                token_guard: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                poll_handle: Mutex::new(None),
            }),
        })
    }

    /// Spawn the periodic `update_all` task. A zero scan interval or a
    /// second call is a no-op.
    pub fn start_polling(&self) {
        let interval = self.inner.config.scan_interval;
        if interval.is_zero() {
            debug!("polling disabled");
            return;
        }

        let mut handle = self.inner.poll_handle.lock().expect("poll handle lock poisoned");
        if handle.is_some() {
            return;
        }
        *handle = Some(tokio::spawn(poll_task(
            Arc::downgrade(&self.inner),
            interval,
            self.inner.cancel.clone(),
        )));
        info!(interval_secs = interval.as_secs(), "polling started");
    }

    /// Cancel the poll task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self
            .inner
            .poll_handle
            .lock()
            .expect("poll handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!("session shut down");
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Refresh the token if due, persisting and installing the new one.
    pub async fn ensure_token(&self) -> Result<(), CoreError> {
        let _guard = self.inner.token_guard.lock().await;

        let current = self.inner.connection.token();
        let refreshed = self
            .inner
            .oauth
            .refresh(Some(current.clone()))
            .await
            .map_err(reauthentication)?;
        if refreshed != current {
            self.inner.store.save(&refreshed)?;
            self.inner.connection.set_token(refreshed);
        }
        Ok(())
    }

    /// Update every registered device, one at a time.
    ///
    /// A token refresh failure aborts the pass. Individual devices never
    /// fail it: their fetch errors are absorbed inside `Device::update`.
    pub async fn update_all(&self) -> Result<UpdateSummary, CoreError> {
        self.ensure_token().await?;

        let mut summary = UpdateSummary::default();
        for device in self.inner.registry.all() {
            if device.update().await {
                summary.updated += 1;
            } else {
                warn!(device = %device.key(), "update skipped (throttled)");
                summary.skipped += 1;
            }
        }
        info!(updated = summary.updated, skipped = summary.skipped, "update pass complete");
        Ok(summary)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn connection(&self) -> &Arc<ApiConnection> {
        &self.inner.connection
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    /// The organization tree found at connect time.
    pub fn orgs(&self) -> &[Org] {
        &self.inner.orgs
    }

    /// Every registered device, in discovery order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.inner.registry.all()
    }

    /// Resolve a device by full key or unambiguous device id.
    pub fn device(&self, identifier: &str) -> Result<Arc<Device>, CoreError> {
        self.inner
            .registry
            .find(identifier)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: identifier.to_owned(),
            })
    }

    /// The token currently attached to requests.
    pub fn token(&self) -> TokenRecord {
        self.inner.connection.token()
    }
}

fn reauthentication(err: incontrol_api::Error) -> CoreError {
    error!(error = %err, "token refresh failed");
    CoreError::ReauthenticationRequired {
        reason: err.to_string(),
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Holds the session weakly: once every `Session` handle is gone the
/// inner state drops, cancels the token and this loop exits.
async fn poll_task(weak: Weak<SessionInner>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // discovery already polled every device

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = weak.upgrade() else { break };
                let session = Session { inner };
                if let Err(e) = session.update_all().await {
                    warn!(error = %e, "periodic update failed");
                }
            }
        }
    }
    debug!("poll task stopped");
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
