//! Session state and the controller that owns it.
//!
//! SYSTEM CONTEXT
//! ==============
//! Exactly one [`SessionController`] exists per running client. It owns the
//! [`Session`], is the only code that mutates it, and publishes every
//! transition on a `watch` channel so routing and views re-evaluate from the
//! latest snapshot.
//!
//! STATE MACHINE
//! =============
//! `Uninitialized -> Restoring -> {Active, Anonymous}`. From `Active`, logout
//! or a failed refresh moves to `Anonymous`; a successful refresh stays
//! `Active` and only swaps the access token. From `Anonymous`, login moves to
//! `Active`.
//!
//! CONCURRENCY
//! ===========
//! At most one refresh is in flight. Callers that discover a stale token
//! queue on `refresh_gate`; once inside they re-read the session and reuse
//! whatever the previous holder produced instead of refreshing again.
//! Every login and logout bumps `epoch`, and a refresh result is applied
//! only if the epoch it started under is still current, so a late refresh
//! can never resurrect credentials across a logout/login transition.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, watch};

use crate::config::ClientConfig;
use crate::error::{GatewayError, SessionError};
use crate::gateway::{self, AuthGateway};
use crate::store::CredentialStore;
use crate::token;
use crate::types::{Identity, LoginRequest, PersistedCredential};
use crate::validate;

// =============================================================================
// CLOCK
// =============================================================================

/// Source of "now" for expiry checks, in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Restoring,
    Active,
    Anonymous,
}

/// In-memory session. Fields are private; read through accessors, mutate
/// through [`SessionController`] only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    identity: Option<Identity>,
    status: SessionStatus,
    epoch: u64,
}

impl Session {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Active && self.identity.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.identity.as_ref().is_some_and(Identity::is_admin)
    }

    /// True while boot logic has not finished; the UI should block.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.status, SessionStatus::Uninitialized | SessionStatus::Restoring)
    }

    /// Generation counter, bumped on every login and sign-out.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn has_credentials(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some() || self.identity.is_some()
    }

    fn adopt(&mut self, credential: PersistedCredential) {
        self.access_token = Some(credential.access_token);
        self.refresh_token = Some(credential.refresh_token);
        self.identity = Some(credential.identity);
        self.status = SessionStatus::Active;
        self.epoch += 1;
    }

    fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.identity = None;
        self.status = SessionStatus::Anonymous;
        self.epoch += 1;
    }

    fn credential(&self) -> Option<PersistedCredential> {
        Some(PersistedCredential {
            access_token: self.access_token.clone()?,
            refresh_token: self.refresh_token.clone()?,
            identity: self.identity.clone()?,
        })
    }

    #[cfg(test)]
    pub(crate) fn signed_in(identity: Identity) -> Self {
        let mut session = Self::default();
        session.adopt(PersistedCredential {
            access_token: "test-access".to_owned(),
            refresh_token: "test-refresh".to_owned(),
            identity,
        });
        session
    }

    #[cfg(test)]
    pub(crate) fn anonymous() -> Self {
        let mut session = Self::default();
        session.clear();
        session
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("identity", &self.identity)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Result of the boot-time restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing persisted; the session is anonymous.
    NoCredential,
    /// The stored access token was still valid and was adopted as-is.
    Adopted,
    /// The stored access token had expired and a refresh succeeded.
    Refreshed,
    /// The refresh failed; storage was cleared. Show the session-expired notice.
    Expired(SessionError),
    /// A login or logout happened while the refresh was in flight.
    Superseded,
    /// Boot already ran (or is running) for this controller.
    AlreadyRestored,
}

/// Failed refresh remembered so queued callers from the same epoch get the
/// same answer instead of a generic "not signed in".
#[derive(Debug, Default)]
struct RefreshGate {
    last_failure: Option<(u64, String)>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    gateway: Arc<dyn AuthGateway>,
    clock: Arc<dyn Clock>,
    refresh_timeout: Duration,
    state: watch::Sender<Session>,
    refresh_gate: Mutex<RefreshGate>,
}

impl SessionController {
    pub fn new(store: Arc<dyn CredentialStore>, gateway: Arc<dyn AuthGateway>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            store,
            gateway,
            clock: Arc::new(SystemClock),
            refresh_timeout: config.timeouts.refresh(),
            state,
            refresh_gate: Mutex::new(RefreshGate::default()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub(crate) fn gateway(&self) -> &dyn AuthGateway {
        self.gateway.as_ref()
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Persist and adopt a full credential. Moves to `Active`.
    fn set_credentials(&self, credential: PersistedCredential) -> Identity {
        self.store.save(&credential);
        let identity = credential.identity.clone();
        self.state.send_modify(|s| s.adopt(credential));
        tracing::info!(user_id = %identity.id, role = identity.role.as_str(), "session active");
        identity
    }

    /// Clear memory and storage together. Moves to `Anonymous`.
    fn end_session(&self, reason: &str) {
        self.store.clear();
        self.state.send_modify(Session::clear);
        tracing::info!(reason, "session ended");
    }

    /// Bounded refresh call. Any failure, including timeout, is terminal.
    async fn call_refresh(&self, refresh_token: &str) -> Result<String, String> {
        match tokio::time::timeout(self.refresh_timeout, self.gateway.refresh(refresh_token)).await {
            Ok(Ok(response)) if !response.access_token.is_empty() => Ok(response.access_token),
            Ok(Ok(_)) => Err("refresh returned an empty access token".to_owned()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("refresh timed out after {}s", self.refresh_timeout.as_secs())),
        }
    }

    // -------------------------------------------------------------------------
    // Boot
    // -------------------------------------------------------------------------

    /// Rebuild the session from storage. Runs once per controller; later
    /// calls return [`RestoreOutcome::AlreadyRestored`] without side effects.
    ///
    /// Always leaves the session `Active` or `Anonymous`.
    pub async fn restore_session(&self) -> RestoreOutcome {
        let started = self.state.send_if_modified(|s| {
            if s.status == SessionStatus::Uninitialized {
                s.status = SessionStatus::Restoring;
                true
            } else {
                false
            }
        });
        if !started {
            return RestoreOutcome::AlreadyRestored;
        }
        let boot_epoch = self.state.borrow().epoch;

        let Some(credential) = self.store.load() else {
            // Drop any partial leftovers so they are not re-read on every boot.
            self.store.clear();
            self.state.send_modify(|s| s.status = SessionStatus::Anonymous);
            tracing::info!("no stored credential; session anonymous");
            return RestoreOutcome::NoCredential;
        };

        if !token::is_expired(&credential.access_token, self.clock.now_ms()) {
            self.set_credentials(credential);
            return RestoreOutcome::Adopted;
        }

        tracing::info!(user_id = %credential.identity.id, "stored access token expired; refreshing");
        let mut gate = self.refresh_gate.lock().await;
        let result = self.call_refresh(&credential.refresh_token).await;

        if self.state.borrow().epoch != boot_epoch {
            tracing::info!("session changed during boot refresh; discarding result");
            return RestoreOutcome::Superseded;
        }

        match result {
            Ok(access_token) => {
                self.set_credentials(PersistedCredential { access_token, ..credential });
                RestoreOutcome::Refreshed
            }
            Err(reason) => {
                tracing::warn!(%reason, "boot refresh failed");
                gate.last_failure = Some((boot_epoch, reason.clone()));
                self.end_session("refresh failed");
                RestoreOutcome::Expired(SessionError::RefreshFailed(reason))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Login / signup / logout
    // -------------------------------------------------------------------------

    /// Validate and submit the login form. On success the session is `Active`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Validation`] without a request for bad input,
    /// [`SessionError::AuthRejected`] when the server declines, and
    /// [`SessionError::Gateway`] for transport failures. The session is left
    /// untouched in every error case.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        let request = validate::validate_login(email, password)?;
        self.submit_login(&request).await
    }

    async fn submit_login(&self, request: &LoginRequest) -> Result<Identity, SessionError> {
        let response = self.gateway.login(request).await.map_err(auth_failure(LOGIN_FAILED_MESSAGE))?;
        Ok(self.set_credentials(response.into_credential()))
    }

    /// Validate and submit the signup form. Does not sign in.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`SessionController::login`].
    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<(), SessionError> {
        let request = validate::validate_signup(username, email, password)?;
        self.gateway.signup(&request).await.map_err(auth_failure(SIGNUP_FAILED_MESSAGE))?;
        tracing::info!(email = %request.email, "account created");
        Ok(())
    }

    /// Sign up, then sign in with the same credentials.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`SessionController::login`]; a failure in either
    /// step leaves the session untouched.
    pub async fn signup_and_login(&self, username: &str, email: &str, password: &str) -> Result<Identity, SessionError> {
        let request = validate::validate_signup(username, email, password)?;
        self.gateway.signup(&request).await.map_err(auth_failure(SIGNUP_FAILED_MESSAGE))?;
        self.submit_login(&request.login_request()).await
    }

    /// Sign out. Returns `false` when already anonymous (no-op).
    pub fn logout(&self) -> bool {
        let present = {
            let session = self.state.borrow();
            session.status != SessionStatus::Anonymous || session.has_credentials()
        };
        if !present {
            return false;
        }
        self.end_session("logout");
        true
    }

    // -------------------------------------------------------------------------
    // Authenticated calls
    // -------------------------------------------------------------------------

    fn current_access(&self) -> Result<(String, u64), SessionError> {
        let session = self.state.borrow();
        match (session.status, session.access_token.as_deref()) {
            (SessionStatus::Active, Some(token)) => Ok((token.to_owned(), session.epoch)),
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// Obtain a token newer than `stale`, refreshing at most once across all
    /// concurrent callers.
    async fn refresh_coalesced(&self, stale: &str, epoch: u64) -> Result<String, SessionError> {
        let mut gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let session = self.state.borrow();
            if session.epoch != epoch || session.status != SessionStatus::Active {
                return Err(match &gate.last_failure {
                    Some((failed_epoch, reason)) if *failed_epoch == epoch => SessionError::RefreshFailed(reason.clone()),
                    _ => SessionError::NotAuthenticated,
                });
            }
            match (session.access_token.as_deref(), session.refresh_token.as_deref()) {
                (Some(current), _) if current != stale => return Ok(current.to_owned()),
                (Some(_), Some(refresh)) => refresh.to_owned(),
                _ => return Err(SessionError::NotAuthenticated),
            }
        };

        tracing::debug!("refreshing access token");
        let result = self.call_refresh(&refresh_token).await;

        let (current_epoch, current_refresh) = {
            let session = self.state.borrow();
            (session.epoch, session.refresh_token.clone())
        };
        if current_epoch != epoch || current_refresh.as_deref() != Some(refresh_token.as_str()) {
            tracing::info!("session changed during refresh; discarding result");
            return Err(SessionError::NotAuthenticated);
        }

        match result {
            Ok(access_token) => {
                self.state.send_modify(|s| s.access_token = Some(access_token.clone()));
                let credential = self.state.borrow().credential();
                if let Some(credential) = credential {
                    self.store.save(&credential);
                }
                tracing::info!("access token refreshed");
                Ok(access_token)
            }
            Err(reason) => {
                tracing::warn!(%reason, "token refresh failed");
                gate.last_failure = Some((epoch, reason.clone()));
                self.end_session("refresh failed");
                Err(SessionError::RefreshFailed(reason))
            }
        }
    }

    /// Run an authenticated call with the current access token.
    ///
    /// An access token already known to be expired is refreshed first. A
    /// 401 triggers one refresh-and-retry unless a refresh already happened
    /// for this call. Refresh failure, or a second 401, signs the user out.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] without an active session,
    /// [`SessionError::RefreshFailed`] when the session could not be
    /// renewed, and [`SessionError::Gateway`] for every other failure.
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, SessionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let (mut token, epoch) = self.current_access()?;
        let mut refreshed = false;

        if token::is_expired(&token, self.clock.now_ms()) {
            token = self.refresh_coalesced(&token, epoch).await?;
            refreshed = true;
        }

        match call(token.clone()).await {
            Ok(value) => return Ok(value),
            Err(GatewayError::Unauthorized { .. }) if !refreshed => {
                tracing::info!("access token rejected; refreshing once");
            }
            Err(GatewayError::Unauthorized { status }) => return Err(self.reject_after_refresh(epoch, status)),
            Err(e) => return Err(SessionError::Gateway(e)),
        }

        let fresh = self.refresh_coalesced(&token, epoch).await?;
        match call(fresh).await {
            Ok(value) => Ok(value),
            Err(GatewayError::Unauthorized { status }) => Err(self.reject_after_refresh(epoch, status)),
            Err(e) => Err(SessionError::Gateway(e)),
        }
    }

    fn reject_after_refresh(&self, epoch: u64, status: u16) -> SessionError {
        if self.state.borrow().epoch == epoch {
            self.end_session("token rejected after refresh");
        }
        SessionError::RefreshFailed(format!("token rejected after refresh (status {status})"))
    }
}

pub(crate) const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";
pub(crate) const SIGNUP_FAILED_MESSAGE: &str = "Signup failed. Please check the errors.";

/// Turn a declined login or signup into [`SessionError::AuthRejected`],
/// substituting `fallback` when the server sent no message of its own.
fn auth_failure(fallback: &'static str) -> impl Fn(GatewayError) -> SessionError {
    move |e| match e {
        GatewayError::Rejected { status, message, fields } => {
            let message = if message == gateway::status_message(status) { fallback.to_owned() } else { message };
            SessionError::AuthRejected { message, fields }
        }
        other => SessionError::Gateway(other),
    }
}
