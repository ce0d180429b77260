//! Shared fixtures for unit tests: a scripted gateway, a settable clock, and
//! JWT builders.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::config::ClientConfig;
use crate::error::GatewayError;
use crate::gateway::AuthGateway;
use crate::session::{Clock, SessionController};
use crate::store::MemoryCredentialStore;
use crate::types::{
    Identity, LoginRequest, LoginResponse, PersistedCredential, Profile, RefreshResponse, Role, SignupRequest, Task,
    TaskDraft, TaskQuery, UserSummary,
};

/// Fixed "now" used throughout the tests: 2024-01-01T00:00:00Z.
pub(crate) const NOW_SECS: i64 = 1_704_067_200;

/// Unsigned JWT expiring at `exp` seconds; `tag` keeps tokens distinct.
pub(crate) fn jwt(exp: i64, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"jti":"{tag}"}}"#).as_bytes());
    format!("{header}.{payload}.c2ln")
}

pub(crate) fn fresh_token(tag: &str) -> String {
    jwt(NOW_SECS + 3600, tag)
}

pub(crate) fn expired_token(tag: &str) -> String {
    jwt(NOW_SECS - 60, tag)
}

pub(crate) fn identity(role: Role) -> Identity {
    Identity { id: "u1".to_owned(), role }
}

pub(crate) fn credential(access_token: String) -> PersistedCredential {
    PersistedCredential { access_token, refresh_token: "refresh-1".to_owned(), identity: identity(Role::User) }
}

// =============================================================================
// TestClock
// =============================================================================

pub(crate) struct TestClock(AtomicI64);

impl TestClock {
    pub(crate) fn at_secs(secs: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(secs * 1000)))
    }

    pub(crate) fn set_secs(&self, secs: i64) {
        self.0.store(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// MockGateway
// =============================================================================

/// Scripted gateway. Resource calls succeed unless the token is listed in
/// `rejected` (or `reject_all` is set), in which case they return 401.
#[derive(Default)]
pub(crate) struct MockGateway {
    pub login_results: Mutex<VecDeque<Result<LoginResponse, GatewayError>>>,
    pub signup_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    pub refresh_results: Mutex<VecDeque<Result<String, GatewayError>>>,
    pub resource_errors: Mutex<VecDeque<GatewayError>>,
    pub refresh_delay: Mutex<Duration>,
    pub rejected: Mutex<HashSet<String>>,
    pub reject_all: std::sync::atomic::AtomicBool,
    pub tasks: Mutex<Vec<Task>>,
    pub users: Mutex<Vec<UserSummary>>,

    pub login_calls: AtomicUsize,
    pub signup_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub seen_tokens: Mutex<Vec<String>>,
    pub seen_refresh_tokens: Mutex<Vec<String>>,
    pub seen_paths: Mutex<Vec<String>>,
}

impl MockGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_login(&self, result: Result<LoginResponse, GatewayError>) {
        self.login_results.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_refresh(&self, result: Result<String, GatewayError>) {
        self.refresh_results.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_resource_error(&self, error: GatewayError) {
        self.resource_errors.lock().unwrap().push_back(error);
    }

    pub(crate) fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub(crate) fn reject(&self, token: &str) {
        self.rejected.lock().unwrap().insert(token.to_owned());
    }

    pub(crate) fn network_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
            + self.signup_calls.load(Ordering::SeqCst)
            + self.refresh_calls.load(Ordering::SeqCst)
            + self.resource_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn resources(&self) -> usize {
        self.resource_calls.load(Ordering::SeqCst)
    }

    fn check(&self, token: &str, path: String) -> Result<(), GatewayError> {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(token.to_owned());
        self.seen_paths.lock().unwrap().push(path);
        if self.reject_all.load(Ordering::SeqCst) || self.rejected.lock().unwrap().contains(token) {
            return Err(GatewayError::Unauthorized { status: 401 });
        }
        match self.resource_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub(crate) fn login_response(access_token: String, role: Role) -> LoginResponse {
    serde_json::from_value(serde_json::json!({
        "accessToken": access_token,
        "refreshToken": "refresh-login",
        "id": "u-login",
        "role": role.as_str(),
    }))
    .unwrap()
}

#[async_trait::async_trait]
impl AuthGateway for MockGateway {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, GatewayError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(login_response(fresh_token("login"), Role::User)))
    }

    async fn signup(&self, _request: &SignupRequest) -> Result<(), GatewayError> {
        self.signup_calls.fetch_add(1, Ordering::SeqCst);
        self.signup_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, GatewayError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens.lock().unwrap().push(refresh_token.to_owned());
        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.refresh_results.lock().unwrap().pop_front();
        let access_token = match scripted {
            Some(result) => result?,
            None => fresh_token(&format!("refreshed-{n}")),
        };
        Ok(serde_json::from_value(serde_json::json!({ "accessToken": access_token })).unwrap())
    }

    async fn profile(&self, access_token: &str) -> Result<Profile, GatewayError> {
        self.check(access_token, "/auth/profile".to_owned())?;
        Ok(Profile { username: "alice".to_owned(), email: "alice@example.com".to_owned(), role: Role::User })
    }

    async fn list_tasks(&self, access_token: &str, query: &TaskQuery) -> Result<Vec<Task>, GatewayError> {
        self.check(access_token, format!("/tasks?search={}&sortBy={}", query.search, query.sort.as_query()))?;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn create_task(&self, access_token: &str, _draft: &TaskDraft) -> Result<(), GatewayError> {
        self.check(access_token, "/tasks".to_owned())
    }

    async fn update_task(&self, access_token: &str, task_id: &str, _draft: &TaskDraft) -> Result<(), GatewayError> {
        self.check(access_token, format!("/tasks/{task_id}"))
    }

    async fn delete_task(&self, access_token: &str, task_id: &str) -> Result<(), GatewayError> {
        self.check(access_token, format!("/tasks/{task_id}"))
    }

    async fn list_users(&self, access_token: &str) -> Result<Vec<UserSummary>, GatewayError> {
        self.check(access_token, "/admin/users".to_owned())?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn block_user(&self, access_token: &str, user_id: &str) -> Result<(), GatewayError> {
        self.check(access_token, format!("/admin/users/{user_id}/block"))
    }
}

/// Controller over a memory store, the mock gateway, and a clock at `NOW_SECS`.
pub(crate) fn controller(
    store: &Arc<MemoryCredentialStore>,
    gateway: &Arc<MockGateway>,
) -> (SessionController, Arc<TestClock>) {
    let clock = TestClock::at_secs(NOW_SECS);
    let controller = SessionController::new(store.clone(), gateway.clone(), &ClientConfig::default())
        .with_clock(clock.clone())
        .with_refresh_timeout(Duration::from_secs(5));
    (controller, clock)
}
