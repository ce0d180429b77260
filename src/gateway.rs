//! REST boundary to the task API.
//!
//! ARCHITECTURE
//! ============
//! [`AuthGateway`] is the seam between the session controller and the
//! network. Resource operations take the bearer token explicitly: the
//! controller decides which token to send, and the gateway only attaches it.
//! The gateway never inspects expiry and never retries. A 401 on an
//! authenticated call comes back as [`GatewayError::Unauthorized`] so the
//! controller can choose between refresh-and-retry and sign-out.
//!
//! [`HttpGateway`] is the `reqwest` implementation.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::GatewayError;
use crate::types::{
    LoginRequest, LoginResponse, Profile, RefreshResponse, SignupRequest, Task, TaskDraft, TaskQuery, UserSummary,
};
use crate::validate::FieldError;

/// Request/response operations exposed by the task API.
#[async_trait::async_trait]
pub trait AuthGateway: Send + Sync {
    /// `POST /auth/login`.
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, GatewayError>;

    /// `POST /auth/signup`.
    async fn signup(&self, request: &SignupRequest) -> Result<(), GatewayError>;

    /// `POST /auth/refresh-token`.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, GatewayError>;

    /// `GET /auth/profile`.
    async fn profile(&self, access_token: &str) -> Result<Profile, GatewayError>;

    /// `GET /tasks?search=..&sortBy=..`.
    async fn list_tasks(&self, access_token: &str, query: &TaskQuery) -> Result<Vec<Task>, GatewayError>;

    /// `POST /tasks` (multipart).
    async fn create_task(&self, access_token: &str, draft: &TaskDraft) -> Result<(), GatewayError>;

    /// `PUT /tasks/:id` (multipart).
    async fn update_task(&self, access_token: &str, task_id: &str, draft: &TaskDraft) -> Result<(), GatewayError>;

    /// `DELETE /tasks/:id`.
    async fn delete_task(&self, access_token: &str, task_id: &str) -> Result<(), GatewayError>;

    /// `GET /admin/users`.
    async fn list_users(&self, access_token: &str) -> Result<Vec<UserSummary>, GatewayError>;

    /// `PUT /admin/users/:id/block`.
    async fn block_user(&self, access_token: &str, user_id: &str) -> Result<(), GatewayError>;
}

// =============================================================================
// ERROR BODIES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiFieldError>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFieldError {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    param: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

/// Extract a display message and per-field errors from a failure body.
///
/// Understands `{ "errors": [{ "msg", "param" }] }` and `{ "message" }`.
fn parse_error_body(status: u16, body: &str) -> (String, Vec<FieldError>) {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();

    let fields: Vec<FieldError> = parsed
        .errors
        .iter()
        .filter_map(|e| {
            let message = e.msg.clone()?;
            let field = e.param.clone().or_else(|| e.path.clone()).unwrap_or_else(|| "general".to_owned());
            Some(FieldError { field, message })
        })
        .collect();

    let message = fields
        .first()
        .map(|f| f.message.clone())
        .or(parsed.message)
        .unwrap_or_else(|| status_message(status));

    (message, fields)
}

/// Message used when a failure body carries none of its own.
pub(crate) fn status_message(status: u16) -> String {
    format!("request failed with status {status}")
}

/// Map a non-success status to a gateway error.
fn classify_failure(status: u16, body: &str, authenticated: bool) -> GatewayError {
    if authenticated && status == StatusCode::UNAUTHORIZED.as_u16() {
        return GatewayError::Unauthorized { status };
    }
    let (message, fields) = parse_error_body(status, body);
    GatewayError::Rejected { status, message, fields }
}

// =============================================================================
// HTTP GATEWAY
// =============================================================================

pub struct HttpGateway {
    http: reqwest::Client,
    base: Url,
}

impl HttpGateway {
    /// Build a gateway for `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::HttpClientBuild`] if the base URL does not
    /// parse or the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        let base = Url::parse(&config.api_url).map_err(|e| GatewayError::HttpClientBuild(format!("{e}: {}", config.api_url)))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::HttpClientBuild(format!("not a base URL: {}", config.api_url)));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| GatewayError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join path segments onto the base URL, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Encode(format!("not a base URL: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str], access_token: Option<&str>) -> Result<RequestBuilder, GatewayError> {
        let builder = self.http.request(method, self.endpoint(segments)?);
        Ok(match access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder, authenticated: bool) -> Result<Response, GatewayError> {
        let request = builder.build().map_err(|e| GatewayError::Encode(e.to_string()))?;
        let method = request.method().clone();
        let path = request.url().path().to_owned();

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!(%method, %path, status = status.as_u16(), "api request");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status.as_u16(), &body, authenticated))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, authenticated: bool) -> Result<T, GatewayError> {
        let response = self.send(builder, authenticated).await?;
        response.json::<T>().await.map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn task_form(draft: &TaskDraft) -> Result<reqwest::multipart::Form, GatewayError> {
        let mut form = reqwest::multipart::Form::new()
            .text("title", draft.title.clone())
            .text("description", draft.description.clone());
        if let Some(image) = &draft.image {
            let part = reqwest::multipart::Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime_type)
                .map_err(|e| GatewayError::Encode(e.to_string()))?;
            form = form.part("image", part);
        }
        Ok(form)
    }
}

#[async_trait::async_trait]
impl AuthGateway for HttpGateway {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, GatewayError> {
        let builder = self.request(Method::POST, &["auth", "login"], None)?.json(request);
        self.send_json(builder, false).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<(), GatewayError> {
        let builder = self.request(Method::POST, &["auth", "signup"], None)?.json(request);
        self.send(builder, false).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, GatewayError> {
        let body = serde_json::json!({ "refreshToken": refresh_token });
        let builder = self.request(Method::POST, &["auth", "refresh-token"], None)?.json(&body);
        self.send_json(builder, false).await
    }

    async fn profile(&self, access_token: &str) -> Result<Profile, GatewayError> {
        let builder = self.request(Method::GET, &["auth", "profile"], Some(access_token))?;
        self.send_json(builder, true).await
    }

    async fn list_tasks(&self, access_token: &str, query: &TaskQuery) -> Result<Vec<Task>, GatewayError> {
        let builder = self
            .request(Method::GET, &["tasks"], Some(access_token))?
            .query(&[("search", query.search.as_str()), ("sortBy", query.sort.as_query())]);
        self.send_json(builder, true).await
    }

    async fn create_task(&self, access_token: &str, draft: &TaskDraft) -> Result<(), GatewayError> {
        let builder = self
            .request(Method::POST, &["tasks"], Some(access_token))?
            .multipart(Self::task_form(draft)?);
        self.send(builder, true).await?;
        Ok(())
    }

    async fn update_task(&self, access_token: &str, task_id: &str, draft: &TaskDraft) -> Result<(), GatewayError> {
        let builder = self
            .request(Method::PUT, &["tasks", task_id], Some(access_token))?
            .multipart(Self::task_form(draft)?);
        self.send(builder, true).await?;
        Ok(())
    }

    async fn delete_task(&self, access_token: &str, task_id: &str) -> Result<(), GatewayError> {
        let builder = self.request(Method::DELETE, &["tasks", task_id], Some(access_token))?;
        self.send(builder, true).await?;
        Ok(())
    }

    async fn list_users(&self, access_token: &str) -> Result<Vec<UserSummary>, GatewayError> {
        let builder = self.request(Method::GET, &["admin", "users"], Some(access_token))?;
        self.send_json(builder, true).await
    }

    async fn block_user(&self, access_token: &str, user_id: &str) -> Result<(), GatewayError> {
        let builder = self.request(Method::PUT, &["admin", "users", user_id, "block"], Some(access_token))?;
        self.send(builder, true).await?;
        Ok(())
    }
}
