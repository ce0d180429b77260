//! Wire and domain types shared by the session core and its consumers.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Identity` and `PersistedCredential` are owned by the session core; the
//! remaining structs mirror the REST API's JSON bodies (camelCase, Mongo-style
//! `_id` keys).

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTITY
// =============================================================================

/// Role claim issued by the server at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// The authenticated user's id and role.
///
/// Only ever built from a login response or restored from storage; nothing
/// in the view layer constructs one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Durable projection of an active session: all three fields or nothing.
#[derive(Clone, PartialEq, Eq)]
pub struct PersistedCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
}

impl std::fmt::Debug for PersistedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedCredential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

// =============================================================================
// AUTH PAYLOADS
// =============================================================================

/// `POST /auth/login` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/signup` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Credentials for the login that follows a successful signup.
    #[must_use]
    pub fn login_request(&self) -> LoginRequest {
        LoginRequest { email: self.email.clone(), password: self.password.clone() }
    }
}

/// `POST /auth/login` response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub id: String,
    pub role: Role,
}

impl LoginResponse {
    #[must_use]
    pub fn into_credential(self) -> PersistedCredential {
        PersistedCredential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            identity: Identity { id: self.id, role: self.role },
        }
    }
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// `POST /auth/refresh-token` response. Only the access token rotates.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

impl std::fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshResponse").finish_non_exhaustive()
    }
}

/// `GET /auth/profile` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub role: Role,
}

// =============================================================================
// TASKS
// =============================================================================

/// Creator of a task: a bare id, or the populated user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskOwner {
    Populated {
        #[serde(rename = "_id", default)]
        id: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        role: Option<Role>,
    },
    Id(String),
}

/// Task resource as returned by the task endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user: TaskOwner,
}

impl Task {
    /// Absolute URL of the task image, served relative to the API base.
    #[must_use]
    pub fn image_url(&self, api_url: &str) -> Option<String> {
        self.image
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| format!("{}/{}", api_url.trim_end_matches('/'), path.trim_start_matches('/')))
    }

    /// Attribution line shown to admins.
    #[must_use]
    pub fn creator_label(&self) -> String {
        match &self.user {
            TaskOwner::Populated { role: Some(Role::Admin), .. } => "Created by Admin".to_owned(),
            TaskOwner::Populated { username, .. } => {
                format!("User {} created", username.as_deref().unwrap_or("unknown"))
            }
            TaskOwner::Id(id) => format!("User {id} created"),
        }
    }
}

/// Sort order accepted by `GET /tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    NewestFirst,
    OldestFirst,
    TitleAsc,
}

impl TaskSort {
    #[must_use]
    pub fn as_query(self) -> &'static str {
        match self {
            Self::NewestFirst => "-createdAt",
            Self::OldestFirst => "createdAt",
            Self::TitleAsc => "title",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "-createdAt" | "newest" => Some(Self::NewestFirst),
            "createdAt" | "oldest" => Some(Self::OldestFirst),
            "title" => Some(Self::TitleAsc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskQuery {
    pub search: String,
    pub sort: TaskSort,
}

/// Image file attached to a task form.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Create/update form payload, sent as multipart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub image: Option<ImageUpload>,
}

// =============================================================================
// ADMIN
// =============================================================================

/// Row of `GET /admin/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub is_blocked: bool,
}

fn default_role() -> Role {
    Role::User
}
