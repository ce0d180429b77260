//! Session and authentication core for the task service client.
//!
//! SYSTEM CONTEXT
//! ==============
//! A client holds one [`SessionController`]. On boot it restores the session
//! from a [`CredentialStore`], classifies the stored access token with the
//! [`token`] inspector, and either adopts it or refreshes it through the
//! [`AuthGateway`]. Every authenticated call goes through the controller so
//! token expiry and rejection are handled in one place. The routing layer
//! asks [`can_enter`] before showing a view.

pub mod config;
pub mod error;
pub mod gateway;
mod resources;
pub mod route;
pub mod session;
pub mod store;
pub mod token;
pub mod types;
pub mod validate;

#[cfg(test)]
mod test_utils;

pub use config::{ClientConfig, ClientTimeouts};
pub use error::{ErrorCode, GatewayError, SESSION_EXPIRED_NOTICE, SessionError, StoreError};
pub use gateway::{AuthGateway, HttpGateway};
pub use route::{Gate, HOME_PATH, LOGIN_PATH, NavLink, Route, RouteAccess, can_enter, can_enter_path, nav_links};
pub use session::{Clock, RestoreOutcome, Session, SessionController, SessionStatus, SystemClock};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{
    Identity, ImageUpload, LoginRequest, LoginResponse, PersistedCredential, Profile, RefreshResponse, Role,
    SignupRequest, Task, TaskDraft, TaskOwner, TaskQuery, TaskSort, UserSummary,
};
pub use validate::{FieldError, ValidationErrors};
