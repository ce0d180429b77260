//! Authenticated resource operations.
//!
//! Every call goes through [`SessionController::authorized`], so expiry
//! checks, the single refresh-and-retry, and sign-out on terminal failure
//! apply uniformly. Task forms are validated before any request is sent.

#[cfg(test)]
#[path = "resources_test.rs"]
mod tests;

use crate::error::SessionError;
use crate::session::SessionController;
use crate::types::{Profile, Task, TaskDraft, TaskQuery, UserSummary};
use crate::validate;

impl SessionController {
    /// `GET /auth/profile` for the signed-in user.
    ///
    /// # Errors
    ///
    /// See [`SessionController::authorized`].
    pub async fn profile(&self) -> Result<Profile, SessionError> {
        let gateway = self.gateway();
        self.authorized(|token| async move { gateway.profile(&token).await }).await
    }

    /// Tasks visible to the signed-in user. Admins see every task.
    ///
    /// # Errors
    ///
    /// See [`SessionController::authorized`].
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, SessionError> {
        let gateway = self.gateway();
        let tasks = self.authorized(|token| async move { gateway.list_tasks(&token, query).await }).await?;
        tracing::debug!(count = tasks.len(), search = %query.search, "tasks listed");
        Ok(tasks)
    }

    /// Validate and create a task. An image is required.
    ///
    /// # Errors
    ///
    /// [`SessionError::Validation`] without a request for bad input;
    /// otherwise see [`SessionController::authorized`].
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<(), SessionError> {
        validate::validate_task(draft, false)?;
        let gateway = self.gateway();
        self.authorized(|token| async move { gateway.create_task(&token, draft).await }).await?;
        tracing::info!(title = %draft.title, "task created");
        Ok(())
    }

    /// Validate and update a task. The image may be omitted when the task
    /// already has one.
    ///
    /// # Errors
    ///
    /// Same as [`SessionController::create_task`].
    pub async fn update_task(&self, task_id: &str, draft: &TaskDraft, has_existing_image: bool) -> Result<(), SessionError> {
        validate::validate_task(draft, has_existing_image)?;
        let gateway = self.gateway();
        self.authorized(|token| async move { gateway.update_task(&token, task_id, draft).await }).await?;
        tracing::info!(task_id, "task updated");
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionController::authorized`].
    pub async fn delete_task(&self, task_id: &str) -> Result<(), SessionError> {
        let gateway = self.gateway();
        self.authorized(|token| async move { gateway.delete_task(&token, task_id).await }).await?;
        tracing::info!(task_id, "task deleted");
        Ok(())
    }

    /// Admin user listing. The server enforces the role; this only forwards.
    ///
    /// # Errors
    ///
    /// See [`SessionController::authorized`].
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, SessionError> {
        let gateway = self.gateway();
        self.authorized(|token| async move { gateway.list_users(&token).await }).await
    }

    /// Toggle the blocked flag on a user.
    ///
    /// # Errors
    ///
    /// See [`SessionController::authorized`].
    pub async fn block_user(&self, user_id: &str) -> Result<(), SessionError> {
        let gateway = self.gateway();
        self.authorized(|token| async move { gateway.block_user(&token, user_id).await }).await?;
        tracing::info!(user_id, "user block toggled");
        Ok(())
    }
}
