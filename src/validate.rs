//! Client-side form validation.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login, signup, and task forms are checked before any request is issued so
//! obviously invalid input never costs a round trip. Errors are collected per
//! field (first failing rule wins) in field order.

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::types::{LoginRequest, SignupRequest, TaskDraft};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// One message attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Collected field errors for one form submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &str, message: &str) {
        self.0.push(FieldError::new(field, message));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message.as_str())
    }

    fn into_result<T>(self, ok: T) -> Result<T, Self> {
        if self.is_empty() { Ok(ok) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

/// Structural email check: `local@domain.tld`, no whitespace, non-empty labels.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.push("email", "Please enter a valid email");
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.is_empty() {
        errors.push("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("password", "Password must be at least 6 characters");
    }
}

/// Validate the login form, returning the request body on success.
///
/// # Errors
///
/// Returns every failing field when email or password are unacceptable.
pub fn validate_login(email: &str, password: &str) -> Result<LoginRequest, ValidationErrors> {
    let email = email.trim();
    let mut errors = ValidationErrors::default();
    check_email(&mut errors, email);
    check_password(&mut errors, password);
    errors.into_result(LoginRequest { email: email.to_owned(), password: password.to_owned() })
}

/// Validate the signup form, returning the request body on success.
///
/// # Errors
///
/// Returns every failing field among username, email, and password.
pub fn validate_signup(username: &str, email: &str, password: &str) -> Result<SignupRequest, ValidationErrors> {
    let username = username.trim();
    let email = email.trim();
    let mut errors = ValidationErrors::default();
    if username.is_empty() {
        errors.push("username", "Username is required");
    }
    check_email(&mut errors, email);
    check_password(&mut errors, password);
    errors.into_result(SignupRequest {
        username: username.to_owned(),
        email: email.to_owned(),
        password: password.to_owned(),
    })
}

/// Validate a task form. `has_existing_image` is true when editing a task
/// that already carries an image, which makes a new upload optional.
///
/// # Errors
///
/// Returns every failing field among title, description, and image.
pub fn validate_task(draft: &TaskDraft, has_existing_image: bool) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = draft.title.trim();
    if title.is_empty() {
        errors.push("title", "Title is required");
    } else if title.chars().count() < MIN_TITLE_LEN {
        errors.push("title", "Title must be at least 3 characters");
    }

    if draft.description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.push("description", "Description cannot exceed 500 characters");
    }

    match &draft.image {
        None if !has_existing_image => errors.push("image", "Image is required"),
        None => {}
        Some(image) if image.bytes.len() > MAX_IMAGE_BYTES => {
            errors.push("image", "Image size must be less than 2MB");
        }
        Some(image) if !image.mime_type.starts_with("image/") => {
            errors.push("image", "Only image files are allowed");
        }
        Some(_) => {}
    }

    errors.into_result(())
}
