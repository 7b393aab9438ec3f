//! The caller's identity for one request.
//!
//! Token verification belongs to the identity provider in front of this
//! service. By the time a request arrives here the verified email travels in
//! the `x-user-email` header, and the role comes from the user directory.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::user::{normalize_email, Role};
use crate::state::AppState;

pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Debug, Clone)]
pub struct Session {
    pub email: String,
    pub role: Role,
}

impl Session {
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} is not allowed for role {:?}",
                self.email, self.role
            )))
        }
    }

    pub fn is(&self, email: &str) -> bool {
        self.email == normalize_email(email)
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_EMAIL_HEADER} header")))?;

        let role = state.role_of(&email);
        Ok(Session { email, role })
    }
}
