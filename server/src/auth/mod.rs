//! Authentication and organization-role checks.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Utc;
use uuid::Uuid;

use crate::models::User;
use crate::state::AppState;
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};

pub mod password;
pub mod session;

/// The authenticated caller, resolved from an `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

fn unauthorized() -> AppError {
    AppError::AuthError("Unauthorized".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(unauthorized)?;

        let session = state
            .store
            .find_session_by_token_hash(&session::hash_token(token))
            .await?
            .ok_or_else(unauthorized)?;

        if session.is_expired(Utc::now()) {
            tracing::debug!(session_id = %session.id, "Rejecting expired session");
            state.store.delete_session(session.id).await?;
            return Err(unauthorized());
        }

        let user = state
            .store
            .find_user(session.user_id)
            .await?
            .ok_or_else(unauthorized)?;

        Ok(CurrentUser {
            user,
            session_id: session.id,
        })
    }
}

/// Whether `user_id` is an OWNER or ADMIN of `organization_id`.
pub async fn can_manage_organization(
    store: &dyn Store,
    user_id: Uuid,
    organization_id: Uuid,
) -> AppResult<bool> {
    Ok(store
        .find_membership(user_id, organization_id)
        .await?
        .is_some_and(|member| member.role.can_manage_events()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
