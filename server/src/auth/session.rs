use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{TimeDelta, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{NewSession, Session};
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};

const TOKEN_BYTES: usize = 32;

/// Opaque bearer token. Only its SHA-256 digest is persisted.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Starts a session for `user_id` and returns it with the raw token to hand
/// back to the client.
pub async fn start_session(
    store: &dyn Store,
    user_id: Uuid,
    ttl_hours: i64,
) -> AppResult<(Session, String)> {
    let expires_at = TimeDelta::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Session TTL of {} hours is out of range",
                ttl_hours
            ))
        })?;

    let token = generate_token();
    let session = store
        .create_session(NewSession {
            user_id,
            token_hash: hash_token(&token),
            expires_at,
        })
        .await?;
    Ok((session, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_tokens_are_random_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_is_stable_and_differs_from_token() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn test_start_session_persists_only_the_hash() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let (session, token) = start_session(&store, user_id, 1).await.unwrap();

        assert_eq!(session.user_id, user_id);
        assert!(!session.is_expired(Utc::now()));
        let found = store
            .find_session_by_token_hash(&hash_token(&token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, session.id);
        assert!(store.find_session_by_token_hash(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_session_rejects_overflowing_ttl() {
        let store = MemoryStore::new();
        let result = start_session(&store, Uuid::new_v4(), 1_000_000_000_000).await;
        assert!(matches!(result, Err(AppError::InternalServerError(_))));
    }
}
