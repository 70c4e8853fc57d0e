//! Bearer Token Authentication
//!
//! `Authorization: Bearer <token>` 헤더의 토큰을 SHA3-256으로 해시해서
//! `api_tokens` 테이블에서 조회함. 원본 토큰은 저장하지 않음.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

use crate::{
    db::{ParkingStore, Role},
    error::ApiError,
    AppState,
};

/// 인증된 사용자
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin role required".to_string()))
        }
    }
}

/// 토큰 해시 (SHA3-256, hex)
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha3_256::digest(token.as_bytes()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// 헤더에서 사용자 확인 (없거나 모르는 토큰이면 401)
pub async fn authenticate(store: &dyn ParkingStore, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;

    let record = store
        .find_token(&hash_token(token))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let role = Role::parse(&record.role).ok_or_else(|| {
        tracing::warn!(user_id = %record.user_id, role = %record.role, "Unknown role on token");
        ApiError::Unauthorized
    })?;

    Ok(AuthUser {
        user_id: record.user_id,
        role,
    })
}

/// 토큰 등록 (해시만 저장)
pub async fn register_token(
    store: &dyn ParkingStore,
    token: &str,
    user_id: Uuid,
    role: Role,
) -> anyhow::Result<()> {
    store.upsert_token(&hash_token(token), user_id, role).await
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(state.store.as_ref(), &parts.headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let h = hash_token("secret");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_token("secret"));
        assert_ne!(h, hash_token("Secret"));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_authenticate_known_token() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        register_token(&store, "tok", user_id, Role::User).await.unwrap();

        let user = authenticate(&store, &headers_with("Bearer tok")).await.unwrap();
        assert_eq!(user.user_id, user_id);
        assert!(user.require_admin().is_err());

        let err = authenticate(&store, &headers_with("Bearer other")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
