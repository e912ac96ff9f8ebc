use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{
    claims::{Claims, TokenKind},
    jwt::JwtKeys,
    roles::Area,
};
use crate::error::{ApiError, AuthError};

/// Extracts and validates an access JWT, yielding its claims.
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn require(&self, area: Area) -> Result<(), AuthError> {
        if self.0.role.can_access(area) {
            Ok(())
        } else {
            warn!(user_id = %self.0.sub, role = %self.0.role, ?area, "access denied");
            Err(AuthError::Forbidden {
                required: area.required_role(),
            })
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::unauthorized("Invalid or expired token")
        })?;

        if claims.kind != TokenKind::Access {
            return Err(ApiError::unauthorized("Access token required"));
        }

        Ok(AuthUser(claims))
    }
}

/// An [`AuthUser`] whose token carries the admin role.
pub struct AdminUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require(Area::UserAdmin)?;
        Ok(AdminUser(user.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{repo_types::User, roles::Role},
        config::JwtConfig,
    };
    use axum::http::{header, Request, StatusCode};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[derive(Clone)]
    struct TestState(JwtConfig);

    impl FromRef<TestState> for JwtKeys {
        fn from_ref(state: &TestState) -> Self {
            JwtKeys::from(&state.0)
        }
    }

    fn state() -> TestState {
        TestState(JwtConfig {
            secret: "test".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn token(state: &TestState, role: Role, refresh: bool) -> String {
        let keys = JwtKeys::from_ref(state);
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            password_hash: String::new(),
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        if refresh {
            keys.sign_refresh(&user).unwrap()
        } else {
            keys.sign_access(&user).unwrap()
        }
    }

    fn parts(auth: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = auth {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_bearer_access_token() {
        let st = state();
        let mut p = parts(Some(format!("Bearer {}", token(&st, Role::Analyst, false))));
        let AuthUser(claims) = AuthUser::from_request_parts(&mut p, &st).await.unwrap();
        assert_eq!(claims.role, Role::Analyst);
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let st = state();
        let err = AuthUser::from_request_parts(&mut parts(None), &st)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_refresh_token() {
        let st = state();
        let mut p = parts(Some(format!("Bearer {}", token(&st, Role::User, true))));
        let err = AuthUser::from_request_parts(&mut p, &st).await.err().unwrap();
        assert_eq!(err.message, "Access token required");
    }

    #[tokio::test]
    async fn admin_extractor_enforces_role() {
        let st = state();
        let mut p = parts(Some(format!("Bearer {}", token(&st, Role::Analyst, false))));
        let err = AdminUser::from_request_parts(&mut p, &st).await.err().unwrap();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let mut p = parts(Some(format!("Bearer {}", token(&st, Role::Admin, false))));
        assert!(AdminUser::from_request_parts(&mut p, &st).await.is_ok());
    }
}
