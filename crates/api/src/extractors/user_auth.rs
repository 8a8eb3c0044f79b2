//! Bearer-token authentication extractors.

use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::UserRole;
use persistence::repositories::UserRepository;
use shared::jwt::{Claims, JwtConfig, JwtError};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated user taken from a valid access token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub user_id: Uuid,
    pub role: UserRole,
    pub jti: String,
}

impl UserAuth {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Allows the user themself or an admin.
    pub fn ensure_self_or_admin(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You can only access your own account".to_string(),
            ))
        }
    }
}

impl TryFrom<Claims> for UserAuth {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            role: UserRole::from_str(&claims.role).map_err(|_| JwtError::InvalidToken)?,
            jti: claims.jti,
        })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

fn authenticate(jwt: &JwtConfig, token: &str) -> Result<UserAuth, ApiError> {
    jwt.validate(token)
        .and_then(UserAuth::try_from)
        .map_err(|e| match e {
            JwtError::TokenExpired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        })
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let auth = authenticate(&state.jwt, bearer_token(parts)?)?;
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

/// Authenticated admin.
///
/// The role is re-read from the database so a demoted admin loses access
/// before their token expires.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub UserAuth);

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = UserAuth::from_request_parts(parts, state).await?;

        let user = UserRepository::new(state.pool.clone())
            .find_by_id(auth.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

        if !UserRole::from(user.role).is_admin() {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminAuth(UserAuth {
            role: UserRole::Admin,
            ..auth
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    const SECRET: &str = "test_secret_key_for_jwt_testing_0123456789";

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/users/me");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            bearer_token(&parts_with_auth(Some("Bearer abc.def"))).unwrap(),
            "abc.def"
        );
        assert!(bearer_token(&parts_with_auth(None)).is_err());
        assert!(bearer_token(&parts_with_auth(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts_with_auth(Some("Bearer "))).is_err());
    }

    #[test]
    fn test_authenticate_roundtrip() {
        let jwt = JwtConfig::new(SECRET, 3600, 0).unwrap();
        let user_id = Uuid::new_v4();
        let issued = jwt.issue(user_id, "admin").unwrap();

        let auth = authenticate(&jwt, &issued.token).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert!(auth.is_admin());
        assert_eq!(auth.jti, issued.jti);
    }

    #[test]
    fn test_authenticate_rejects_foreign_token() {
        let jwt = JwtConfig::new(SECRET, 3600, 0).unwrap();
        let other = JwtConfig::new("another_secret_key_that_is_long_enough_1", 3600, 0).unwrap();
        let issued = other.issue(Uuid::new_v4(), "user").unwrap();
        assert!(matches!(
            authenticate(&jwt, &issued.token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_ensure_self_or_admin() {
        let me = Uuid::new_v4();
        let user = UserAuth {
            user_id: me,
            role: UserRole::User,
            jti: "jti".to_string(),
        };
        assert!(user.ensure_self_or_admin(me).is_ok());
        assert!(user.ensure_self_or_admin(Uuid::new_v4()).is_err());

        let admin = UserAuth {
            role: UserRole::Admin,
            ..user
        };
        assert!(admin.ensure_self_or_admin(Uuid::new_v4()).is_ok());
    }
}
