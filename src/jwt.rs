use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret =
            std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    /// Issue a token for a user. The active organization is carried in the
    /// claims: selecting a different practice means issuing a new token, so
    /// the active tenant is an explicit per-request value, never shared
    /// server-side state.
    pub fn encode(
        &self,
        user_id: Uuid,
        active_organization_id: Option<Uuid>,
    ) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            org: active_organization_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign token: {err}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::unauthenticated(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Organization the caller has selected as active, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Uuid>,
    pub exp: usize,
    pub iat: usize,
}

/// Resolved session: the caller's identity plus the active-organization
/// hint. Missing, expired, or tampered credentials fail here with 401 —
/// terminal for the request, before any membership lookup runs.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub active_organization_id: Option<Uuid>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthenticated("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        Ok(AuthSession {
            user_id: claims.sub,
            active_organization_id: claims.org,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(exp_hours: i64) -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"test-secret".to_vec()),
            exp_hours,
        }
    }

    #[test]
    fn token_round_trips_with_org_claim() {
        let jwt = config(1);
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();

        let token = jwt.encode(user, Some(org)).unwrap();
        let claims = jwt.decode(&token).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.org, Some(org));
    }

    #[test]
    fn token_without_org_claim_decodes_to_none() {
        let jwt = config(1);
        let token = jwt.encode(Uuid::new_v4(), None).unwrap();
        assert_eq!(jwt.decode(&token).unwrap().org, None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = config(-1);
        let token = jwt.encode(Uuid::new_v4(), None).unwrap();
        let err = jwt.decode(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let jwt = config(1);
        let err = jwt.decode("not.a.token").unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = config(1).encode(Uuid::new_v4(), None).unwrap();
        let other = JwtConfig {
            secret: Arc::new(b"different-secret".to_vec()),
            exp_hours: 1,
        };
        assert!(matches!(other.decode(&token), Err(AppError::Unauthenticated(_))));
    }
}
