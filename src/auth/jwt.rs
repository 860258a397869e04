use crate::types::{AppError, Claims, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// HS256 bearer token service.
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    /// Creates a new AuthService.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for signing JWTs (should be at least 32 chars)
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Issues a token for `subject` valid for `ttl_seconds`.
    pub fn issue_token(&self, subject: &str, ttl_seconds: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + Duration::seconds(ttl_seconds)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> AuthService {
        AuthService::new("test-secret-key-that-is-at-least-32-chars".to_string())
    }

    #[test]
    fn test_token_roundtrip() {
        let service = create_test_service();
        let token = service.issue_token("user-123", 900).expect("should issue");

        let claims = service.verify_token(&token).expect("should verify");
        assert_eq!(claims.sub, "user-123");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_test_service()
            .issue_token("user-123", 900)
            .expect("should issue");

        let other = AuthService::new("a-completely-different-secret-value".to_string());
        assert!(matches!(other.verify_token(&token), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = create_test_service();
        let token = service.issue_token("user-123", -3600).expect("should issue");
        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(create_test_service().verify_token("not.a.jwt").is_err());
    }
}
