//! Authentication and actor resolution

use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use core_kernel::UserId;
use domain_reimbursement::{Actor, Role};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject is not a user id: {0}")]
    InvalidSubject(String),
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

impl Claims {
    /// Builds the acting user from the token
    ///
    /// Staff roles come from the `roles` claim; unknown role names are
    /// ignored. Whether the user is the requester is decided per
    /// reimbursement, never by the token.
    pub fn actor(&self) -> Result<Actor, AuthError> {
        let user_id = UserId::from_str(&self.sub)
            .map_err(|_| AuthError::InvalidSubject(self.sub.clone()))?;

        let mut actor = Actor::new(user_id);
        for name in &self.roles {
            match Role::from_str(name) {
                Ok(role) => actor = actor.with_role(role),
                Err(_) => debug!(role = %name, "Ignoring unknown role claim"),
            }
        }
        Ok(actor)
    }
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role)
}

/// Role names accepted in the `roles` claim
pub mod roles {
    pub const TSP: &str = "tsp";
    pub const ADMINISTRATIVE: &str = "administrative";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-0123456789";

    #[test]
    fn test_token_round_trip_to_actor() {
        let user = UserId::new();
        let token = create_token(
            &user.to_string(),
            vec![roles::TSP.to_string(), "auditor".to_string()],
            SECRET,
            600,
        )
        .unwrap();

        let claims = validate_token(&token, SECRET).unwrap();
        assert!(has_role(&claims, roles::TSP));
        assert!(!has_role(&claims, roles::ADMINISTRATIVE));

        let actor = claims.actor().unwrap();
        assert_eq!(actor.user_id, user);
        assert_eq!(actor.staff_roles, vec![Role::Tsp]);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = create_token("USR-x", vec![], SECRET, 600).unwrap();
        assert!(matches!(
            validate_token(&token, "another-secret-9876543210"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_non_user_subject_is_rejected() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            roles: vec![],
            exp: 0,
            iat: 0,
        };
        assert!(matches!(claims.actor(), Err(AuthError::InvalidSubject(_))));
    }
}
