use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{
    audit,
    config::AdminConfig,
    dto::auth::{Claims, LoginRequest, LoginResponse},
    error::{AppError, AppResult},
    state::AppState,
};

pub const ADMIN_ROLE: &str = "admin";

/// Signs a session token for `username` that expires after the configured TTL.
pub fn issue_token(
    admin: &AdminConfig,
    username: &str,
    now: DateTime<Utc>,
) -> AppResult<LoginResponse> {
    let expires_at = now
        .checked_add_signed(admin.session_ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: username.to_string(),
        role: ADMIN_ROLE.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(admin.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(LoginResponse { token, expires_at })
}

/// Claims of a valid, unexpired admin token.
pub fn verify_token(admin: &AdminConfig, token: &str) -> Option<Claims> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(admin.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    (decoded.claims.role == ADMIN_ROLE && decoded.claims.sub == admin.username)
        .then_some(decoded.claims)
}

pub fn verify_password(admin: &AdminConfig, username: &str, password: &str) -> bool {
    if username != admin.username {
        return false;
    }
    let Ok(parsed_hash) = PasswordHash::new(&admin.password_hash) else {
        tracing::error!("ADMIN_PASSWORD_HASH is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Password login. Wrong credentials look like a missing page.
pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<LoginResponse> {
    let admin = &state.config.admin;
    if !verify_password(admin, &payload.username, &payload.password) {
        tracing::warn!(username = %payload.username, "admin login failed");
        return Err(AppError::NotFound);
    }

    let resp = issue_token(admin, &payload.username, Utc::now())?;
    audit::record(
        &state.pool,
        &payload.username,
        "admin_login",
        "session",
        serde_json::json!({ "expires_at": resp.expires_at }),
    )
    .await;
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use chrono::TimeDelta;
    use password_hash::rand_core::OsRng;

    use super::*;

    fn admin() -> AdminConfig {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(b"hunter2", &salt)
            .unwrap()
            .to_string();
        AdminConfig {
            username: "admin".into(),
            password_hash,
            jwt_secret: "test-secret".into(),
            session_ttl: TimeDelta::hours(1),
            host: None,
        }
    }

    #[test]
    fn password_check() {
        let admin = admin();
        assert!(verify_password(&admin, "admin", "hunter2"));
        assert!(!verify_password(&admin, "admin", "hunter3"));
        assert!(!verify_password(&admin, "root", "hunter2"));
    }

    #[test]
    fn token_round_trip() {
        let admin = admin();
        let resp = issue_token(&admin, "admin", Utc::now()).unwrap();
        let claims = verify_token(&admin, &resp.token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, ADMIN_ROLE);
    }

    #[test]
    fn rejects_expired_or_foreign_tokens() {
        let admin = admin();
        let stale = issue_token(&admin, "admin", Utc::now() - TimeDelta::hours(3)).unwrap();
        assert!(verify_token(&admin, &stale.token).is_none());

        let mut other = admin.clone();
        other.jwt_secret = "another-secret".into();
        let foreign = issue_token(&other, "admin", Utc::now()).unwrap();
        assert!(verify_token(&admin, &foreign.token).is_none());
        assert!(verify_token(&admin, "not-a-token").is_none());
    }
}
