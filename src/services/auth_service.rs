use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use crate::server::config::AuthConfig;
use crate::web::error::AppError;
use crate::web::models::{AuthenticatedUser, Claims, LoginRequest};

/// Checks the submitted credentials against the configured users and issues a session token.
pub fn login_user(auth: &AuthConfig, req: &LoginRequest) -> Result<String, AppError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Please enter your username and password".to_string(),
        ));
    }

    let username = req.username.trim();
    let Some(user) = auth.users.get(username) else {
        warn!(username = %username, "Login attempt for unknown user.");
        return Err(AppError::InvalidCredentials);
    };

    let valid_password = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;

    if !valid_password {
        warn!(username = %username, "Login attempt with a wrong password.");
        return Err(AppError::InvalidCredentials);
    }

    let display_name = user.name.clone().unwrap_or_else(|| username.to_string());
    let token = create_jwt_for_user(username, &display_name, auth)?;
    info!(username = %username, "User logged in.");
    Ok(token)
}

pub fn create_jwt_for_user(username: &str, display_name: &str, auth: &AuthConfig) -> Result<String, AppError> {
    let expiration = (Utc::now() + Duration::days(auth.cookie_expiry_days)).timestamp() as usize;

    let claims = Claims {
        sub: username.to_string(),
        name: display_name.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.cookie_key.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

pub fn verify_token(token: &str, auth: &AuthConfig) -> Result<AuthenticatedUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.cookie_key.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "Session token rejected.");
        AppError::InvalidCredentials
    })?;

    // A token for a user that was removed from the config is no longer honoured.
    if !auth.users.contains_key(&token_data.claims.sub) {
        return Err(AppError::InvalidCredentials);
    }

    Ok(AuthenticatedUser {
        username: token_data.claims.sub,
        name: token_data.claims.name,
    })
}
