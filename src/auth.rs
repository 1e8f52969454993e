//! Authentication module.

use crate::db::{Database, NewUser, Session, User, now_timestamp};
use crate::error::{AppError, Resource, Result};
use crate::oauth::OAuthProfile;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;

/// Minimum password length for sign-up.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Maximum nickname length.
pub const MAX_NICKNAME_LEN: usize = 45;

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Korean mobile number: digits only, starts with `01`, 10 or 11 digits.
pub fn is_valid_phone_number(phone_number: &str) -> bool {
    (10..=11).contains(&phone_number.len())
        && phone_number.starts_with("01")
        && phone_number.chars().all(|c| c.is_ascii_digit())
}

fn validate_credentials(phone_number: &str, password: &str, nickname: &str) -> Result<()> {
    if !is_valid_phone_number(phone_number) {
        return Err(AppError::InvalidRequest(format!(
            "Invalid phone number: {}",
            phone_number
        )));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let nickname_len = nickname.trim().chars().count();
    if nickname_len == 0 || nickname_len > MAX_NICKNAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Nickname must be 1-{} characters",
            MAX_NICKNAME_LEN
        )));
    }

    Ok(())
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
    registration_enabled: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, session_duration_days: u32, registration_enabled: bool) -> Self {
        Self {
            db,
            session_duration_days,
            registration_enabled,
        }
    }

    /// Register a new user with phone number and password.
    pub fn sign_up(&self, phone_number: &str, password: &str, nickname: &str) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::RegistrationDisabled);
        }

        self.create_user(phone_number, password, nickname)
    }

    /// Create a new user (admin function, ignores the registration setting).
    pub fn create_user(&self, phone_number: &str, password: &str, nickname: &str) -> Result<User> {
        validate_credentials(phone_number, password, nickname)?;

        let user = self.db.create_user(&NewUser {
            nickname: nickname.trim().to_string(),
            password_hash: Some(hash_password(password)?),
            phone_number: Some(phone_number.to_string()),
            ..NewUser::default()
        })?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Sign in with phone number and password, returning a session token.
    ///
    /// Unknown numbers and wrong passwords are reported identically.
    pub fn sign_in(&self, phone_number: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .db
            .get_user_by_phone(phone_number)?
            .ok_or(AppError::NotExist(Resource::User))?;

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AppError::NotExist(Resource::User));
        };

        if !verify_password(password, hash)? {
            return Err(AppError::NotExist(Resource::User));
        }

        let token = self.create_session(user.id)?;
        Ok((user, token))
    }

    /// Sign in with a verified OAuth profile, creating the account on first use.
    pub fn sign_in_with_profile(&self, profile: &OAuthProfile) -> Result<(User, String)> {
        let user = match self.db.get_user_by_kakao_id(&profile.id)? {
            Some(user) => user,
            None => {
                if !self.registration_enabled {
                    return Err(AppError::RegistrationDisabled);
                }

                let user = self.db.create_user(&NewUser {
                    nickname: profile.nickname.clone(),
                    email: profile.email.clone(),
                    image_url: profile.image_url.clone(),
                    kakao_id: Some(profile.id.clone()),
                    ..NewUser::default()
                })?;
                tracing::info!(user_id = user.id, "User registered via Kakao");
                user
            }
        };

        let token = self.create_session(user.id)?;
        Ok((user, token))
    }

    /// Create a session for a user.
    fn create_session(&self, user_id: i64) -> Result<String> {
        let token = generate_token();
        let expires_at = now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60);

        self.db.create_session(&Session {
            token: token.clone(),
            user_id,
            expires_at,
        })?;

        Ok(token)
    }

    /// Validate a session token and return the user.
    pub fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let session = match self.db.get_session(token)? {
            Some(s) => s,
            None => return Ok(None),
        };

        // Check expiration
        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        self.db.get_user_by_id(session.user_id)
    }

    /// Logout (delete session).
    pub fn logout(&self, token: &str) -> Result<()> {
        self.db.delete_session(token)
    }

    /// Change the password of the user with this phone number.
    pub fn change_password(&self, phone_number: &str, new_password: &str) -> Result<bool> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::InvalidRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(new_password)?;
        self.db.update_user_password(phone_number, &password_hash)
    }

    /// Delete a user.
    pub fn delete_user(&self, phone_number: &str) -> Result<bool> {
        self.db.delete_user(phone_number)
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 43); // Base64 of 32 bytes
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_phone_number_format() {
        assert!(is_valid_phone_number("01012345678"));
        assert!(is_valid_phone_number("0111234567"));
        assert!(!is_valid_phone_number("010-1213-7654"));
        assert!(!is_valid_phone_number("02012345678"));
        assert!(!is_valid_phone_number("010123456789"));
    }
}
