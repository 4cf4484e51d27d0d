use crate::errors::{AppError, AppResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use regex::Regex;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.@-]{1,64}$").expect("valid username regex"));

/// Trims and validates a username, returning the stored form.
pub fn normalize_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::Validation(
            "Username may only contain letters, digits, '.', '_', '-' and '@' (max 64)".to_string(),
        ));
    }
    Ok(username.to_string())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| AppError::Internal(format!("password hashing failed: {error}")))
}

/// Returns false for a wrong password; errors only on a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|error| AppError::Internal(format!("stored password hash is invalid: {error}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::{hash_password, normalize_username, verify_password};
    use crate::errors::AppError;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).expect("verify"));
        assert!(!verify_password("battery staple", &hash).expect("verify"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let first = hash_password("pw").expect("hash");
        let second = hash_password("pw").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(hash_password(""), Err(AppError::Validation(_))));
    }

    #[test]
    fn malformed_stored_hash_is_internal_error() {
        assert!(matches!(
            verify_password("pw", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn usernames_are_trimmed_and_checked() {
        assert_eq!(normalize_username("  alice ").expect("valid"), "alice");
        assert!(matches!(normalize_username("   "), Err(AppError::Validation(_))));
        assert!(matches!(normalize_username("bob smith"), Err(AppError::Validation(_))));
    }
}
