//! Input validation for API requests.
//!
//! Mirrors the presence checks the client form enforces (`required`,
//! `minLength`) so the server never relies on the browser.

use lazy_static::lazy_static;
use regex::Regex;

/// Minimum password length, matching the registration form's minLength
pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    /// Regex for validating email addresses (pragmatic, not RFC 5322)
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a first name
pub fn validate_first_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("First name is required".to_string());
    }

    if name.len() > 100 {
        return Err("First name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_accepts_normal_addresses() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("jane.doe+tag@sub.example.co").is_ok());
    }

    #[test]
    fn test_validate_email_rejects_bad_addresses() {
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }

    #[test]
    fn test_validate_password_length_bounds() {
        assert!(validate_password("").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("hunter2!").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_first_name_presence() {
        assert!(validate_first_name("Jane").is_ok());
        assert!(validate_first_name("").is_err());
        assert!(validate_first_name("   ").is_err());
    }
}
