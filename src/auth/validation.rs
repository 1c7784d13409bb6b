//! Input validation for accounts and content.
//!
//! Checks here are about length and shape only. Uniqueness is decided by the
//! database.

use thiserror::Error;

use crate::TavernError;

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum topic title length (characters).
pub const MAX_TITLE_LENGTH: usize = 120;

/// Maximum post body length (characters).
pub const MAX_BODY_LENGTH: usize = 20_000;

/// Maximum profile status length (characters).
pub const MAX_STATUS_LENGTH: usize = 120;

/// Maximum profile bio length (characters).
pub const MAX_BIO_LENGTH: usize = 2_000;

/// Maximum board slug length.
pub const MAX_SLUG_LENGTH: usize = 64;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username is too short.
    #[error("username must be at least {MIN_USERNAME_LENGTH} characters")]
    UsernameTooShort,

    /// Username is too long.
    #[error("username must be at most {MAX_USERNAME_LENGTH} characters")]
    UsernameTooLong,

    /// Username contains invalid characters.
    #[error("username can only contain letters, digits, '_' and '-'")]
    UsernameInvalidChars,

    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    PasswordTooLong,

    /// Password and its confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,

    /// Title is blank.
    #[error("title cannot be empty")]
    TitleEmpty,

    /// Title is too long.
    #[error("title must be at most {MAX_TITLE_LENGTH} characters")]
    TitleTooLong,

    /// Body is blank.
    #[error("message cannot be empty")]
    BodyEmpty,

    /// Body is too long.
    #[error("message must be at most {MAX_BODY_LENGTH} characters")]
    BodyTooLong,

    /// Slug is malformed.
    #[error("slug must be 1-{MAX_SLUG_LENGTH} lowercase letters, digits or '-'")]
    SlugInvalid,
}

impl From<ValidationError> for TavernError {
    fn from(e: ValidationError) -> Self {
        TavernError::Validation(e.to_string())
    }
}

/// Normalize a username for storage and lookup.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate a (normalized) username.
///
/// # Examples
///
/// ```
/// use tavern::auth::validation::validate_username;
///
/// assert!(validate_username("nova").is_ok());
/// assert!(validate_username("ab").is_err()); // too short
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooShort);
    }
    if len > MAX_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooLong);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::UsernameInvalidChars);
    }
    Ok(())
}

/// Validate a password's length.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }
    Ok(())
}

/// Validate a new password together with its confirmation field.
pub fn validate_password_pair(password: &str, repeat: &str) -> Result<(), ValidationError> {
    validate_password(password)?;
    if password != repeat {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Validate a (normalized) email address.
///
/// # Examples
///
/// ```
/// use tavern::auth::validation::validate_email;
///
/// assert!(validate_email("nova@example.com").is_ok());
/// assert!(validate_email("invalid").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }
    if email.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or(ValidationError::EmailInvalidFormat)?;
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::EmailInvalidFormat);
    }
    if !domain.contains('.') || domain.split('.').any(|p| p.is_empty()) {
        return Err(ValidationError::EmailInvalidFormat);
    }
    Ok(())
}

/// Validate a topic title.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Validate a post body.
pub fn validate_body(body: &str) -> Result<(), ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::BodyEmpty);
    }
    if body.chars().count() > MAX_BODY_LENGTH {
        return Err(ValidationError::BodyTooLong);
    }
    Ok(())
}

/// Validate a board slug.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty()
        || slug.len() > MAX_SLUG_LENGTH
        || !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::SlugInvalid);
    }
    Ok(())
}

/// Truncate free text to at most `max_chars` characters.
pub fn clamp_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_username("  nova \t"), "nova");
        assert_eq!(normalize_username(" Nova "), "Nova");
        assert_eq!(normalize_email("  Nova@Example.COM "), "nova@example.com");
    }

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("nova").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("night-owl_42").is_ok());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_username_lengths() {
        assert_eq!(validate_username(""), Err(ValidationError::UsernameTooShort));
        assert_eq!(validate_username("ab"), Err(ValidationError::UsernameTooShort));
        assert_eq!(
            validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)),
            Err(ValidationError::UsernameTooLong)
        );
    }

    #[test]
    fn test_validate_username_invalid_chars() {
        for name in ["nova star", "nova.star", "nova@star", "növa", "<b>x</b>"] {
            assert_eq!(
                validate_username(name),
                Err(ValidationError::UsernameInvalidChars),
                "{name}"
            );
        }
    }

    #[test]
    fn test_validate_password() {
        assert_eq!(validate_password("12345"), Err(ValidationError::PasswordTooShort));
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"a".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert_eq!(
            validate_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(ValidationError::PasswordTooLong)
        );
    }

    #[test]
    fn test_validate_password_pair() {
        assert!(validate_password_pair("secret1", "secret1").is_ok());
        assert_eq!(
            validate_password_pair("secret1", "secret2"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_password_pair("short", "short"),
            Err(ValidationError::PasswordTooShort)
        );
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("nova@example.com").is_ok());
        assert!(validate_email("a.b+tag@mail.example.org").is_ok());

        for bad in [
            "",
            "invalid",
            "@example.com",
            "nova@",
            "nova@example",
            "nova@example.",
            "nova@@example.com",
            "nova@exa mple.com",
            "a@b@c.com",
        ] {
            assert_eq!(
                validate_email(bad),
                Err(ValidationError::EmailInvalidFormat),
                "{bad}"
            );
        }

        let long = format!("{}@example.com", "a".repeat(MAX_EMAIL_LENGTH));
        assert_eq!(validate_email(&long), Err(ValidationError::EmailTooLong));
    }

    #[test]
    fn test_validate_title_and_body() {
        assert!(validate_title("Hello").is_ok());
        assert_eq!(validate_title("   "), Err(ValidationError::TitleEmpty));
        assert_eq!(
            validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)),
            Err(ValidationError::TitleTooLong)
        );

        assert!(validate_body("First!").is_ok());
        assert_eq!(validate_body("\n\n"), Err(ValidationError::BodyEmpty));
        assert_eq!(
            validate_body(&"b".repeat(MAX_BODY_LENGTH + 1)),
            Err(ValidationError::BodyTooLong)
        );
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("general").is_ok());
        assert!(validate_slug("off-topic-2").is_ok());
        assert_eq!(validate_slug(""), Err(ValidationError::SlugInvalid));
        assert_eq!(validate_slug("Off-Topic"), Err(ValidationError::SlugInvalid));
        assert_eq!(validate_slug("off topic"), Err(ValidationError::SlugInvalid));
    }

    #[test]
    fn test_clamp_text_counts_characters() {
        assert_eq!(clamp_text("hello", 10), "hello");
        assert_eq!(clamp_text("hello", 3), "hel");
        assert_eq!(clamp_text("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn test_validation_error_into_tavern_error() {
        let err: TavernError = ValidationError::PasswordMismatch.into();
        assert!(matches!(err, TavernError::Validation(ref m) if m == "passwords do not match"));
    }
}
