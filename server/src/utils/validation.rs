use chrono::{DateTime, Utc};

use validator::Validate;

use crate::utils::error::{AppError, AppResult};

/// Trims `value` and fails with `message` when nothing is left.
pub fn required(value: &str, message: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(message.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional value, treating blank input as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercased, trimmed email address. Format checks run through [`check`].
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Runs the `validator` rules derived on `value`, reporting the first failing
/// field's message.
pub fn check<T: Validate>(value: &T) -> AppResult<()> {
    value.validate().map_err(|errors| {
        let mut fields: Vec<(String, String)> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            })
            .collect();
        fields.sort();
        let message = fields
            .into_iter()
            .next()
            .map(|(_, message)| message)
            .unwrap_or_else(|| "Validation failed".to_string());
        AppError::ValidationError(message)
    })
}

pub fn date_order(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if end <= start {
        return Err(AppError::ValidationError(
            "End date must be after start date".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Gala ", "Title is required").unwrap(), "Gala");
        let err = required("   ", "Title is required").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Title is required");
    }

    #[test]
    fn test_optional_drops_blank() {
        assert_eq!(optional(Some("  ".to_string())), None);
        assert_eq!(optional(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(optional(None), None);
    }

    #[derive(Validate)]
    struct Contact {
        #[validate(email(message = "Invalid email"))]
        email: String,
        #[validate(url(message = "Invalid url"))]
        website: Option<String>,
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    fn contact(email: &str, website: Option<&str>, password: &str) -> Contact {
        Contact {
            email: normalize_email(email),
            website: website.map(str::to_string),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ada@Example.com "), "ada@example.com");
    }

    #[test]
    fn test_check_accepts_valid_input() {
        let valid = contact("Ada@Example.com", Some("https://example.org"), "123456");
        assert!(check(&valid).is_ok());
        assert!(check(&contact("ada@example.com", None, "123456")).is_ok());
    }

    #[test]
    fn test_check_reports_field_message() {
        let err = check(&contact("ada", None, "123456")).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Invalid email");

        let err = check(&contact("ada@example.com", Some("example.org"), "123456")).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Invalid url");

        let err = check(&contact("ada@example.com", None, "12345")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Password must be at least 6 characters"
        );
    }

    #[test]
    fn test_date_order() {
        let start = Utc::now();
        assert!(date_order(start, start + Duration::hours(1)).is_ok());
        assert!(date_order(start, start).is_err());
        assert!(date_order(start, start - Duration::hours(1)).is_err());
    }
}
