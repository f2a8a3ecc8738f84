//! Payload and room name validation rules.

use chathub_core::error::AppError;

/// Longest accepted room name, in characters.
pub const MAX_ROOM_NAME_CHARS: usize = 100;

/// Validates an inbound chat payload and returns the trimmed body.
pub fn validate_body(raw: &str, max_bytes: usize) -> Result<&str, AppError> {
    if raw.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_bytes} bytes"
        )));
    }

    let body = raw.trim();
    if body.is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(body)
}

/// Validates a room display name and returns it trimmed.
pub fn validate_room_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_CHARS {
        return Err(AppError::validation(format!(
            "Room name must be 1 to {MAX_ROOM_NAME_CHARS} characters"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(AppError::validation(
            "Room name contains control characters",
        ));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_trimmed() {
        assert_eq!(validate_body("  hi \n", 16).unwrap(), "hi");
    }

    #[test]
    fn test_body_rejects_blank_and_oversized() {
        assert!(validate_body(" \t ", 16).is_err());
        assert!(validate_body(&"x".repeat(17), 16).is_err());
    }

    #[test]
    fn test_room_names() {
        assert_eq!(validate_room_name(" general ").unwrap(), "general");
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name("bad\u{0007}name").is_err());
        assert!(validate_room_name(&"r".repeat(MAX_ROOM_NAME_CHARS + 1)).is_err());
    }
}
