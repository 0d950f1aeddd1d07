//! Validation helpers for DTOs.

use validator::ValidationError;

/// Length of a hex-encoded ed25519 public key.
const PLAYER_ID_LENGTH: usize = 64;

/// Validates that a player id is a 64-character lowercase-hex ed25519 public key.
///
/// # Examples
///
/// ```ignore
/// validate_player_id(&"ab".repeat(32)) // Ok
/// validate_player_id("AB0...")         // Err - uppercase
/// validate_player_id("abc")            // Err - too short
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != PLAYER_ID_LENGTH {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "player id must be exactly {} characters (got {})",
                PLAYER_ID_LENGTH,
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("player id must contain only lowercase hexadecimal characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a roster character id: non-empty, short, lowercase slug.
pub fn validate_character_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 32 {
        let mut err = ValidationError::new("character_id_length");
        err.message = Some("character id must be between 1 and 32 characters".into());
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("character_id_format");
        err.message = Some("character id must be a lowercase slug".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_player_ids_pass() {
        assert!(validate_player_id(&"ab".repeat(32)).is_ok());
        assert!(validate_player_id(&"0".repeat(64)).is_ok());
        assert!(validate_player_id(&"9f".repeat(32)).is_ok());
    }

    #[test]
    fn player_id_length_is_enforced() {
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id(&"a".repeat(63)).is_err());
        assert!(validate_player_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn player_id_format_is_enforced() {
        assert!(validate_player_id(&"G".repeat(64)).is_err()); // not hex
        assert!(validate_player_id(&"AB".repeat(32)).is_err()); // uppercase
        assert!(validate_player_id(&format!("{} {}", "a".repeat(31), "b".repeat(31))).is_err());
    }

    #[test]
    fn character_ids_are_slugs() {
        assert!(validate_character_id("razor").is_ok());
        assert!(validate_character_id("iron-fist_2").is_ok());
        assert!(validate_character_id("").is_err());
        assert!(validate_character_id("Razor").is_err());
        assert!(validate_character_id(&"x".repeat(33)).is_err());
    }
}
