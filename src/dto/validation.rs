//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::session::TraitCode;

/// Longest accepted player name, in characters, after trimming.
pub const MAX_PLAYER_NAME_CHARS: usize = 32;

/// Validates that a player name is non-empty after trimming and reasonably short.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Ada")   // Ok
/// validate_player_name("   ")   // Err - blank
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be empty".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates a four-letter trait code such as `INFJ`; case and surrounding blanks are ignored.
pub fn validate_trait_code(code: &str) -> Result<(), ValidationError> {
    TraitCode::parse(code).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("trait_code_format");
        err.message = Some("MBTI must be a four-letter code such as INFJ".into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("Ada").is_ok());
        assert!(validate_player_name("  Ada  ").is_ok());
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name(" \t ").is_err());
        assert!(validate_player_name(&"x".repeat(MAX_PLAYER_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn test_validate_trait_code() {
        assert!(validate_trait_code("INFJ").is_ok());
        assert!(validate_trait_code(" entp ").is_ok());
        assert!(validate_trait_code("ABCD").is_err());
        assert!(validate_trait_code("INF").is_err());
    }
}
