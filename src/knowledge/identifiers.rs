//! Store identifier validation.
//!
//! Store and match-function names are derived from user-controlled agent
//! names and end up inside schema-definition statements, where they cannot
//! be bound as ordinary parameters. Every name must pass the allow-list
//! here before it is ever interpolated into SQL.

use crate::types::{AppError, AppResult};

/// Postgres truncates identifiers at 63 bytes; the `match_` prefix and
/// headroom for suffixes leave 48 for the store name itself.
pub const MAX_STORE_NAME_LEN: usize = 48;

/// Allow-list check: ASCII lowercase letters, digits and underscores only,
/// no leading digit, bounded length.
pub fn validate_store_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::Validation("store name is empty".to_string()));
    }
    if name.len() > MAX_STORE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "store name '{name}' exceeds {MAX_STORE_NAME_LEN} characters"
        )));
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "store name '{name}' must not start with a digit"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(AppError::Validation(format!(
            "store name '{name}' contains characters outside [a-z0-9_]"
        )));
    }
    Ok(())
}

/// Derive the store name for an agent: `<agent name>_<owner username>`,
/// lowercased, with separators folded to underscores and everything
/// outside the allow-list dropped. Fails when nothing valid is left.
pub fn derive_store_name(agent_name: &str, owner_username: &str) -> AppResult<String> {
    let raw = format!("{agent_name}_{owner_username}").to_lowercase();
    let mut name: String = raw
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => Some(c),
            ' ' | '-' | '.' => Some('_'),
            _ => None,
        })
        .collect();

    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name.truncate(MAX_STORE_NAME_LEN);

    if name.chars().all(|c| c == '_') {
        return Err(AppError::Validation(format!(
            "agent name '{agent_name}' cannot be turned into a store identifier"
        )));
    }

    validate_store_name(&name)?;
    Ok(name)
}

pub fn match_function_name(store_name: &str) -> String {
    format!("match_{store_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names_pass() {
        assert!(validate_store_name("sales_bob").is_ok());
        assert!(validate_store_name("_internal").is_ok());
        assert!(validate_store_name("agent42_alice").is_ok());
    }

    #[test]
    fn test_injection_shaped_names_rejected() {
        assert!(validate_store_name("users; drop table users").is_err());
        assert!(validate_store_name("a\"b").is_err());
        assert!(validate_store_name("Sales_Bob").is_err());
        assert!(validate_store_name("").is_err());
    }

    #[test]
    fn test_length_and_digit_rules() {
        assert!(validate_store_name(&"a".repeat(48)).is_ok());
        assert!(validate_store_name(&"a".repeat(49)).is_err());
        assert!(validate_store_name("1agent").is_err());
    }

    #[test]
    fn test_derivation_normalizes() {
        assert_eq!(derive_store_name("Sales", "bob").unwrap(), "sales_bob");
        assert_eq!(
            derive_store_name("Sales Helper", "bob.smith").unwrap(),
            "sales_helper_bob_smith"
        );
        assert_eq!(derive_store_name("42crew", "bob").unwrap(), "_42crew_bob");
    }

    #[test]
    fn test_derivation_strips_hostile_input() {
        let name = derive_store_name("x'); DROP TABLE agents;--", "bob").unwrap();
        validate_store_name(&name).unwrap();
        assert!(!name.contains(';'));
        assert!(!name.contains('\''));
    }

    #[test]
    fn test_derivation_rejects_empty_result() {
        assert!(derive_store_name("日本語", "株式会社").is_err());
    }

    #[test]
    fn test_match_function_name() {
        assert_eq!(match_function_name("sales_bob"), "match_sales_bob");
    }
}
