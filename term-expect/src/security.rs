//! SQL identifier validation and literal escaping.
//!
//! Every column and table name that reaches the SQL engine passes through
//! [`SqlSecurity::escape_identifier`], and every literal value through
//! [`SqlSecurity::escape_literal`].

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and escapes a SQL identifier (table name, column name, etc.).
    ///
    /// # Examples
    /// ```rust
    /// use term_expect::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("event_date").unwrap(), "\"event_date\"");
    /// assert_eq!(SqlSecurity::escape_identifier("user-id").unwrap(), "\"user-id\"");
    /// assert_eq!(SqlSecurity::escape_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::escape_identifier("").is_err());
    /// assert!(SqlSecurity::escape_identifier(&"very_long_name_".repeat(100)).is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates a SQL identifier without escaping it.
    ///
    /// Identifiers are always emitted double-quoted, so any printable name
    /// is accepted, including `user-id` or `Order Total`.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > 128 {
            return Err(TermError::SecurityError(
                "SQL identifier too long (max 128 characters)".to_string(),
            ));
        }

        if identifier.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        if identifier.chars().any(char::is_control) {
            return Err(TermError::SecurityError(format!(
                "SQL identifier cannot contain control characters: {identifier:?}"
            )));
        }

        Ok(())
    }

    /// Validates a name registered with the SQL context.
    ///
    /// Registration parses the name as a possibly qualified table
    /// reference, so table names keep the plain `[a-zA-Z_][a-zA-Z0-9_]*`
    /// form.
    pub fn validate_table_name(name: &str) -> Result<()> {
        Self::validate_identifier(name)?;

        static TABLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
            // Hard-coded pattern, known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Hard-coded regex pattern should be valid")
        });

        if !TABLE_NAME_REGEX.is_match(name) {
            return Err(TermError::SecurityError(format!(
                "Invalid table name: '{name}'. Table names must start with a letter or underscore and contain only letters, numbers and underscores"
            )));
        }

        Ok(())
    }

    /// Quotes a string as a SQL literal, doubling embedded single quotes.
    pub fn escape_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}
