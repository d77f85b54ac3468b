//! Utility functions for the movies ETL repository.

/// Validate a SQL identifier before it is spliced into a query.
///
/// Identifiers must be non-empty and contain only ASCII alphanumeric
/// characters and underscores, and must not start with a digit.
///
/// # Example
///
/// ```
/// use movies_etl_repository::validate_identifier;
///
/// assert!(validate_identifier("content").is_ok());
/// assert!(validate_identifier("content; DROP TABLE person").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<(), String> {
    if identifier.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if identifier.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("Identifier '{}' cannot start with a digit", identifier));
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!(
            "Identifier '{}' contains invalid characters. Only alphanumeric characters and underscores are allowed",
            identifier
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for identifier in ["content", "public", "_private", "schema_v2", "A1"] {
            assert!(
                validate_identifier(identifier).is_ok(),
                "Expected '{}' to be valid",
                identifier
            );
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        let test_cases = vec![
            ("", "empty"),
            ("1content", "starts with digit"),
            ("content-v2", "contains dash"),
            ("content.person", "contains dot"),
            ("content person", "contains space"),
            ("content;", "contains semicolon"),
            ("content\"", "contains quote"),
            ("контент", "non-ascii"),
        ];

        for (identifier, description) in test_cases {
            assert!(
                validate_identifier(identifier).is_err(),
                "Expected error for '{}' ({})",
                identifier,
                description
            );
        }
    }
}
