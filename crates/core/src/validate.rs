//! Input checks shared by command handlers.

use crate::error::{DomainError, DomainResult};

/// Trimmed, non-empty text.
pub fn require(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn max_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Minimal shape check: `local@domain.tld`, no whitespace. Returns the
/// lowercased address.
pub fn email(value: &str) -> DomainResult<String> {
    let normalized = value.trim().to_lowercase();
    let invalid = || DomainError::validation(format!("invalid email '{}'", value.trim()));

    if normalized.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = normalized.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(invalid());
    };
    if host.is_empty() || tld.len() < 2 || domain.starts_with('.') || domain.contains("..") {
        return Err(invalid());
    }
    Ok(normalized)
}

/// Phone numbers: spaces, dashes, dots and parentheses are ignored, a leading
/// `+` is allowed, and 7 to 15 digits must remain.
pub fn phone(value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    let invalid = || DomainError::validation(format!("invalid phone number '{trimmed}'"));

    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(invalid()),
        }
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(invalid());
    }
    Ok(if plus { format!("+{digits}") } else { digits })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_trims_and_rejects_blank() {
        assert_eq!(require("name", "  Ana ").unwrap(), "Ana");
        assert!(matches!(require("name", "   "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn max_len_counts_chars() {
        assert!(max_len("title", "héllo", 5).is_ok());
        assert!(max_len("title", "héllo!", 5).is_err());
    }

    #[test]
    fn email_accepts_and_lowercases() {
        assert_eq!(email(" Chef@Trattoria.IT ").unwrap(), "chef@trattoria.it");
        assert_eq!(email("a.b+c@mail.co.uk").unwrap(), "a.b+c@mail.co.uk");
    }

    #[test]
    fn email_rejects_malformed() {
        for bad in ["", "no-at-sign", "@host.com", "a@b", "a@.com", "a b@c.com", "a@b@c.com", "a@host.c"] {
            assert!(email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn phone_normalizes_separators() {
        assert_eq!(phone("(555) 123-4567").unwrap(), "5551234567");
        assert_eq!(phone("+39 06.1234.5678").unwrap(), "+390612345678");
    }

    #[test]
    fn phone_rejects_letters_and_bad_length() {
        assert!(phone("555-CALL-NOW").is_err());
        assert!(phone("12345").is_err());
        assert!(phone("1234567890123456").is_err());
    }
}
