//! # Kubernetes Validation
//!
//! Validates Kubernetes resource names per RFC 1123.

use crate::constants::MAX_RESOURCE_NAME_LENGTH;
use crate::error::ConfigValidationError;
use regex::Regex;
use std::sync::LazyLock;

// RFC 1123 subdomain: [a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*
static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("Failed to compile DNS subdomain regex - this should never happen")
});

/// Validate a webhook configuration name (RFC 1123 subdomain)
/// Format: lowercase alphanumeric, hyphens, dots
/// Length: 1-253 characters
/// Cannot start or end with hyphen or dot
pub fn validate_webhook_name(name: &str) -> Result<(), ConfigValidationError> {
    if name.is_empty() {
        return Err(ConfigValidationError::EmptyWebhookName);
    }

    if name.len() > MAX_RESOURCE_NAME_LENGTH {
        return Err(ConfigValidationError::InvalidWebhookName {
            name: name.to_string(),
            reason: format!(
                "exceeds maximum length of {MAX_RESOURCE_NAME_LENGTH} characters (got {})",
                name.len()
            ),
        });
    }

    if !DNS_SUBDOMAIN.is_match(name) {
        return Err(ConfigValidationError::InvalidWebhookName {
            name: name.to_string(),
            reason: "lowercase alphanumeric, hyphens, dots; cannot start/end with hyphen or dot"
                .to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_webhook_name_valid() {
        let max_name = "a".repeat(253);
        let valid_names = vec![
            "my-webhook",
            "webhook-123",
            "validating.webhook.example.com",
            "a",
            &max_name,
        ];

        for name in valid_names {
            assert!(
                validate_webhook_name(name).is_ok(),
                "Name '{}' should be valid",
                name
            );
        }
    }

    #[test]
    fn test_validate_webhook_name_invalid() {
        let too_long = "a".repeat(254);
        let invalid_names = vec![
            "-invalid",
            "invalid-",
            ".invalid",
            "invalid.",
            "Invalid",
            "invalid_name",
            "invalid name",
            "invalid/name",
            "invalid..name",
            &too_long,
        ];

        for name in invalid_names {
            assert!(
                matches!(
                    validate_webhook_name(name),
                    Err(ConfigValidationError::InvalidWebhookName { .. })
                ),
                "Name '{}' should be invalid",
                name
            );
        }
    }

    #[test]
    fn test_validate_webhook_name_empty() {
        assert!(matches!(
            validate_webhook_name(""),
            Err(ConfigValidationError::EmptyWebhookName)
        ));
    }
}
