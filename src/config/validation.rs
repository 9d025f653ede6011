//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and URLs. All
//! violations are collected so a bad file reports everything at once.

use std::time::Duration;

use crate::config::schema::ClientConfig;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, returning every violation found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let scheme = &config.transport.default_scheme;
    if scheme.is_empty()
        || !scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        errors.push(ValidationError::new(
            "transport.default_scheme",
            format!("'{}' is not a valid URI scheme", scheme),
        ));
    }

    if config.transport.default_port == 0 {
        errors.push(ValidationError::new("transport.default_port", "must be non-zero"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }

    let request_secs = config.timeouts.request_secs;
    if !request_secs.is_finite() || request_secs <= 0.0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be a positive number"));
    } else if Duration::try_from_secs_f64(request_secs).is_err() {
        errors.push(ValidationError::new("timeouts.request_secs", "is out of range"));
    }

    if config.tracing.report_timeout_ms == 0 {
        errors.push(ValidationError::new("tracing.report_timeout_ms", "must be greater than 0"));
    }

    if let Some(url) = &config.tracing.collector_url {
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(ValidationError::new(
                "tracing.collector_url",
                format!("unsupported scheme '{}'", parsed.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("tracing.collector_url", e.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
