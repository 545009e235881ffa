//! Configuration validation with field-level error reporting

use warden_util::{TimeRange, parse_duration};

use crate::{RawConfig, RawUserPolicy};

/// A single validation failure, pointing at the offending field
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            field: field.into(),
            message: message.to_string(),
        }
    }
}

/// Validate a raw config, collecting every error rather than stopping at
/// the first
pub fn validate_config(raw: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(interval) = &raw.daemon.poll_interval {
        match parse_duration(interval) {
            Ok(d) if d.is_zero() => {
                errors.push(ValidationError::new(
                    "daemon.poll_interval",
                    "must be non-zero",
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new("daemon.poll_interval", e)),
        }
    }

    if raw.daemon.retention_days == Some(0) {
        errors.push(ValidationError::new(
            "daemon.retention_days",
            "must be at least 1",
        ));
    }

    validate_user_policy(&raw.default, "default", &mut errors);
    for (name, policy) in &raw.users {
        validate_user_policy(policy, &format!("users.{}", name), &mut errors);
    }

    errors
}

fn validate_user_policy(policy: &RawUserPolicy, prefix: &str, errors: &mut Vec<ValidationError>) {
    if let Some(limit) = &policy.daily_limit
        && let Err(e) = parse_duration(limit)
    {
        errors.push(ValidationError::new(format!("{}.daily_limit", prefix), e));
    }

    if let Some(hours) = &policy.allowed_hours
        && let Err(e) = hours.parse::<TimeRange>()
    {
        errors.push(ValidationError::new(format!("{}.allowed_hours", prefix), e));
    }

    if let Some(hours) = &policy.weekend_hours
        && let Err(e) = hours.parse::<TimeRange>()
    {
        errors.push(ValidationError::new(format!("{}.weekend_hours", prefix), e));
    }

    if let Some(thresholds) = &policy.notify_before {
        for (i, threshold) in thresholds.iter().enumerate() {
            match parse_duration(threshold) {
                Ok(d) if d.is_zero() => errors.push(ValidationError::new(
                    format!("{}.notify_before[{}]", prefix, i),
                    "must be non-zero",
                )),
                Ok(_) => {}
                Err(e) => errors.push(ValidationError::new(
                    format!("{}.notify_before[{}]", prefix, i),
                    e,
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn valid_config_has_no_errors() {
        let raw = raw(r#"
            [default]
            daily_limit = "2h"
            allowed_hours = "09:00-17:00"
            notify_before = ["10m", "5m"]
        "#);

        assert!(validate_config(&raw).is_empty());
    }

    #[test]
    fn collects_multiple_errors() {
        let raw = raw(r#"
            [daemon]
            poll_interval = "fast"

            [users.alice]
            daily_limit = "lots"
            allowed_hours = "17:00-09:00"
        "#);

        let errors = validate_config(&raw);
        assert_eq!(errors.len(), 3);

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"daemon.poll_interval"));
        assert!(fields.contains(&"users.alice.daily_limit"));
        assert!(fields.contains(&"users.alice.allowed_hours"));
    }

    #[test]
    fn zero_notify_threshold_rejected() {
        let raw = raw(r#"
            [users.bob]
            notify_before = ["0s"]
        "#);

        let errors = validate_config(&raw);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "users.bob.notify_before[0]");
    }
}
