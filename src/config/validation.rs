//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (page size > 0, addresses parse)
//! - Check seeded accounts (roles exist, emails unique, partners linked)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PortalConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::PortalConfig;
use crate::http::session::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("app.base_path '{0}' must start with '/'")]
    BasePath(String),

    #[error("session.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("account '{email}': {reason}")]
    Account { email: String, reason: String },
}

fn account_error(email: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Account {
        email: email.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.app.items_per_page == 0 {
        errors.push(ValidationError::Zero("app.items_per_page"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size"));
    }
    if !config.app.base_path.starts_with('/') {
        errors.push(ValidationError::BasePath(config.app.base_path.clone()));
    }
    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    let mut seen = HashSet::new();
    for account in &config.accounts {
        if !account.email.contains('@') {
            errors.push(account_error(&account.email, "email is not valid"));
        }
        if !seen.insert(account.email.to_lowercase()) {
            errors.push(account_error(&account.email, "email is listed twice"));
        }
        if account.password.len() < config.security.min_password_length {
            errors.push(account_error(
                &account.email,
                format!(
                    "password must be at least {} characters long",
                    config.security.min_password_length
                ),
            ));
        }
        match account.role.parse::<Role>() {
            Ok(Role::Partner) if account.partner_id.is_none() => {
                errors.push(account_error(&account.email, "partner accounts need a partner_id"));
            }
            Ok(_) => {}
            Err(reason) => errors.push(account_error(&account.email, reason)),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AccountConfig;

    fn account(email: &str, role: &str) -> AccountConfig {
        AccountConfig {
            email: email.to_string(),
            password: "supersecret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Admin".to_string(),
            role: role.to_string(),
            partner_id: None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&PortalConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = PortalConfig::default();
        config.listener.bind_address = "nowhere".to_string();
        config.app.items_per_page = 0;
        config.app.base_path = "portal".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero("app.items_per_page")));
    }

    #[test]
    fn test_account_checks() {
        let mut config = PortalConfig::default();
        config.accounts = vec![
            account("admin@pasha.org", "admin"),
            account("ADMIN@pasha.org", "staff"),
            account("partner@pasha.org", "partner"),
            account("nobody", "guest"),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
