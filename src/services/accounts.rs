//! Back-office accounts: seeding, login and password resets.

use serde_json::Value;

use crate::config::AccountConfig;
use crate::http::session::{random_token, Role, SessionUser};
use crate::services::PortalServices;
use crate::store::{datetime_in, field_text, now_datetime, Record, Table};

/// Length of password reset tokens.
pub const RESET_TOKEN_LENGTH: usize = 64;

/// Session identity for a stored user record.
pub fn session_user(user: &Record) -> Option<SessionUser> {
    let id = user.get("id").and_then(Value::as_u64)?;
    let role = field_text(user, "role")?.parse::<Role>().ok()?;
    let first = field_text(user, "first_name").unwrap_or_default();
    let last = field_text(user, "last_name").unwrap_or_default();

    Some(SessionUser {
        id,
        email: field_text(user, "email").unwrap_or_default(),
        name: format!("{} {}", first, last).trim().to_string(),
        role,
        partner_id: user.get("partner_id").and_then(Value::as_u64),
    })
}

/// Copy of a user record without the password hash.
pub fn public_user(mut user: Record) -> Record {
    user.remove("password");
    user
}

fn is_active(record: &Record) -> bool {
    field_text(record, "status").as_deref() == Some("active")
}

impl PortalServices {
    /// Insert configured accounts whose email is not taken yet. Returns how many were added.
    pub fn seed_accounts(&self, accounts: &[AccountConfig]) -> usize {
        let mut added = 0;
        for account in accounts {
            if self.store.exists_other(Table::Users, "email", &account.email, None) {
                tracing::debug!(email = %account.email, "Seed account already present");
                continue;
            }

            let mut user = Record::new();
            user.insert("email".into(), Value::from(account.email.as_str()));
            user.insert("password".into(), Value::from(self.hasher.hash(&account.password)));
            user.insert("first_name".into(), Value::from(account.first_name.as_str()));
            user.insert("last_name".into(), Value::from(account.last_name.as_str()));
            user.insert("role".into(), Value::from(account.role.as_str()));
            user.insert(
                "partner_id".into(),
                account.partner_id.map(Value::from).unwrap_or(Value::Null),
            );
            user.insert("status".into(), Value::from("active"));

            let id = self.store.insert(Table::Users, user);
            tracing::info!(
                user_id = id,
                email = %account.email,
                role = %account.role,
                "Seeded account"
            );
            added += 1;
        }
        added
    }

    /// Check credentials of an active user and stamp `last_login`.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<Record> {
        let user = self.store.find_one_by(Table::Users, "email", email)?;
        if !is_active(&user) {
            return None;
        }
        let hash = field_text(&user, "password")?;
        if !self.hasher.verify(password, &hash) {
            return None;
        }

        let id = user.get("id").and_then(Value::as_u64)?;
        let mut changes = Record::new();
        changes.insert("last_login".into(), Value::from(now_datetime()));
        self.store.update(Table::Users, id, changes).ok().map(public_user)
    }

    /// Issue a reset token for an active user. Returns the user and token.
    pub fn create_reset_token(&self, email: &str) -> Option<(Record, String)> {
        let user = self.store.find_one_by(Table::Users, "email", email)?;
        if !is_active(&user) {
            return None;
        }

        let token = random_token(RESET_TOKEN_LENGTH);
        let ttl = i64::try_from(self.settings.reset_token_ttl_secs).unwrap_or(i64::MAX / 2);

        let mut reset = Record::new();
        reset.insert("email".into(), Value::from(email));
        reset.insert("token".into(), Value::from(token.as_str()));
        reset.insert("expires_at".into(), Value::from(datetime_in(ttl)));
        reset.insert("used".into(), Value::from(false));

        // One live token per address.
        match self
            .store
            .find_one_by(Table::PasswordResets, "email", email)
            .and_then(|r| r.get("id").and_then(Value::as_u64))
        {
            Some(id) => {
                self.store.update(Table::PasswordResets, id, reset).ok()?;
            }
            None => {
                self.store.insert(Table::PasswordResets, reset);
            }
        }

        Some((public_user(user), token))
    }

    /// The reset row for a token that is unused and unexpired.
    pub fn verify_reset_token(&self, token: &str) -> Option<Record> {
        let reset = self.store.find_one_by(Table::PasswordResets, "token", token)?;
        let used = reset.get("used").and_then(Value::as_bool).unwrap_or(false);
        let expires_at = field_text(&reset, "expires_at")?;
        if used || expires_at <= now_datetime() {
            return None;
        }
        let email = field_text(&reset, "email")?;
        self.store.find_one_by(Table::Users, "email", &email)?;
        Some(reset)
    }

    /// Set a new password through a valid token, consuming the token.
    pub fn reset_password(&self, token: &str, password: &str) -> bool {
        let Some(reset) = self.verify_reset_token(token) else {
            return false;
        };
        let user = field_text(&reset, "email")
            .and_then(|email| self.store.find_one_by(Table::Users, "email", &email));
        let (Some(user_id), Some(reset_id)) = (
            user.as_ref().and_then(|u| u.get("id")).and_then(Value::as_u64),
            reset.get("id").and_then(Value::as_u64),
        ) else {
            return false;
        };

        let mut changes = Record::new();
        changes.insert("password".into(), Value::from(self.hasher.hash(password)));
        if self.store.update(Table::Users, user_id, changes).is_err() {
            return false;
        }

        let mut consumed = Record::new();
        consumed.insert("used".into(), Value::from(true));
        self.store.update(Table::PasswordResets, reset_id, consumed).is_ok()
    }
}
