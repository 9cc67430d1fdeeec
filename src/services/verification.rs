//! Membership verification.

use serde::Serialize;
use serde_json::Value;

use crate::services::PortalServices;
use crate::store::{field_text, now_datetime, Record, Table};

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub success: bool,
    pub member: Option<Record>,
    pub message: String,
}

/// Member field searched for a verification type. Anything but `id` searches by company.
pub fn verification_field(kind: &str) -> &'static str {
    if kind == "id" {
        "membership_id"
    } else {
        "company_name"
    }
}

impl PortalServices {
    /// Look a member up by membership id or company name and log the attempt.
    ///
    /// Succeeds only when the member exists and its membership is active.
    pub fn verify_member(
        &self,
        kind: &str,
        value: &str,
        verified_by: Option<u64>,
        ip_address: Option<String>,
    ) -> VerificationResult {
        let field = verification_field(kind);
        let member = self.store.find_one_by(Table::Members, field, value);

        let (success, message) = match &member {
            None => (false, "Member not found"),
            Some(m) if field_text(m, "membership_status").as_deref() != Some("active") => {
                (false, "Membership is not active")
            }
            Some(_) => (true, "Member verification successful"),
        };
        let member_id = member.as_ref().and_then(|m| m.get("id").and_then(Value::as_u64));

        tracing::info!(
            target: "verification",
            method = field,
            success,
            member_id = ?member_id,
            verified_by = ?verified_by,
            "Membership verification"
        );

        let mut log = Record::new();
        log.insert("member_id".into(), member_id.map(Value::from).unwrap_or(Value::Null));
        log.insert("verified_by".into(), verified_by.map(Value::from).unwrap_or(Value::Null));
        log.insert("verification_method".into(), Value::from(field));
        log.insert("verification_input".into(), Value::from(value));
        log.insert(
            "verification_result".into(),
            Value::from(if success { "success" } else { "failed" }),
        );
        log.insert("verification_date".into(), Value::from(now_datetime()));
        log.insert("ip_address".into(), Value::from(ip_address.unwrap_or_default()));
        self.store.insert(Table::VerificationLogs, log);

        VerificationResult {
            success,
            member,
            message: message.to_string(),
        }
    }
}
