//! Portal controllers.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → ControllerRegistry ("OfferController" → OfferController)
//!     → OfferController::new(services)   (fresh per request)
//!     → action(ctx, params...)           (guards, store access)
//!     → PortalResponse / Halt
//! ```
//!
//! # Design Decisions
//! - Controllers hold only an `Arc<PortalServices>`; all request state lives in the context
//! - Guards return `Err(Halt)` so actions read top to bottom with `?`
//! - Every POST checks the CSRF token before looking at its fields

pub mod admin;
pub mod auth;
pub mod home;
pub mod member;
pub mod offer;
pub mod page;
pub mod partner;
pub mod report;

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};

use crate::routing::ControllerRegistry;
use crate::store::{field_text, today, MemoryStore, Record, Table};

pub use admin::AdminController;
pub use auth::AuthController;
pub use home::HomeController;
pub use member::MemberController;
pub use offer::OfferController;
pub use page::PageController;
pub use partner::PartnerController;
pub use report::ReportController;

/// Register every portal controller under the name routes refer to.
pub fn registry() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry
        .register::<HomeController>("HomeController")
        .register::<OfferController>("OfferController")
        .register::<MemberController>("MemberController")
        .register::<PageController>("PageController")
        .register::<AuthController>("AuthController")
        .register::<AdminController>("AdminController")
        .register::<ReportController>("ReportController")
        .register::<PartnerController>("PartnerController");
    registry
}

/// Numeric route parameter. Out-of-range values are treated as unknown ids.
pub(crate) fn parse_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

pub(crate) fn rows(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

pub(crate) fn record_id(record: &Record) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

/// Distinct offer categories, alphabetically.
pub(crate) fn categories(store: &MemoryStore) -> Vec<String> {
    let mut categories: Vec<String> = store
        .all(Table::Offers)
        .iter()
        .filter_map(|o| field_text(o, "category"))
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Active partners as `{id, name}` pairs, by name.
pub(crate) fn active_partners(store: &MemoryStore) -> Value {
    let mut partners: Vec<(String, u64)> = store
        .all(Table::Partners)
        .iter()
        .filter(|p| field_text(p, "status").as_deref() == Some("active"))
        .filter_map(|p| Some((field_text(p, "name")?, record_id(p)?)))
        .collect();
    partners.sort();
    Value::Array(
        partners
            .into_iter()
            .map(|(name, id)| json!({ "id": id, "name": name }))
            .collect(),
    )
}

/// Attach `partner_name`, `partner_logo` and `partner_website` to offers.
pub(crate) fn with_partners(store: &MemoryStore, offers: Vec<Record>) -> Vec<Record> {
    let partners: HashMap<u64, Record> = store
        .all(Table::Partners)
        .into_iter()
        .filter_map(|p| Some((record_id(&p)?, p)))
        .collect();

    offers
        .into_iter()
        .map(|mut offer| {
            let partner = offer
                .get("partner_id")
                .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
                .and_then(|id| partners.get(&id));
            for (field, alias) in [
                ("name", "partner_name"),
                ("logo_url", "partner_logo"),
                ("website", "partner_website"),
            ] {
                let value = partner.and_then(|p| p.get(field).cloned()).unwrap_or(Value::Null);
                offer.insert(alias.into(), value);
            }
            offer
        })
        .collect()
}

/// Active offers whose validity window contains today.
pub(crate) fn is_public_offer(offer: &Record, today: &str) -> bool {
    let active = field_text(offer, "status").as_deref() == Some("active");
    let started =
        field_text(offer, "start_date").is_some_and(|d| !d.is_empty() && d.as_str() <= today);
    let not_ended = field_text(offer, "end_date")
        .filter(|d| !d.is_empty())
        .map_or(true, |d| d.as_str() >= today);
    active && started && not_ended
}

/// Publicly visible offers with partner details.
pub(crate) fn public_offers(store: &MemoryStore) -> Vec<Record> {
    let today = today();
    let offers = store
        .all(Table::Offers)
        .into_iter()
        .filter(|o| is_public_offer(o, &today))
        .collect();
    with_partners(store, offers)
}

/// Count records by the text of `field`, seeded with zeroes for `known` values.
pub(crate) fn count_by(records: &[Record], field: &str, known: &[&str]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = known.iter().map(|k| (k.to_string(), 0)).collect();
    for record in records {
        if let Some(value) = field_text(record, field).filter(|v| !v.is_empty()) {
            *counts.entry(value).or_default() += 1;
        }
    }
    counts
}
