//! Back-office controller for admins and staff.
//!
//! Actions are split by the entity they manage; every file adds an
//! `impl AdminController` block and [`Controller::action`] below maps the
//! route names onto them.

mod members;
mod offers;
mod partners;
mod system;
mod users;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::controllers::{count_by, parse_id, record_id, rows};
use crate::http::context::RequestContext;
use crate::http::session::{FlashKind, Role};
use crate::routing::{Action, Controller, Halt, Outcome};
use crate::services::PortalServices;
use crate::store::{field_text, today, ListQuery, MemoryStore, Record, SortOrder, Table};

pub(crate) const MEMBER_STATUSES: [&str; 3] = ["active", "inactive", "pending"];
pub(crate) const OFFER_STATUSES: [&str; 3] = ["active", "inactive", "draft"];
const PARTNER_STATUSES: [&str; 2] = ["active", "inactive"];

const DASHBOARD_ROWS: usize = 10;
const TOP_PARTNERS: usize = 5;
const EXPIRY_WINDOW_DAYS: i64 = 30;

/// `YYYY-MM-DD` for `days` from today (negative for the past).
fn date_from_today(days: i64) -> String {
    (chrono::Utc::now().date_naive() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// Serialized form data for the activity log.
fn details(record: &Record) -> Option<String> {
    serde_json::to_string(record).ok()
}

/// One of `allowed`, or `default` when the input is absent or unknown.
fn choice(ctx: &RequestContext, key: &str, allowed: &[&str], default: &str) -> String {
    ctx.raw_input(key)
        .map(str::trim)
        .filter(|v| allowed.contains(v))
        .unwrap_or(default)
        .to_string()
}

/// Active members expiring within the next 30 days, soonest first.
fn expiring_members(store: &MemoryStore) -> Vec<Record> {
    let (from, to) = (today(), date_from_today(EXPIRY_WINDOW_DAYS));
    ListQuery::unpaged()
        .filter("membership_status", Some("active"))
        .date_range("expiry_date", Some(&from), Some(&to))
        .sort("expiry_date", SortOrder::Asc)
        .apply(store.all(Table::Members))
        .records
}

pub(crate) fn member_stats(store: &MemoryStore) -> Value {
    let members = store.all(Table::Members);
    let by_status = count_by(&members, "membership_status", &MEMBER_STATUSES);
    let month_ago = date_from_today(-EXPIRY_WINDOW_DAYS);
    let recently_added = members
        .iter()
        .filter_map(|m| field_text(m, "joining_date"))
        .filter(|d| !d.is_empty() && *d >= month_ago)
        .count();

    json!({
        "total": members.len(),
        "active": by_status["active"],
        "inactive": by_status["inactive"],
        "pending": by_status["pending"],
        "expiring_soon": expiring_members(store).len(),
        "recently_added": recently_added,
    })
}

pub(crate) fn offer_stats(store: &MemoryStore) -> Value {
    let offers = store.all(Table::Offers);
    let by_status = count_by(&offers, "status", &OFFER_STATUSES);
    let today = today();
    let expired = offers
        .iter()
        .filter(|o| field_text(o, "status").as_deref() == Some("active"))
        .filter_map(|o| field_text(o, "end_date"))
        .filter(|end| !end.is_empty() && *end < today)
        .count();

    json!({
        "total": offers.len(),
        "active": by_status["active"],
        "inactive": by_status["inactive"],
        "draft": by_status["draft"],
        "expired": expired,
        "by_category": count_by(&offers, "category", &[]),
    })
}

/// Number of offers per partner id.
fn offer_counts(store: &MemoryStore) -> HashMap<u64, usize> {
    let mut counts = HashMap::new();
    for offer in store.all(Table::Offers) {
        if let Some(partner) = field_text(&offer, "partner_id").and_then(|p| parse_id(&p)) {
            *counts.entry(partner).or_insert(0) += 1;
        }
    }
    counts
}

fn partner_stats(store: &MemoryStore) -> Value {
    let partners = store.all(Table::Partners);
    let by_status = count_by(&partners, "status", &PARTNER_STATUSES);
    let counts = offer_counts(store);

    let mut ranked: Vec<(usize, &Record)> = partners
        .iter()
        .map(|p| (record_id(p).and_then(|id| counts.get(&id).copied()).unwrap_or(0), p))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    let with_offers = ranked.iter().filter(|(n, _)| *n > 0).count();

    let top: Vec<Value> = ranked
        .iter()
        .take(TOP_PARTNERS)
        .map(|(n, p)| {
            json!({
                "id": p.get("id"),
                "name": p.get("name"),
                "status": p.get("status"),
                "offer_count": n,
            })
        })
        .collect();

    json!({
        "total": partners.len(),
        "active": by_status["active"],
        "inactive": by_status["inactive"],
        "with_offers": with_offers,
        "without_offers": partners.len() - with_offers,
        "top_partners": top,
    })
}

/// Attach `user_email`, `first_name`, `last_name` and `role` of the acting user.
pub(crate) fn with_users(
    store: &MemoryStore,
    records: Vec<Record>,
    user_field: &str,
) -> Vec<Record> {
    let users: HashMap<u64, Record> = store
        .all(Table::Users)
        .into_iter()
        .filter_map(|u| Some((record_id(&u)?, u)))
        .collect();

    records
        .into_iter()
        .map(|mut record| {
            let user = record.get(user_field).and_then(Value::as_u64).and_then(|id| users.get(&id));
            for (field, alias) in [
                ("email", "user_email"),
                ("first_name", "first_name"),
                ("last_name", "last_name"),
                ("role", "role"),
            ] {
                let value = user.and_then(|u| u.get(field).cloned()).unwrap_or(Value::Null);
                record.insert(alias.into(), value);
            }
            record
        })
        .collect()
}

pub struct AdminController {
    services: Arc<PortalServices>,
}

impl AdminController {
    fn store(&self) -> &MemoryStore {
        &self.services.store
    }

    fn per_page(&self) -> usize {
        self.services.items_per_page()
    }

    /// Members, offers and partners are managed by admins and staff.
    fn require_staff(ctx: &mut RequestContext) -> Result<(), Halt> {
        ctx.require_role(&[Role::Admin, Role::Staff])
    }

    fn require_admin(ctx: &mut RequestContext) -> Result<(), Halt> {
        ctx.require_role(&[Role::Admin])
    }

    /// Look up `id` in `table`, or flash "`label` not found" and redirect to `back`.
    fn load(
        &self,
        ctx: &mut RequestContext,
        table: Table,
        id: &str,
        label: &str,
        back: &str,
    ) -> Result<(u64, Record), Halt> {
        match parse_id(id).and_then(|id| Some((id, self.store().find(table, id)?))) {
            Some(found) => Ok(found),
            None => Err(ctx.redirect_with(FlashKind::Error, format!("{} not found", label), back)),
        }
    }

    fn dashboard(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        let store = self.store();

        let recent = ListQuery::page(1, DASHBOARD_ROWS);
        let recent_activity = recent.apply(store.all(Table::ActivityLogs));
        let recent_verifications = recent.apply(store.all(Table::VerificationLogs));
        let expiring: Vec<Record> = expiring_members(store)
            .into_iter()
            .take(DASHBOARD_ROWS)
            .collect();

        Ok(ctx.render(
            "admin/dashboard",
            json!({
                "memberStats": member_stats(store),
                "offerStats": offer_stats(store),
                "partnerStats": partner_stats(store),
                "recentActivity": rows(with_users(store, recent_activity.records, "user_id")),
                "recentVerifications": rows(with_users(
                    store,
                    recent_verifications.records,
                    "verified_by"
                )),
                "expiringMembers": rows(expiring),
            }),
        ))
    }
}

impl Controller for AdminController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        use Action::{Nullary, Unary};

        Some(match name {
            "dashboard" => Nullary(Self::dashboard),

            "listMembers" => Nullary(Self::list_members),
            "addMemberForm" => Nullary(Self::add_member_form),
            "addMember" => Nullary(Self::add_member),
            "editMemberForm" => Unary(Self::edit_member_form),
            "editMember" => Unary(Self::edit_member),
            "updateMemberStatus" => Unary(Self::update_member_status),

            "listOffers" => Nullary(Self::list_offers),
            "addOfferForm" => Nullary(Self::add_offer_form),
            "addOffer" => Nullary(Self::add_offer),
            "editOfferForm" => Unary(Self::edit_offer_form),
            "editOffer" => Unary(Self::edit_offer),
            "updateOfferStatus" => Unary(Self::update_offer_status),

            "listPartners" => Nullary(Self::list_partners),
            "addPartnerForm" => Nullary(Self::add_partner_form),
            "addPartner" => Nullary(Self::add_partner),
            "editPartnerForm" => Unary(Self::edit_partner_form),
            "editPartner" => Unary(Self::edit_partner),

            "listUsers" => Nullary(Self::list_users),
            "addUserForm" => Nullary(Self::add_user_form),
            "addUser" => Nullary(Self::add_user),
            "editUserForm" => Unary(Self::edit_user_form),
            "editUser" => Unary(Self::edit_user),

            "activityLogs" => Nullary(Self::activity_logs),
            "settings" => Nullary(Self::settings),
            "updateSettings" => Nullary(Self::update_settings),
            _ => return None,
        })
    }
}
