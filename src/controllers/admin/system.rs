use serde_json::{json, Map, Value};

use super::{details, with_users, AdminController};
use crate::controllers::rows;
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::FlashKind;
use crate::routing::Outcome;
use crate::services::accounts::public_user;
use crate::store::{field_text, ListQuery, Record, Table};

const SETTINGS: &str = "/admin/settings";
const TEXT_SETTINGS: [&str; 6] = [
    "site_name",
    "site_description",
    "contact_email",
    "contact_phone",
    "address",
    "logo_url",
];
const SWITCH_SETTINGS: [&str; 3] = [
    "enable_member_verification",
    "enable_partner_portal",
    "maintenance_mode",
];

impl AdminController {
    pub(super) fn activity_logs(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_admin(ctx)?;
        let store = self.store();

        let user_id = ctx.input_number("user_id").filter(|id| *id > 0);
        let query = ListQuery::page(ctx.page(), self.per_page())
            .search(ctx.raw_input("search"), &["action", "details"])
            .filter("user_id", user_id.map(|id| id.to_string()).as_deref())
            .filter("entity_type", ctx.raw_input("entity_type"))
            .date_range("created_at", ctx.raw_input("date_from"), ctx.raw_input("date_to"));
        let page = store.list(Table::ActivityLogs, &query);

        let mut users = store.all(Table::Users);
        users.sort_by_key(|u| field_text(u, "email"));
        let users: Vec<Record> = users.into_iter().map(public_user).collect();

        Ok(ctx.render(
            "admin/logs",
            json!({
                "logs": rows(with_users(store, page.records, "user_id")),
                "pagination": page.pagination,
                "search": ctx.input("search"),
                "userId": user_id,
                "entityType": ctx.input("entity_type"),
                "dateFrom": ctx.input("date_from"),
                "dateTo": ctx.input("date_to"),
                "users": rows(users),
            }),
        ))
    }

    /// Current settings with their defaults filled in.
    fn current_settings(&self) -> Map<String, Value> {
        let defaults = [
            ("site_name", self.services.settings.app_name.clone()),
            ("site_description", String::new()),
            ("contact_email", String::new()),
            ("contact_phone", String::new()),
            ("address", String::new()),
            ("logo_url", String::new()),
            ("enable_member_verification", "1".to_string()),
            ("enable_partner_portal", "1".to_string()),
            ("items_per_page", self.services.settings.items_per_page.to_string()),
            (
                "maintenance_mode",
                if self.services.settings.maintenance_mode { "1" } else { "0" }.to_string(),
            ),
        ];
        defaults
            .into_iter()
            .map(|(key, default)| {
                (key.to_string(), Value::from(self.services.setting(key, &default)))
            })
            .collect()
    }

    pub(super) fn settings(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_admin(ctx)?;
        Ok(ctx.render("admin/settings", json!({ "settings": self.current_settings() })))
    }

    pub(super) fn update_settings(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_admin(ctx)?;
        ctx.require_csrf(SETTINGS)?;

        let mut settings: Vec<(&str, String)> = TEXT_SETTINGS
            .iter()
            .map(|key| (*key, ctx.raw_input_or(key, "").trim().to_string()))
            .collect();
        settings.extend(
            SWITCH_SETTINGS
                .iter()
                .map(|key| (*key, if ctx.checkbox(key) { "1" } else { "0" }.to_string())),
        );
        let per_page = ctx
            .input_number("items_per_page")
            .filter(|n| *n > 0)
            .unwrap_or(self.services.settings.items_per_page as u64);
        settings.push(("items_per_page", per_page.to_string()));

        for (key, value) in &settings {
            if let Err(e) = self.store().put_setting(key, value) {
                tracing::error!(setting = %key, error = %e, "Failed to save setting");
                return Err(ctx.redirect_with(
                    FlashKind::Error,
                    "Failed to update settings",
                    SETTINGS,
                ));
            }
        }

        let logged: Record = settings
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v.as_str())))
            .collect();
        ctx.log_activity("Settings updated", Some("settings"), None, details(&logged));
        tracing::info!(
            maintenance_mode = self.services.maintenance_mode(),
            items_per_page = per_page,
            "Portal settings changed"
        );

        ctx.flash(FlashKind::Success, "Settings updated successfully");
        Ok(PortalResponse::redirect(SETTINGS))
    }
}
