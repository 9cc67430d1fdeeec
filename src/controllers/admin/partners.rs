use serde_json::{json, Value};

use super::{choice, details, offer_counts, AdminController, PARTNER_STATUSES};
use crate::controllers::{record_id, rows};
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::FlashKind;
use crate::routing::{Halt, Outcome};
use crate::store::{ListQuery, Record, Table};

const LIST: &str = "/admin/partners";
const REQUIRED: [&str; 3] = ["name", "contact_person", "email"];
const FIELDS: [&str; 7] = [
    "name",
    "contact_person",
    "email",
    "phone",
    "address",
    "logo_url",
    "website",
];

impl AdminController {
    fn partner_form(&self, ctx: &mut RequestContext, back: &str) -> Result<Record, Halt> {
        ctx.require_csrf(back)?;
        ctx.require_fields(&REQUIRED, back)?;

        let mut partner = ctx.record_from(&FIELDS);
        partner.insert(
            "status".into(),
            Value::from(choice(ctx, "status", &PARTNER_STATUSES, "active")),
        );
        Ok(partner)
    }

    pub(super) fn list_partners(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;

        let query = ListQuery::page(ctx.page(), self.per_page())
            .search(ctx.raw_input("search"), &["name", "contact_person", "email"])
            .filter("status", ctx.raw_input("status"));
        let mut page = self.store().list(Table::Partners, &query);

        let counts = offer_counts(self.store());
        for partner in &mut page.records {
            let count = record_id(partner).and_then(|id| counts.get(&id).copied()).unwrap_or(0);
            partner.insert("offer_count".into(), Value::from(count));
        }

        Ok(ctx.render(
            "admin/partners/list",
            json!({
                "partners": rows(page.records),
                "pagination": page.pagination,
                "search": ctx.input("search"),
                "status": ctx.input("status"),
            }),
        ))
    }

    pub(super) fn add_partner_form(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        Ok(ctx.render("admin/partners/add", json!({ "statuses": PARTNER_STATUSES })))
    }

    pub(super) fn add_partner(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        let partner = self.partner_form(ctx, "/admin/partners/add")?;

        let id = self.store().insert(Table::Partners, partner.clone());
        ctx.log_activity("Partner created", Some("partner"), Some(id), details(&partner));

        ctx.flash(FlashKind::Success, "Partner added successfully");
        Ok(PortalResponse::redirect(LIST))
    }

    pub(super) fn edit_partner_form(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        let (id, mut partner) = self.load(ctx, Table::Partners, id, "Partner", LIST)?;

        let offers = offer_counts(self.store()).get(&id).copied().unwrap_or(0);
        partner.insert("offer_count".into(), Value::from(offers));

        Ok(ctx.render(
            "admin/partners/edit",
            json!({
                "partner": partner,
                "statuses": PARTNER_STATUSES,
            }),
        ))
    }

    pub(super) fn edit_partner(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        let back = format!("/admin/partners/edit/{}", id);
        let (id, _) = self.load(ctx, Table::Partners, id, "Partner", LIST)?;
        let partner = self.partner_form(ctx, &back)?;

        if self.store().update(Table::Partners, id, partner.clone()).is_err() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Failed to update partner, please try again",
                &back,
            ));
        }
        ctx.log_activity("Partner updated", Some("partner"), Some(id), details(&partner));

        ctx.flash(FlashKind::Success, "Partner updated successfully");
        Ok(PortalResponse::redirect(LIST))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::tests::{context, last_flash, run};
    use crate::http::session::Role;
    use crate::services::PortalServices;
    use crate::store::{into_record, Table};
    use serde_json::json;

    #[test]
    fn test_add_partner_requires_contact() {
        let services = Arc::new(PortalServices::default());
        let mut ctx = context(
            &services,
            Role::Staff,
            "POST",
            "/admin/partners/add",
            &[("name", "Cafe")],
        );
        let response = run(&mut ctx, "addPartner", &[]);
        assert_eq!(response.location(), Some("/admin/partners/add"));
        assert_eq!(last_flash(&ctx), "Please fill in all required fields: contact_person, email");
    }

    #[test]
    fn test_edit_partner_form_counts_offers() {
        let services = Arc::new(PortalServices::default());
        let store = &services.store;
        store.insert(Table::Partners, into_record(json!({"name": "Cafe", "status": "active"})));
        store.insert(Table::Offers, into_record(json!({"title": "A", "partner_id": 1})));
        store.insert(Table::Offers, into_record(json!({"title": "B", "partner_id": 1})));

        let mut ctx = context(&services, Role::Staff, "GET", "/admin/partners/edit/1", &[]);
        let response = run(&mut ctx, "editPartnerForm", &["1"]);
        assert_eq!(response.data().unwrap()["partner"]["offer_count"], 2);
    }

    #[test]
    fn test_edit_partner_logs_activity() {
        let services = Arc::new(PortalServices::default());
        services.store.insert(
            Table::Partners,
            into_record(json!({"name": "Cafe", "status": "active"})),
        );

        let form = [
            ("name", "Cafe Baku"),
            ("contact_person", "Leyla"),
            ("email", "leyla@cafe.az"),
            ("status", "inactive"),
        ];
        let mut ctx = context(&services, Role::Admin, "POST", "/admin/partners/edit/1", &form);
        let response = run(&mut ctx, "editPartner", &["1"]);

        assert_eq!(response.location(), Some("/admin/partners"));
        let partner = services.store.find(Table::Partners, 1).unwrap();
        assert_eq!(partner["name"], "Cafe Baku");
        assert_eq!(partner["status"], "inactive");
        let log = &services.store.all(Table::ActivityLogs)[0];
        assert_eq!(log["action"], "Partner updated");
        assert_eq!(log["entity_id"], 1);
    }
}
