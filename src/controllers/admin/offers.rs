use serde_json::{json, Value};

use super::{choice, details, AdminController, OFFER_STATUSES};
use crate::controllers::{active_partners, categories, rows, with_partners};
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::FlashKind;
use crate::routing::{Halt, Outcome};
use crate::store::{ListQuery, Record, Table};

const LIST: &str = "/admin/offers";
const REQUIRED: [&str; 5] = ["title", "description", "partner_id", "category", "start_date"];
const FIELDS: [&str; 8] = [
    "title",
    "description",
    "category",
    "discount_value",
    "redemption_instructions",
    "start_date",
    "end_date",
    "image_url",
];

impl AdminController {
    fn offer_form(&self, ctx: &mut RequestContext, back: &str) -> Result<Record, Halt> {
        ctx.require_csrf(back)?;
        ctx.require_fields(&REQUIRED, back)?;

        let partner = ctx
            .input_number("partner_id")
            .filter(|id| self.store().find(Table::Partners, *id).is_some());
        let Some(partner) = partner else {
            return Err(ctx.redirect_with(FlashKind::Error, "Please select a valid partner", back));
        };

        let mut offer = ctx.record_from(&FIELDS);
        offer.insert("partner_id".into(), Value::from(partner));
        offer.insert(
            "status".into(),
            Value::from(choice(ctx, "status", &OFFER_STATUSES, "active")),
        );
        Ok(offer)
    }

    pub(super) fn list_offers(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        let store = self.store();

        let page = ListQuery::page(ctx.page(), self.per_page())
            .search(ctx.raw_input("search"), &["title", "description", "partner_name"])
            .filter("status", ctx.raw_input("status"))
            .filter("partner_id", ctx.raw_input("partner_id"))
            .filter("category", ctx.raw_input("category"))
            .apply(with_partners(store, store.all(Table::Offers)));

        Ok(ctx.render(
            "admin/offers/list",
            json!({
                "offers": rows(page.records),
                "pagination": page.pagination,
                "search": ctx.input("search"),
                "status": ctx.input("status"),
                "partnerId": ctx.input_number("partner_id"),
                "category": ctx.input("category"),
                "partners": active_partners(store),
                "categories": categories(store),
            }),
        ))
    }

    pub(super) fn add_offer_form(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        Ok(ctx.render(
            "admin/offers/add",
            json!({
                "partners": active_partners(self.store()),
                "categories": categories(self.store()),
                "statuses": OFFER_STATUSES,
            }),
        ))
    }

    pub(super) fn add_offer(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        let offer = self.offer_form(ctx, "/admin/offers/add")?;

        let id = self.store().insert(Table::Offers, offer.clone());
        ctx.log_activity("Offer created", Some("offer"), Some(id), details(&offer));

        ctx.flash(FlashKind::Success, "Offer added successfully");
        Ok(PortalResponse::redirect(LIST))
    }

    pub(super) fn edit_offer_form(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        let (_, offer) = self.load(ctx, Table::Offers, id, "Offer", LIST)?;

        Ok(ctx.render(
            "admin/offers/edit",
            json!({
                "offer": offer,
                "partners": active_partners(self.store()),
                "categories": categories(self.store()),
                "statuses": OFFER_STATUSES,
            }),
        ))
    }

    pub(super) fn edit_offer(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        let back = format!("/admin/offers/edit/{}", id);
        let (id, _) = self.load(ctx, Table::Offers, id, "Offer", LIST)?;
        let offer = self.offer_form(ctx, &back)?;

        if self.store().update(Table::Offers, id, offer.clone()).is_err() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Failed to update offer, please try again",
                &back,
            ));
        }
        ctx.log_activity("Offer updated", Some("offer"), Some(id), details(&offer));

        ctx.flash(FlashKind::Success, "Offer updated successfully");
        Ok(PortalResponse::redirect(LIST))
    }

    pub(super) fn update_offer_status(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        ctx.require_csrf(LIST)?;
        let (id, _) = self.load(ctx, Table::Offers, id, "Offer", LIST)?;

        let status = ctx.raw_input_or("status", "");
        let mut changes = Record::new();
        changes.insert("status".into(), Value::from(status.as_str()));

        let updated = OFFER_STATUSES.contains(&status.as_str())
            && self.store().update(Table::Offers, id, changes).is_ok();
        if !updated {
            return Err(ctx.redirect_with(FlashKind::Error, "Failed to update offer status", LIST));
        }
        ctx.log_activity(
            "Offer status updated",
            Some("offer"),
            Some(id),
            Some(format!("Status changed to {}", status)),
        );

        ctx.flash(FlashKind::Success, "Offer status updated successfully");
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

    fn services_with_partner() -> Arc<PortalServices> {
        let services = Arc::new(PortalServices::default());
        services
            .store
            .insert(Table::Partners, into_record(json!({"name": "Cafe Baku", "status": "active"})));
        services
    }

    fn offer_form(partner_id: &'static str) -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "Latte 10%"),
            ("description", "Ten percent off"),
            ("partner_id", partner_id),
            ("category", "food"),
            ("start_date", "2024-01-01"),
            ("status", "draft"),
        ]
    }

    #[test]
    fn test_add_offer() {
        let services = services_with_partner();
        let mut ctx = context(
            &services,
            Role::Staff,
            "POST",
            "/admin/offers/add",
            &offer_form("1"),
        );
        let response = run(&mut ctx, "addOffer", &[]);

        assert_eq!(response.location(), Some("/admin/offers"));
        let offer = services.store.find(Table::Offers, 1).unwrap();
        assert_eq!(offer["partner_id"], 1);
        assert_eq!(offer["status"], "draft");
        assert_eq!(offer["end_date"], "");
    }

    #[test]
    fn test_add_offer_unknown_partner() {
        let services = services_with_partner();
        let mut ctx = context(
            &services,
            Role::Staff,
            "POST",
            "/admin/offers/add",
            &offer_form("7"),
        );
        let response = run(&mut ctx, "addOffer", &[]);
        assert_eq!(response.location(), Some("/admin/offers/add"));
        assert_eq!(last_flash(&ctx), "Please select a valid partner");
    }

    #[test]
    fn test_list_offers_filters_by_partner() {
        let services = services_with_partner();
        let store = &services.store;
        store.insert(
            Table::Offers,
            into_record(json!({"title": "A", "partner_id": 1, "status": "active"})),
        );
        store.insert(
            Table::Offers,
            into_record(json!({"title": "B", "partner_id": 2, "status": "active"})),
        );

        let mut ctx = context(&services, Role::Admin, "GET", "/admin/offers?partner_id=1", &[]);
        let response = run(&mut ctx, "listOffers", &[]);
        let data = response.data().unwrap();
        assert_eq!(data["offers"].as_array().unwrap().len(), 1);
        assert_eq!(data["offers"][0]["partner_name"], "Cafe Baku");
        assert_eq!(data["partnerId"], 1);
    }

    #[test]
    fn test_update_offer_status_rejects_unknown() {
        let services = services_with_partner();
        services.store.insert(
            Table::Offers,
            into_record(json!({"title": "A", "status": "active"})),
        );

        let mut ctx = context(
            &services,
            Role::Staff,
            "POST",
            "/admin/offers/status/1",
            &[("status", "expired")],
        );
        run(&mut ctx, "updateOfferStatus", &["1"]);
        assert_eq!(last_flash(&ctx), "Failed to update offer status");

        let mut ctx = context(
            &services,
            Role::Staff,
            "POST",
            "/admin/offers/status/1",
            &[("status", "inactive")],
        );
        run(&mut ctx, "updateOfferStatus", &["1"]);
        assert_eq!(last_flash(&ctx), "Offer status updated successfully");
        assert_eq!(services.store.find(Table::Offers, 1).unwrap()["status"], "inactive");
    }
}
