//! Public offer catalogue.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::controllers::{categories, parse_id, public_offers, record_id, rows};
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::FlashKind;
use crate::routing::{Action, Controller, Outcome};
use crate::services::PortalServices;
use crate::store::{field_text, ListQuery, SortOrder};

const RELATED_OFFERS: usize = 3;

pub struct OfferController {
    services: Arc<PortalServices>,
}

impl OfferController {
    fn list_public(&self, ctx: &mut RequestContext) -> Outcome {
        let search = ctx.input("search");
        let category = ctx.input("category");

        let page = ListQuery::page(ctx.page(), self.services.items_per_page())
            .filter("category", ctx.raw_input("category"))
            .search(
                ctx.raw_input("search"),
                &["title", "description", "partner_name"],
            )
            .sort("start_date", SortOrder::Desc)
            .apply(public_offers(&self.services.store));

        Ok(ctx.render(
            "offers/list",
            json!({
                "offers": rows(page.records),
                "pagination": page.pagination,
                "categories": categories(&self.services.store),
                "currentCategory": category,
                "search": search,
            }),
        ))
    }

    fn list_by_category(&self, _ctx: &mut RequestContext, category: &str) -> Outcome {
        let encoded: String = url::form_urlencoded::byte_serialize(category.as_bytes()).collect();
        Ok(PortalResponse::redirect(format!("/offers?category={}", encoded)))
    }

    fn view(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        let offers = public_offers(&self.services.store);
        let offer = parse_id(id)
            .and_then(|id| offers.iter().find(|o| record_id(o) == Some(id)))
            .cloned();

        let Some(offer) = offer else {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Offer not found or no longer available",
                "/offers",
            ));
        };

        let category = field_text(&offer, "category");
        let related: Vec<Value> = {
            let mut related: Vec<_> = offers
                .into_iter()
                .filter(|o| {
                    record_id(o) != record_id(&offer) && field_text(o, "category") == category
                })
                .collect();
            related.sort_by(|a, b| field_text(b, "start_date").cmp(&field_text(a, "start_date")));
            related.into_iter().take(RELATED_OFFERS).map(Value::Object).collect()
        };

        Ok(ctx.render(
            "offers/view",
            json!({
                "offer": offer,
                "relatedOffers": related,
            }),
        ))
    }
}

impl Controller for OfferController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        Some(match name {
            "listPublic" => Action::Nullary(Self::list_public),
            "listByCategory" => Action::Unary(Self::list_by_category),
            "view" => Action::Unary(Self::view),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{into_record, Table};

    fn services() -> Arc<PortalServices> {
        let services = Arc::new(PortalServices::default());
        let store = &services.store;
        let partner = store.insert(
            Table::Partners,
            into_record(json!({"name": "Cafe Baku", "status": "active"})),
        );
        for (title, category, status) in [
            ("Latte 10%", "food", "active"),
            ("Gym pass", "sport", "active"),
            ("Cake 5%", "food", "active"),
            ("Hidden", "food", "draft"),
        ] {
            store.insert(
                Table::Offers,
                into_record(json!({
                    "title": title,
                    "description": "",
                    "category": category,
                    "status": status,
                    "partner_id": partner,
                    "start_date": "2020-01-01",
                    "end_date": "",
                })),
            );
        }
        services
    }

    fn run(ctx: &mut RequestContext, action: &str, params: &[&str]) -> PortalResponse {
        let controller = OfferController::new(ctx.services());
        let outcome = match (OfferController::action(action), params) {
            (Some(Action::Nullary(f)), []) => f(&controller, ctx),
            (Some(Action::Unary(f)), [p]) => f(&controller, ctx, p),
            _ => panic!("unexpected action shape"),
        };
        outcome.unwrap_or_else(|halt| halt.0)
    }

    #[test]
    fn test_list_public_filters_category() {
        let mut ctx = RequestContext::new("GET", "/offers?category=food").with_services(services());
        let response = run(&mut ctx, "listPublic", &[]);
        let data = response.data().unwrap();
        assert_eq!(data["offers"].as_array().unwrap().len(), 2);
        assert_eq!(data["pagination"]["total_items"], 2);
        assert_eq!(data["categories"], json!(["food", "sport"]));
    }

    #[test]
    fn test_list_public_searches_partner_name() {
        let mut ctx = RequestContext::new("GET", "/offers?search=baku").with_services(services());
        let response = run(&mut ctx, "listPublic", &[]);
        assert_eq!(response.data().unwrap()["offers"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_category_redirect_is_encoded() {
        let mut ctx = RequestContext::new("GET", "/offers/category/food-drink");
        let response = run(&mut ctx, "listByCategory", &["food-drink"]);
        assert_eq!(response.location(), Some("/offers?category=food-drink"));
    }

    #[test]
    fn test_view_shows_related() {
        let mut ctx = RequestContext::new("GET", "/offers/1").with_services(services());
        let response = run(&mut ctx, "view", &["1"]);
        assert_eq!(response.template(), Some("offers/view"));
        let data = response.data().unwrap();
        assert_eq!(data["offer"]["partner_name"], "Cafe Baku");
        assert_eq!(data["relatedOffers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_view_hidden_offer_redirects() {
        let mut ctx = RequestContext::new("GET", "/offers/4").with_services(services());
        let response = run(&mut ctx, "view", &["4"]);
        assert_eq!(response.location(), Some("/offers"));
        assert_eq!(ctx.session.flash[0].message, "Offer not found or no longer available");
    }
}
