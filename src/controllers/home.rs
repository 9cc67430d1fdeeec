use std::sync::Arc;

use serde_json::json;

use crate::controllers::{categories, public_offers, rows};
use crate::http::context::RequestContext;
use crate::routing::{Action, Controller, Outcome};
use crate::services::PortalServices;
use crate::store::{ListQuery, SortOrder};

/// Number of offers featured on the home page.
const FEATURED_OFFERS: usize = 6;

pub struct HomeController {
    services: Arc<PortalServices>,
}

impl HomeController {
    fn index(&self, ctx: &mut RequestContext) -> Outcome {
        let latest = ListQuery::page(1, FEATURED_OFFERS)
            .sort("start_date", SortOrder::Desc)
            .apply(public_offers(&self.services.store));

        Ok(ctx.render(
            "home/index",
            json!({
                "offers": rows(latest.records),
                "categories": categories(&self.services.store),
            }),
        ))
    }
}

impl Controller for HomeController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        match name {
            "index" => Some(Action::Nullary(Self::index)),
            _ => None,
        }
    }
}
