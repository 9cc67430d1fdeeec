use std::sync::Arc;

use serde_json::{json, Value};

use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::FlashKind;
use crate::routing::{Action, Controller, Outcome};
use crate::services::PortalServices;
use crate::store::Table;

const CONTACT_FIELDS: [&str; 4] = ["name", "email", "subject", "message"];

pub struct PageController {
    services: Arc<PortalServices>,
}

impl PageController {
    fn about(&self, ctx: &mut RequestContext) -> Outcome {
        Ok(ctx.render("pages/about", json!({})))
    }

    fn contact_form(&self, ctx: &mut RequestContext) -> Outcome {
        let contact_email = self.services.setting("contact_email", "");
        Ok(ctx.render("pages/contact", json!({ "contactEmail": contact_email })))
    }

    fn submit_contact(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_csrf("/contact")?;
        ctx.require_fields(&CONTACT_FIELDS, "/contact")?;

        let mut message = ctx.record_from(&CONTACT_FIELDS);
        message.insert(
            "ip_address".into(),
            Value::from(ctx.remote_addr.map(|ip| ip.to_string()).unwrap_or_default()),
        );

        tracing::info!(
            name = ctx.raw_input("name").unwrap_or_default(),
            email = ctx.raw_input("email").unwrap_or_default(),
            subject = ctx.raw_input("subject").unwrap_or_default(),
            "Contact form submission"
        );
        self.services.store.insert(Table::ContactMessages, message);

        ctx.flash(
            FlashKind::Success,
            "Your message has been sent. We will get back to you soon.",
        );
        Ok(PortalResponse::redirect("/contact"))
    }
}

impl Controller for PageController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        Some(match name {
            "about" => Action::Nullary(Self::about),
            "contactForm" => Action::Nullary(Self::contact_form),
            "submitContact" => Action::Nullary(Self::submit_contact),
            _ => return None,
        })
    }
}
