use std::sync::Arc;

use serde_json::json;

use crate::http::context::RequestContext;
use crate::http::session::FlashKind;
use crate::routing::{Action, Controller, Outcome};
use crate::services::PortalServices;

pub struct MemberController {
    services: Arc<PortalServices>,
}

impl MemberController {
    fn verify_form(&self, ctx: &mut RequestContext) -> Outcome {
        Ok(ctx.render("members/verify", json!({})))
    }

    fn verify_member(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_csrf("/verify")?;

        let kind = ctx.raw_input_or("verification_type", "id");
        let value = ctx.raw_input_or("verification_value", "").trim().to_string();
        if value.is_empty() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Please enter a value to verify",
                "/verify",
            ));
        }

        let verified_by = ctx.session.user_id();
        let ip = ctx.remote_addr.map(|ip| ip.to_string());
        let result = self.services.verify_member(&kind, &value, verified_by, ip);

        Ok(ctx.render(
            "members/verify_result",
            json!({
                "result": result,
                "type": kind,
                "value": value,
            }),
        ))
    }
}

impl Controller for MemberController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        Some(match name {
            "verifyForm" => Action::Nullary(Self::verify_form),
            "verifyMember" => Action::Nullary(Self::verify_member),
            _ => return None,
        })
    }
}
