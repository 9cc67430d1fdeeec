//! Partner self-service portal.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::controllers::rows;
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::{FlashKind, Role};
use crate::routing::{Action, Controller, Halt, Outcome};
use crate::services::PortalServices;
use crate::store::{field_text, ListQuery, Record, SortOrder, Table};

const PROFILE: &str = "/partner/profile";
const PROFILE_FIELDS: [&str; 5] = ["contact_person", "email", "phone", "address", "website"];
const RECENT_VERIFICATIONS: usize = 10;

pub struct PartnerController {
    services: Arc<PortalServices>,
}

impl PartnerController {
    /// Partner record of the signed-in partner user, or a redirect to `missing`.
    fn partner(&self, ctx: &mut RequestContext, missing: &str) -> Result<(u64, Record), Halt> {
        ctx.require_role(&[Role::Partner])?;

        let partner_id = ctx.session.user.as_ref().and_then(|u| u.partner_id);
        match partner_id.and_then(|id| Some((id, self.services.store.find(Table::Partners, id)?))) {
            Some(found) => Ok(found),
            None => Err(ctx.redirect_with(FlashKind::Error, "Partner not found", missing)),
        }
    }

    fn dashboard(&self, ctx: &mut RequestContext) -> Outcome {
        let (partner_id, partner) = self.partner(ctx, "/")?;
        let store = &self.services.store;

        let offers = ListQuery::unpaged()
            .filter("partner_id", Some(&partner_id.to_string()))
            .sort("start_date", SortOrder::Desc)
            .apply(store.all(Table::Offers))
            .records;

        let user_id = ctx.session.user_id().map(|id| id.to_string());
        let verifications: Vec<Record> = ListQuery::page(1, RECENT_VERIFICATIONS)
            .filter("verified_by", user_id.as_deref())
            .sort("verification_date", SortOrder::Desc)
            .apply(store.all(Table::VerificationLogs))
            .records
            .into_iter()
            .filter_map(|mut log| {
                let member = store.find(Table::Members, log.get("member_id")?.as_u64()?)?;
                for field in ["company_name", "membership_id"] {
                    let value = member.get(field).cloned().unwrap_or(Value::Null);
                    log.insert(field.into(), value);
                }
                Some(log)
            })
            .collect();

        Ok(ctx.render(
            "partner/dashboard",
            json!({
                "partner": partner,
                "offers": rows(offers),
                "verifications": rows(verifications),
            }),
        ))
    }

    fn verify_form(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Partner])?;
        Ok(ctx.render("partner/verify", json!({})))
    }

    fn verify_member(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Partner])?;
        ctx.require_csrf("/partner/verify")?;

        let kind = ctx.raw_input_or("verification_type", "id");
        let value = ctx.raw_input_or("verification_value", "").trim().to_string();
        if value.is_empty() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Please enter a value to verify",
                "/partner/verify",
            ));
        }

        let ip = ctx.remote_addr.map(|ip| ip.to_string());
        let result = self.services.verify_member(&kind, &value, ctx.session.user_id(), ip);

        Ok(ctx.render(
            "partner/verify_result",
            json!({
                "result": result,
                "type": kind,
                "value": value,
            }),
        ))
    }

    fn profile_form(&self, ctx: &mut RequestContext) -> Outcome {
        let (_, partner) = self.partner(ctx, "/partner")?;
        Ok(ctx.render("partner/profile", json!({ "partner": partner })))
    }

    fn update_profile(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Partner])?;
        ctx.require_csrf(PROFILE)?;
        let (partner_id, _) = self.partner(ctx, "/partner")?;
        ctx.require_fields(&["contact_person", "email"], PROFILE)?;

        let changes = ctx.record_from(&PROFILE_FIELDS);
        if self.services.store.update(Table::Partners, partner_id, changes.clone()).is_err() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Failed to update profile, please try again",
                PROFILE,
            ));
        }
        ctx.log_activity(
            "Partner profile updated",
            Some("partner"),
            Some(partner_id),
            serde_json::to_string(&changes).ok(),
        );
        tracing::debug!(
            partner_id,
            email = field_text(&changes, "email").unwrap_or_default(),
            "Partner updated own profile"
        );

        ctx.flash(FlashKind::Success, "Profile updated successfully");
        Ok(PortalResponse::redirect(PROFILE))
    }
}

impl Controller for PartnerController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        Some(match name {
            "dashboard" => Action::Nullary(Self::dashboard),
            "verifyForm" => Action::Nullary(Self::verify_form),
            "verifyMember" => Action::Nullary(Self::verify_member),
            "profileForm" => Action::Nullary(Self::profile_form),
            "updateProfile" => Action::Nullary(Self::update_profile),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::{Session, SessionUser};
    use crate::store::into_record;

    fn services() -> Arc<PortalServices> {
        let services = Arc::new(PortalServices::default());
        let store = &services.store;
        store.insert(
            Table::Partners,
            into_record(json!({"name": "Cafe Baku", "status": "active"})),
        );
        store.insert(
            Table::Offers,
            into_record(json!({"title": "Mine", "partner_id": 1, "start_date": "2024-01-01"})),
        );
        store.insert(
            Table::Offers,
            into_record(json!({"title": "Other", "partner_id": 2, "start_date": "2024-01-01"})),
        );
        store.insert(
            Table::Members,
            into_record(json!({
                "company_name": "Acme",
                "membership_id": "PASHA-001",
                "membership_status": "active",
            })),
        );
        services
    }

    fn partner_ctx(
        services: &Arc<PortalServices>,
        method: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> RequestContext {
        let mut session = Session::default();
        session.login(
            SessionUser {
                id: 7,
                email: "owner@cafe.az".into(),
                name: "Cafe Owner".into(),
                role: Role::Partner,
                partner_id: Some(1),
            },
            false,
        );
        let token = session.csrf_token();
        let mut pairs: Vec<(String, String)> = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        pairs.push(("csrf_token".into(), token));
        RequestContext::new(method, path)
            .with_session(session)
            .with_services(Arc::clone(services))
            .with_form_pairs(pairs)
    }

    fn run(ctx: &mut RequestContext, action: &str) -> PortalResponse {
        let controller = PartnerController::new(ctx.services());
        match PartnerController::action(action) {
            Some(Action::Nullary(f)) => f(&controller, ctx).unwrap_or_else(|halt| halt.0),
            _ => panic!("unexpected action shape"),
        }
    }

    #[test]
    fn test_dashboard_shows_own_offers_and_verifications() {
        let services = services();
        let mut ctx = partner_ctx(
            &services,
            "POST",
            "/partner/verify",
            &[("verification_value", "PASHA-001")],
        );
        let response = run(&mut ctx, "verifyMember");
        assert_eq!(response.data().unwrap()["result"]["success"], true);

        let mut ctx = partner_ctx(&services, "GET", "/partner", &[]);
        let response = run(&mut ctx, "dashboard");
        let data = response.data().unwrap();
        assert_eq!(data["partner"]["name"], "Cafe Baku");
        assert_eq!(data["offers"].as_array().unwrap().len(), 1);
        assert_eq!(data["verifications"][0]["company_name"], "Acme");
    }

    #[test]
    fn test_anonymous_visitor_sent_to_login() {
        let services = services();
        let mut ctx = RequestContext::new("GET", "/partner").with_services(services);
        let response = run(&mut ctx, "dashboard");
        assert_eq!(response.location(), Some("/login"));
    }

    #[test]
    fn test_update_profile() {
        let services = services();
        let form = [
            ("contact_person", "Leyla"),
            ("email", "leyla@cafe.az"),
            ("website", "https://cafe.az"),
        ];
        let mut ctx = partner_ctx(&services, "POST", "/partner/profile", &form);
        let response = run(&mut ctx, "updateProfile");

        assert_eq!(response.location(), Some("/partner/profile"));
        let partner = services.store.find(Table::Partners, 1).unwrap();
        assert_eq!(partner["contact_person"], "Leyla");
        assert_eq!(partner["name"], "Cafe Baku");
        assert_eq!(services.store.all(Table::ActivityLogs)[0]["action"], "Partner profile updated");
    }

    #[test]
    fn test_update_profile_requires_email() {
        let services = services();
        let mut ctx = partner_ctx(
            &services,
            "POST",
            "/partner/profile",
            &[("contact_person", "Leyla")],
        );
        run(&mut ctx, "updateProfile");
        assert_eq!(ctx.session.flash[0].message, "Please fill in all required fields: email");
    }
}
