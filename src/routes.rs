//! The portal's route table.

use std::sync::Arc;

use serde_json::json;

use crate::controllers;
use crate::routing::{Dispatcher, HandlerRef, HttpMethod, RouteError, RouteTable};

use HttpMethod::{Get, Post};

/// Every route in registration order. Earlier entries win.
pub const ROUTES: &[(HttpMethod, &str, &str)] = &[
    // Public pages
    (Get, "/", "HomeController@index"),
    (Get, "/offers", "OfferController@listPublic"),
    (Get, "/offers/category/([a-zA-Z0-9-]+)", "OfferController@listByCategory"),
    (Get, "/offers/([0-9]+)", "OfferController@view"),
    (Get, "/verify", "MemberController@verifyForm"),
    (Post, "/verify", "MemberController@verifyMember"),
    (Get, "/about", "PageController@about"),
    (Get, "/contact", "PageController@contactForm"),
    (Post, "/contact", "PageController@submitContact"),
    // Authentication
    (Get, "/login", "AuthController@loginForm"),
    (Post, "/login", "AuthController@login"),
    (Get, "/logout", "AuthController@logout"),
    (Get, "/forgot-password", "AuthController@forgotPasswordForm"),
    (Post, "/forgot-password", "AuthController@forgotPassword"),
    (Get, "/reset-password/([a-zA-Z0-9]+)", "AuthController@resetPasswordForm"),
    (Post, "/reset-password/([a-zA-Z0-9]+)", "AuthController@resetPassword"),
    // Back office
    (Get, "/admin", "AdminController@dashboard"),
    (Get, "/admin/members", "AdminController@listMembers"),
    (Get, "/admin/members/add", "AdminController@addMemberForm"),
    (Post, "/admin/members/add", "AdminController@addMember"),
    (Get, "/admin/members/edit/([0-9]+)", "AdminController@editMemberForm"),
    (Post, "/admin/members/edit/([0-9]+)", "AdminController@editMember"),
    (Post, "/admin/members/status/([0-9]+)", "AdminController@updateMemberStatus"),
    (Get, "/admin/offers", "AdminController@listOffers"),
    (Get, "/admin/offers/add", "AdminController@addOfferForm"),
    (Post, "/admin/offers/add", "AdminController@addOffer"),
    (Get, "/admin/offers/edit/([0-9]+)", "AdminController@editOfferForm"),
    (Post, "/admin/offers/edit/([0-9]+)", "AdminController@editOffer"),
    (Post, "/admin/offers/status/([0-9]+)", "AdminController@updateOfferStatus"),
    (Get, "/admin/partners", "AdminController@listPartners"),
    (Get, "/admin/partners/add", "AdminController@addPartnerForm"),
    (Post, "/admin/partners/add", "AdminController@addPartner"),
    (Get, "/admin/partners/edit/([0-9]+)", "AdminController@editPartnerForm"),
    (Post, "/admin/partners/edit/([0-9]+)", "AdminController@editPartner"),
    (Get, "/admin/users", "AdminController@listUsers"),
    (Get, "/admin/users/add", "AdminController@addUserForm"),
    (Post, "/admin/users/add", "AdminController@addUser"),
    (Get, "/admin/users/edit/([0-9]+)", "AdminController@editUserForm"),
    (Post, "/admin/users/edit/([0-9]+)", "AdminController@editUser"),
    (Get, "/admin/reports", "ReportController@index"),
    (Get, "/admin/reports/members", "ReportController@membersReport"),
    (Get, "/admin/reports/verifications", "ReportController@verificationsReport"),
    (Get, "/admin/reports/offers", "ReportController@offersReport"),
    (Get, "/admin/reports/export/([a-zA-Z0-9-]+)", "ReportController@exportReport"),
    (Get, "/admin/logs", "AdminController@activityLogs"),
    (Get, "/admin/settings", "AdminController@settings"),
    (Post, "/admin/settings", "AdminController@updateSettings"),
    // Partner portal
    (Get, "/partner", "PartnerController@dashboard"),
    (Get, "/partner/verify", "PartnerController@verifyForm"),
    (Post, "/partner/verify", "PartnerController@verifyMember"),
    (Get, "/partner/profile", "PartnerController@profileForm"),
    (Post, "/partner/profile", "PartnerController@updateProfile"),
];

/// Compile [`ROUTES`] and install the 404 page as the fallback.
pub fn build_route_table() -> Result<RouteTable, RouteError> {
    let mut table = RouteTable::new();
    for (method, pattern, handler) in ROUTES {
        table.register(*method, pattern, *handler)?;
    }
    table.set_not_found(HandlerRef::callable(|ctx, _| {
        Ok(ctx.render("errors/404", json!({ "path": ctx.raw_path })).with_status(404))
    }));
    Ok(table)
}

/// The route table bound to every portal controller.
pub fn build_dispatcher() -> Result<Arc<Dispatcher>, RouteError> {
    Ok(Arc::new(Dispatcher::new(build_route_table()?, controllers::registry())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_compiles() {
        let table = build_route_table().unwrap();
        assert_eq!(table.len(), ROUTES.len());
        assert!(table.not_found().is_some());
    }

    #[test]
    fn test_every_handler_resolves() {
        let dispatcher = build_dispatcher().unwrap();
        let unresolved: Vec<String> = dispatcher
            .unresolved()
            .into_iter()
            .map(|(route, err)| format!("{} {}: {}", route.method, route.pattern.as_str(), err))
            .collect();
        assert!(unresolved.is_empty(), "{:?}", unresolved);
    }

    #[test]
    fn test_first_match_wins_for_offer_paths() {
        let dispatcher = build_dispatcher().unwrap();
        let found = dispatcher.find("GET", "/offers/category/food-and-drink").unwrap();
        assert_eq!(found.params, vec!["food-and-drink"]);
        assert!(dispatcher.find("GET", "/offers/abc").is_none());
        assert!(dispatcher.find("POST", "/offers").is_none());
    }
}
