//! Login, logout and password recovery.

use std::sync::Arc;

use serde_json::json;

use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::{FlashKind, Role};
use crate::routing::{Action, Controller, Outcome};
use crate::services::accounts::session_user;
use crate::services::PortalServices;
use crate::store::field_text;

const INVALID_RESET_LINK: &str = "Invalid or expired password reset link";

/// Landing page for a signed-in role.
pub fn home_for(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) | Some(Role::Staff) => "/admin",
        Some(Role::Partner) => "/partner",
        None => "/",
    }
}

pub struct AuthController {
    services: Arc<PortalServices>,
}

impl AuthController {
    fn login_form(&self, ctx: &mut RequestContext) -> Outcome {
        if ctx.session.is_authenticated() {
            return Ok(PortalResponse::redirect(home_for(ctx.session.role())));
        }
        Ok(ctx.render_bare("auth/login", json!({})))
    }

    fn login(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_csrf("/login")?;

        let email = ctx.raw_input_or("email", "").trim().to_string();
        let password = ctx.raw_input_or("password", "");
        let remember = ctx.checkbox("remember_me");

        if email.is_empty() || password.is_empty() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Please enter both email and password",
                "/login",
            ));
        }

        let Some(user) = self
            .services
            .authenticate(&email, &password)
            .as_ref()
            .and_then(session_user)
        else {
            tracing::warn!(email = %email, "Failed login attempt");
            return Err(ctx.redirect_with(FlashKind::Error, "Invalid email or password", "/login"));
        };

        ctx.session.login(user, remember);
        ctx.log_activity("User login", None, None, None);

        Ok(PortalResponse::redirect(home_for(ctx.session.role())))
    }

    fn logout(&self, ctx: &mut RequestContext) -> Outcome {
        if ctx.session.is_authenticated() {
            ctx.log_activity("User logout", None, None, None);
        }
        ctx.session.logout();
        Ok(PortalResponse::redirect("/"))
    }

    fn forgot_password_form(&self, ctx: &mut RequestContext) -> Outcome {
        if ctx.session.is_authenticated() {
            return Ok(PortalResponse::redirect("/"));
        }
        Ok(ctx.render_bare("auth/forgot_password", json!({})))
    }

    fn forgot_password(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_csrf("/forgot-password")?;

        let email = ctx.raw_input_or("email", "").trim().to_string();
        if email.is_empty() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Please enter your email address",
                "/forgot-password",
            ));
        }

        // Same answer whether or not the address exists.
        if let Some((user, token)) = self.services.create_reset_token(&email) {
            let link = self.services.url(&format!("reset-password/{}", token));
            tracing::info!(
                email = %email,
                first_name = field_text(&user, "first_name").unwrap_or_default(),
                reset_link = %link,
                "Password reset requested"
            );
        }

        ctx.flash(
            FlashKind::Success,
            "If your email address is registered, you will receive password reset instructions",
        );
        Ok(PortalResponse::redirect("/login"))
    }

    fn reset_password_form(&self, ctx: &mut RequestContext, token: &str) -> Outcome {
        if ctx.session.is_authenticated() {
            return Ok(PortalResponse::redirect("/"));
        }

        let Some(reset) = self.services.verify_reset_token(token) else {
            return Err(ctx.redirect_with(FlashKind::Error, INVALID_RESET_LINK, "/forgot-password"));
        };

        Ok(ctx.render_bare(
            "auth/reset_password",
            json!({
                "token": token,
                "email": field_text(&reset, "email"),
            }),
        ))
    }

    fn reset_password(&self, ctx: &mut RequestContext, token: &str) -> Outcome {
        let back = format!("/reset-password/{}", token);
        ctx.require_csrf(&back)?;

        if self.services.verify_reset_token(token).is_none() {
            return Err(ctx.redirect_with(FlashKind::Error, INVALID_RESET_LINK, "/forgot-password"));
        }

        let password = ctx.raw_input_or("password", "");
        let confirm = ctx.raw_input_or("confirm_password", "");
        let min_length = self.services.settings.min_password_length;

        if password.is_empty() || confirm.is_empty() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Please enter both password fields",
                &back,
            ));
        }
        if password != confirm {
            return Err(ctx.redirect_with(FlashKind::Error, "Passwords do not match", &back));
        }
        if password.chars().count() < min_length {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                format!("Password must be at least {} characters long", min_length),
                &back,
            ));
        }

        if !self.services.reset_password(token, &password) {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Failed to reset password, please try again",
                &back,
            ));
        }

        ctx.flash(
            FlashKind::Success,
            "Your password has been reset successfully. You can now log in with your new password",
        );
        Ok(PortalResponse::redirect("/login"))
    }
}

impl Controller for AuthController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        Some(match name {
            "loginForm" => Action::Nullary(Self::login_form),
            "login" => Action::Nullary(Self::login),
            "logout" => Action::Nullary(Self::logout),
            "forgotPasswordForm" => Action::Nullary(Self::forgot_password_form),
            "forgotPassword" => Action::Nullary(Self::forgot_password),
            "resetPasswordForm" => Action::Unary(Self::reset_password_form),
            "resetPassword" => Action::Unary(Self::reset_password),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_for_role() {
        assert_eq!(home_for(Some(Role::Admin)), "/admin");
        assert_eq!(home_for(Some(Role::Staff)), "/admin");
        assert_eq!(home_for(Some(Role::Partner)), "/partner");
        assert_eq!(home_for(None), "/");
    }
}
