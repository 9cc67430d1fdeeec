use serde_json::{json, Value};

use super::{details, AdminController};
use crate::controllers::{active_partners, rows};
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::{FlashKind, Role};
use crate::routing::{Halt, Outcome};
use crate::services::accounts::public_user;
use crate::store::{field_text, ListQuery, MemoryStore, Record, Table};

const LIST: &str = "/admin/users";
const USER_STATUSES: [&str; 2] = ["active", "inactive"];

/// Public user record with the linked partner's name.
fn with_partner_name(store: &MemoryStore, user: Record) -> Record {
    let partner_name = user
        .get("partner_id")
        .and_then(Value::as_u64)
        .and_then(|id| store.find(Table::Partners, id))
        .and_then(|p| p.get("name").cloned())
        .unwrap_or(Value::Null);
    let mut user = public_user(user);
    user.insert("partner_name".into(), partner_name);
    user
}

impl AdminController {
    /// Validate the user form. A password is required only when `require_password` is set;
    /// otherwise an empty password leaves the stored hash untouched.
    fn user_form(
        &self,
        ctx: &mut RequestContext,
        back: &str,
        except: Option<u64>,
        require_password: bool,
    ) -> Result<Record, Halt> {
        ctx.require_csrf(back)?;
        if require_password {
            ctx.require_fields(&["email", "password", "first_name", "last_name", "role"], back)?;
        } else {
            ctx.require_fields(&["email", "first_name", "last_name", "role"], back)?;
        }

        let mut user = ctx.record_from(&["email", "first_name", "last_name"]);
        let email = field_text(&user, "email").unwrap_or_default();

        let role = match ctx.raw_input_or("role", "").parse::<Role>() {
            Ok(role) => role,
            Err(_) => {
                return Err(ctx.redirect_with(
                    FlashKind::Error,
                    "Please select a valid role",
                    back,
                ))
            }
        };

        let taken = self
            .store()
            .all(Table::Users)
            .iter()
            .filter(|u| u.get("id").and_then(Value::as_u64) != except)
            .any(|u| field_text(u, "email").is_some_and(|e| e.eq_ignore_ascii_case(&email)));
        if taken {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "A user with this email already exists",
                back,
            ));
        }

        let partner_id = match role {
            Role::Partner => match ctx.input_number("partner_id").filter(|id| *id > 0) {
                Some(id) => Value::from(id),
                None => {
                    return Err(ctx.redirect_with(
                        FlashKind::Error,
                        "Please select a partner for partner users",
                        back,
                    ))
                }
            },
            _ => Value::Null,
        };

        let password = ctx.raw_input_or("password", "");
        if !password.is_empty() {
            let min_length = self.services.settings.min_password_length;
            if password.chars().count() < min_length {
                return Err(ctx.redirect_with(
                    FlashKind::Error,
                    format!("Password must be at least {} characters long", min_length),
                    back,
                ));
            }
            user.insert("password".into(), Value::from(self.services.hasher.hash(&password)));
        }

        let status = ctx
            .raw_input("status")
            .filter(|s| USER_STATUSES.contains(s))
            .unwrap_or("active");
        user.insert("role".into(), Value::from(role.as_str()));
        user.insert("partner_id".into(), partner_id);
        user.insert("status".into(), Value::from(status));
        Ok(user)
    }

    pub(super) fn list_users(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_admin(ctx)?;

        let query = ListQuery::page(ctx.page(), self.per_page())
            .search(ctx.raw_input("search"), &["email", "first_name", "last_name"])
            .filter("role", ctx.raw_input("role"));
        let page = self.store().list(Table::Users, &query);
        let users: Vec<Record> = page
            .records
            .into_iter()
            .map(|u| with_partner_name(self.store(), u))
            .collect();

        Ok(ctx.render(
            "admin/users/list",
            json!({
                "users": rows(users),
                "pagination": page.pagination,
                "search": ctx.input("search"),
                "role": ctx.input("role"),
            }),
        ))
    }

    pub(super) fn add_user_form(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_admin(ctx)?;
        Ok(ctx.render(
            "admin/users/add",
            json!({ "partners": active_partners(self.store()) }),
        ))
    }

    pub(super) fn add_user(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_admin(ctx)?;
        let user = self.user_form(ctx, "/admin/users/add", None, true)?;

        let id = self.store().insert(Table::Users, user.clone());
        ctx.log_activity("User created", Some("user"), Some(id), details(&public_user(user)));

        ctx.flash(FlashKind::Success, "User added successfully");
        Ok(PortalResponse::redirect(LIST))
    }

    pub(super) fn edit_user_form(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_admin(ctx)?;
        let (_, user) = self.load(ctx, Table::Users, id, "User", LIST)?;

        Ok(ctx.render(
            "admin/users/edit",
            json!({
                "user": with_partner_name(self.store(), user),
                "partners": active_partners(self.store()),
            }),
        ))
    }

    pub(super) fn edit_user(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_admin(ctx)?;
        let back = format!("/admin/users/edit/{}", id);
        let (id, _) = self.load(ctx, Table::Users, id, "User", LIST)?;
        let user = self.user_form(ctx, &back, Some(id), false)?;

        if self.store().update(Table::Users, id, user.clone()).is_err() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Failed to update user, please try again",
                &back,
            ));
        }
        ctx.log_activity("User updated", Some("user"), Some(id), details(&public_user(user)));

        ctx.flash(FlashKind::Success, "User updated successfully");
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

    fn new_user(role: &'static str, password: &'static str) -> Vec<(&'static str, &'static str)> {
        vec![
            ("email", "nigar@pasha.org"),
            ("password", password),
            ("first_name", "Nigar"),
            ("last_name", "Aliyeva"),
            ("role", role),
        ]
    }

    #[test]
    fn test_users_are_admin_only() {
        let services = Arc::new(PortalServices::default());
        let mut ctx = context(&services, Role::Staff, "GET", "/admin/users", &[]);
        let response = run(&mut ctx, "listUsers", &[]);
        assert_eq!(response.location(), Some("/"));
    }

    #[test]
    fn test_add_user_hashes_password_and_hides_it_from_log() {
        let services = Arc::new(PortalServices::default());
        let mut ctx = context(
            &services,
            Role::Admin,
            "POST",
            "/admin/users/add",
            &new_user("staff", "s3cret-pass"),
        );
        let response = run(&mut ctx, "addUser", &[]);

        assert_eq!(response.location(), Some("/admin/users"));
        let user = services.store.find(Table::Users, 1).unwrap();
        let hash = user["password"].as_str().unwrap();
        assert!(services.hasher.verify("s3cret-pass", hash));

        let log = &services.store.all(Table::ActivityLogs)[0];
        assert!(!log["details"].as_str().unwrap().contains("password"));
    }

    #[test]
    fn test_add_user_duplicate_email() {
        let services = Arc::new(PortalServices::default());
        services.store.insert(Table::Users, into_record(json!({"email": "NIGAR@pasha.org"})));

        let mut ctx = context(
            &services,
            Role::Admin,
            "POST",
            "/admin/users/add",
            &new_user("staff", "s3cret-pass"),
        );
        run(&mut ctx, "addUser", &[]);
        assert_eq!(last_flash(&ctx), "A user with this email already exists");
    }

    #[test]
    fn test_partner_user_needs_partner() {
        let services = Arc::new(PortalServices::default());
        let mut ctx = context(
            &services,
            Role::Admin,
            "POST",
            "/admin/users/add",
            &new_user("partner", "s3cret-pass"),
        );
        run(&mut ctx, "addUser", &[]);
        assert_eq!(last_flash(&ctx), "Please select a partner for partner users");
    }

    #[test]
    fn test_short_password_rejected() {
        let services = Arc::new(PortalServices::default());
        let mut ctx = context(
            &services,
            Role::Admin,
            "POST",
            "/admin/users/add",
            &new_user("staff", "short"),
        );
        run(&mut ctx, "addUser", &[]);
        assert_eq!(last_flash(&ctx), "Password must be at least 8 characters long");
    }

    #[test]
    fn test_edit_user_keeps_password_when_blank() {
        let services = Arc::new(PortalServices::default());
        services.store.insert(
            Table::Users,
            into_record(json!({
                "email": "nigar@pasha.org",
                "password": "$argon2id$keep",
                "role": "staff",
            })),
        );

        let mut ctx = context(
            &services,
            Role::Admin,
            "POST",
            "/admin/users/edit/1",
            &new_user("admin", ""),
        );
        let response = run(&mut ctx, "editUser", &["1"]);

        assert_eq!(response.location(), Some("/admin/users"));
        let user = services.store.find(Table::Users, 1).unwrap();
        assert_eq!(user["password"], "$argon2id$keep");
        assert_eq!(user["role"], "admin");
    }
}
