use serde_json::{json, Value};

use super::{choice, details, with_users, AdminController, MEMBER_STATUSES};
use crate::controllers::rows;
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::FlashKind;
use crate::routing::{Halt, Outcome};
use crate::store::{field_text, today, ListQuery, Record, Table};

const LIST: &str = "/admin/members";
const REQUIRED: [&str; 4] = ["company_name", "membership_id", "contact_person", "email"];
const FIELDS: [&str; 8] = [
    "company_name",
    "membership_id",
    "contact_person",
    "email",
    "phone",
    "address",
    "joining_date",
    "expiry_date",
];
const HISTORY_ROWS: usize = 10;

impl AdminController {
    /// Validate the member form and collect it into a record.
    fn member_form(
        &self,
        ctx: &mut RequestContext,
        back: &str,
        except: Option<u64>,
    ) -> Result<Record, Halt> {
        ctx.require_csrf(back)?;
        ctx.require_fields(&REQUIRED, back)?;

        let mut member = ctx.record_from(&FIELDS);
        let membership_id = field_text(&member, "membership_id").unwrap_or_default();
        if self.store().exists_other(Table::Members, "membership_id", &membership_id, except) {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "A member with this membership ID already exists",
                back,
            ));
        }

        if field_text(&member, "joining_date").is_some_and(|d| d.is_empty()) {
            member.insert("joining_date".into(), Value::from(today()));
        }
        member.insert(
            "membership_status".into(),
            Value::from(choice(ctx, "membership_status", &MEMBER_STATUSES, "active")),
        );
        Ok(member)
    }

    pub(super) fn list_members(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;

        let query = ListQuery::page(ctx.page(), self.per_page())
            .search(
                ctx.raw_input("search"),
                &["company_name", "membership_id", "contact_person", "email"],
            )
            .filter("membership_status", ctx.raw_input("status"));
        let page = self.store().list(Table::Members, &query);

        Ok(ctx.render(
            "admin/members/list",
            json!({
                "members": rows(page.records),
                "pagination": page.pagination,
                "search": ctx.input("search"),
                "status": ctx.input("status"),
            }),
        ))
    }

    pub(super) fn add_member_form(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        Ok(ctx.render("admin/members/add", json!({ "statuses": MEMBER_STATUSES })))
    }

    pub(super) fn add_member(&self, ctx: &mut RequestContext) -> Outcome {
        Self::require_staff(ctx)?;
        let member = self.member_form(ctx, "/admin/members/add", None)?;

        let id = self.store().insert(Table::Members, member.clone());
        ctx.log_activity("Member created", Some("member"), Some(id), details(&member));

        ctx.flash(FlashKind::Success, "Member added successfully");
        Ok(PortalResponse::redirect(LIST))
    }

    pub(super) fn edit_member_form(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        let (id, member) = self.load(ctx, Table::Members, id, "Member", LIST)?;

        let history = ListQuery::page(1, HISTORY_ROWS)
            .filter("member_id", Some(&id.to_string()))
            .apply(self.store().all(Table::VerificationLogs));

        Ok(ctx.render(
            "admin/members/edit",
            json!({
                "member": member,
                "statuses": MEMBER_STATUSES,
                "verifications": rows(with_users(self.store(), history.records, "verified_by")),
            }),
        ))
    }

    pub(super) fn edit_member(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        let back = format!("/admin/members/edit/{}", id);
        let (id, _) = self.load(ctx, Table::Members, id, "Member", LIST)?;
        let member = self.member_form(ctx, &back, Some(id))?;

        if self.store().update(Table::Members, id, member.clone()).is_err() {
            return Err(ctx.redirect_with(
                FlashKind::Error,
                "Failed to update member, please try again",
                &back,
            ));
        }
        ctx.log_activity("Member updated", Some("member"), Some(id), details(&member));

        ctx.flash(FlashKind::Success, "Member updated successfully");
        Ok(PortalResponse::redirect(LIST))
    }

    pub(super) fn update_member_status(&self, ctx: &mut RequestContext, id: &str) -> Outcome {
        Self::require_staff(ctx)?;
        ctx.require_csrf(LIST)?;
        let (id, _) = self.load(ctx, Table::Members, id, "Member", LIST)?;

        let status = ctx.raw_input_or("status", "");
        if !MEMBER_STATUSES.contains(&status.as_str()) {
            return Err(ctx.redirect_with(FlashKind::Error, "Failed to update member status", LIST));
        }

        let mut changes = Record::new();
        changes.insert("membership_status".into(), Value::from(status.as_str()));
        if self.store().update(Table::Members, id, changes).is_err() {
            return Err(ctx.redirect_with(FlashKind::Error, "Failed to update member status", LIST));
        }
        ctx.log_activity(
            "Member status updated",
            Some("member"),
            Some(id),
            Some(format!("Status changed to {}", status)),
        );

        ctx.flash(FlashKind::Success, "Member status updated successfully");
        Ok(PortalResponse::redirect(LIST))
    }
}
