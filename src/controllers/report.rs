//! Back-office reports and their downloads.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::controllers::admin::{with_users, MEMBER_STATUSES, OFFER_STATUSES};
use crate::controllers::{active_partners, categories, count_by, record_id, rows, with_partners};
use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::http::session::{FlashKind, Role};
use crate::routing::{Action, Controller, Outcome};
use crate::services::PortalServices;
use crate::store::{ListQuery, Record, SortOrder, Table};

const REPORTS: &str = "/admin/reports";
const VERIFICATION_METHODS: [&str; 2] = ["membership_id", "company_name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Members,
    Verifications,
    Offers,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Members => "members",
            ReportKind::Verifications => "verifications",
            ReportKind::Offers => "offers",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "members" => Ok(ReportKind::Members),
            "verifications" => Ok(ReportKind::Verifications),
            "offers" => Ok(ReportKind::Offers),
            other => Err(format!("unknown report `{}`", other)),
        }
    }
}

/// Rows of a report plus a human-readable list of the filters applied.
struct Report {
    rows: Vec<Record>,
    filters: Vec<String>,
}

/// Record `label: value` for every non-empty input among `inputs`.
fn describe(ctx: &RequestContext, inputs: &[(&str, &str)]) -> Vec<String> {
    inputs
        .iter()
        .filter_map(|(key, label)| {
            let value = ctx.raw_input(key)?.trim();
            (!value.is_empty()).then(|| format!("{}: {}", label, value))
        })
        .collect()
}

/// Flatten status counts next to a total.
fn totals(total: usize, counts: impl IntoIterator<Item = (String, usize)>) -> Map<String, Value> {
    let mut stats = Map::new();
    stats.insert("total".into(), Value::from(total));
    for (key, count) in counts {
        stats.insert(key, Value::from(count));
    }
    stats
}

pub struct ReportController {
    services: Arc<PortalServices>,
}

impl ReportController {
    fn members(&self, ctx: &RequestContext) -> Report {
        let rows = ListQuery::unpaged()
            .filter("membership_status", ctx.raw_input("status"))
            .date_range("joining_date", ctx.raw_input("date_from"), ctx.raw_input("date_to"))
            .sort("company_name", SortOrder::Asc)
            .apply(self.services.store.all(Table::Members))
            .records;
        let filters = describe(
            ctx,
            &[("status", "Status"), ("date_from", "From"), ("date_to", "To")],
        );
        Report { rows, filters }
    }

    fn verifications(&self, ctx: &RequestContext) -> Report {
        let store = &self.services.store;
        let members: HashMap<u64, Record> = store
            .all(Table::Members)
            .into_iter()
            .filter_map(|m| Some((record_id(&m)?, m)))
            .collect();

        let logs = store
            .all(Table::VerificationLogs)
            .into_iter()
            .map(|mut log| {
                let member = log
                    .get("member_id")
                    .and_then(Value::as_u64)
                    .and_then(|id| members.get(&id));
                for field in ["company_name", "membership_id"] {
                    let value = member.and_then(|m| m.get(field).cloned()).unwrap_or(Value::Null);
                    log.insert(field.into(), value);
                }
                log
            })
            .collect();

        let rows = ListQuery::unpaged()
            .filter("verification_result", ctx.raw_input("result"))
            .date_range("verification_date", ctx.raw_input("date_from"), ctx.raw_input("date_to"))
            .sort("verification_date", SortOrder::Desc)
            .apply(with_users(store, logs, "verified_by"))
            .records;
        let filters = describe(
            ctx,
            &[("date_from", "From"), ("date_to", "To"), ("result", "Result")],
        );
        Report { rows, filters }
    }

    fn offers(&self, ctx: &RequestContext) -> Report {
        let store = &self.services.store;
        let rows = ListQuery::unpaged()
            .filter("status", ctx.raw_input("status"))
            .filter("category", ctx.raw_input("category"))
            .filter("partner_id", ctx.raw_input("partner_id"))
            .sort("start_date", SortOrder::Desc)
            .apply(with_partners(store, store.all(Table::Offers)))
            .records;
        let filters = describe(
            ctx,
            &[("status", "Status"), ("category", "Category"), ("partner_id", "Partner")],
        );
        Report { rows, filters }
    }

    fn report(&self, kind: ReportKind, ctx: &RequestContext) -> Report {
        match kind {
            ReportKind::Members => self.members(ctx),
            ReportKind::Verifications => self.verifications(ctx),
            ReportKind::Offers => self.offers(ctx),
        }
    }

    fn index(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Admin, Role::Staff])?;
        Ok(ctx.render("admin/reports/index", json!({})))
    }

    fn members_report(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Admin, Role::Staff])?;
        let report = self.members(ctx);
        let stats = totals(
            report.rows.len(),
            count_by(&report.rows, "membership_status", &MEMBER_STATUSES),
        );

        Ok(ctx.render(
            "admin/reports/members",
            json!({
                "members": rows(report.rows),
                "stats": stats,
                "status": ctx.input("status"),
                "dateFrom": ctx.input("date_from"),
                "dateTo": ctx.input("date_to"),
            }),
        ))
    }

    fn verifications_report(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Admin, Role::Staff])?;
        let report = self.verifications(ctx);
        let mut stats = totals(
            report.rows.len(),
            count_by(&report.rows, "verification_result", &["success", "failed"]),
        );
        stats.insert(
            "by_method".into(),
            json!(count_by(&report.rows, "verification_method", &VERIFICATION_METHODS)),
        );

        Ok(ctx.render(
            "admin/reports/verifications",
            json!({
                "verifications": rows(report.rows),
                "stats": stats,
                "dateFrom": ctx.input("date_from"),
                "dateTo": ctx.input("date_to"),
                "result": ctx.input("result"),
            }),
        ))
    }

    fn offers_report(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.require_role(&[Role::Admin, Role::Staff])?;
        let report = self.offers(ctx);
        let by_status = count_by(&report.rows, "status", &OFFER_STATUSES);
        let mut stats = totals(report.rows.len(), by_status);

        let mut by_category: Vec<(String, usize)> =
            count_by(&report.rows, "category", &[]).into_iter().collect();
        by_category.sort_by(|a, b| b.1.cmp(&a.1));
        stats.insert(
            "by_category".into(),
            Value::Array(
                by_category
                    .into_iter()
                    .map(|(category, count)| json!({ "category": category, "count": count }))
                    .collect(),
            ),
        );

        Ok(ctx.render(
            "admin/reports/offers",
            json!({
                "offers": rows(report.rows),
                "stats": stats,
                "status": ctx.input("status"),
                "category": ctx.input("category"),
                "partnerId": ctx.input_number("partner_id"),
                "partners": active_partners(&self.services.store),
                "categories": categories(&self.services.store),
            }),
        ))
    }

    fn export_report(&self, ctx: &mut RequestContext, kind: &str) -> Outcome {
        ctx.require_role(&[Role::Admin, Role::Staff])?;

        let Ok(kind) = kind.parse::<ReportKind>() else {
            return Err(ctx.redirect_with(FlashKind::Error, "Invalid report type", REPORTS));
        };
        let report = self.report(kind, ctx);

        match self.services.exporter.export(kind.as_str(), &report.rows) {
            Ok(export) => {
                let mut details = format!("{} ({} rows)", kind, report.rows.len());
                if !report.filters.is_empty() {
                    details.push_str(&format!(" [{}]", report.filters.join(", ")));
                }
                ctx.log_activity("Report exported", Some("report"), None, Some(details));
                Ok(PortalResponse::attachment(export.filename, export.content_type, export.body))
            }
            Err(e) => {
                tracing::error!(report = %kind, error = %e, "Report export failed");
                Err(ctx.redirect_with(FlashKind::Error, "Failed to export report", REPORTS))
            }
        }
    }
}

impl Controller for ReportController {
    fn new(services: &Arc<PortalServices>) -> Self {
        Self {
            services: Arc::clone(services),
        }
    }

    fn action(name: &str) -> Option<Action<Self>> {
        Some(match name {
            "index" => Action::Nullary(Self::index),
            "membersReport" => Action::Nullary(Self::members_report),
            "verificationsReport" => Action::Nullary(Self::verifications_report),
            "offersReport" => Action::Nullary(Self::offers_report),
            "exportReport" => Action::Unary(Self::export_report),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::admin::tests::context;
    use crate::store::{into_record, today};

    fn run(ctx: &mut RequestContext, action: &str, params: &[&str]) -> PortalResponse {
        let controller = ReportController::new(ctx.services());
        let outcome = match (ReportController::action(action), params) {
            (Some(Action::Nullary(f)), []) => f(&controller, ctx),
            (Some(Action::Unary(f)), [p]) => f(&controller, ctx, p),
            _ => panic!("unexpected action shape"),
        };
        outcome.unwrap_or_else(|halt| halt.0)
    }

    fn services() -> Arc<PortalServices> {
        let services = Arc::new(PortalServices::default());
        let store = &services.store;
        for (name, status, joined) in [
            ("Zeta", "active", "2024-01-10"),
            ("Acme", "active", "2024-03-01"),
            ("Beta", "pending", "2024-05-20"),
        ] {
            store.insert(
                Table::Members,
                into_record(json!({
                    "company_name": name,
                    "membership_status": status,
                    "joining_date": joined,
                })),
            );
        }
        store.insert(
            Table::VerificationLogs,
            into_record(json!({
                "member_id": 2,
                "verification_method": "membership_id",
                "verification_result": "success",
                "verification_date": "2024-06-01 10:00:00",
            })),
        );
        store.insert(
            Table::VerificationLogs,
            into_record(json!({
                "member_id": null,
                "verification_method": "company_name",
                "verification_result": "failed",
                "verification_date": "2024-06-02 10:00:00",
            })),
        );
        services
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!("offers".parse::<ReportKind>(), Ok(ReportKind::Offers));
        assert!("payments".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_members_report_filters_and_sorts() {
        let services = services();
        let mut ctx = context(
            &services,
            Role::Staff,
            "GET",
            "/admin/reports/members?status=active",
            &[],
        );
        let response = run(&mut ctx, "membersReport", &[]);
        let data = response.data().unwrap();
        assert_eq!(data["members"][0]["company_name"], "Acme");
        assert_eq!(data["members"][1]["company_name"], "Zeta");
        assert_eq!(data["stats"]["total"], 2);
        assert_eq!(data["stats"]["pending"], 0);
    }

    #[test]
    fn test_members_report_date_range() {
        let services = services();
        let path = "/admin/reports/members?date_from=2024-02-01&date_to=2024-05-20";
        let mut ctx = context(&services, Role::Admin, "GET", path, &[]);
        let response = run(&mut ctx, "membersReport", &[]);
        assert_eq!(response.data().unwrap()["stats"]["total"], 2);
    }

    #[test]
    fn test_verifications_report_stats() {
        let services = services();
        let mut ctx = context(&services, Role::Admin, "GET", "/admin/reports/verifications", &[]);
        let response = run(&mut ctx, "verificationsReport", &[]);
        let data = response.data().unwrap();
        assert_eq!(data["stats"]["success"], 1);
        assert_eq!(data["stats"]["failed"], 1);
        assert_eq!(data["stats"]["by_method"]["company_name"], 1);
        assert_eq!(data["verifications"][0]["verification_result"], "failed");
        assert_eq!(data["verifications"][1]["company_name"], "Acme");
    }

    #[test]
    fn test_export_members() {
        let services = services();
        let mut ctx = context(
            &services,
            Role::Admin,
            "GET",
            "/admin/reports/export/members?status=pending",
            &[],
        );
        let response = run(&mut ctx, "exportReport", &["members"]);
        match response {
            PortalResponse::Attachment {
                filename,
                content_type,
                body,
            } => {
                assert_eq!(filename, format!("members_report_{}.csv", today()));
                assert_eq!(content_type, "text/csv");
                let csv = String::from_utf8(body).unwrap();
                let lines: Vec<&str> = csv.lines().collect();
                assert!(lines[0].starts_with("ID,Company Name,Membership ID"));
                assert_eq!(lines.len(), 2);
                assert!(lines[1].contains(",Beta,"));
                assert!(lines[1].contains(",pending,"));
            }
            other => panic!("expected attachment, got {:?}", other),
        }

        let logs = services.store.all(Table::ActivityLogs);
        assert_eq!(logs[0]["details"], "members (1 rows) [Status: pending]");
    }

    #[test]
    fn test_export_unknown_type() {
        let services = services();
        let mut ctx = context(&services, Role::Admin, "GET", "/admin/reports/export/payments", &[]);
        let response = run(&mut ctx, "exportReport", &["payments"]);
        assert_eq!(response.location(), Some("/admin/reports"));
        assert_eq!(ctx.session.flash[0].message, "Invalid report type");
    }
}
