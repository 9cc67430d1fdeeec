//! List queries and pagination.

use std::cmp::Ordering;

use serde::Serialize;

use crate::store::memory::field_text;
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Inclusive date bounds on a `YYYY-MM-DD...` field.
#[derive(Debug, Clone)]
struct DateRange {
    field: String,
    from: Option<String>,
    to: Option<String>,
}

/// Filter, search, sort and page a table listing.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Exact-match conditions, ANDed.
    pub filters: Vec<(String, String)>,
    /// Case-insensitive substring searched across `search_fields`.
    pub search: Option<String>,
    pub search_fields: Vec<String>,
    pub sort: Option<(String, SortOrder)>,
    pub page: usize,
    pub per_page: usize,
    ranges: Vec<DateRange>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            search: None,
            search_fields: Vec::new(),
            sort: None,
            page: 1,
            per_page: 10,
            ranges: Vec::new(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn compare_fields(a: &Record, b: &Record, field: &str) -> Ordering {
    let (a, b) = (field_text(a, field), field_text(b, field));
    match (a.as_deref().map(str::parse::<f64>), b.as_deref().map(str::parse::<f64>)) {
        (Some(Ok(x)), Some(Ok(y))) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(&b),
    }
}

impl ListQuery {
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            ..Self::default()
        }
    }

    /// Everything on one page.
    pub fn unpaged() -> Self {
        Self::page(1, usize::MAX)
    }

    /// Add an equality filter; empty values are ignored.
    pub fn filter(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(value) = non_empty(value) {
            self.filters.push((field.to_string(), value));
        }
        self
    }

    /// Search `fields` for `term`; an empty term is ignored.
    pub fn search(mut self, term: Option<&str>, fields: &[&str]) -> Self {
        if let Some(term) = non_empty(term) {
            self.search = Some(term.to_lowercase());
            self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        }
        self
    }

    /// Keep records whose `field` date lies within `from..=to`. Empty bounds are open.
    pub fn date_range(mut self, field: &str, from: Option<&str>, to: Option<&str>) -> Self {
        let (from, to) = (non_empty(from), non_empty(to));
        if from.is_some() || to.is_some() {
            self.ranges.push(DateRange {
                field: field.to_string(),
                from,
                to,
            });
        }
        self
    }

    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    fn matches(&self, record: &Record) -> bool {
        let filtered = self
            .filters
            .iter()
            .all(|(f, v)| field_text(record, f).as_deref() == Some(v.as_str()));

        let searched = match &self.search {
            Some(term) => self.search_fields.iter().any(|f| {
                field_text(record, f).is_some_and(|text| text.to_lowercase().contains(term))
            }),
            None => true,
        };

        let in_range = self.ranges.iter().all(|range| {
            let Some(value) = field_text(record, &range.field) else {
                return false;
            };
            let date = value.get(..10).unwrap_or(&value);
            range.from.as_deref().map_or(true, |from| date >= from)
                && range.to.as_deref().map_or(true, |to| date <= to)
        });

        filtered && searched && in_range
    }

    /// Run the query over `rows` (assumed in id order). Newest first unless sorted.
    pub fn apply(&self, rows: Vec<Record>) -> Page {
        let mut matching: Vec<Record> = rows.into_iter().filter(|r| self.matches(r)).collect();

        match &self.sort {
            Some((field, SortOrder::Asc)) => matching.sort_by(|a, b| compare_fields(a, b, field)),
            Some((field, SortOrder::Desc)) => matching.sort_by(|a, b| compare_fields(b, a, field)),
            None => matching.reverse(),
        }

        let pagination = Pagination::new(self.page, self.per_page, matching.len());
        let records = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.per_page)
            .collect();

        Page { records, pagination }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl Pagination {
    pub fn new(current_page: usize, per_page: usize, total_items: usize) -> Self {
        let per_page = per_page.max(1);
        Self {
            current_page: current_page.max(1),
            per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page),
        }
    }

    /// Index of the first item on the current page.
    pub fn offset(&self) -> usize {
        (self.current_page - 1).saturating_mul(self.per_page)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub records: Vec<Record>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows() -> Vec<Record> {
        [
            json!({"id": 1, "action": "User login", "created_at": "2024-03-01 09:00:00"}),
            json!({"id": 2, "action": "Offer updated", "created_at": "2024-03-05 12:30:00"}),
            json!({"id": 3, "action": "User logout", "created_at": "2024-03-09 18:00:00"}),
        ]
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset(), 10);

        let p = Pagination::new(0, 0, 0);
        assert_eq!(p.current_page, 1);
        assert_eq!(p.total_pages, 0);
    }

    #[test]
    fn test_empty_filters_are_ignored() {
        let q = ListQuery::page(1, 10)
            .filter("status", Some(""))
            .filter("category", None)
            .search(Some("  "), &["title"])
            .date_range("created_at", Some(""), None);
        assert!(q.filters.is_empty());
        assert!(q.search.is_none());
        assert_eq!(q.apply(rows()).records.len(), 3);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let page = ListQuery::unpaged()
            .date_range("created_at", Some("2024-03-05"), Some("2024-03-09"))
            .apply(rows());
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0]["id"], 3);

        let page = ListQuery::unpaged()
            .date_range("created_at", None, Some("2024-03-01"))
            .apply(rows());
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn test_search_and_default_order() {
        let page = ListQuery::unpaged().search(Some("user"), &["action"]).apply(rows());
        let ids: Vec<_> = page.records.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(1)]);
    }
}
