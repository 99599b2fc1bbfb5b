/* 📖 # How is a collection listing narrowed down?

`GET /{collection}` applies the query string in a fixed order:

1. `q`: full-text search over every scalar of a record
2. field filters: `field=value` (repeatable, any value matches), with the suffixes
   `_ne` (no value matches), `_gte`, `_lte` and `_like` (case-insensitive regex).
   Dotted keys address nested fields. Keys that no record has are ignored, unless
   they carry a suffix or were pinned by the nested resolver.
3. `_sort` / `_order`: comma-separated fields, each ascending unless its order is `desc`
4. `_page` (+ `_limit`, default 10) or `_start` / `_end` / `_limit` slicing

Whenever the listing is cut down by 4., the size before cutting is reported in
`X-Total-Count`. Pages also get a `Link` header.
*/

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use mockrest_base::MockrestResult;

use crate::store::identity::deep_query;

use super::{QueryParams, RenderContext};

/// Query keys that control the listing instead of filtering it.
const CONTROL_KEYS: [&str; 11] = [
    "q", "_start", "_end", "_page", "_sort", "_order", "_limit", "_embed", "_expand",
    "callback", "_",
];

const DEFAULT_PAGE_SIZE: i64 = 10;

/// Apply full-text search, filters, sorting and slicing from the request query.
///
/// Sets `X-Total-Count`, `Access-Control-Expose-Headers` and `Link` on the context.
pub(super) fn list(records: Vec<Value>, ctx: &mut RenderContext) -> MockrestResult<Vec<Value>> {
    let query = ctx.query().clone();
    let filters = field_filters(&query, &records, |key| ctx.is_pinned_filter(key))?;

    let q = first_value(&query, "q").map(str::to_lowercase);
    let mut selected: Vec<Value> = records
        .into_iter()
        .filter(|record| q.as_deref().is_none_or(|q| matches_full_text(record, q)))
        .filter(|record| filters.iter().all(|filter| filter.matches(record)))
        .collect();

    if let Some(sort) = first_value(&query, "_sort") {
        sort_records(&mut selected, sort, query.get("_order").unwrap_or_default());
    }

    let page = first_value(&query, "_page");
    let end = first_value(&query, "_end");
    let limit = first_value(&query, "_limit");
    if page.is_none() && end.is_none() && limit.is_none() {
        return Ok(selected);
    }

    ctx.set_response_header("X-Total-Count", selected.len().to_string());
    let exposed = if page.is_some() {
        "X-Total-Count, Link"
    } else {
        "X-Total-Count"
    };
    ctx.set_response_header("Access-Control-Expose-Headers", exposed);

    let start = first_value(&query, "_start").and_then(parse_int).unwrap_or(0);
    let sliced = if let Some(page) = page {
        let number = parse_int(page).filter(|n| *n >= 1).unwrap_or(1);
        let size = limit
            .and_then(parse_int)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let page = Page::of(selected, number, size);
        if let Some(links) = page.link_header(ctx) {
            ctx.set_response_header("Link", links);
        }
        page.items
    } else if let Some(end) = end {
        js_slice(selected, start, parse_int(end).unwrap_or(0))
    } else {
        let limit = limit.and_then(parse_int).unwrap_or(0);
        js_slice(selected, start, start.saturating_add(limit))
    };
    debug!(count = sliced.len(), "sliced listing");
    Ok(sliced)
}

fn first_value<'a>(query: &'a QueryParams, key: &str) -> Option<&'a str> {
    query.get(key).filter(|value| !value.is_empty())
}

fn matches_full_text(record: &Value, q: &str) -> bool {
    match record {
        Value::Object(fields) => fields.values().any(|value| deep_query(value, q)),
        other => deep_query(other, q),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gte,
    Lte,
    Like,
}

impl FilterOp {
    /// Split a query key into the field path and the comparison it asks for.
    fn split(key: &str) -> (&str, Self) {
        let suffixes = [
            ("_gte", Self::Gte),
            ("_lte", Self::Lte),
            ("_ne", Self::Ne),
            ("_like", Self::Like),
        ];
        suffixes
            .into_iter()
            .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|path| (path, op)))
            .unwrap_or((key, Self::Eq))
    }
}

/// One query key turned into a predicate over records.
#[derive(Debug)]
struct FieldFilter {
    path: String,
    op: FilterOp,
    values: Vec<String>,
    patterns: Vec<Regex>,
}

impl FieldFilter {
    fn new(key: &str, values: Vec<String>) -> MockrestResult<Self> {
        let (path, op) = FilterOp::split(key);
        let patterns = if op == FilterOp::Like {
            values
                .iter()
                .map(|value| {
                    RegexBuilder::new(value)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| mockrest_base::err!("Invalid pattern for {}: {}", key, e))
                })
                .collect::<MockrestResult<_>>()?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_string(),
            op,
            values,
            patterns,
        })
    }

    fn matches(&self, record: &Value) -> bool {
        let Some(element) = value_at_path(record, &self.path).filter(|v| !v.is_null()) else {
            return false;
        };
        let text = js_string(element);
        match self.op {
            FilterOp::Eq => self.values.iter().any(|value| *value == text),
            FilterOp::Ne => self.values.iter().all(|value| *value != text),
            FilterOp::Gte => self
                .values
                .iter()
                .any(|value| compare_loose(element, value).is_some_and(Ordering::is_ge)),
            FilterOp::Lte => self
                .values
                .iter()
                .any(|value| compare_loose(element, value).is_some_and(Ordering::is_le)),
            FilterOp::Like => self.patterns.iter().any(|pattern| pattern.is_match(&text)),
        }
    }
}

fn field_filters(
    query: &QueryParams,
    records: &[Value],
    is_pinned: impl Fn(&str) -> bool,
) -> MockrestResult<Vec<FieldFilter>> {
    let mut filters = Vec::new();
    for key in query.keys() {
        if CONTROL_KEYS.contains(&key) {
            continue;
        }
        let has_suffix = FilterOp::split(key).1 != FilterOp::Eq;
        let known = records
            .iter()
            .any(|record| value_at_path(record, key).is_some());
        if !(known || has_suffix || is_pinned(key)) {
            debug!(key, "ignoring filter on unknown field");
            continue;
        }
        let values = query.get_all(key).into_iter().map(str::to_string).collect();
        filters.push(FieldFilter::new(key, values)?);
    }
    Ok(filters)
}

/// The value at a dotted path (`author.name`, `tags.0`). A literal key containing
/// dots takes precedence over the path.
pub fn value_at_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    path.split('.').try_fold(record, |current, segment| match current {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of a value as query strings compare against it.
///
/// Integral floats print without a fraction and arrays join their items with commas.
pub fn js_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Compare a record value with a query value: numerically against numbers and
/// booleans, as text against strings. None if the two are not comparable.
fn compare_loose(element: &Value, value: &str) -> Option<Ordering> {
    let numeric = |element: f64| {
        let trimmed = value.trim();
        let parsed = if trimmed.is_empty() {
            Some(0.0)
        } else {
            trimmed.parse::<f64>().ok()
        };
        parsed.and_then(|parsed| element.partial_cmp(&parsed))
    };
    match element {
        Value::Number(n) => n.as_f64().and_then(numeric),
        Value::Bool(b) => numeric(f64::from(u8::from(*b))),
        Value::String(s) => Some(s.as_str().cmp(value)),
        _ => None,
    }
}

fn sort_records(records: &mut [Value], sort: &str, order: &str) {
    let fields: Vec<&str> = sort.split(',').map(str::trim).collect();
    let descending: Vec<bool> = order
        .split(',')
        .map(|o| o.trim().eq_ignore_ascii_case("desc"))
        .collect();
    records.sort_by(|a, b| {
        fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let ordering = compare_for_sort(value_at_path(a, field), value_at_path(b, field));
                if descending.get(i).copied().unwrap_or(false) {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Ascending order of two field values. Missing and null values sort last.
fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => js_string(x).cmp(&js_string(y)),
    }
}

/// Leading integer of a string, like JavaScript's `parseInt(s, 10)`.
pub fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// `Array.prototype.slice` semantics: negative bounds count from the end.
fn js_slice(records: Vec<Value>, start: i64, end: i64) -> Vec<Value> {
    let len = records.len() as i64;
    let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
    let (start, end) = (clamp(start), clamp(end));
    if start >= end {
        return Vec::new();
    }
    records
        .into_iter()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect()
}

/// One page of a listing with the neighbouring page numbers.
#[derive(Debug, Default, PartialEq)]
struct Page {
    items: Vec<Value>,
    first: Option<i64>,
    prev: Option<i64>,
    next: Option<i64>,
    last: Option<i64>,
}

impl Page {
    fn of(records: Vec<Value>, number: i64, size: i64) -> Self {
        let total = records.len() as i64;
        let start = (number - 1).saturating_mul(size);
        let end = number.saturating_mul(size);
        let items = js_slice(records, start, end);
        if items.is_empty() {
            return Self::default();
        }
        let partial = items.len() as i64 != total;
        Self {
            first: partial.then_some(1),
            prev: (number > 1).then(|| number - 1),
            next: (end < total).then(|| number + 1),
            last: partial.then(|| (total + size - 1) / size),
            items,
        }
    }

    /// `Link` header value pointing at the neighbouring pages of the current URL.
    fn link_header(&self, ctx: &RenderContext) -> Option<String> {
        let raw_query = ctx
            .original_url()
            .split_once('?')
            .map_or("", |(_, query)| query);
        let base = format!("{}{}", ctx.base_url(), ctx.original_path());
        let links: Vec<String> = [
            ("first", self.first),
            ("prev", self.prev),
            ("next", self.next),
            ("last", self.last),
        ]
        .into_iter()
        .filter_map(|(rel, page)| {
            page.map(|page| format!("<{}?{}>; rel=\"{}\"", base, with_page(raw_query, page), rel))
        })
        .collect();
        (!links.is_empty()).then(|| links.join(", "))
    }
}

/// The raw query string with its `_page` parameter set to `page`.
fn with_page(raw_query: &str, page: i64) -> String {
    raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let key = pair.split_once('=').map_or(pair, |(key, _)| key);
            if key == "_page" {
                format!("_page={}", page)
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
