//! Paging, sorting and search helpers shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Page used when the client does not send one.
pub const DEFAULT_PAGE: i64 = 1;

/// Page size used when the client does not send one.
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page size a client may request.
pub const MAX_LIMIT: i64 = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated page/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub limit: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Paging {
    /// Validate raw query values, applying defaults for missing ones.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, String> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page < 1 {
            return Err("page must be at least 1".into());
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {MAX_LIMIT}"));
        }
        Ok(Self { page, limit })
    }

    /// Rows to skip for this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Paging metadata returned alongside list data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// One page of results: `{data, meta}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, paging: Paging, total: i64) -> Self {
        Self {
            data,
            meta: PageMeta {
                page: paging.page,
                limit: paging.limit,
                total,
            },
        }
    }

    /// Slice an already-filtered, already-sorted collection into a page.
    pub fn from_sorted(items: Vec<T>, paging: Paging) -> Self {
        let total = items.len() as i64;
        let data = items
            .into_iter()
            .skip(paging.offset() as usize)
            .take(paging.limit as usize)
            .collect();
        Self::new(data, paging, total)
    }
}

/// Build an `ILIKE` pattern matching `term` anywhere, escaping wildcards.
pub fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Normalize an optional search term: blank means "no filter".
pub fn search_term(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
