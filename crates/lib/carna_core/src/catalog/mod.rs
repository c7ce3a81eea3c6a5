//! Course catalog persistence: courses, their contents, favorites and
//! dashboard counts.
//!
//! Plain async functions over a `PgPool`, one module per table.

pub mod contents;
pub mod courses;
pub mod favorites;
pub mod stats;

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;

use crate::listing::{Paging, SortOrder, contains_pattern, search_term};

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Sortable columns shared by courses and contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogSort {
    Name,
    Description,
    #[default]
    DateCreated,
}

impl CatalogSort {
    pub fn column(&self) -> &'static str {
        match self {
            CatalogSort::Name => "name",
            CatalogSort::Description => "description",
            CatalogSort::DateCreated => "date_created",
        }
    }
}

/// Filters for listing courses or a course's contents.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of the description.
    pub description: Option<String>,
    pub paging: Paging,
    pub sort: CatalogSort,
    pub order: SortOrder,
}

/// Append `AND ...` clauses for the name/description filters.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &CatalogQuery) {
    if let Some(name) = search_term(query.name.as_deref()) {
        qb.push(" AND name ILIKE ").push_bind(contains_pattern(name));
    }
    if let Some(description) = search_term(query.description.as_deref()) {
        qb.push(" AND description ILIKE ")
            .push_bind(contains_pattern(description));
    }
}

/// Reject blank required text, returning the trimmed value.
pub fn require_text(field: &str, value: &str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Like [`require_text`] for optional update fields.
pub fn optional_text(field: &str, value: Option<&str>) -> Result<Option<String>, CatalogError> {
    value.map(|v| require_text(field, v)).transpose()
}
