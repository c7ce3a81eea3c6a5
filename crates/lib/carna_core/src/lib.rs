//! # carna_core
//!
//! Core domain logic for Carna: sessions and credentials, the course
//! catalog and the database schema.

pub mod auth;
pub mod catalog;
pub mod ids;
pub mod listing;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
