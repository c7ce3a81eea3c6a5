//! Request handlers.

pub mod auth;
pub mod contents;
pub mod courses;
pub mod favorites;
pub mod health;
pub mod stats;
pub mod users;
