//! Domain models shared by the store, the API and the client.

pub mod auth;
pub mod catalog;
