//! Transport-side services: the refresh cookie policy and image uploads.

pub mod cookies;
pub mod uploads;
