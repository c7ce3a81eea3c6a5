//! Time-ordered identifiers for catalog rows.
//!
//! Courses, contents and favorites get UUIDv7 ids generated here so the
//! caller knows a content id before the row exists (uploads are named after
//! it). Users keep PostgreSQL's `gen_random_uuid()`.

use uuid::Uuid;

/// Generate a new UUIDv7.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}
