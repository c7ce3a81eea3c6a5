//! Course catalog domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub date_created: DateTime<Utc>,
}

/// A content item belonging to a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub description: String,
    /// Public URL of the uploaded image, if any.
    pub image: Option<String>,
    pub date_created: DateTime<Utc>,
}

/// Content joined with its course, for the dashboard feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentWithCourse {
    #[serde(flatten)]
    pub content: Content,
    pub course: Course,
}

/// Aggregated dashboard counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub number_of_users: i64,
    pub number_of_courses: i64,
    pub number_of_contents: i64,
}

/// A user's favorite course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
}
