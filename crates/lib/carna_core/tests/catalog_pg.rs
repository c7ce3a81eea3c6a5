//! Catalog queries against a live PostgreSQL database.
//!
//! Runs only when `CARNA_TEST_DATABASE_URL` points at a disposable database;
//! otherwise every test returns early.

use carna_core::auth::queries::PgCredentialStore;
use carna_core::auth::store::CredentialStore;
use carna_core::catalog::contents::{self, NewContent};
use carna_core::catalog::courses::{self, CourseChanges};
use carna_core::catalog::{CatalogError, CatalogQuery, favorites};
use carna_core::ids::new_id;
use carna_core::models::auth::{NewUser, Role};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

async fn pool() -> Option<PgPool> {
    let url = std::env::var("CARNA_TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to test database");
    carna_core::migrate::migrate(&pool).await.expect("migrate");
    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}{}", new_id().simple())
}

#[tokio::test]
async fn course_lifecycle() {
    let Some(pool) = pool().await else { return };
    let name = unique("Rust");

    let course = courses::create_course(&pool, &name, "Ownership and borrowing")
        .await
        .unwrap();
    assert_eq!(courses::get_course(&pool, course.id).await.unwrap(), course);

    let query = CatalogQuery {
        name: Some(name.to_lowercase()),
        ..Default::default()
    };
    let page = courses::list_courses(&pool, &query).await.unwrap();
    assert_eq!(page.meta.total, 1);
    assert_eq!(page.data[0].id, course.id);

    let changes = CourseChanges {
        name: None,
        description: Some("Lifetimes too".into()),
    };
    let updated = courses::update_course(&pool, course.id, &changes).await.unwrap();
    assert_eq!(updated.name, name);
    assert_eq!(updated.description, "Lifetimes too");

    assert_eq!(courses::delete_course(&pool, course.id).await.unwrap(), course.id);
    assert!(matches!(
        courses::get_course(&pool, course.id).await,
        Err(CatalogError::NotFound(_))
    ));
}

#[tokio::test]
async fn contents_belong_to_their_course() {
    let Some(pool) = pool().await else { return };
    let course = courses::create_course(&pool, &unique("Course"), "desc")
        .await
        .unwrap();
    let other = courses::create_course(&pool, &unique("Other"), "desc")
        .await
        .unwrap();
    let content = contents::create_content(
        &pool,
        course.id,
        &NewContent {
            id: new_id(),
            name: "Intro".into(),
            description: "First steps".into(),
            image: Some("/shared/upload/x.png".into()),
        },
    )
    .await
    .unwrap();

    assert!(matches!(
        contents::get_content(&pool, other.id, content.id).await,
        Err(CatalogError::NotFound(_))
    ));
    assert_eq!(
        contents::course_images(&pool, course.id).await.unwrap(),
        vec!["/shared/upload/x.png".to_string()]
    );

    let latest = contents::latest_contents(&pool, 50).await.unwrap();
    assert!(latest.iter().any(|c| c.content.id == content.id));

    courses::delete_course(&pool, course.id).await.unwrap();
    courses::delete_course(&pool, other.id).await.unwrap();
}

#[tokio::test]
async fn favorites_are_idempotent_per_user() {
    let Some(pool) = pool().await else { return };
    let store = PgCredentialStore::new(pool.clone());
    let user = store
        .create(NewUser {
            first_name: "Fav".into(),
            last_name: "Tester".into(),
            username: unique("fav"),
            password_hash: "x".into(),
            role: Role::User,
            is_active: true,
        })
        .await
        .unwrap();
    let course = courses::create_course(&pool, &unique("Fav"), "desc")
        .await
        .unwrap();

    let first = favorites::add_favorite(&pool, user.id, course.id).await.unwrap();
    let again = favorites::add_favorite(&pool, user.id, course.id).await.unwrap();
    assert_eq!(first.id, again.id);
    assert!(favorites::is_favorite(&pool, user.id, course.id).await.unwrap());
    assert_eq!(
        favorites::list_favorites(&pool, user.id).await.unwrap()[0].id,
        course.id
    );

    favorites::remove_favorite(&pool, user.id, course.id).await.unwrap();
    assert!(matches!(
        favorites::remove_favorite(&pool, user.id, course.id).await,
        Err(CatalogError::NotFound(_))
    ));
    courses::delete_course(&pool, course.id).await.unwrap();
}
