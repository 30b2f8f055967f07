//! Startup seeding: the demo catalog and an optional moderator account.

use archpath_core::roles::ROLE_MODERATOR;
use sqlx::PgPool;

use crate::models::artifact::CreateArtifact;
use crate::models::user::CreateUser;
use crate::repositories::{ArtifactRepo, UserRepo};

/// `(name, period, production center, image file)` for the demo catalog.
const CATALOG: [(&str, &str, &str, &str); 6] = [
    ("Attic amphorae", "Period: 5th-4th c. BCE", "Attica", "first.jpg"),
    ("Corinthian amphorae", "Period: 6th-5th c. BCE", "Corinth", "2.jpg"),
    ("Phoenician amphorae", "Period: 8th-6th c. BCE", "Phoenicia", "3.jpeg"),
    ("Roman coins", "Period: 1st-4th c. CE", "Italy", "4.jpg"),
    ("Scythian bronze arrowheads", "Period: 7th-3rd c. BCE", "Scythia", "5.jpg"),
    ("La Tène fibulae", "Period: 4th-1st c. BCE", "Central Europe", "6.jpg"),
];

/// Insert the demo artifacts that are not present yet (matched by name).
///
/// With `image_base_url` set, each artifact gets `{base}/{file}` as its
/// image URL. Returns the number of artifacts inserted.
pub async fn seed_catalog(pool: &PgPool, image_base_url: Option<&str>) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for (name, period, center, file) in CATALOG {
        let input = CreateArtifact {
            name: name.to_string(),
            description: Some(period.to_string()),
            production_center: Some(center.to_string()),
            example_location: None,
            is_active: Some(true),
        };
        let image_url =
            image_base_url.map(|base| format!("{}/{file}", base.trim_end_matches('/')));
        if ArtifactRepo::insert_if_name_absent(pool, &input, image_url.as_deref()).await? {
            inserted += 1;
        }
    }
    if inserted > 0 {
        tracing::info!(inserted, "Seeded artifact catalog");
    }
    Ok(inserted)
}

/// Create a moderator account unless the login already exists.
///
/// Returns `true` if the account was created. An existing user with that
/// login is left untouched.
pub async fn ensure_moderator(
    pool: &PgPool,
    login: &str,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let input = CreateUser {
        login: login.to_string(),
        password_hash: password_hash.to_string(),
        role: ROLE_MODERATOR.to_string(),
    };
    let created = UserRepo::create_if_absent(pool, &input).await?;
    if let Some(user) = &created {
        tracing::info!(user_id = user.id, login, "Bootstrapped moderator account");
    }
    Ok(created.is_some())
}
