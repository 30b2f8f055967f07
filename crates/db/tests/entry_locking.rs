//! Entry writes and `form` serialize on the request row lock.
//!
//! Each test holds the lock in one transaction, starts the competing
//! operation on another connection, and checks it waits for the commit.

use std::time::Duration;

use archpath_core::types::DbId;
use archpath_db::models::artifact::CreateArtifact;
use archpath_db::models::trade_analysis::UpdateTradeAnalysis;
use archpath_db::models::user::CreateUser;
use archpath_db::repositories::{AnalysisRecordRepo, ArtifactRepo, TradeAnalysisRepo, UserRepo};
use assert_matches::assert_matches;
use sqlx::PgPool;

/// Long enough for a blocked statement to have reached its lock wait.
const LOCK_WAIT: Duration = Duration::from_millis(300);

async fn user(pool: &PgPool, login: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            login: login.to_string(),
            password_hash: "x".to_string(),
            role: "user".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn artifact(pool: &PgPool, name: &str, center: &str) -> DbId {
    ArtifactRepo::create(
        pool,
        &CreateArtifact {
            name: name.to_string(),
            description: None,
            production_center: Some(center.to_string()),
            example_location: None,
            is_active: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// A named draft holding one entry for `artifact_id`.
async fn ready_draft(pool: &PgPool, creator_id: DbId, artifact_id: DbId) -> DbId {
    let mut tx = pool.begin().await.unwrap();
    let draft = TradeAnalysisRepo::get_or_create_draft(&mut tx, creator_id)
        .await
        .unwrap()
        .unwrap();
    AnalysisRecordRepo::upsert(&mut tx, draft.id, artifact_id, 1, "")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    TradeAnalysisRepo::update_draft(
        pool,
        draft.id,
        &UpdateTradeAnalysis {
            site_name: Some("Olbia".into()),
        },
    )
    .await
    .unwrap()
    .unwrap();
    draft.id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_form_waits_for_pending_add(pool: PgPool) {
    let creator = user(&pool, "alice").await;
    let a = artifact(&pool, "Attic amphorae", "Attica").await;
    let b = artifact(&pool, "Corinthian amphorae", "Corinth").await;
    let request_id = ready_draft(&pool, creator, a).await;

    let mut tx = pool.begin().await.unwrap();
    let draft = TradeAnalysisRepo::get_or_create_draft(&mut tx, creator)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(draft.id, request_id);

    let form = tokio::spawn({
        let pool = pool.clone();
        async move { TradeAnalysisRepo::form(&pool, request_id).await }
    });
    tokio::time::sleep(LOCK_WAIT).await;
    assert!(!form.is_finished());

    AnalysisRecordRepo::upsert(&mut tx, request_id, b, 5, "")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let formed = form.await.unwrap().unwrap().unwrap();
    assert_eq!(formed.status, "formed");
    let entries = AnalysisRecordRepo::list_for_request(&pool, request_id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_form_sees_entry_removed_while_waiting(pool: PgPool) {
    let creator = user(&pool, "alice").await;
    let a = artifact(&pool, "Attic amphorae", "Attica").await;
    let request_id = ready_draft(&pool, creator, a).await;

    let mut tx = pool.begin().await.unwrap();
    let locked = TradeAnalysisRepo::lock_by_id(&mut tx, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locked.status, "draft");

    let form = tokio::spawn({
        let pool = pool.clone();
        async move { TradeAnalysisRepo::form(&pool, request_id).await }
    });
    tokio::time::sleep(LOCK_WAIT).await;
    assert!(!form.is_finished());

    assert!(AnalysisRecordRepo::delete(&mut tx, request_id, a).await.unwrap());
    tx.commit().await.unwrap();

    // The last entry is gone, so the guard refuses to form.
    assert_matches!(form.await.unwrap(), Ok(None));
    let request = TradeAnalysisRepo::find_by_id(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, "draft");
    assert!(request.formation_date.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_after_form_reports_formed(pool: PgPool) {
    let creator = user(&pool, "alice").await;
    let a = artifact(&pool, "Attic amphorae", "Attica").await;
    let request_id = ready_draft(&pool, creator, a).await;

    TradeAnalysisRepo::form(&pool, request_id).await.unwrap().unwrap();

    // An entry edit that lost the race sees the new status before writing.
    let mut tx = pool.begin().await.unwrap();
    let locked = TradeAnalysisRepo::lock_by_id(&mut tx, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locked.status, "formed");
    tx.rollback().await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_draft_formed_while_waiting_is_not_returned(pool: PgPool) {
    let creator = user(&pool, "alice").await;
    let a = artifact(&pool, "Attic amphorae", "Attica").await;
    let b = artifact(&pool, "Corinthian amphorae", "Corinth").await;
    let request_id = ready_draft(&pool, creator, a).await;

    let mut form_tx = pool.begin().await.unwrap();
    TradeAnalysisRepo::lock_by_id(&mut form_tx, request_id)
        .await
        .unwrap()
        .unwrap();

    let add = tokio::spawn({
        let pool = pool.clone();
        async move {
            let mut tx = pool.begin().await.unwrap();
            let draft = TradeAnalysisRepo::get_or_create_draft(&mut tx, creator)
                .await
                .unwrap();
            tx.commit().await.unwrap();
            draft
        }
    });
    tokio::time::sleep(LOCK_WAIT).await;
    assert!(!add.is_finished());

    sqlx::query("UPDATE trade_analyses SET status = 'formed', formation_date = NOW() WHERE id = $1")
        .bind(request_id)
        .execute(&mut *form_tx)
        .await
        .unwrap();
    form_tx.commit().await.unwrap();

    assert_matches!(add.await.unwrap(), None);

    // A retried add opens a fresh draft and leaves the formed request alone.
    let mut tx = pool.begin().await.unwrap();
    let fresh = TradeAnalysisRepo::get_or_create_draft(&mut tx, creator)
        .await
        .unwrap()
        .unwrap();
    AnalysisRecordRepo::upsert(&mut tx, fresh.id, b, 2, "")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_ne!(fresh.id, request_id);
    let formed_entries = AnalysisRecordRepo::list_for_request(&pool, request_id)
        .await
        .unwrap();
    assert_eq!(formed_entries.len(), 1);
}
