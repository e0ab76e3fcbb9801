//! Integration tests for bulletin ingestion storage and historical lookups.

mod common;

use common::{day, entry};
use litis_db::repositories::BulletinEntryRepo;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn insert_batch_skips_duplicates(pool: PgPool) {
    let batch = vec![
        entry(day(10), "17/2025", Some("17/2025"), "ACUERDO"),
        entry(day(10), "18/2025", Some("18/2025"), "ACUERDO"),
    ];
    let first = BulletinEntryRepo::insert_batch(&pool, &batch).await.unwrap();
    assert_eq!(first.len(), 2);

    let again = vec![
        entry(day(10), "17/2025", Some("17/2025"), "ACUERDO"),
        entry(day(11), "17/2025", Some("17/2025"), "ACUERDO"),
    ];
    let second = BulletinEntryRepo::insert_batch(&pool, &again).await.unwrap();
    assert_eq!(second.len(), 1, "only the new date is inserted");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unprocessed_entries_are_listed_oldest_first(pool: PgPool) {
    let ids = BulletinEntryRepo::insert_batch(
        &pool,
        &[
            entry(day(10), "1/2025", Some("1/2025"), ""),
            entry(day(10), "2/2025", Some("2/2025"), ""),
            entry(day(10), "3/2025", Some("3/2025"), ""),
        ],
    )
    .await
    .unwrap();

    BulletinEntryRepo::mark_processed(&pool, ids[0]).await.unwrap();
    assert!(BulletinEntryRepo::soft_delete(&pool, ids[2]).await.unwrap());
    assert!(!BulletinEntryRepo::soft_delete(&pool, ids[2]).await.unwrap());

    let pending = BulletinEntryRepo::list_unprocessed(&pool, 0, 100).await.unwrap();
    assert_eq!(pending.iter().map(|e| e.id).collect::<Vec<_>>(), vec![ids[1]]);
    assert!(BulletinEntryRepo::list_unprocessed(&pool, ids[1], 100).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn historical_lookup_by_case_key(pool: PgPool) {
    BulletinEntryRepo::insert_batch(
        &pool,
        &[
            entry(day(3), "EXP 00017/2025", Some("17/2025"), ""),
            entry(day(4), "17/2024", Some("17/2024"), ""),
            entry(day(5), "17 / 2025", Some("17/2025"), ""),
        ],
    )
    .await
    .unwrap();

    let hits = BulletinEntryRepo::list_by_case_key(&pool, "17/2025").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].bulletin_date, day(3));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn historical_lookup_by_text_tokens(pool: PgPool) {
    BulletinEntryRepo::insert_batch(
        &pool,
        &[
            entry(day(3), "1/2025", None, "Actor: Maria Lopez Hernandez vs Banco"),
            entry(day(4), "2/2025", None, "Actor: Maria Hernandez"),
        ],
    )
    .await
    .unwrap();

    let tokens = vec!["MARIA".to_string(), "LOPEZ".to_string(), "HERNANDEZ".to_string()];
    let hits = BulletinEntryRepo::list_containing_all(&pool, &tokens).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].case_number, "1/2025");

    assert!(BulletinEntryRepo::list_containing_all(&pool, &[]).await.unwrap().is_empty());
}
