use sqlx::PgPool;

/// Connect, migrate, and verify every table exists and is empty.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    litis_db::health_check(&pool).await.unwrap();

    let tables = [
        "users",
        "monitored_cases",
        "bulletin_entries",
        "alerts",
        "notification_log",
        "calendar_tokens",
        "calendar_watch_channels",
        "calendar_events",
    ];

    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

/// A monitored case must carry a case number or a party name.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_monitored_case_requires_a_target(pool: PgPool) {
    let user_id: i64 = sqlx::query_scalar("INSERT INTO users (email) VALUES ('a@b.mx') RETURNING id")
        .fetch_one(&pool)
        .await
        .unwrap();

    let err = sqlx::query("INSERT INTO monitored_cases (user_id) VALUES ($1)")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.constraint(), Some("ck_monitored_cases_target"));
}
