//! Integration tests for DatabaseSession and ConnectionPool.
//!
//! These tests require a PostgreSQL database and run only when DATABASE_URL
//! is set; otherwise each test returns early.
//!
//! Run with: DATABASE_URL=postgresql://localhost/test_db cargo test -p keystone-postgres --test test_session

use keystone_postgres::{
    ConnectParams, ConnectionPool, DatabaseSession, KeywordError, PoolConfig, QueryResult, Row,
    SessionState, SqlValue,
};

/// Connection parameters from the environment, if a database is configured
fn database_params() -> Option<ConnectParams> {
    std::env::var("DATABASE_URL").ok().map(ConnectParams::from_url)
}

/// Connected session with a fresh test table
async fn session_with_table(params: &ConnectParams, table: &str) -> DatabaseSession {
    let mut session = DatabaseSession::new();
    session.connect(params).await.unwrap();

    session
        .execute_query(&format!("DROP TABLE IF EXISTS {} CASCADE", table), &[])
        .await
        .unwrap();
    session
        .execute_query(
            &format!(
                "CREATE TABLE {} (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL,
                    value INTEGER,
                    created_on DATE
                )",
                table
            ),
            &[],
        )
        .await
        .unwrap();

    session
}

async fn drop_table(session: &mut DatabaseSession, table: &str) {
    session
        .execute_query(&format!("DROP TABLE IF EXISTS {} CASCADE", table), &[])
        .await
        .unwrap();
}

async fn count_rows(session: &mut DatabaseSession, table: &str) -> i64 {
    let result = session
        .execute_query(&format!("SELECT COUNT(*) AS n FROM {}", table), &[])
        .await
        .unwrap();
    let rows = result.into_rows().unwrap();
    match rows[0].get("n") {
        Some(SqlValue::Int(n)) => *n,
        other => panic!("unexpected count {:?}", other),
    }
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connect_twice_fails() {
    let Some(params) = database_params() else { return };

    let mut session = DatabaseSession::new();
    session.connect(&params).await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    let err = session.connect(&params).await.unwrap_err();
    assert!(matches!(err, KeywordError::AlreadyConnected(_)));

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_bad_credentials() {
    let Some(params) = database_params() else { return };

    let options = params.connect_options().unwrap();
    let wrong = ConnectParams::new(
        options.get_host(),
        options.get_port(),
        options.get_database().unwrap_or("postgres"),
        "keystone_no_such_user",
        "wrong",
    );

    let mut session = DatabaseSession::new();
    let err = session.connect(&wrong).await.unwrap_err();
    assert!(matches!(err, KeywordError::ConnectionFailed(_)));
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_execute_query_rows_and_affected() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_queries";
    let mut session = session_with_table(&params, table).await;

    let inserted = session
        .execute_query(
            &format!("INSERT INTO {} (name, value) VALUES ($1, $2), ($3, $4)", table),
            &["alice".into(), SqlValue::Int(10), "bob".into(), SqlValue::Null],
        )
        .await
        .unwrap();
    assert_eq!(inserted, QueryResult::Affected(2));

    let result = session
        .execute_query(
            &format!("SELECT name, value FROM {} ORDER BY name", table),
            &[],
        )
        .await
        .unwrap();
    let rows = result.into_rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].column_names().collect::<Vec<_>>(), vec!["name", "value"]);
    assert_eq!(rows[0].get("name"), Some(&SqlValue::Text("alice".to_string())));
    assert_eq!(rows[0].get("value"), Some(&SqlValue::Int(10)));
    assert_eq!(rows[1].get("value"), Some(&SqlValue::Null));

    let returned = session
        .execute_query(
            &format!("UPDATE {} SET value = $1 WHERE name = $2 RETURNING id", table),
            &[SqlValue::Int(99), "bob".into()],
        )
        .await
        .unwrap();
    assert_eq!(returned.rows().map(|r| r.len()), Some(1));

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_query_error_carries_driver_message() {
    let Some(params) = database_params() else { return };

    let mut session = DatabaseSession::new();
    session.connect(&params).await.unwrap();

    let err = session
        .execute_query("SELECT * FROM keystone_missing_table", &[])
        .await
        .unwrap_err();
    match err {
        KeywordError::QueryError(msg) => assert!(msg.contains("keystone_missing_table")),
        other => panic!("Expected QueryError, got {:?}", other),
    }

    let err = session.execute_query("SELEC 1", &[]).await.unwrap_err();
    assert!(matches!(err, KeywordError::QueryError(_)));

    session.close().await.unwrap();
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_begin_commit_then_second_commit_fails() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_commit";
    let mut session = session_with_table(&params, table).await;

    session.begin_transaction().await.unwrap();
    assert_eq!(session.state(), SessionState::InTransaction);
    session
        .execute_query(
            &format!("INSERT INTO {} (name) VALUES ($1)", table),
            &["committed".into()],
        )
        .await
        .unwrap();
    session.commit_transaction().await.unwrap();

    let err = session.commit_transaction().await.unwrap_err();
    assert_eq!(err, KeywordError::NoActiveTransaction);
    assert_eq!(count_rows(&mut session, table).await, 1);

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_rollback_discards_changes() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_rollback";
    let mut session = session_with_table(&params, table).await;

    session.begin_transaction().await.unwrap();
    assert_eq!(
        session.begin_transaction().await.unwrap_err(),
        KeywordError::TransactionAlreadyActive
    );
    session
        .execute_query(
            &format!("INSERT INTO {} (name) VALUES ($1)", table),
            &["discarded".into()],
        )
        .await
        .unwrap();
    session.rollback_transaction().await.unwrap();

    assert_eq!(count_rows(&mut session, table).await, 0);
    assert_eq!(
        session.rollback_transaction().await.unwrap_err(),
        KeywordError::NoActiveTransaction
    );

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_close_rolls_back_open_transaction() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_close_tx";
    let mut session = session_with_table(&params, table).await;

    session.begin_transaction().await.unwrap();
    session
        .execute_query(
            &format!("INSERT INTO {} (name) VALUES ($1)", table),
            &["pending".into()],
        )
        .await
        .unwrap();
    session.close().await.unwrap();

    let mut check = DatabaseSession::new();
    check.connect(&params).await.unwrap();
    assert_eq!(count_rows(&mut check, table).await, 0);
    drop_table(&mut check, table).await;
    check.close().await.unwrap();
}

// =============================================================================
// Table helpers
// =============================================================================

#[tokio::test]
async fn test_table_columns_and_existence() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_columns";
    let mut session = session_with_table(&params, table).await;

    let columns = session.get_table_columns(table).await.unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "value", "created_on"]);
    assert_eq!(columns[1].data_type, "text");
    assert!(!columns[1].is_nullable);
    assert!(columns[2].is_nullable);
    assert_eq!(columns[3].ordinal_position, 4);

    let qualified = session
        .get_table_columns(&format!("public.{}", table))
        .await
        .unwrap();
    assert_eq!(qualified, columns);

    assert!(session.table_exists(table).await.unwrap());
    session.verify_table_exists(table).await.unwrap();

    assert!(!session.table_exists("keystone_missing_table").await.unwrap());
    assert_eq!(
        session.verify_table_exists("keystone_missing_table").await.unwrap_err(),
        KeywordError::TableNotFound("keystone_missing_table".to_string())
    );
    assert!(matches!(
        session.get_table_columns("keystone_missing_table").await,
        Err(KeywordError::TableNotFound(_))
    ));

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_insert_test_data_and_truncate() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_insert";
    let mut session = session_with_table(&params, table).await;

    // Text arguments are cast to the column types
    let data = Row::new()
        .with("name", "widget")
        .with("value", "42")
        .with("created_on", "2024-03-01");
    assert_eq!(session.insert_test_data(table, &data).await.unwrap(), 1);

    let data = Row::new().with("name", "gadget").with("value", SqlValue::Null);
    assert_eq!(session.insert_test_data(table, &data).await.unwrap(), 1);

    let rows = session
        .execute_query(
            &format!("SELECT value, created_on FROM {} WHERE name = $1", table),
            &["widget".into()],
        )
        .await
        .unwrap()
        .into_rows()
        .unwrap();
    assert_eq!(rows[0].get("value"), Some(&SqlValue::Int(42)));
    assert_eq!(
        rows[0].get("created_on").map(SqlValue::to_json),
        Some(serde_json::json!("2024-03-01"))
    );

    let err = session
        .insert_test_data(table, &Row::new().with("no_such_column", 1i64))
        .await
        .unwrap_err();
    assert!(matches!(err, KeywordError::QueryError(_)));

    // Truncation inside a rolled-back transaction is undone
    session.begin_transaction().await.unwrap();
    session.truncate_table(table).await.unwrap();
    assert_eq!(count_rows(&mut session, table).await, 0);
    session.rollback_transaction().await.unwrap();
    assert_eq!(count_rows(&mut session, table).await, 2);

    session.truncate_table(table).await.unwrap();
    assert_eq!(count_rows(&mut session, table).await, 0);

    assert!(matches!(
        session.truncate_table("keystone_missing_table").await,
        Err(KeywordError::TableNotFound(_))
    ));

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_null_binds_to_typed_columns() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_nulls";
    let mut session = DatabaseSession::new();
    session.connect(&params).await.unwrap();
    drop_table(&mut session, table).await;
    session
        .execute_query(
            &format!(
                "CREATE TABLE {} (
                    id SERIAL PRIMARY KEY,
                    created_on DATE,
                    ref_id UUID,
                    doc JSONB,
                    seen_at TIMESTAMP
                )",
                table
            ),
            &[],
        )
        .await
        .unwrap();

    let data = Row::new()
        .with("created_on", SqlValue::Null)
        .with("ref_id", SqlValue::Null)
        .with("doc", SqlValue::Null)
        .with("seen_at", SqlValue::Null);
    assert_eq!(session.insert_test_data(table, &data).await.unwrap(), 1);

    // Same SQL text run with a NULL and then a typed argument
    let update = format!("UPDATE {} SET created_on = $1", table);
    let result = session.execute_query(&update, &[SqlValue::Null]).await.unwrap();
    assert_eq!(result, QueryResult::Affected(1));
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let result = session.execute_query(&update, &[SqlValue::Date(date)]).await.unwrap();
    assert_eq!(result, QueryResult::Affected(1));

    let result = session
        .execute_query(
            &format!("UPDATE {} SET ref_id = $1, doc = $2", table),
            &[SqlValue::Null, SqlValue::Null],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Affected(1));

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_returning_inside_literal_reports_affected() {
    let Some(params) = database_params() else { return };
    let table = "keystone_test_returning_text";
    let mut session = session_with_table(&params, table).await;

    session
        .execute_query(
            &format!("INSERT INTO {} (name) VALUES ('a'), ('b')", table),
            &[],
        )
        .await
        .unwrap();

    let result = session
        .execute_query(&format!("UPDATE {} SET name = 'returning customer'", table), &[])
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Affected(2));

    let result = session
        .execute_query(
            &format!("UPDATE {} SET value = $1 -- returning\n", table),
            &[SqlValue::Int(7)],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Affected(2));

    // A real RETURNING clause still yields rows, even when none match
    let result = session
        .execute_query(
            &format!("DELETE FROM {} WHERE name = $1 RETURNING id", table),
            &["nobody".into()],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Rows(vec![]));

    drop_table(&mut session, table).await;
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_enum_interval_and_inet_columns_decode_as_text() {
    let Some(params) = database_params() else { return };
    let mut session = DatabaseSession::new();
    session.connect(&params).await.unwrap();

    session
        .execute_query("DROP TYPE IF EXISTS keystone_mood CASCADE", &[])
        .await
        .unwrap();
    session
        .execute_query("CREATE TYPE keystone_mood AS ENUM ('sad', 'ok', 'happy')", &[])
        .await
        .unwrap();

    let rows = session
        .execute_query(
            "SELECT 'happy'::keystone_mood AS mood, interval '1 day' AS span, \
             '10.0.0.1'::inet AS host, '10.0.0.0/8'::cidr AS net",
            &[],
        )
        .await
        .unwrap()
        .into_rows()
        .unwrap();
    assert_eq!(rows[0].get("mood"), Some(&SqlValue::Text("happy".into())));
    assert_eq!(rows[0].get("span"), Some(&SqlValue::Text("1 day".into())));
    assert_eq!(rows[0].get("host"), Some(&SqlValue::Text("10.0.0.1".into())));
    assert_eq!(rows[0].get("net"), Some(&SqlValue::Text("10.0.0.0/8".into())));

    session
        .execute_query("DROP TYPE keystone_mood", &[])
        .await
        .unwrap();
    session.close().await.unwrap();
}

// =============================================================================
// Pool
// =============================================================================

#[tokio::test]
async fn test_pool_connections_run_queries() {
    let Some(params) = database_params() else { return };

    let pool = ConnectionPool::connect(params, PoolConfig::new(1, 2).unwrap())
        .await
        .unwrap();

    let mut a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id(), b.id());

    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&mut *a).await.unwrap();
    assert_eq!(one, 1);

    pool.release(a).await.unwrap();
    pool.release(b).await.unwrap();
    assert_eq!(pool.status().idle, 2);

    pool.drain().await;
    assert!(matches!(pool.acquire().await, Err(KeywordError::PoolClosed)));
}
