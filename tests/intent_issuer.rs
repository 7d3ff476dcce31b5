#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use checkout::{
    intents::{IdempotencyLocks, IntentConfig, IssueError, create_intent},
    processor::{CreateIntentCall, PaymentProcessor, ProcessorError, RemoteIntent},
    types::CreateIntentRequest,
};
use sqlx::{
    Connection, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tempfile::NamedTempFile;
use uuid::Uuid;

struct TestDb {
    pool: SqlitePool,
    _db_file: NamedTempFile,
}

async fn setup_db(max_connections: u32) -> TestDb {
    let db_file = NamedTempFile::new().expect("create temp sqlite file");
    let options = SqliteConnectOptions::new()
        .filename(db_file.path())
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_millis(500));

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .expect("connect sqlite for migrations");
    run_migrations_on_conn(&mut conn).await.expect("run migrations");
    conn.close().await.expect("close migration conn");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON;").execute(conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
        .expect("connect sqlite file");

    TestDb {
        pool,
        _db_file: db_file,
    }
}

async fn run_migrations_on_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let mut entries: Vec<_> = fs::read_dir("migrations")
        .map_err(sqlx::Error::Io)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("sql"))
        .collect();

    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let contents = fs::read_to_string(entry.path()).map_err(sqlx::Error::Io)?;
        for statement in contents.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&mut *conn).await?;
        }
    }

    Ok(())
}

struct MockProcessor {
    calls: AtomicUsize,
    fail: bool,
}

impl MockProcessor {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_intent(&self, _call: &CreateIntentCall) -> Result<RemoteIntent, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProcessorError::Unavailable("connection refused".to_string()));
        }
        let id = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{id}_secret_{}", Uuid::new_v4().simple());
        Ok(RemoteIntent { id, client_secret })
    }
}

fn request(amount: i64, currency: &str) -> CreateIntentRequest {
    CreateIntentRequest {
        amount,
        currency: currency.to_string(),
    }
}

#[tokio::test]
async fn create_persists_record_and_history() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let created = create_intent(&db.pool, &mock, &config, &locks, &request(1000, "usd"), None)
        .await
        .expect("create intent");

    assert_eq!(mock.call_count(), 1);
    assert!(created.client_secret.contains("_secret_"));

    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT amount, currency, status FROM payment_intents WHERE id = ?",
    )
    .bind(&created.id)
    .fetch_one(&db.pool)
    .await
    .expect("intent row exists");

    assert_eq!(row.0, 1000);
    assert_eq!(row.1, "usd");
    assert_eq!(row.2, "created");

    let transitions = sqlx::query_as::<_, (Option<String>, String)>(
        "SELECT from_status, to_status FROM intent_transitions WHERE intent_id = ?",
    )
    .bind(&created.id)
    .fetch_all(&db.pool)
    .await
    .expect("transitions");

    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].0, None);
    assert_eq!(transitions[0].1, "created");
}

#[tokio::test]
async fn zero_amount_rejected_without_remote_call() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let result = create_intent(&db.pool, &mock, &config, &locks, &request(0, "usd"), None).await;

    assert!(matches!(result, Err(IssueError::InvalidAmount(_))));
    assert_eq!(mock.call_count(), 0);

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payment_intents")
        .fetch_one(&db.pool)
        .await
        .expect("count intents");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn negative_amount_rejected() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let result = create_intent(&db.pool, &mock, &config, &locks, &request(-500, "usd"), None).await;

    assert!(matches!(result, Err(IssueError::InvalidAmount(_))));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn unrecognized_currency_rejected() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let result =
        create_intent(&db.pool, &mock, &config, &locks, &request(1000, "doubloons"), None).await;

    assert!(matches!(result, Err(IssueError::InvalidCurrency(_))));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn currency_codes_are_case_insensitive() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let created = create_intent(&db.pool, &mock, &config, &locks, &request(1000, "USD"), None)
        .await
        .expect("create intent");

    let currency =
        sqlx::query_scalar::<_, String>("SELECT currency FROM payment_intents WHERE id = ?")
            .bind(&created.id)
            .fetch_one(&db.pool)
            .await
            .expect("currency stored");
    assert_eq!(currency, "usd");
}

#[tokio::test]
async fn repeated_key_returns_identical_pair_with_one_remote_call() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let first = create_intent(
        &db.pool,
        &mock,
        &config,
        &locks,
        &request(1000, "usd"),
        Some("key-1"),
    )
    .await
    .expect("first create");

    let second = create_intent(
        &db.pool,
        &mock,
        &config,
        &locks,
        &request(1000, "usd"),
        Some("key-1"),
    )
    .await
    .expect("second create");

    assert_eq!(first.id, second.id);
    assert_eq!(first.client_secret, second.client_secret);
    assert_eq!(mock.call_count(), 1);

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payment_intents")
        .fetch_one(&db.pool)
        .await
        .expect("count intents");
    assert_eq!(count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_same_key_makes_one_remote_call() {
    let db = setup_db(2).await;
    let mock = Arc::new(MockProcessor::new());
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let barrier_a = barrier.clone();
    let barrier_b = barrier.clone();

    let (a, b) = tokio::join!(
        async {
            barrier_a.wait().await;
            create_intent(
                &db.pool,
                mock.as_ref(),
                &config,
                &locks,
                &request(1000, "usd"),
                Some("key-race"),
            )
            .await
            .expect("create a")
        },
        async {
            barrier_b.wait().await;
            create_intent(
                &db.pool,
                mock.as_ref(),
                &config,
                &locks,
                &request(1000, "usd"),
                Some("key-race"),
            )
            .await
            .expect("create b")
        }
    );

    assert_eq!(a.id, b.id, "both callers must observe the same intent");
    assert_eq!(a.client_secret, b.client_secret);
    assert_eq!(mock.call_count(), 1, "only one remote call per key");

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payment_intents")
        .fetch_one(&db.pool)
        .await
        .expect("count intents");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn distinct_keys_create_distinct_intents() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let first = create_intent(
        &db.pool,
        &mock,
        &config,
        &locks,
        &request(1000, "usd"),
        Some("key-a"),
    )
    .await
    .expect("create a");
    let second = create_intent(
        &db.pool,
        &mock,
        &config,
        &locks,
        &request(2000, "eur"),
        Some("key-b"),
    )
    .await
    .expect("create b");

    assert_ne!(first.id, second.id);
    assert_ne!(first.client_secret, second.client_secret);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn processor_outage_surfaces_and_persists_nothing() {
    let db = setup_db(1).await;
    let mock = MockProcessor::failing();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    let result = create_intent(&db.pool, &mock, &config, &locks, &request(1000, "usd"), None).await;

    assert!(matches!(
        result,
        Err(IssueError::Processor(ProcessorError::Unavailable(_)))
    ));

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payment_intents")
        .fetch_one(&db.pool)
        .await
        .expect("count intents");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn persistence_failure_still_surfaces_success_by_default() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig::default();
    let locks = IdempotencyLocks::new();

    // Remote creation succeeds, local write cannot land.
    sqlx::query("DROP TABLE intent_transitions")
        .execute(&db.pool)
        .await
        .expect("drop table");
    sqlx::query("DROP TABLE payment_intents")
        .execute(&db.pool)
        .await
        .expect("drop table");

    let created = create_intent(&db.pool, &mock, &config, &locks, &request(1000, "usd"), None)
        .await
        .expect("remote state is authoritative");

    assert_eq!(mock.call_count(), 1);
    assert!(!created.id.is_empty());
}

#[tokio::test]
async fn persistence_failure_errors_in_strict_mode() {
    let db = setup_db(1).await;
    let mock = MockProcessor::new();
    let config = IntentConfig {
        strict_persistence: true,
    };
    let locks = IdempotencyLocks::new();

    sqlx::query("DROP TABLE intent_transitions")
        .execute(&db.pool)
        .await
        .expect("drop table");
    sqlx::query("DROP TABLE payment_intents")
        .execute(&db.pool)
        .await
        .expect("drop table");

    let result = create_intent(&db.pool, &mock, &config, &locks, &request(1000, "usd"), None).await;

    assert!(matches!(result, Err(IssueError::Store(_))));
    assert_eq!(mock.call_count(), 1);
}
