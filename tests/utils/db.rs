/// Database test utilities with singleton pattern
///
/// Tests that need Postgres read `TEST_DATABASE_URL` and share one migrated pool.
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use keystone_sync::shared::Database;
use std::sync::{Mutex, MutexGuard, OnceLock};

static DATABASE: OnceLock<Database> = OnceLock::new();

/// Get or create the migrated test database
pub fn test_database() -> Database {
    DATABASE
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let test_db_url = std::env::var("TEST_DATABASE_URL")
                .expect("TEST_DATABASE_URL must be set in .env for tests");

            let manager = ConnectionManager::<PgConnection>::new(test_db_url);
            let pool = r2d2::Pool::builder()
                .max_size(10)
                .build(manager)
                .expect("Failed to create test database pool");

            let database = Database::from_pool(pool);
            database
                .run_migrations()
                .expect("Failed to run migrations on test database");
            database
        })
        .clone()
}

/// Clean all pipeline tables - use at the start of each test
pub fn clean_test_db() {
    let database = test_database();
    let mut conn = database.get_connection().expect("Failed to get DB connection");

    for table in ["player_builds", "reports", "player_rankings", "workflow_states"] {
        diesel::sql_query(format!("TRUNCATE TABLE {} CASCADE", table))
            .execute(&mut conn)
            .unwrap_or_else(|e| panic!("Failed to clean {}: {}", table, e));
    }
}

/// Global test mutex for serialization
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire test lock to ensure database tests run serially
pub fn acquire_test_lock() -> MutexGuard<'static, ()> {
    // Handle poisoned mutex by recovering from panic
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
