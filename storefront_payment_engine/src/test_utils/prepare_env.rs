use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// A fresh database URL in the system temp directory.
pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("spg_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// Creates an empty database at `url`, dropping any existing one first.
pub async fn create_database(url: &str) {
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("🚀️ Error dropping database {url}: {e:?}");
        }
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {url}");
}

pub async fn run_migrations(db: &SqliteDatabase) {
    db.run_migrations().await.expect("Error running DB migrations");
}

/// Creates, migrates and connects to a throwaway database at `url`.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    create_database(url).await;
    let db = SqliteDatabase::new_with_url(url, 25).await.expect("Error creating connection to database");
    run_migrations(&db).await;
    db
}

/// Shorthand for [`prepare_test_env`] on a [`random_db_path`].
pub async fn prepare_test_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}
