use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

use crate::config::DatabaseConfig;

pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool<Sqlite>, sqlx::Error> {
    // Create data directory if it doesn't exist (file-backed databases only)
    let file_path = config.url.trim_start_matches("sqlite://");
    if !file_path.contains(":memory:") {
        if let Some(path) = Path::new(file_path).parent() {
            std::fs::create_dir_all(path).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.pool_size)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
