use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{api::error, ENV};

/// Builds the single process-wide pool. Constructed once in main and shared
/// by reference with every repository (no module-level client singleton).
pub async fn connect_database() -> Result<PgPool, error::SystemError> {
    let database_url = &ENV.database_url;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_slow_threshold(std::time::Duration::from_secs(3))
        .connect(database_url)
        .await?;
    Ok(pool)
}
