use sqlx::{Pool, Postgres};

const MIG_0001: &str = include_str!("../migrations/0001_create_access_requests.sql");

/// Apply the message store schema and this service's tables.
///
/// Every statement is idempotent, so running on each startup is safe.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (label, sql) in [("messages", message_store::SCHEMA), ("access_requests", MIG_0001)] {
        sqlx::raw_sql(sql).execute(db).await?;
        tracing::info!(migration = %label, "viewonce-service migration applied");
    }
    Ok(())
}
