use sqlx::SqlitePool;

/// Applies the schema idempotently. Every statement is `IF NOT EXISTS`, so
/// running it on an already-initialized database is a no-op.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}
