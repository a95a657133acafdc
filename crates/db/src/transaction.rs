use std::future::Future;
use std::pin::Pin;

use sqlx::SqliteConnection;
use tracing::warn;

use crate::DbPool;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs `work` inside one transaction: committed when it returns `Ok`,
/// rolled back when it returns `Err`.
///
/// ```ignore
/// in_transaction(&pool, |conn| Box::pin(async move {
///     repositories::user::save(&mut *conn, &user).await
/// }))
/// .await?;
/// ```
pub async fn in_transaction<T, E, F>(pool: &DbPool, work: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>>,
    E: From<sqlx::Error>,
{
    let mut tx = pool.begin().await?;

    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(
                    event_name = "system.db.rollback_failed",
                    error = %rollback_error,
                    "transaction rollback failed; connection will be discarded"
                );
            }
            Err(error)
        }
    }
}
