use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite, SqliteConnection};

use helpbot_core::domain::user::{User, UserId};

use super::{parse_u32, RepositoryError};

const USER_COLUMNS: &str = "id, reputation, level, asked_questions, resolved_questions";

pub async fn find<'e, E>(executor: E, id: UserId) -> Result<Option<User>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(executor)
        .await?;

    row.map(user_from_row).transpose()
}

/// Returns the stored user, inserting a fresh one first if needed.
///
/// This is a write even when the row exists, so inside a transaction it takes
/// the write lock before anything is read.
pub async fn ensure<'e, E>(executor: E, id: UserId) -> Result<User, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "INSERT INTO users (id) VALUES (?)
         ON CONFLICT(id) DO UPDATE SET id = excluded.id
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id.0)
    .fetch_one(executor)
    .await?;

    user_from_row(row)
}

pub async fn save<'e, E>(executor: E, user: &User) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO users (id, reputation, level, asked_questions, resolved_questions)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            reputation = excluded.reputation,
            level = excluded.level,
            asked_questions = excluded.asked_questions,
            resolved_questions = excluded.resolved_questions",
    )
    .bind(user.id.0)
    .bind(user.reputation)
    .bind(i64::from(user.level))
    .bind(i64::from(user.asked_questions))
    .bind(i64::from(user.resolved_questions))
    .execute(executor)
    .await?;

    Ok(())
}

/// Returns whether a row was removed.
pub async fn delete<'e, E>(executor: E, id: UserId) -> Result<bool, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id.0).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// Inserts a default row for every id that has none; returns how many were created.
pub async fn insert_missing(
    conn: &mut SqliteConnection,
    ids: &[UserId],
) -> Result<u64, RepositoryError> {
    let mut created = 0;
    for id in ids {
        created += sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?)")
            .bind(id.0)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(created)
}

pub async fn count<'e, E>(executor: E) -> Result<i64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(executor).await?)
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        reputation: row.try_get("reputation")?,
        level: parse_u32("level", row.try_get("level")?)?,
        asked_questions: parse_u32("asked_questions", row.try_get("asked_questions")?)?,
        resolved_questions: parse_u32("resolved_questions", row.try_get("resolved_questions")?)?,
    })
}
