use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite};

use helpbot_core::domain::review::{
    MessageId, Review, ReviewId, ReviewWindow, SignupEntry, SignupForm,
};
use helpbot_core::domain::user::UserId;

use super::{encode_timestamp, parse_optional_timestamp, parse_timestamp, RepositoryError};

const REVIEW_COLUMNS: &str = "id, started_at, closed_at, announcement_message_id, finalized_at";

pub async fn insert<'e, E>(
    executor: E,
    window: &ReviewWindow,
    announcement_message_id: MessageId,
) -> Result<Review, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "INSERT INTO reviews (started_at, closed_at, announcement_message_id)
         VALUES (?, ?, ?)
         RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(encode_timestamp(window.started_at))
    .bind(encode_timestamp(window.closed_at))
    .bind(announcement_message_id.0)
    .fetch_one(executor)
    .await?;

    review_from_row(row)
}

pub async fn find<'e, E>(executor: E, id: ReviewId) -> Result<Option<Review>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(executor)
        .await?;

    row.map(review_from_row).transpose()
}

/// The unfinalized review whose window contains `now`, bounds inclusive.
pub async fn find_open_at<'e, E>(
    executor: E,
    now: DateTime<Utc>,
) -> Result<Option<Review>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = encode_timestamp(now);
    let row = sqlx::query(&format!(
        "SELECT {REVIEW_COLUMNS}
         FROM reviews
         WHERE started_at <= ? AND closed_at >= ? AND finalized_at IS NULL
         ORDER BY id DESC
         LIMIT 1"
    ))
    .bind(&now)
    .bind(&now)
    .fetch_optional(executor)
    .await?;

    row.map(review_from_row).transpose()
}

/// Reviews whose close report has not gone out yet, oldest window end first.
pub async fn list_unfinalized<'e, E>(executor: E) -> Result<Vec<Review>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {REVIEW_COLUMNS}
         FROM reviews
         WHERE finalized_at IS NULL
         ORDER BY closed_at ASC, id ASC"
    ))
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(review_from_row).collect()
}

/// Returns `false` when the review was already finalized (or does not exist).
pub async fn mark_finalized<'e, E>(
    executor: E,
    id: ReviewId,
    at: DateTime<Utc>,
) -> Result<bool, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("UPDATE reviews SET finalized_at = ? WHERE id = ? AND finalized_at IS NULL")
            .bind(encode_timestamp(at))
            .bind(id.0)
            .execute(executor)
            .await?;

    Ok(result.rows_affected() == 1)
}

/// Fails with a unique violation if the participant already has an entry.
pub async fn insert_entry<'e, E>(
    executor: E,
    entry: &SignupEntry,
    created_at: DateTime<Utc>,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO review_entries (
            review_id,
            participant_id,
            repository_url,
            description,
            check_modules,
            architecture_image_url,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.review_id.0)
    .bind(entry.participant.0)
    .bind(&entry.form.repository_url)
    .bind(&entry.form.description)
    .bind(entry.form.check_modules.as_deref())
    .bind(entry.form.architecture_image_url.as_deref())
    .bind(encode_timestamp(created_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_entry<'e, E>(
    executor: E,
    review_id: ReviewId,
    participant: UserId,
) -> Result<Option<SignupEntry>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT review_id, participant_id, repository_url, description, check_modules,
                architecture_image_url
         FROM review_entries
         WHERE review_id = ? AND participant_id = ?",
    )
    .bind(review_id.0)
    .bind(participant.0)
    .fetch_optional(executor)
    .await?;

    row.map(entry_from_row).transpose()
}

/// Returns whether an entry was removed.
pub async fn delete_entry<'e, E>(
    executor: E,
    review_id: ReviewId,
    participant: UserId,
) -> Result<bool, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("DELETE FROM review_entries WHERE review_id = ? AND participant_id = ?")
            .bind(review_id.0)
            .bind(participant.0)
            .execute(executor)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Participants in signup order.
pub async fn list_participants<'e, E>(
    executor: E,
    review_id: ReviewId,
) -> Result<Vec<UserId>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT participant_id FROM review_entries WHERE review_id = ? ORDER BY id ASC",
    )
    .bind(review_id.0)
    .fetch_all(executor)
    .await?;

    Ok(ids.into_iter().map(UserId).collect())
}

fn review_from_row(row: SqliteRow) -> Result<Review, RepositoryError> {
    Ok(Review {
        id: ReviewId(row.try_get("id")?),
        started_at: parse_timestamp("started_at", row.try_get("started_at")?)?,
        closed_at: parse_timestamp("closed_at", row.try_get("closed_at")?)?,
        announcement_message_id: MessageId(row.try_get("announcement_message_id")?),
        finalized_at: parse_optional_timestamp("finalized_at", row.try_get("finalized_at")?)?,
    })
}

fn entry_from_row(row: SqliteRow) -> Result<SignupEntry, RepositoryError> {
    Ok(SignupEntry {
        review_id: ReviewId(row.try_get("review_id")?),
        participant: UserId(row.try_get("participant_id")?),
        form: SignupForm {
            repository_url: row.try_get("repository_url")?,
            description: row.try_get("description")?,
            check_modules: row.try_get("check_modules")?,
            architecture_image_url: row.try_get("architecture_image_url")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use helpbot_core::domain::review::{MessageId, Review, ReviewWindow, SignupEntry, SignupForm};
    use helpbot_core::domain::user::UserId;

    use super::{
        delete_entry, find_open_at, insert, insert_entry, list_participants, list_unfinalized,
        mark_finalized,
    };
    use crate::{connect_with_settings, migrations::run_pending, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        pool
    }

    fn window() -> ReviewWindow {
        let started_at = Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap();
        ReviewWindow { started_at, closed_at: started_at + Duration::days(2) }
    }

    fn entry(review: &Review, participant: i64) -> SignupEntry {
        SignupEntry {
            review_id: review.id,
            participant: UserId(participant),
            form: SignupForm {
                repository_url: "https://github.com/example/project".to_owned(),
                description: "x".repeat(120),
                check_modules: None,
                architecture_image_url: None,
            },
        }
    }

    #[tokio::test]
    async fn open_lookup_includes_both_window_bounds() {
        let pool = pool().await;
        let window = window();
        let review = insert(&pool, &window, MessageId(9)).await.expect("insert");

        let at_start = find_open_at(&pool, window.started_at).await.expect("query");
        let at_end = find_open_at(&pool, window.closed_at).await.expect("query");
        let after = find_open_at(&pool, window.closed_at + Duration::microseconds(1))
            .await
            .expect("query");

        assert_eq!(at_start.map(|r| r.id), Some(review.id));
        assert_eq!(at_end.map(|r| r.id), Some(review.id));
        assert!(after.is_none());

        mark_finalized(&pool, review.id, window.started_at).await.expect("finalize");
        assert!(find_open_at(&pool, window.started_at).await.expect("query").is_none());
    }

    #[tokio::test]
    async fn participants_come_back_in_signup_order() {
        let pool = pool().await;
        let review = insert(&pool, &window(), MessageId(9)).await.expect("insert");
        let now = Utc::now();

        for participant in [30, 10, 20] {
            insert_entry(&pool, &entry(&review, participant), now).await.expect("entry");
        }
        assert!(delete_entry(&pool, review.id, UserId(10)).await.expect("delete"));

        let participants = list_participants(&pool, review.id).await.expect("list");
        assert_eq!(participants, vec![UserId(30), UserId(20)]);

        let duplicate = insert_entry(&pool, &entry(&review, 30), now).await.expect_err("dup");
        assert!(duplicate.is_unique_violation());
    }

    #[tokio::test]
    async fn finalization_is_recorded_once() {
        let pool = pool().await;
        let review = insert(&pool, &window(), MessageId(9)).await.expect("insert");
        let at = Utc::now();

        assert!(mark_finalized(&pool, review.id, at).await.expect("first"));
        assert!(!mark_finalized(&pool, review.id, at).await.expect("second"));
        assert!(list_unfinalized(&pool).await.expect("list").is_empty());
    }
}
