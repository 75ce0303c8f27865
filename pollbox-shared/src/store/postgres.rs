//! PostgreSQL implementation of [`PollStore`]
//!
//! Poll rows and option rows are loaded separately and stitched together,
//! so every listing costs two queries regardless of page size.
//!
//! Vote and bookmark uniqueness rely on table constraints, not on
//! check-then-insert. See `migrations/` for the schema.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool, Postgres};
use tracing::{debug, info};

use super::{
    already_voted, option_not_in_poll, poll_not_found, user_not_found, PollStore, StoreError,
    StoreResult,
};
use crate::models::{
    poll::{NewPoll, PageRequest, Poll, PollOption, PollPage},
    user::{CreateUser, User},
    vote::Vote,
};

const POLL_COLUMNS: &str =
    "p.id, p.user_id, u.username, p.title, p.description, p.created_at";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for migrations and shutdown
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn with_options(&self, records: Vec<PollRecord>) -> StoreResult<Vec<Poll>> {
        with_options(&self.pool, records).await
    }

    async fn poll_exists(&self, poll_id: i64) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM polls WHERE id = $1)")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

/// Loads options for the given poll rows and assembles full polls
async fn with_options<'e, E>(executor: E, records: Vec<PollRecord>) -> StoreResult<Vec<Poll>>
where
    E: Executor<'e, Database = Postgres>,
{
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    let options: Vec<PollOption> = sqlx::query_as(
        "SELECT id, poll_id, position, text, vote_count
         FROM options
         WHERE poll_id = ANY($1)
         ORDER BY poll_id, position",
    )
    .bind(&ids)
    .fetch_all(executor)
    .await?;

    let mut by_poll: HashMap<i64, Vec<PollOption>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id).or_default().push(option);
    }

    Ok(records
        .into_iter()
        .map(|r| {
            let options = by_poll.remove(&r.id).unwrap_or_default();
            r.to_domain(options)
        })
        .collect())
}

#[derive(FromRow)]
struct PollRecord {
    id: i64,
    user_id: i64,
    username: String,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl PollRecord {
    fn to_domain(self, options: Vec<PollOption>) -> Poll {
        Poll {
            id: self.id,
            user_id: self.user_id,
            username: self.username,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            vote_count: options.iter().map(|o| o.vote_count).sum(),
            options,
        }
    }
}

/// Maps constraint violations onto domain errors
fn map_user_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("users_username_key") => {
                    StoreError::Conflict("Username is already taken".to_string())
                }
                _ => StoreError::Conflict("Email is already registered".to_string()),
            };
        }
    }
    StoreError::Database(err)
}

/// Maps a foreign key violation on a vote or bookmark insert
///
/// Constraint names follow PostgreSQL's `<table>_<column>_fkey` default. A
/// missing user means the token outlived its account; anything else means
/// the poll vanished mid-request.
fn map_reference_error(err: sqlx::Error, user_id: i64, poll_id: i64) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_foreign_key_violation() {
            return match db.constraint() {
                Some(c) if c.ends_with("_user_id_fkey") => user_not_found(user_id),
                _ => poll_not_found(poll_id),
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl PollStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: CreateUser) -> StoreResult<User> {
        let created: User = sqlx::query_as(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id, username, email, password_hash, created_at",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_insert_error)?;

        info!(user_id = created.id, "User created");
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_poll(&self, owner_id: i64, poll: &NewPoll) -> StoreResult<Poll> {
        let mut tx = self.pool.begin().await?;

        let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        let username = username.ok_or_else(|| user_not_found(owner_id))?;

        let (poll_id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO polls (user_id, title, description)
             VALUES ($1, $2, $3)
             RETURNING id, created_at",
        )
        .bind(owner_id)
        .bind(poll.title())
        .bind(poll.description())
        .fetch_one(&mut *tx)
        .await?;

        let mut options = Vec::with_capacity(poll.options().len());
        for (position, text) in poll.options().iter().enumerate() {
            let option: PollOption = sqlx::query_as(
                "INSERT INTO options (poll_id, position, text)
                 VALUES ($1, $2, $3)
                 RETURNING id, poll_id, position, text, vote_count",
            )
            .bind(poll_id)
            .bind(position as i32)
            .bind(text)
            .fetch_one(&mut *tx)
            .await?;
            options.push(option);
        }

        tx.commit().await?;

        info!(poll_id, owner_id, options = options.len(), "Poll created");

        Ok(Poll {
            id: poll_id,
            user_id: owner_id,
            username,
            title: poll.title().to_string(),
            description: poll.description().to_string(),
            created_at,
            vote_count: 0,
            options,
        })
    }

    async fn get_poll(&self, poll_id: i64) -> StoreResult<Poll> {
        let record: Option<PollRecord> = sqlx::query_as(&format!(
            "SELECT {POLL_COLUMNS}
             FROM polls p JOIN users u ON u.id = p.user_id
             WHERE p.id = $1"
        ))
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        let record = record.ok_or_else(|| poll_not_found(poll_id))?;
        self.with_options(vec![record])
            .await?
            .pop()
            .ok_or_else(|| poll_not_found(poll_id))
    }

    async fn list_polls(&self, page: PageRequest) -> StoreResult<PollPage> {
        // One snapshot for the count, the page and its options
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls")
            .fetch_one(&mut *tx)
            .await?;

        let records: Vec<PollRecord> = sqlx::query_as(&format!(
            "SELECT {POLL_COLUMNS}
             FROM polls p JOIN users u ON u.id = p.user_id
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit() as i64)
        .bind(page.offset())
        .fetch_all(&mut *tx)
        .await?;

        debug!(page = page.page(), returned = records.len(), total, "Listed polls");

        let polls = with_options(&mut *tx, records).await?;
        tx.commit().await?;

        Ok(PollPage {
            polls,
            total,
            page: page.page(),
            limit: page.limit(),
        })
    }

    async fn list_polls_by_user(&self, user_id: i64) -> StoreResult<Vec<Poll>> {
        let records: Vec<PollRecord> = sqlx::query_as(&format!(
            "SELECT {POLL_COLUMNS}
             FROM polls p JOIN users u ON u.id = p.user_id
             WHERE p.user_id = $1
             ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_options(records).await
    }

    async fn delete_poll(&self, poll_id: i64, requester_id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM polls WHERE id = $1 FOR UPDATE")
            .bind(poll_id)
            .fetch_optional(&mut *tx)
            .await?;

        match owner {
            None => return Err(poll_not_found(poll_id)),
            Some(owner) if owner != requester_id => {
                return Err(StoreError::Forbidden(
                    "Only the poll's owner can delete it".to_string(),
                ))
            }
            Some(_) => {}
        }

        // Options, votes and bookmarks go with it via ON DELETE CASCADE
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(poll_id, requester_id, "Poll deleted");
        Ok(())
    }

    async fn cast_vote(&self, user_id: i64, poll_id: i64, option_id: i64) -> StoreResult<Vote> {
        let mut tx = self.pool.begin().await?;

        let poll_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM polls WHERE id = $1)")
                .bind(poll_id)
                .fetch_one(&mut *tx)
                .await?;
        if !poll_exists {
            return Err(poll_not_found(poll_id));
        }

        let option_in_poll: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM options WHERE id = $1 AND poll_id = $2)",
        )
        .bind(option_id)
        .bind(poll_id)
        .fetch_one(&mut *tx)
        .await?;
        if !option_in_poll {
            return Err(option_not_in_poll(option_id, poll_id));
        }

        // A concurrent vote by the same user blocks here until the other
        // transaction finishes, then sees the conflict.
        let vote: Option<Vote> = sqlx::query_as(
            "INSERT INTO votes (user_id, poll_id, option_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, poll_id) DO NOTHING
             RETURNING id, user_id, poll_id, option_id, created_at",
        )
        .bind(user_id)
        .bind(poll_id)
        .bind(option_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_reference_error(e, user_id, poll_id))?;

        let vote = vote.ok_or_else(already_voted)?;

        sqlx::query("UPDATE options SET vote_count = vote_count + 1 WHERE id = $1")
            .bind(option_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id, poll_id, option_id, "Vote recorded");
        Ok(vote)
    }

    async fn find_vote(&self, user_id: i64, poll_id: i64) -> StoreResult<Option<Vote>> {
        let vote = sqlx::query_as(
            "SELECT id, user_id, poll_id, option_id, created_at
             FROM votes
             WHERE user_id = $1 AND poll_id = $2",
        )
        .bind(user_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn is_bookmarked(&self, user_id: i64, poll_id: i64) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookmarks WHERE user_id = $1 AND poll_id = $2)",
        )
        .bind(user_id)
        .bind(poll_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn add_bookmark(&self, user_id: i64, poll_id: i64) -> StoreResult<()> {
        if !self.poll_exists(poll_id).await? {
            return Err(poll_not_found(poll_id));
        }

        let result = sqlx::query(
            "INSERT INTO bookmarks (user_id, poll_id)
             VALUES ($1, $2)
             ON CONFLICT (user_id, poll_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(poll_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_reference_error(e, user_id, poll_id))?;

        debug!(user_id, poll_id, inserted = result.rows_affected(), "Bookmark added");
        Ok(())
    }

    async fn remove_bookmark(&self, user_id: i64, poll_id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND poll_id = $2")
            .bind(user_id)
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        debug!(user_id, poll_id, removed = result.rows_affected(), "Bookmark removed");
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: i64) -> StoreResult<Vec<Poll>> {
        let records: Vec<PollRecord> = sqlx::query_as(&format!(
            "SELECT {POLL_COLUMNS}
             FROM bookmarks b
             JOIN polls p ON p.id = b.poll_id
             JOIN users u ON u.id = p.user_id
             WHERE b.user_id = $1
             ORDER BY b.created_at DESC, p.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_options(records).await
    }
}
