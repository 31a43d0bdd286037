// src/db.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{Choice, ChoiceTally, Question, ResolvedQuestion, UserId, Vote};
use crate::store::PollStore;

pub async fn create_pool(database_url: &str, config: &Config) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");

    Ok(pool)
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serializes writers for one `(user, question)` until the transaction ends.
    async fn lock_vote_key(
        tx: &mut Transaction<'_, Postgres>,
        user: &UserId,
        question_id: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || ':' || $2::text, 0))")
            .bind(user.as_str())
            .bind(question_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, text, pub_date, end_date FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }

    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Question>, StoreError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, text, pub_date, end_date
            FROM questions
            WHERE pub_date <= $1
            ORDER BY pub_date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn choices(&self, question_id: i64) -> Result<Vec<Choice>, StoreError> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, text FROM choices WHERE question_id = $1 ORDER BY id",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(choices)
    }

    async fn choice_for_question(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, StoreError> {
        let choice = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, text FROM choices WHERE id = $1 AND question_id = $2",
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(choice)
    }

    async fn vote_for(&self, user: &UserId, question_id: i64) -> Result<Option<Vote>, StoreError> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, user_id, question_id, choice_id
            FROM votes
            WHERE user_id = $1 AND question_id = $2
            "#,
        )
        .bind(user.as_str())
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn record_vote(
        &self,
        user: &UserId,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_vote_key(&mut tx, user, question_id).await?;

        let previous = sqlx::query_scalar::<_, i64>(
            "SELECT choice_id FROM votes WHERE user_id = $1 AND question_id = $2",
        )
        .bind(user.as_str())
        .bind(question_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Insert or move the vote; the unique key backs up the advisory lock
        let written = sqlx::query(
            r#"
            INSERT INTO votes (user_id, question_id, choice_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, question_id) DO UPDATE
            SET choice_id = EXCLUDED.choice_id
            "#,
        )
        .bind(user.as_str())
        .bind(question_id)
        .bind(choice_id)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(e)) = &written {
            if e.is_foreign_key_violation() {
                return Err(StoreError::ChoiceMismatch {
                    question_id,
                    choice_id,
                });
            }
        }
        written?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn vote_count(&self, choice_id: i64) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE choice_id = $1")
            .bind(choice_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn tally(&self, question_id: i64) -> Result<Vec<ChoiceTally>, StoreError> {
        let tally = sqlx::query_as::<_, ChoiceTally>(
            r#"
            SELECT c.id, c.question_id, c.text, COUNT(v.id) AS votes
            FROM choices c
            LEFT JOIN votes v ON v.choice_id = c.id
            WHERE c.question_id = $1
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tally)
    }

    async fn create_question(&self, question: ResolvedQuestion) -> Result<Question, StoreError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (text, pub_date, end_date)
            VALUES ($1, $2, $3)
            RETURNING id, text, pub_date, end_date
            "#,
        )
        .bind(&question.text)
        .bind(question.pub_date)
        .bind(question.end_date)
        .fetch_one(&mut *tx)
        .await?;

        for text in &question.choices {
            sqlx::query("INSERT INTO choices (question_id, text) VALUES ($1, $2)")
                .bind(created.id)
                .bind(text)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn add_choice(&self, question_id: i64, text: &str) -> Result<Choice, StoreError> {
        let inserted = sqlx::query_as::<_, Choice>(
            "INSERT INTO choices (question_id, text) VALUES ($1, $2) RETURNING id, question_id, text",
        )
        .bind(question_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(StoreError::UnknownQuestion(question_id))
            }
            other => Ok(other?),
        }
    }

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_choice(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM choices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
