// store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Choice, ChoiceTally, Question, ResolvedQuestion, UserId, Vote};

/// Persistence used by the voting service and the HTTP layer.
///
/// Implementations must make [`PollStore::record_vote`] atomic per
/// `(user, question)`: two concurrent calls for the same pair may never leave
/// more than one vote row behind.
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn question(&self, id: i64) -> Result<Option<Question>, StoreError>;

    /// Questions with `pub_date <= now`, newest first.
    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Question>, StoreError>;

    async fn choices(&self, question_id: i64) -> Result<Vec<Choice>, StoreError>;

    /// Looks a choice up only among the choices of `question_id`.
    async fn choice_for_question(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, StoreError>;

    async fn vote_for(&self, user: &UserId, question_id: i64) -> Result<Option<Vote>, StoreError>;

    /// Creates the user's vote for the question or moves it to `choice_id`.
    /// Returns the choice the vote pointed at before, if there was one.
    async fn record_vote(
        &self,
        user: &UserId,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<i64>, StoreError>;

    /// Counted on every call, never cached.
    async fn vote_count(&self, choice_id: i64) -> Result<i64, StoreError>;

    /// Every choice of the question with its current vote count, in id order.
    async fn tally(&self, question_id: i64) -> Result<Vec<ChoiceTally>, StoreError>;

    async fn create_question(&self, question: ResolvedQuestion) -> Result<Question, StoreError>;

    async fn add_choice(&self, question_id: i64, text: &str) -> Result<Choice, StoreError>;

    /// Removes the question with its choices and votes.
    async fn delete_question(&self, id: i64) -> Result<bool, StoreError>;

    /// Removes the choice with its votes.
    async fn delete_choice(&self, id: i64) -> Result<bool, StoreError>;
}
