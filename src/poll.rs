// src/poll.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{StoreError, VoteError};
use crate::models::{Choice, UserId};
use crate::store::PollStore;

/// What a successful submission did to the user's vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// First vote of this user on the question.
    VoteCreated { choice: Choice },
    /// The existing vote now points at `new_choice`. Re-submitting the same
    /// choice lands here with `previous_choice == new_choice.id`.
    VoteChanged { previous_choice: i64, new_choice: Choice },
}

impl VoteOutcome {
    pub fn choice(&self) -> &Choice {
        match self {
            VoteOutcome::VoteCreated { choice } => choice,
            VoteOutcome::VoteChanged { new_choice, .. } => new_choice,
        }
    }
}

/// Records `user`'s vote on a question, replacing any earlier vote they cast
/// on it.
///
/// Gates are checked in order: the question must exist, be published, and be
/// open for voting at `now`, and `choice_id` must name one of its choices.
/// Nothing is written unless every gate passes.
pub async fn submit_vote(
    store: &dyn PollStore,
    user: &UserId,
    question_id: i64,
    choice_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<VoteOutcome, VoteError> {
    let result = try_submit(store, user, question_id, choice_id, now).await;

    match &result {
        Ok(VoteOutcome::VoteCreated { choice }) => {
            info!(user = %user, question_id, choice_id = choice.id, "vote recorded");
        }
        Ok(VoteOutcome::VoteChanged {
            previous_choice,
            new_choice,
        }) => {
            info!(
                user = %user,
                question_id,
                previous_choice,
                choice_id = new_choice.id,
                "vote changed"
            );
        }
        Err(VoteError::Store(_)) => {}
        Err(e) => debug!(user = %user, question_id, ?choice_id, reason = %e, "vote rejected"),
    }

    result
}

async fn try_submit(
    store: &dyn PollStore,
    user: &UserId,
    question_id: i64,
    choice_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<VoteOutcome, VoteError> {
    let question = store.question(question_id).await?.ok_or(VoteError::NotFound)?;

    if !question.is_published(now) {
        return Err(VoteError::NotPublished);
    }
    if !question.can_vote(now) {
        return Err(VoteError::VotingClosed);
    }

    let choice_id = choice_id.ok_or(VoteError::InvalidChoice)?;
    let choice = store
        .choice_for_question(question.id, choice_id)
        .await?
        .ok_or(VoteError::InvalidChoice)?;

    let previous = match store.record_vote(user, question.id, choice.id).await {
        Ok(previous) => previous,
        // choice deleted between lookup and write
        Err(StoreError::ChoiceMismatch { .. }) => return Err(VoteError::InvalidChoice),
        Err(e) => return Err(e.into()),
    };

    Ok(match previous {
        None => VoteOutcome::VoteCreated { choice },
        Some(previous_choice) => VoteOutcome::VoteChanged {
            previous_choice,
            new_choice: choice,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{NewQuestion, Question};

    struct Fixture {
        store: MemoryStore,
        question: Question,
        a: Choice,
        b: Choice,
    }

    async fn fixture(new: NewQuestion, now: DateTime<Utc>) -> Fixture {
        let store = MemoryStore::new();
        let question = store
            .create_question(new.with_choices(["A", "B"]).resolve(now).unwrap())
            .await
            .unwrap();
        let mut choices = store.choices(question.id).await.unwrap().into_iter();
        let a = choices.next().unwrap();
        let b = choices.next().unwrap();
        Fixture { store, question, a, b }
    }

    #[tokio::test]
    async fn vote_then_change_moves_the_count() {
        let now = Utc::now();
        let f = fixture(NewQuestion::new("Q", now - Duration::days(1)), now).await;
        let user = UserId::new("alice");

        let first = submit_vote(&f.store, &user, f.question.id, Some(f.a.id), now).await.unwrap();
        assert_eq!(first, VoteOutcome::VoteCreated { choice: f.a.clone() });
        assert_eq!(f.store.vote_count(f.a.id).await.unwrap(), 1);

        let second = submit_vote(&f.store, &user, f.question.id, Some(f.b.id), now).await.unwrap();
        assert_eq!(
            second,
            VoteOutcome::VoteChanged {
                previous_choice: f.a.id,
                new_choice: f.b.clone()
            }
        );
        assert_eq!(f.store.vote_count(f.a.id).await.unwrap(), 0);
        assert_eq!(f.store.vote_count(f.b.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeating_the_same_vote_is_a_no_op() {
        let now = Utc::now();
        let f = fixture(NewQuestion::new("Q", now - Duration::hours(1)), now).await;
        let user = UserId::new("alice");

        submit_vote(&f.store, &user, f.question.id, Some(f.a.id), now).await.unwrap();
        let again = submit_vote(&f.store, &user, f.question.id, Some(f.a.id), now + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(again.choice().id, f.a.id);
        assert!(matches!(again, VoteOutcome::VoteChanged { previous_choice, .. } if previous_choice == f.a.id));
        assert_eq!(f.store.vote_count(f.a.id).await.unwrap(), 1);
        assert_eq!(f.store.vote_for(&user, f.question.id).await.unwrap().unwrap().choice_id, f.a.id);
    }

    #[tokio::test]
    async fn different_users_are_counted_separately() {
        let now = Utc::now();
        let f = fixture(NewQuestion::new("Q", now - Duration::hours(1)), now).await;

        for user in ["alice", "bob", "carol"] {
            submit_vote(&f.store, &UserId::new(user), f.question.id, Some(f.a.id), now)
                .await
                .unwrap();
        }
        assert_eq!(f.store.vote_count(f.a.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unknown_question_is_not_found() {
        let store = MemoryStore::new();
        let err = submit_vote(&store, &UserId::new("alice"), 7, Some(1), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::NotFound));
    }

    #[tokio::test]
    async fn unpublished_question_refuses_votes() {
        let now = Utc::now();
        let f = fixture(NewQuestion::new("Q", now + Duration::days(1)), now).await;

        let err = submit_vote(&f.store, &UserId::new("alice"), f.question.id, Some(f.a.id), now)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::NotPublished));
        assert_eq!(f.store.vote_count(f.a.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn closed_question_refuses_votes() {
        let now = Utc::now();
        let new = NewQuestion::new("Q", now - Duration::days(2)).closing_at(now - Duration::hours(1));
        let f = fixture(new, now).await;
        let user = UserId::new("alice");

        let err = submit_vote(&f.store, &user, f.question.id, Some(f.a.id), now)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::VotingClosed));
        assert!(f.store.vote_for(&user, f.question.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_or_missing_choice_is_invalid() {
        let now = Utc::now();
        let f = fixture(NewQuestion::new("Q", now - Duration::hours(1)), now).await;
        let other = f
            .store
            .create_question(NewQuestion::new("Other", now).with_choices(["X"]).resolve(now).unwrap())
            .await
            .unwrap();
        let foreign = f.store.choices(other.id).await.unwrap().remove(0);
        let user = UserId::new("alice");

        submit_vote(&f.store, &user, f.question.id, Some(f.a.id), now).await.unwrap();

        for choice_id in [Some(foreign.id), Some(9_999), None] {
            let err = submit_vote(&f.store, &user, f.question.id, choice_id, now)
                .await
                .unwrap_err();
            assert!(matches!(err, VoteError::InvalidChoice));
        }

        // the earlier vote is untouched
        assert_eq!(f.store.vote_for(&user, f.question.id).await.unwrap().unwrap().choice_id, f.a.id);
        assert_eq!(f.store.vote_count(foreign.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_duplicate_submissions_leave_one_vote() {
        let now = Utc::now();
        let Fixture { store, question, a, b } =
            fixture(NewQuestion::new("Q", now - Duration::hours(1)), now).await;
        let store = Arc::new(store);
        let user = UserId::new("alice");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let user = user.clone();
                let choice = if i % 2 == 0 { a.id } else { b.id };
                let question_id = question.id;
                tokio::spawn(async move {
                    submit_vote(store.as_ref(), &user, question_id, Some(choice), now).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let total = store.vote_count(a.id).await.unwrap() + store.vote_count(b.id).await.unwrap();
        assert_eq!(total, 1);
    }
}
