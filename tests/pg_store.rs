//! Runs against a live PostgreSQL database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`
use std::sync::Arc;

use chrono::{Duration, Utc};

use poll_service::config::Config;
use poll_service::db::{create_pool, PgStore};
use poll_service::models::{NewQuestion, UserId};
use poll_service::{submit_vote, PollStore, StoreError, VoteError, VoteOutcome};

async fn store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(&url, &Config::default()).await.unwrap();
    PgStore::new(pool)
}

fn unique_user(name: &str) -> UserId {
    UserId::new(format!("{name}-{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn vote_moves_between_choices() {
    let store = store().await;
    let now = Utc::now();
    let question = store
        .create_question(
            NewQuestion::new("pg: move vote", now - Duration::days(1))
                .with_choices(["A", "B"])
                .resolve(now)
                .unwrap(),
        )
        .await
        .unwrap();
    let choices = store.choices(question.id).await.unwrap();
    let user = unique_user("alice");

    let first = submit_vote(&store, &user, question.id, Some(choices[0].id), now).await.unwrap();
    assert!(matches!(first, VoteOutcome::VoteCreated { .. }));

    let second = submit_vote(&store, &user, question.id, Some(choices[1].id), now).await.unwrap();
    assert_eq!(
        second,
        VoteOutcome::VoteChanged {
            previous_choice: choices[0].id,
            new_choice: choices[1].clone()
        }
    );

    let tally = store.tally(question.id).await.unwrap();
    assert_eq!(tally.iter().map(|t| t.votes).collect::<Vec<_>>(), [0, 1]);

    assert!(store.delete_question(question.id).await.unwrap());
    assert!(store.vote_for(&user, question.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn concurrent_duplicates_leave_one_row() {
    let store = Arc::new(store().await);
    let now = Utc::now();
    let question = store
        .create_question(
            NewQuestion::new("pg: concurrent", now - Duration::hours(1))
                .with_choices(["A", "B"])
                .resolve(now)
                .unwrap(),
        )
        .await
        .unwrap();
    let choices = store.choices(question.id).await.unwrap();
    let user = unique_user("bob");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let user = user.clone();
            let question_id = question.id;
            let choice_id = choices[i % 2].id;
            tokio::spawn(async move {
                submit_vote(store.as_ref(), &user, question_id, Some(choice_id), now).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let total: i64 = store.tally(question.id).await.unwrap().iter().map(|t| t.votes).sum();
    assert_eq!(total, 1);
    store.delete_question(question.id).await.unwrap();
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn storage_rejects_choice_of_another_question() {
    let store = store().await;
    let now = Utc::now();
    let make = |text: &'static str| {
        NewQuestion::new(text, now - Duration::hours(1))
            .with_choices(["X"])
            .resolve(now)
            .unwrap()
    };
    let q1 = store.create_question(make("pg: first")).await.unwrap();
    let q2 = store.create_question(make("pg: second")).await.unwrap();
    let foreign = store.choices(q2.id).await.unwrap().remove(0);
    let user = unique_user("carol");

    let err = store.record_vote(&user, q1.id, foreign.id).await.unwrap_err();
    assert!(matches!(err, StoreError::ChoiceMismatch { .. }));

    let err = submit_vote(&store, &user, q1.id, Some(foreign.id), now).await.unwrap_err();
    assert!(matches!(err, VoteError::InvalidChoice));

    store.delete_question(q1.id).await.unwrap();
    store.delete_question(q2.id).await.unwrap();
}
