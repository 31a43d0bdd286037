// memory.rs
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{Choice, ChoiceTally, Question, ResolvedQuestion, UserId, Vote};
use crate::store::PollStore;

#[derive(Default)]
struct Tables {
    next_id: i64,
    questions: BTreeMap<i64, Question>,
    choices: BTreeMap<i64, Choice>,
    votes: HashMap<(UserId, i64), Vote>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Every operation runs under one lock, which makes
/// `record_vote` atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        Ok(self.tables.lock().await.questions.get(&id).cloned())
    }

    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.pub_date <= now)
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        questions.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(questions)
    }

    async fn choices(&self, question_id: i64) -> Result<Vec<Choice>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn choice_for_question(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .get(&choice_id)
            .filter(|c| c.question_id == question_id)
            .cloned())
    }

    async fn vote_for(&self, user: &UserId, question_id: i64) -> Result<Option<Vote>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.votes.get(&(user.clone(), question_id)).cloned())
    }

    async fn record_vote(
        &self,
        user: &UserId,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        let mut tables = self.tables.lock().await;

        let belongs = tables
            .choices
            .get(&choice_id)
            .is_some_and(|c| c.question_id == question_id);
        if !belongs {
            return Err(StoreError::ChoiceMismatch {
                question_id,
                choice_id,
            });
        }

        let key = (user.clone(), question_id);
        if let Some(vote) = tables.votes.get_mut(&key) {
            let previous = vote.choice_id;
            vote.choice_id = choice_id;
            return Ok(Some(previous));
        }

        let id = tables.next_id();
        tables.votes.insert(
            key,
            Vote {
                id,
                user_id: user.as_str().to_string(),
                question_id,
                choice_id,
            },
        );
        Ok(None)
    }

    async fn vote_count(&self, choice_id: i64) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        let count = tables.votes.values().filter(|v| v.choice_id == choice_id).count();
        Ok(count as i64)
    }

    async fn tally(&self, question_id: i64) -> Result<Vec<ChoiceTally>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .map(|c| ChoiceTally {
                choice: c.clone(),
                votes: tables.votes.values().filter(|v| v.choice_id == c.id).count() as i64,
            })
            .collect())
    }

    async fn create_question(&self, question: ResolvedQuestion) -> Result<Question, StoreError> {
        let mut tables = self.tables.lock().await;

        let created = Question {
            id: tables.next_id(),
            text: question.text,
            pub_date: question.pub_date,
            end_date: question.end_date,
        };
        tables.questions.insert(created.id, created.clone());

        for text in question.choices {
            let id = tables.next_id();
            tables.choices.insert(
                id,
                Choice {
                    id,
                    question_id: created.id,
                    text,
                },
            );
        }

        Ok(created)
    }

    async fn add_choice(&self, question_id: i64, text: &str) -> Result<Choice, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.questions.contains_key(&question_id) {
            return Err(StoreError::UnknownQuestion(question_id));
        }

        let choice = Choice {
            id: tables.next_id(),
            question_id,
            text: text.to_string(),
        };
        tables.choices.insert(choice.id, choice.clone());
        Ok(choice)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.questions.remove(&id).is_none() {
            return Ok(false);
        }
        tables.choices.retain(|_, c| c.question_id != id);
        tables.votes.retain(|_, v| v.question_id != id);
        Ok(true)
    }

    async fn delete_choice(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.choices.remove(&id).is_none() {
            return Ok(false);
        }
        tables.votes.retain(|_, v| v.choice_id != id);
        Ok(true)
    }
}
