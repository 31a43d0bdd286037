// models.rs
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A poll prompt with a publication window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Question {
    /// True once `now` has reached the publication date.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        now >= self.pub_date
    }

    /// True while `now` lies inside `[pub_date, end_date]`. A question
    /// without an end date stays open once published.
    pub fn can_vote(&self, now: DateTime<Utc>) -> bool {
        match self.end_date {
            None => self.is_published(now),
            Some(end_date) => self.pub_date <= now && now <= end_date,
        }
    }

    /// True if the question went live in the 24 hours up to and including `now`.
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) < self.pub_date && self.pub_date <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
}

/// A choice together with the number of votes currently pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ChoiceTally {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub choice: Choice,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: i64,
    pub user_id: String,
    pub question_id: i64,
    pub choice_id: i64,
}

/// Opaque identity handed to us by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Administrative input for a new question.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    /// Defaults to the creation time.
    pub pub_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl NewQuestion {
    pub fn new(text: impl Into<String>, pub_date: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            pub_date: Some(pub_date),
            end_date: None,
            choices: Vec::new(),
        }
    }

    pub fn closing_at(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves the publication date against `now` and rejects a window
    /// that closes before it opens.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<ResolvedQuestion, StoreError> {
        let pub_date = self.pub_date.unwrap_or(now);
        if let Some(end_date) = self.end_date {
            if end_date < pub_date {
                return Err(StoreError::InvalidWindow { pub_date, end_date });
            }
        }

        Ok(ResolvedQuestion {
            text: self.text,
            pub_date,
            end_date: self.end_date,
            choices: self.choices,
        })
    }
}

/// A [`NewQuestion`] whose window has been checked.
#[derive(Debug, Clone)]
pub struct ResolvedQuestion {
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub choices: Vec<String>,
}

/// Form body of the vote endpoint. `choice` stays a string so a missing or
/// garbled value is reported as an invalid choice rather than a 4xx rejection.
#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    pub fn choice_id(&self) -> Option<i64> {
        self.choice.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

/// Flash message carried across a redirect in the `error` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct Flash {
    pub error: Option<String>,
}

impl Flash {
    pub fn into_messages(self) -> Vec<String> {
        self.error.into_iter().collect()
    }
}
