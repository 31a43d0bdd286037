// handlers.rs
use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use http::header::LOCATION;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::{AdminAuth, CurrentUser};
use crate::error::{AppError, VoteError};
use crate::models::{Flash, NewQuestion, Question, VoteForm};
use crate::poll::submit_vote;
use crate::state::AppState;

const NO_POLLS: &str = "No polls are available.";

/// Question plus the derived window flags the views display.
#[derive(Serialize)]
struct QuestionView<'a> {
    #[serde(flatten)]
    question: &'a Question,
    was_published_recently: bool,
    can_vote: bool,
}

impl<'a> QuestionView<'a> {
    fn new(question: &'a Question, state: &AppState) -> Self {
        let now = state.clock.now();
        Self {
            question,
            was_published_recently: question.was_published_recently(now),
            can_vote: question.can_vote(now),
        }
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

fn found_with_flash(path: &str, message: &str) -> Response {
    found(&format!("{path}?error={}", urlencoding::encode(message)))
}

fn push_once(messages: &mut Vec<String>, message: String) {
    if !messages.contains(&message) {
        messages.push(message);
    }
}

/// List the latest published questions
pub async fn index(
    State(state): State<AppState>,
    Query(flash): Query<Flash>,
) -> Result<Json<Value>, AppError> {
    let now = state.clock.now();
    let questions = state
        .store
        .published_questions(now, i64::from(state.config.index_limit))
        .await?;

    let mut messages = flash.into_messages();
    if questions.is_empty() {
        push_once(&mut messages, NO_POLLS.to_string());
    }

    let latest: Vec<_> = questions.iter().map(|q| QuestionView::new(q, &state)).collect();
    Ok(Json(json!({
        "latest_question_list": latest,
        "messages": messages,
    })))
}

async fn render_detail(
    state: &AppState,
    question: &Question,
    mut messages: Vec<String>,
    error_message: Option<String>,
) -> Result<Json<Value>, AppError> {
    if !question.can_vote(state.clock.now()) {
        push_once(&mut messages, VoteError::VotingClosed.to_string());
    }
    let choices = state.store.choices(question.id).await?;

    Ok(Json(json!({
        "question": QuestionView::new(question, state),
        "choices": choices,
        "messages": messages,
        "error_message": error_message,
    })))
}

/// Show a published question with its choices
pub async fn detail(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Query(flash): Query<Flash>,
) -> Result<Json<Value>, AppError> {
    let now = state.clock.now();
    let question = state
        .store
        .question(question_id)
        .await?
        .filter(|q| q.is_published(now))
        .ok_or(AppError::NotFound)?;

    render_detail(&state, &question, flash.into_messages(), None).await
}

/// Vote counts for every choice, counted at request time
pub async fn results(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let question = state
        .store
        .question(question_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let tally = state.store.tally(question.id).await?;
    let total: i64 = tally.iter().map(|t| t.votes).sum();

    Ok(Json(json!({
        "question": QuestionView::new(&question, &state),
        "choices": tally,
        "total_votes": total,
    })))
}

/// Cast or change the current user's vote
pub async fn vote(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    CurrentUser(user): CurrentUser,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Response, AppError> {
    let now = state.clock.now();
    // an unreadable or missing body means no choice was selected
    let form = form.map(|Form(form)| form).unwrap_or(VoteForm { choice: None });

    match submit_vote(state.store.as_ref(), &user, question_id, form.choice_id(), now).await {
        Ok(_) => Ok(found(&format!("/polls/{question_id}/results"))),
        Err(VoteError::NotFound) => Err(AppError::NotFound),
        Err(e @ VoteError::NotPublished) => Ok(found_with_flash("/polls", &e.to_string())),
        Err(e @ VoteError::VotingClosed) => Ok(found_with_flash(
            &format!("/polls/{question_id}"),
            &e.to_string(),
        )),
        Err(e @ VoteError::InvalidChoice) => {
            // stay on the form instead of redirecting
            let question = state
                .store
                .question(question_id)
                .await?
                .ok_or(AppError::NotFound)?;
            let page = render_detail(&state, &question, Vec::new(), Some(e.to_string())).await?;
            Ok(page.into_response())
        }
        Err(VoteError::Store(e)) => Err(e.into()),
    }
}

/// Create a question and its choices (admin only)
pub async fn create_question(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(new): Json<NewQuestion>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if new.text.trim().is_empty() {
        return Err(AppError::BadRequest("question text must not be empty".into()));
    }
    if new.choices.iter().any(|c| c.trim().is_empty()) {
        return Err(AppError::BadRequest("choice text must not be empty".into()));
    }

    let resolved = new.resolve(state.clock.now())?;
    let question = state.store.create_question(resolved).await?;
    let choices = state.store.choices(question.id).await?;
    tracing::info!(question_id = question.id, choices = choices.len(), "question created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "question": question, "choices": choices })),
    ))
}

#[derive(Deserialize)]
pub struct NewChoice {
    pub text: String,
}

/// Add a choice to an existing question (admin only)
pub async fn add_choice(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Json(new): Json<NewChoice>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if new.text.trim().is_empty() {
        return Err(AppError::BadRequest("choice text must not be empty".into()));
    }
    let choice = state.store.add_choice(question_id, &new.text).await?;
    Ok((StatusCode::CREATED, Json(json!(choice))))
}

/// Delete a question with its choices and votes (admin only)
pub async fn delete_question(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_question(question_id).await? {
        tracing::info!(question_id, "question deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// Delete a choice with its votes (admin only)
pub async fn delete_choice(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(choice_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_choice(choice_id).await? {
        tracing::info!(choice_id, "choice deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
