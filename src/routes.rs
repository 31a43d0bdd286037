// routes.rs
use std::time::Duration;

use axum::{
    extract::Request,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %request.method(),
            uri = %request.uri()
        )
    });

    Router::new()
        .route("/polls", get(handlers::index))
        .route("/polls/{question_id}", get(handlers::detail))
        .route("/polls/{question_id}/results", get(handlers::results))
        .route("/polls/{question_id}/vote", post(handlers::vote))
        .route("/admin/questions", post(handlers::create_question))
        .route("/admin/questions/{question_id}", delete(handlers::delete_question))
        .route("/admin/questions/{question_id}/choices", post(handlers::add_choice))
        .route("/admin/choices/{choice_id}", delete(handlers::delete_choice))
        .layer(trace)
        .layer(cors)
        .with_state(state)
}
