//! Web polling service: published questions, one vote per user per
//! question, and live results.
//!
//! The voting rules live in [`models::Question`] and [`poll::submit_vote`];
//! everything else is plumbing around a [`store::PollStore`].

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod poll;
pub mod routes;
pub mod state;
pub mod store;

pub use error::{AppError, StoreError, VoteError};
pub use poll::{submit_vote, VoteOutcome};
pub use state::AppState;
pub use store::PollStore;
