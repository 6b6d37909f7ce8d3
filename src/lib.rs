//! Quizwise: quiz authoring, taking and grading.
//!
//! The binary in `main.rs` wires these modules into an axum server; `client`
//! and `session` are the consumer side used to take an assessment over HTTP.

pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod logic;
pub mod openai;
pub mod protocol;
pub mod routes;
pub mod scoring;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
