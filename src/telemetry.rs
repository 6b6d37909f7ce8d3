//! Logging setup.
//!
//! - LOG_LEVEL takes an EnvFilter directive string. When unset, the default
//!   depends on APP_ENV: development logs our targets at debug, anything else
//!   at info.
//! - LOG_FORMAT is "json" for structured output, "compact" for one-liners,
//!   anything else for the full human format.
//!
//! Our targets: quizwise, quiz, results, auth, generation, evaluation.

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

const APP_TARGETS: [&str; 6] = ["quizwise", "quiz", "results", "auth", "generation", "evaluation"];

fn default_directives(development: bool) -> String {
    let level = if development { "debug" } else { "info" };
    let mut directives = vec!["info".to_string(), "tower_http=info".into(), "mongodb=warn".into()];
    directives.extend(APP_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

pub fn init_tracing() {
    let development = std::env::var("APP_ENV").is_ok_and(|e| e.eq_ignore_ascii_case("development"));
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_directives(development)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().with_current_span(true).init(),
        Ok("compact") => builder.compact().init(),
        _ => builder.with_file(true).with_line_number(true).init(),
    }
}
