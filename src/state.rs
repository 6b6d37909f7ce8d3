//! Application state: the store, outbound clients, prompts and settings.
//!
//! Built once in `main` (the composition root) and shared behind an `Arc`.
//! The model client is optional; without OPENAI_API_KEY generation endpoints
//! answer 503.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{load_prompts_from_env, Prompts, Settings};
use crate::error::StoreError;
use crate::evaluator::Evaluator;
use crate::openai::OpenAI;
use crate::store::{MemoryStore, MongoStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub openai: Option<OpenAI>,
    pub evaluator: Evaluator,
    pub prompts: Prompts,
    pub settings: Settings,
}

impl AppState {
    /// Build state from settings + env: connect the store, load prompts, init clients.
    #[instrument(level = "info", skip_all)]
    pub async fn from_settings(settings: Settings) -> Result<Self, StoreError> {
        let store: Arc<dyn Store> = match &settings.mongodb_uri {
            Some(uri) => Arc::new(MongoStore::connect(uri, &settings.mongodb_db).await?),
            None => {
                warn!(target: "quizwise", "MONGODB_URI not set; using the in-memory store (data is lost on exit)");
                Arc::new(MemoryStore::new())
            }
        };

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "quizwise", base_url = %oa.base_url, model = %oa.model, "Question generation enabled.");
        } else {
            info!(target: "quizwise", "Question generation disabled (no OPENAI_API_KEY).");
        }

        let evaluator = Evaluator::new(settings.evaluator_url.clone());
        info!(target: "quizwise", url = %evaluator.url, "Answer evaluation service configured");

        Ok(Self::new(store, openai, evaluator, load_prompts_from_env(), settings))
    }

    pub fn new(
        store: Arc<dyn Store>,
        openai: Option<OpenAI>,
        evaluator: Evaluator,
        prompts: Prompts,
        settings: Settings,
    ) -> Self {
        Self { store, openai, evaluator, prompts, settings }
    }
}
