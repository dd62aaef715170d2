//! Context stage. Always continues: a failed lookup degrades to an empty
//! context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use kambot_types::StageName;

use super::bounded;
use super::state::{PipelineState, StageResult};
use super::traits::{ContextRetriever, Stage};

pub struct ContextStage {
    retriever: Arc<dyn ContextRetriever>,
    timeout: Duration,
}

impl ContextStage {
    pub fn new(retriever: Arc<dyn ContextRetriever>, timeout: Duration) -> Self {
        Self { retriever, timeout }
    }
}

#[async_trait]
impl Stage for ContextStage {
    fn name(&self) -> StageName {
        StageName::Context
    }

    async fn run(&self, state: &PipelineState) -> StageResult {
        match bounded(
            "context.retrieve",
            self.timeout,
            self.retriever.retrieve(state.text()),
        )
        .await
        {
            Ok(snippets) => {
                debug!(snippets = snippets.len(), "context retrieved");
                StageResult::Continue(state.clone().with_context(snippets))
            }
            Err(e) => {
                warn!(error = %e, "context retrieval failed, continuing without context");
                StageResult::Continue(
                    state
                        .clone()
                        .with_context_warning(format!("retrieval failed: {e}")),
                )
            }
        }
    }
}
