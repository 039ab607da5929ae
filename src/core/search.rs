use crate::domain::model::SearchOutcome;
use crate::domain::ports::WebSearch;
use std::sync::Arc;
use std::time::Duration;

pub struct ExternalSearchClient {
    provider: Arc<dyn WebSearch>,
}

impl ExternalSearchClient {
    pub fn new(provider: Arc<dyn WebSearch>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Failures are reported as `Unavailable`, never as errors.
    pub async fn search(&self, query: &str, timeout: Duration) -> SearchOutcome {
        match tokio::time::timeout(timeout, self.provider.search(query)).await {
            Ok(Ok(context)) => {
                tracing::info!(
                    "🔎 {} returned {} citations",
                    self.provider_name(),
                    context.citations.len()
                );
                SearchOutcome::Found(context)
            }
            Ok(Err(e)) => {
                tracing::warn!("🔎 External search failed: {}", e);
                SearchOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!("🔎 External search timed out after {:?}", timeout);
                SearchOutcome::Unavailable {
                    reason: format!("External search timeout after {}ms", timeout.as_millis()),
                }
            }
        }
    }
}
