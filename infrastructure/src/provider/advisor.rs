//! Advisory-service adapter.
//!
//! Returns the model's raw text; validation happens in the application.

use super::client::{ChatClient, CompletionParams, ProviderError};
use super::prompt::ADVISORY_SYSTEM_PROMPT;
use crate::config::FileProviderConfig;
use async_trait::async_trait;
use coach_application::{AdvisoryError, CoachingAdvisor};
use coach_domain::AdvisoryContext;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiAdvisor {
    client: ChatClient,
    params: CompletionParams,
}

impl OpenAiAdvisor {
    pub fn new(client: ChatClient, params: CompletionParams) -> Self {
        Self { client, params }
    }

    pub fn from_config(config: &FileProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = ChatClient::new(&config.base_url, config.resolve_api_key(), timeout)?;
        Ok(Self::new(
            client,
            CompletionParams {
                model: config.advisor_model().to_string(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        ))
    }

    pub fn model(&self) -> &str {
        &self.params.model
    }
}

#[async_trait]
impl CoachingAdvisor for OpenAiAdvisor {
    async fn advise(&self, context: &AdvisoryContext) -> Result<String, AdvisoryError> {
        debug!(
            agent = %context.agent_id,
            round = context.round,
            phase = %context.phase,
            "Requesting coaching advice"
        );
        Ok(self
            .client
            .complete(&self.params, ADVISORY_SYSTEM_PROMPT, &context.to_prompt())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisor_uses_advisor_model() {
        let config = FileProviderConfig {
            model: "extractor".into(),
            advisor_model: Some("coach".into()),
            ..Default::default()
        };
        let advisor = OpenAiAdvisor::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(advisor.model(), "coach");

        let invoker = crate::provider::OpenAiInvoker::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(invoker.model(), "extractor");
    }
}
