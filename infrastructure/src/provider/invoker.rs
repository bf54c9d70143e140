//! Model-invocation adapter.

use super::client::{ChatClient, CompletionParams, ProviderError};
use super::prompt::{EXTRACTION_SYSTEM_PROMPT, build_extraction_prompt};
use crate::config::FileProviderConfig;
use async_trait::async_trait;
use coach_application::{InvokeError, InvokeRequest, ModelInvoker};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiInvoker {
    client: ChatClient,
    params: CompletionParams,
}

impl OpenAiInvoker {
    pub fn new(client: ChatClient, params: CompletionParams) -> Self {
        Self { client, params }
    }

    /// Build from the `[provider]` section; `timeout` bounds each HTTP call.
    pub fn from_config(config: &FileProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = ChatClient::new(&config.base_url, config.resolve_api_key(), timeout)?;
        Ok(Self::new(
            client,
            CompletionParams {
                model: config.model.clone(),
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
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        let prompt = build_extraction_prompt(request);
        debug!(
            agent = %request.agent_id,
            document = %request.document_id,
            instruction_version = request.instruction.version,
            pages = request.pages.len(),
            "Invoking extraction model"
        );
        Ok(self
            .client
            .complete(&self.params, EXTRACTION_SYSTEM_PROMPT, &prompt)
            .await?)
    }
}
