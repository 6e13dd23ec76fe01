use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use notecheck_llm::{LlmClient, LlmRequest, LlmResponse};

/// A model that answers prompts either in one piece or as a fragment stream.
///
/// [`LlmClient`] is the production implementation; tests substitute scripted
/// backends.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse>;

    async fn complete_stream(&self, req: &LlmRequest)
        -> Result<BoxStream<'static, Result<String>>>;

    fn describe(&self) -> String;
}

#[async_trait]
impl GenerativeBackend for LlmClient {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        self.chat(req).await
    }

    async fn complete_stream(
        &self,
        req: &LlmRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        self.chat_stream(req).await
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.provider().as_str(), self.model())
    }
}
